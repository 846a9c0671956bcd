//! Operator view: the projection cards plus the controls that apply to them

use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ProjectionView, TimerCard};
use crate::state::{StoreError, StoreResult, TimerRecord, TimerStatus, TimerStore};

/// Operation an operator can trigger on a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerAction {
    Start,
    Pause,
    Reset,
    SetDuration,
    Rename,
    Remove,
}

/// Actions valid for a timer in `status`
pub fn available_actions(status: TimerStatus) -> Vec<TimerAction> {
    let toggle = match status {
        TimerStatus::Paused => Some(TimerAction::Start),
        TimerStatus::Running => Some(TimerAction::Pause),
        TimerStatus::Finished => None,
    };

    toggle
        .into_iter()
        .chain([
            TimerAction::Reset,
            TimerAction::SetDuration,
            TimerAction::Rename,
            TimerAction::Remove,
        ])
        .collect()
}

/// A card with its controls
#[derive(Debug, Clone, Serialize)]
pub struct ControlCard {
    #[serde(flatten)]
    pub card: TimerCard,
    pub actions: Vec<TimerAction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ControlScreen {
    pub generated_at: DateTime<Utc>,
    pub timers: Vec<ControlCard>,
}

/// Read-only display composed with a handle on the store
#[derive(Debug, Clone)]
pub struct ControlView {
    display: ProjectionView,
    controls: Arc<TimerStore>,
}

impl ControlView {
    pub fn new(controls: Arc<TimerStore>) -> Self {
        Self {
            display: ProjectionView::new(controls.subscribe()),
            controls,
        }
    }

    pub fn display(&self) -> &ProjectionView {
        &self.display
    }

    pub fn controls(&self) -> &TimerStore {
        &self.controls
    }

    pub fn render(&self) -> ControlScreen {
        let screen = self.display.render();
        ControlScreen {
            generated_at: screen.generated_at,
            timers: screen
                .timers
                .into_iter()
                .map(|card| ControlCard {
                    actions: available_actions(card.status),
                    card,
                })
                .collect(),
        }
    }

    /// Apply one of the argument-free actions
    pub async fn perform(&self, action: TimerAction, id: &str) -> StoreResult<Option<TimerRecord>> {
        let record = match action {
            TimerAction::Start => self.controls.start(id).await?,
            TimerAction::Pause => self.controls.pause(id).await?,
            TimerAction::Reset => self.controls.reset(id).await?,
            TimerAction::Remove => {
                self.controls.remove(id).await?;
                return Ok(None);
            }
            TimerAction::SetDuration | TimerAction::Rename => {
                return Err(StoreError::Validation(format!("{:?} needs an argument", action)))
            }
        };
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        persistence::MemoryStore,
        state::StoreConfig,
    };

    fn control_view() -> ControlView {
        let store = TimerStore::new(Arc::new(MemoryStore::new()), StoreConfig::default());
        ControlView::new(Arc::new(store))
    }

    #[test]
    fn actions_follow_status() {
        assert_eq!(available_actions(TimerStatus::Paused)[0], TimerAction::Start);
        assert_eq!(available_actions(TimerStatus::Running)[0], TimerAction::Pause);

        let finished = available_actions(TimerStatus::Finished);
        assert!(!finished.contains(&TimerAction::Start));
        assert!(finished.contains(&TimerAction::Reset));
    }

    #[tokio::test]
    async fn render_reflects_performed_actions() {
        let view = control_view();
        let timer = view.controls().create("Speech", 90).await.unwrap();

        view.perform(TimerAction::Start, &timer.id).await.unwrap();
        let screen = view.render();
        assert_eq!(screen.timers[0].card.status, TimerStatus::Running);
        assert_eq!(screen.timers[0].actions[0], TimerAction::Pause);

        assert!(view.perform(TimerAction::Remove, &timer.id).await.unwrap().is_none());
        assert!(view.render().timers.is_empty());
    }

    #[tokio::test]
    async fn argument_actions_are_rejected() {
        let view = control_view();
        let timer = view.controls().create("Speech", 90).await.unwrap();

        let err = view.perform(TimerAction::SetDuration, &timer.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn control_card_flattens_the_card() {
        let card = TimerCard::render(&TimerRecord::new("Speech", 90).unwrap());
        let value = serde_json::to_value(ControlCard {
            actions: available_actions(card.status),
            card,
        })
        .unwrap();

        assert_eq!(value["name"], "Speech");
        assert_eq!(value["actions"][0], "start");
    }
}

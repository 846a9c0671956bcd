//! HTTP endpoint handlers

use std::{convert::Infallible, sync::Arc};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::stream::{self, Stream};
use tokio::sync::watch;
use tracing::{info, warn};

use super::responses::{ApiError, DurationRequest, HealthResponse, RenameRequest, StatusResponse};
use crate::{
    persistence::TimerRow,
    state::{AppState, StoreError, TimerRecord, TimerStatus},
    views::{ControlScreen, ProjectionScreen, TimerForm},
};

type ApiResult<T> = Result<T, ApiError>;

// ── Control surface ─────────────────────────────────────────────────────────

/// Handle POST /timers - Create a paused timer
pub async fn create_timer_handler(
    State(state): State<Arc<AppState>>,
    Json(form): Json<TimerForm>,
) -> ApiResult<(StatusCode, Json<TimerRecord>)> {
    let (name, total_seconds) = form.validate()?;
    let timer = state.store.create(&name, total_seconds).await?;
    state.record_action("create");
    Ok((StatusCode::CREATED, Json(timer)))
}

/// Handle POST /timers/:id/start
pub async fn start_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<TimerRecord>> {
    let timer = state.store.start(&id).await?;
    state.record_action("start");
    Ok(Json(timer))
}

/// Handle POST /timers/:id/pause
pub async fn pause_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<TimerRecord>> {
    let timer = state.store.pause(&id).await?;
    state.record_action("pause");
    Ok(Json(timer))
}

/// Handle POST /timers/:id/reset
pub async fn reset_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<TimerRecord>> {
    let timer = state.store.reset(&id).await?;
    state.record_action("reset");
    Ok(Json(timer))
}

/// Handle PUT /timers/:id/duration - Reset to a new duration
pub async fn set_duration_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<DurationRequest>,
) -> ApiResult<Json<TimerRecord>> {
    let timer = state.store.set_duration(&id, request.total_seconds).await?;
    state.record_action("set_duration");
    Ok(Json(timer))
}

/// Handle PUT /timers/:id/name
pub async fn rename_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<RenameRequest>,
) -> ApiResult<Json<TimerRecord>> {
    let timer = state.store.rename(&id, &request.name).await?;
    state.record_action("rename");
    Ok(Json(timer))
}

/// Handle DELETE /timers/:id - Idempotent removal
pub async fn remove_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.store.remove(&id).await? {
        state.record_action("remove");
    }
    Ok(StatusCode::NO_CONTENT)
}

// ── Read surface ────────────────────────────────────────────────────────────

/// Handle GET /timers - Snapshot in creation order
pub async fn list_timers_handler(State(state): State<Arc<AppState>>) -> Json<Vec<TimerRecord>> {
    Json(state.store.list_all())
}

/// Handle GET /projection - Read-only audience view
pub async fn projection_handler(State(state): State<Arc<AppState>>) -> Json<ProjectionScreen> {
    Json(state.projection_view().render())
}

/// Handle GET /control - Operator view with available actions
pub async fn control_handler(State(state): State<Arc<AppState>>) -> Json<ControlScreen> {
    Json(state.control_view().render())
}

/// Handle GET /timers/events - One `snapshot` event per published change
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("Snapshot stream subscriber connected");
    Sse::new(snapshot_events(state.store.subscribe())).keep_alive(KeepAlive::default())
}

fn snapshot_events(
    rx: watch::Receiver<Vec<TimerRecord>>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold((rx, true), |(mut rx, first)| async move {
        if !first && rx.changed().await.is_err() {
            return None;
        }
        let timers = rx.borrow_and_update().clone();
        let event = match Event::default().event("snapshot").json_data(&timers) {
            Ok(event) => event,
            Err(e) => {
                warn!("Failed to encode snapshot event: {}", e);
                Event::default().event("error").data(e.to_string())
            }
        };
        Some((Ok(event), (rx, false)))
    })
}

// ── Record backend for replicas ─────────────────────────────────────────────

/// Handle GET /records - Raw persisted rows
pub async fn list_records_handler(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<TimerRow>>> {
    let rows = state
        .store
        .persistence()
        .list_all()
        .await
        .map_err(StoreError::from)?;
    Ok(Json(rows))
}

/// Handle PUT /records/:id - Insert or replace a row
pub async fn put_record_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(row): Json<TimerRow>,
) -> ApiResult<Json<TimerRow>> {
    check_row_id(&id, &row)?;
    let stored = state
        .store
        .persistence()
        .upsert(row)
        .await
        .map_err(StoreError::from)?;
    refresh_after_remote_write(&state).await;
    Ok(Json(stored))
}

/// Handle PATCH /records/:id - Replace a row only if it still exists
pub async fn patch_record_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(row): Json<TimerRow>,
) -> ApiResult<Json<TimerRow>> {
    check_row_id(&id, &row)?;
    let stored = state
        .store
        .persistence()
        .update(row)
        .await
        .map_err(StoreError::from)?
        .ok_or_else(|| StoreError::NotFound(id.clone()))?;
    refresh_after_remote_write(&state).await;
    Ok(Json(stored))
}

/// Handle DELETE /records/:id
pub async fn delete_record_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .store
        .persistence()
        .delete(&id)
        .await
        .map_err(StoreError::from)?;
    refresh_after_remote_write(&state).await;
    Ok(StatusCode::NO_CONTENT)
}

fn check_row_id(id: &str, row: &TimerRow) -> Result<(), StoreError> {
    if row.id != id {
        return Err(StoreError::Validation(format!(
            "record id {} does not match path id {}",
            row.id, id
        )));
    }
    Ok(())
}

async fn refresh_after_remote_write(state: &AppState) {
    if let Err(e) = state.store.refresh().await {
        warn!("Refresh after remote write failed: {}", e);
    }
}

// ── Ops ─────────────────────────────────────────────────────────────────────

/// Handle GET /status - Store and sync status
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let timers = state.store.list_all();
    let count = |status: TimerStatus| timers.iter().filter(|t| t.status == status).count();
    let (last_action, last_action_time) = state.get_last_action();
    let persistence = state.store.persistence();

    Json(StatusResponse {
        timers: timers.len(),
        running: count(TimerStatus::Running),
        finished: count(TimerStatus::Finished),
        finish_policy: state.store.config().finish_policy,
        persistence: persistence.name().to_string(),
        remote: persistence.is_remote(),
        last_refresh: state.store.last_refresh(),
        last_tick: state.store.last_tick(),
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    })
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

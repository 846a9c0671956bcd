//! Terminal projection: prints the audience view whenever it changes

use std::{io::Write, time::Duration};
use tokio::{
    sync::watch,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use super::shutdown_requested;
use crate::views::ProjectionView;

/// Redraw cadence of the projection clock
pub const CLOCK_INTERVAL: Duration = Duration::from_secs(1);

/// Render `view` to `out` on every published snapshot and every clock
/// second until shutdown
pub async fn projection_feed_task<W>(mut view: ProjectionView, mut out: W, mut shutdown: watch::Receiver<bool>)
where
    W: Write + Send,
{
    info!("Starting projection feed");
    print_screen(&view, &mut out);

    let mut clock = interval_at(Instant::now() + CLOCK_INTERVAL, CLOCK_INTERVAL);
    clock.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = clock.tick() => print_screen(&view, &mut out),
            changed = view.changed() => {
                if !changed {
                    debug!("Timer store dropped, stopping projection feed");
                    break;
                }
                print_screen(&view, &mut out);
            }
            _ = shutdown_requested(&mut shutdown) => break,
        }
    }
}

fn print_screen<W: Write>(view: &ProjectionView, out: &mut W) {
    let screen = view.render();
    if let Err(e) = write!(out, "{}", screen).and_then(|_| out.flush()) {
        warn!("Failed to write projection: {}", e);
    }
}

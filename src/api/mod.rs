//! HTTP API module
//!
//! Control surface, read surface, the raw record backend used by replicas,
//! and ops endpoints.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Control surface
        .route("/timers", post(create_timer_handler).get(list_timers_handler))
        .route("/timers/events", get(events_handler))
        .route("/timers/:id", delete(remove_timer_handler))
        .route("/timers/:id/start", post(start_timer_handler))
        .route("/timers/:id/pause", post(pause_timer_handler))
        .route("/timers/:id/reset", post(reset_timer_handler))
        .route("/timers/:id/duration", put(set_duration_handler))
        .route("/timers/:id/name", put(rename_timer_handler))
        // Views
        .route("/projection", get(projection_handler))
        .route("/control", get(control_handler))
        // Record backend
        .route("/records", get(list_records_handler))
        .route(
            "/records/:id",
            put(put_record_handler)
                .patch(patch_record_handler)
                .delete(delete_record_handler),
        )
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

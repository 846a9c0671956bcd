//! API response structures

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::{FinishPolicy, StoreError};

/// Error body returned by every failing endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn new(message: String) -> Self {
        Self {
            status: "error".to_string(),
            message,
            timestamp: Utc::now(),
        }
    }
}

/// Store error mapped onto an HTTP status
#[derive(Debug)]
pub struct ApiError(pub StoreError);

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self.0 {
            StoreError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::Persistence(_) | StoreError::NotificationChannel(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(ErrorResponse::new(self.0.to_string()))).into_response()
    }
}

/// Body of `PUT /timers/:id/duration`
#[derive(Debug, Clone, Deserialize)]
pub struct DurationRequest {
    pub total_seconds: i64,
}

/// Body of `PUT /timers/:id/name`
#[derive(Debug, Clone, Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

/// Status response with store and sync information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub timers: usize,
    pub running: usize,
    pub finished: usize,
    pub finish_policy: FinishPolicy,
    pub persistence: String,
    pub remote: bool,
    pub last_refresh: Option<DateTime<Utc>>,
    pub last_tick: Option<DateTime<Utc>>,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

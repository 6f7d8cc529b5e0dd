//! API response structures

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::{
    error::{ControlError, Field},
    state::{RigState, ScenarioRunState, TimerState},
};

/// API response structure for control endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub data: T,
}

impl<T> ApiResponse<T> {
    /// Create a new API response
    pub fn new(status: &str, message: impl Into<String>, data: T) -> Self {
        Self {
            status: status.to_string(),
            message: message.into(),
            timestamp: Utc::now(),
            data,
        }
    }

    /// Create a success response
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::new("ok", message, data)
    }
}

/// Full status of the rig
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub rig: RigState,
    pub timer: TimerState,
    pub scenario: ScenarioRunState,
    pub uptime: String,
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

/// Body of every failed request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub kind: String,
    pub message: String,
    /// Fields to mark in the form, if the input was rejected
    pub invalid_fields: Vec<Field>,
    pub timestamp: DateTime<Utc>,
}

/// Control error carried out of a handler
#[derive(Debug)]
pub struct ApiError(pub ControlError);

impl From<ControlError> for ApiError {
    fn from(e: ControlError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            ControlError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ControlError::AlreadyRunning | ControlError::NotConnected | ControlError::Busy(_) => StatusCode::CONFLICT,
            ControlError::Device(_) => StatusCode::BAD_GATEWAY,
            ControlError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match &self.0 {
            ControlError::Validation(_) => "validation",
            ControlError::Device(_) => "device",
            ControlError::AlreadyRunning => "already_running",
            ControlError::NotConnected => "not_connected",
            ControlError::Busy(_) => "busy",
            ControlError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }

        let invalid_fields = match &self.0 {
            ControlError::Validation(v) => v.invalid_fields(),
            _ => Vec::new(),
        };
        let body = ErrorResponse {
            status: "error".to_string(),
            kind: self.kind().to_string(),
            message: self.0.to_string(),
            invalid_fields,
            timestamp: Utc::now(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        devices::{DeviceKind, Language},
        error::{DeviceError, ValidationError},
    };

    #[test]
    fn errors_map_to_status_codes() {
        let cases = [
            (ControlError::Validation(ValidationError::NoCurrent), StatusCode::UNPROCESSABLE_ENTITY),
            (ControlError::AlreadyRunning, StatusCode::CONFLICT),
            (ControlError::NotConnected, StatusCode::CONFLICT),
            (ControlError::Busy("busy"), StatusCode::CONFLICT),
            (
                ControlError::Device(DeviceError::from_status(DeviceKind::Shutter, 3, Language::En)),
                StatusCode::BAD_GATEWAY,
            ),
            (ControlError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).status_code(), expected);
        }
    }
}

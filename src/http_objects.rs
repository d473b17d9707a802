use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use data_model::RunOutcome;
use serde::{Deserialize, Serialize};
use tracing::error;

#[derive(Debug, Serialize, Deserialize)]
pub struct BundlerAPIError {
    #[serde(skip)]
    status_code: StatusCode,
    message: String,
}

impl BundlerAPIError {
    pub fn new(status_code: StatusCode, message: &str) -> Self {
        Self {
            status_code,
            message: message.to_string(),
        }
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for BundlerAPIError {
    fn into_response(self) -> Response {
        error!("API Error: {} - {}", self.status_code, self.message);
        (self.status_code, self.message).into_response()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TtlParams {
    pub ttl_secs: Option<u64>,
}

impl TtlParams {
    /// The requested access URL lifetime, if any, checked against presign
    /// limits.
    pub fn ttl(&self) -> Result<Option<Duration>, BundlerAPIError> {
        parse_ttl(self.ttl_secs).map_err(|e| BundlerAPIError::bad_request(&e))
    }
}

pub fn parse_ttl(ttl_secs: Option<u64>) -> Result<Option<Duration>, String> {
    let Some(secs) = ttl_secs else {
        return Ok(None);
    };
    let ttl = Duration::from_secs(secs);
    blob_store::validate_expiry(ttl).map_err(|e| format!("invalid ttl_secs: {}", e))?;
    Ok(Some(ttl))
}

/// Wraps a [`RunOutcome`] so it renders with the matching status code.
pub struct OutcomeResponse(pub RunOutcome);

impl OutcomeResponse {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            RunOutcome::Published { .. } => StatusCode::OK,
            RunOutcome::NoItems => StatusCode::NOT_FOUND,
            RunOutcome::Failed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for OutcomeResponse {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self.0)).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
}

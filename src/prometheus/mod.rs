mod result_types;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub use result_types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// The JSON envelope wrapping every `/api/v1` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status: ResponseStatus,
    pub data: Option<T>,
    pub error_type: Option<String>,
    pub error: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("{error_type}: {message}")]
pub struct ApiError {
    pub error_type: String,
    pub message: String,
}

/// Decoded payload together with any warnings the server attached to it.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiData<T> {
    pub data: T,
    pub warnings: Vec<String>,
}

impl<T> ApiResponse<T> {
    pub fn into_data(self) -> Result<ApiData<T>, ApiError> {
        match (self.status, self.data) {
            (ResponseStatus::Success, Some(data)) => Ok(ApiData {
                data,
                warnings: self.warnings,
            }),
            (ResponseStatus::Success, None) => Err(ApiError {
                error_type: "bad_response".to_string(),
                message: "response carries no data".to_string(),
            }),
            (ResponseStatus::Error, _) => Err(ApiError {
                error_type: self.error_type.unwrap_or_else(|| "unknown".to_string()),
                message: self.error.unwrap_or_default(),
            }),
        }
    }
}

/// Decodes a response body. Non-2xx bodies are still tried as an envelope since the
/// server reports query errors that way (400, 422, 503).
pub fn decode_body<T: DeserializeOwned>(
    status: StatusCode,
    body: &str,
) -> Result<ApiData<T>, ApiError> {
    match serde_json::from_str::<ApiResponse<T>>(body) {
        Ok(response) => response.into_data(),
        Err(_) if !status.is_success() => Err(ApiError {
            error_type: "http".to_string(),
            message: format!("server returned {status}: {}", body.trim()),
        }),
        Err(e) => Err(ApiError {
            error_type: "bad_response".to_string(),
            message: e.to_string(),
        }),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetsResult {
    #[serde(default)]
    pub active_targets: Vec<ActiveTarget>,
    #[serde(default)]
    pub dropped_targets: Vec<DroppedTarget>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTarget {
    #[serde(default)]
    pub discovered_labels: HashMap<String, String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    pub scrape_pool: String,
    pub scrape_url: String,
    #[serde(default)]
    pub global_url: String,
    #[serde(default)]
    pub last_error: String,
    pub last_scrape: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_scrape_duration: f64,
    pub health: TargetHealth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DroppedTarget {
    #[serde(default)]
    pub discovered_labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetHealth {
    Up,
    Down,
    Unknown,
}

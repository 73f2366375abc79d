//! API request and response types

use serde::{Deserialize, Serialize};

/// Request to run one planning turn
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default, alias = "session_id")]
    pub session_key: String,
}

/// Welcome response
#[derive(Debug, Serialize)]
pub struct WelcomeResponse {
    pub message: &'static str,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Offending field of a rejected plan update
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            path: None,
        }
    }

    pub fn at(error: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            path: Some(path.into()),
        }
    }
}

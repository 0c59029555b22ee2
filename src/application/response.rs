//! Response envelope returned at the service boundary.

use serde::Serialize;

use crate::{FailureStage, SymptraError};

/// `{ success, message, data }`, plus `stage` on failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<FailureStage>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            stage: None,
        }
    }

    /// Only the user-facing message is exposed; the cause stays in the logs.
    pub fn failure(err: &SymptraError) -> Self {
        Self {
            success: false,
            message: err.user_message(),
            data: None,
            stage: Some(err.stage()),
        }
    }
}

impl<T> From<Result<T, SymptraError>> for ApiResponse<T> {
    fn from(result: Result<T, SymptraError>) -> Self {
        match result {
            Ok(data) => Self::ok("OK", data),
            Err(err) => Self::failure(&err),
        }
    }
}

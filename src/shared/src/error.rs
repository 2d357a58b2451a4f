use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("API error: {message}")]
    Api { message: String, status: Option<u16> },

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Gathering error: {0}")]
    Gathering(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Buckets used for per-turn error recording in conversation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Api,
    Auth,
    Validation,
    NotFound,
    Gathering,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Auth => "auth",
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Gathering => "gathering",
            Self::Unknown => "unknown",
        }
    }
}

impl AgentError {
    /// Map an HTTP status from the remote service to the right variant.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => AgentError::Auth(message),
            404 => AgentError::NotFound(message),
            400..=499 => AgentError::Validation(message),
            _ => AgentError::Api {
                message,
                status: Some(status),
            },
        }
    }

    pub fn api(message: impl Into<String>) -> Self {
        AgentError::Api {
            message: message.into(),
            status: None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AgentError::Api { .. } => ErrorCategory::Api,
            AgentError::Auth(_) => ErrorCategory::Auth,
            AgentError::Validation(_) => ErrorCategory::Validation,
            AgentError::NotFound(_) => ErrorCategory::NotFound,
            AgentError::Gathering(_) => ErrorCategory::Gathering,
            AgentError::Unknown(_) => ErrorCategory::Unknown,
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Unknown(err.to_string())
    }
}

impl From<std::io::Error> for AgentError {
    fn from(err: std::io::Error) -> Self {
        AgentError::Unknown(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::Validation(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_picks_variant_by_class() {
        assert_eq!(
            AgentError::from_status(401, "no token").category(),
            ErrorCategory::Auth
        );
        assert_eq!(
            AgentError::from_status(403, "forbidden").category(),
            ErrorCategory::Auth
        );
        assert_eq!(
            AgentError::from_status(404, "missing").category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            AgentError::from_status(422, "bad weights").category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            AgentError::from_status(500, "boom").category(),
            ErrorCategory::Api
        );
    }

    #[test]
    fn server_error_keeps_status() {
        match AgentError::from_status(503, "unavailable") {
            AgentError::Api { status, .. } => assert_eq!(status, Some(503)),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}

use shared::{AgentError, Result};
use std::env;

/// Runtime configuration, loaded once at startup from the environment.
/// `dotenvy` is invoked by the binary before this runs.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub auth_token: Option<String>,
    pub anthropic_api_key: String,
    pub anthropic_base_url: String,
    pub model_name: String,
    pub request_timeout_secs: u64,
    /// Bound on tool-calling iterations in the gathering stage.
    pub max_iterations: u32,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            api_url: env::var("UPGRADE_API_URL")
                .unwrap_or_else(|_| "http://localhost:3030/api".to_string()),
            auth_token: env::var("UPGRADE_AUTH_TOKEN").ok(),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            anthropic_base_url: env::var("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|_| "https://api.anthropic.com".to_string()),
            model_name: env::var("MODEL_NAME")
                .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string()),
            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            max_iterations: env::var("MAX_TOOL_ITERATIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.anthropic_api_key.is_empty() {
            return Err(AgentError::Auth(
                "ANTHROPIC_API_KEY is not set in the environment".into(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(AgentError::Validation(
                "MAX_TOOL_ITERATIONS must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            api_url: "http://localhost:3030/api".into(),
            auth_token: None,
            anthropic_api_key: "key".into(),
            anthropic_base_url: "https://api.anthropic.com".into(),
            model_name: "test".into(),
            request_timeout_secs: 30,
            max_iterations: 10,
        }
    }

    #[test]
    fn validate_rejects_missing_api_key() {
        let config = Config {
            anthropic_api_key: String::new(),
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_iteration_bound() {
        let config = Config {
            max_iterations: 0,
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }
}

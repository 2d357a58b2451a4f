pub mod anthropic;
pub mod config;
pub mod upgrade_client;

pub use anthropic::{AnthropicClient, ChatModel};
pub use config::Config;
pub use upgrade_client::{ExperimentApi, UpGradeClient};

pub mod confirmation;
pub mod error;

pub use error::{AgentError, ErrorCategory, Result};

//! Conversation orchestration: stage routing, the bounded tool loop, the
//! confirmation gate, and tool execution against the experiment service.

pub mod agent_loop;
pub mod context;
pub mod executor;
pub mod gate;
pub mod reference;
pub mod router;
pub mod tools;

#[cfg(test)]
pub mod testing;

pub use agent_loop::{LoopConfig, LoopOutcome};
pub use context::TurnContext;
pub use router::Agent;

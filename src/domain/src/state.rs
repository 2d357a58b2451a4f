//! Conversation state shared across router stages. One instance lives for a
//! whole console session and is owned exclusively by the turn in progress.

use crate::actions::ActionType;
use crate::wire::{ContextMetadataResponse, Experiment, ExperimentName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{AgentError, ErrorCategory};
use std::collections::BTreeMap;

/// Exactly one stage is active at any point in a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Stage {
    #[default]
    Analyzing,
    GatheringInfo,
    Confirming,
    Executing,
    Responding,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analyzing => "ANALYZING",
            Self::GatheringInfo => "GATHERING_INFO",
            Self::Confirming => "CONFIRMING",
            Self::Executing => "EXECUTING",
            Self::Responding => "RESPONDING",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    DirectAnswer,
    NeedsInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub kind: IntentKind,
    pub confidence: f32,
    pub summary: String,
}

/// An action the model has proposed but which has not yet executed. The raw
/// params stay as JSON until the executor parses them into typed form; the
/// missing list is what keeps an incomplete action out of the Executing stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    pub action: ActionType,
    pub params: Value,
    pub missing: Vec<String>,
}

impl PendingAction {
    pub fn is_ready(&self) -> bool {
        self.missing.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confirmation {
    pub message: String,
    pub confirmed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub success: bool,
    pub detail: String,
}

/// Session-scoped lookups that are expensive to refetch. These are never
/// echoed wholesale into prompts; tools read slices out of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cached {
    pub context_metadata: Option<ContextMetadataResponse>,
    pub experiment_names: Option<Vec<ExperimentName>>,
    pub experiments: Option<Vec<Experiment>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub user_input: String,
    pub history: Vec<ChatTurn>,
    pub stage: Stage,
    pub intent: Option<Intent>,
    pub pending_action: Option<PendingAction>,
    pub confirmation: Option<Confirmation>,
    pub gathered: BTreeMap<String, Value>,
    pub cached: Cached,
    pub execution_log: Vec<ExecutionRecord>,
    pub errors: BTreeMap<ErrorCategory, String>,
    pub final_response: Option<String>,
    pub done: bool,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the per-turn fields for a fresh user input. A pending action and
    /// its unanswered confirmation survive across turns; everything else is
    /// turn-local.
    pub fn begin_turn(&mut self, input: &str) {
        self.user_input = input.trim().to_string();
        self.stage = Stage::Analyzing;
        self.intent = None;
        self.gathered.clear();
        self.errors.clear();
        self.final_response = None;
        self.done = false;
        self.history.push(ChatTurn {
            role: Role::User,
            content: self.user_input.clone(),
        });
    }

    pub fn finish_turn(&mut self, response: &str) {
        self.history.push(ChatTurn {
            role: Role::Assistant,
            content: response.to_string(),
        });
        self.final_response = Some(response.to_string());
        self.done = true;
    }

    pub fn record_error(&mut self, err: &AgentError) {
        tracing::warn!(category = err.category().as_str(), error = %err, "stage error recorded");
        self.errors.insert(err.category(), err.to_string());
    }

    pub fn log_execution(&mut self, action: &str, success: bool, detail: impl Into<String>) {
        self.execution_log.push(ExecutionRecord {
            timestamp: Utc::now(),
            action: action.to_string(),
            success,
            detail: detail.into(),
        });
    }

    /// Most recent `n` user/assistant exchanges for prompt context.
    pub fn recent_history(&self, n: usize) -> &[ChatTurn] {
        let keep = n * 2;
        let start = self.history.len().saturating_sub(keep);
        &self.history[start..]
    }

    /// Most recent `n` execution records, newest last.
    pub fn recent_executions(&self, n: usize) -> &[ExecutionRecord] {
        let start = self.execution_log.len().saturating_sub(n);
        &self.execution_log[start..]
    }

    /// True while a confirmation question is outstanding.
    pub fn awaiting_confirmation(&self) -> bool {
        matches!(
            self.confirmation,
            Some(Confirmation {
                confirmed: None,
                ..
            })
        )
    }

    pub fn confirmed(&self) -> bool {
        matches!(
            self.confirmation,
            Some(Confirmation {
                confirmed: Some(true),
                ..
            })
        )
    }

    pub fn clear_pending(&mut self) {
        self.pending_action = None;
        self.confirmation = None;
    }
}

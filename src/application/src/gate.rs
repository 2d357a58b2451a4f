//! Confirmation gate. Every staged action gets a confirmation question built
//! from static templates; no model call is involved, so the question cannot
//! be talked around.

use domain::actions::ActionType;
use domain::state::PendingAction;
use serde_json::Value;
use shared::{AgentError, Result};

pub const CONFIRMATION_SUFFIX: &str =
    "\n\nPlease respond with 'yes' to confirm or 'no' to cancel.";

fn str_param(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// Experiment display name: prefer the name parameter, fall back to the id.
fn name_or_id(params: &Value) -> String {
    str_param(params, "name")
        .or_else(|| str_param(params, "experiment_id"))
        .unwrap_or_else(|| "unknown".into())
}

/// Context may arrive as a bare string or a one-element list.
fn context_param(params: &Value) -> String {
    match params.get("context") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .first()
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
        _ => "unknown".into(),
    }
}

pub fn confirmation_message(pending: &PendingAction) -> Result<String> {
    let params = &pending.params;
    let message = match pending.action {
        ActionType::CreateExperiment => format!(
            "Create experiment '{}' in context '{}'?",
            str_param(params, "name").unwrap_or_else(|| "Unknown".into()),
            context_param(params)
        ),
        ActionType::DeleteExperiment => format!(
            "\u{26a0}\u{fe0f} PERMANENTLY DELETE experiment '{}'? This cannot be undone!",
            name_or_id(params)
        ),
        ActionType::UpdateExperiment => {
            format!("Update experiment '{}' with new settings?", name_or_id(params))
        }
        ActionType::UpdateExperimentStatus => format!(
            "Change experiment '{}' status to '{}'?",
            name_or_id(params),
            str_param(params, "status").unwrap_or_else(|| "unknown".into())
        ),
        ActionType::InitExperimentUser => format!(
            "Initialize user '{}' for experiment simulation?",
            str_param(params, "user_id").unwrap_or_else(|| "unknown".into())
        ),
        ActionType::GetDecisionPointAssignments => format!(
            "Get condition assignments for context '{}'?",
            context_param(params)
        ),
        ActionType::MarkDecisionPoint => {
            let experiment_id = params
                .get("assigned_condition")
                .and_then(|c| c.get("experiment_id"))
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            format!("Mark decision point visit for experiment '{experiment_id}'?")
        }
    };
    Ok(message)
}

/// The full prompt shown to the user, instruction suffix included.
pub fn confirmation_prompt(pending: Option<&PendingAction>) -> Result<String> {
    let pending = pending.ok_or_else(|| {
        AgentError::Validation("nothing is staged, so there is nothing to confirm".into())
    })?;
    Ok(format!(
        "{}{}",
        confirmation_message(pending)?,
        CONFIRMATION_SUFFIX
    ))
}

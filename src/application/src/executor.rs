//! Tool execution. Every tool call resolves to a plain-text result the model
//! can read on the next loop iteration; a failing tool reports its error as
//! text instead of aborting the turn.

use crate::context::TurnContext;
use crate::reference;
use crate::tools::Tool;
use domain::actions::ActionType;
use domain::builder;
use domain::chat::ToolCallRequest;
use domain::params::{missing_required, ActionParams};
use domain::simplified::simplify;
use domain::state::PendingAction;
use domain::wire::{
    AssignRequest, ContextMetadataResponse, ExperimentName, InitUserRequest, MarkAssignedCondition,
    MarkData, MarkRequest, UpdateStateRequest,
};
use serde_json::Value;
use shared::{AgentError, Result};

/// Run one model-issued tool call. The returned string always feeds back into
/// the conversation, success or not.
pub async fn execute_tool(ctx: &mut TurnContext<'_>, call: &ToolCallRequest) -> String {
    let Some(tool) = Tool::from_name(&call.name) else {
        return format!("Unknown tool: {}", call.name);
    };
    match run_tool(ctx, tool, &call.arguments).await {
        Ok(text) => text,
        Err(err) => {
            ctx.state.record_error(&err);
            format!("Tool {} failed: {err}", call.name)
        }
    }
}

async fn run_tool(ctx: &mut TurnContext<'_>, tool: Tool, args: &Value) -> Result<String> {
    match tool {
        Tool::GetCoreTerms => pretty(&reference::core_terms()),
        Tool::GetAssignmentTerms => pretty(&reference::assignment_terms()),
        Tool::GetActionSchema => {
            let action = required_action(args)?;
            pretty(&reference::action_schema(action))
        }
        Tool::GetAvailableContexts => {
            let metadata = context_metadata(ctx).await?;
            Ok(reference::available_contexts(&metadata).join(", "))
        }
        Tool::GetConditionsForContext => {
            let metadata = context_metadata(ctx).await?;
            let context = required_str(args, "context")?;
            Ok(reference::conditions_for_context(&metadata, &context)?.join(", "))
        }
        Tool::GetDecisionPointsForContext => {
            let metadata = context_metadata(ctx).await?;
            let context = required_str(args, "context")?;
            pretty(&reference::decision_points_for_context(&metadata, &context)?)
        }
        Tool::GetGroupTypesForContext => {
            let metadata = context_metadata(ctx).await?;
            let context = required_str(args, "context")?;
            Ok(reference::group_types_for_context(&metadata, &context)?.join(", "))
        }
        Tool::GetHealthStatus => {
            let health = ctx.api.health().await?;
            Ok(format!(
                "Service '{}' is up, version {}.",
                health.name, health.version
            ))
        }
        Tool::GetExperimentNames => {
            let names = experiment_names(ctx).await?;
            if names.is_empty() {
                return Ok("No experiments exist yet.".into());
            }
            Ok(names
                .iter()
                .map(|n| format!("{} (id: {})", n.name, n.id))
                .collect::<Vec<_>>()
                .join("\n"))
        }
        Tool::GetExperimentDetails => {
            let id = resolve_experiment_id(ctx, args).await?;
            let experiment = ctx.api.get_experiment(&id).await?;
            pretty(&serde_json::to_value(simplify(&experiment))?)
        }
        Tool::SetPendingAction => stage_pending_action(ctx, args),
        Tool::Action(action) => {
            // Actions only run once the user has said yes; before that the
            // model can merely stage them.
            if !ctx.state.confirmed() {
                return Err(AgentError::Validation(format!(
                    "{} requires user confirmation before it can run",
                    action.name()
                )));
            }
            let detail = dispatch_action(ctx, action, args).await;
            match &detail {
                Ok(text) => ctx.state.log_execution(action.name(), true, text.clone()),
                Err(err) => ctx.state.log_execution(action.name(), false, err.to_string()),
            }
            detail
        }
    }
}

/// Execute the staged action with its staged parameters. Called from the
/// Executing stage after the confirmation gate has passed.
pub async fn execute_pending(ctx: &mut TurnContext<'_>) -> Result<String> {
    let pending = ctx
        .state
        .pending_action
        .clone()
        .ok_or_else(|| AgentError::Validation("no action is pending execution".into()))?;
    if !pending.is_ready() {
        return Err(AgentError::Validation(format!(
            "{} is still missing parameters: {}",
            pending.action.name(),
            pending.missing.join(", ")
        )));
    }

    let outcome = dispatch_action(ctx, pending.action, &pending.params).await;
    match &outcome {
        Ok(text) => ctx
            .state
            .log_execution(pending.action.name(), true, text.clone()),
        Err(err) => ctx
            .state
            .log_execution(pending.action.name(), false, err.to_string()),
    }
    outcome
}

async fn dispatch_action(
    ctx: &mut TurnContext<'_>,
    action: ActionType,
    raw: &Value,
) -> Result<String> {
    let params = ActionParams::parse(action, raw)?;
    let result = match params {
        ActionParams::Create(p) => {
            let request = builder::build_create_request(&p)?;
            let created = ctx.api.create_experiment(&request).await?;
            invalidate_experiment_cache(ctx);
            format!(
                "Created experiment '{}' (id: {}) in context '{}'. Its status is '{}'.",
                created.name,
                created.id,
                created.context.first().cloned().unwrap_or_default(),
                created.state
            )
        }
        ActionParams::Update(p) => {
            let current = ctx.api.get_experiment(&p.experiment_id).await?;
            let base = builder::experiment_to_request(&current);
            let request = builder::apply_partial_update(&base, &p)?;
            let updated = ctx.api.update_experiment(&p.experiment_id, &request).await?;
            invalidate_experiment_cache(ctx);
            format!("Updated experiment '{}' (id: {}).", updated.name, updated.id)
        }
        ActionParams::UpdateStatus(p) => {
            let request = UpdateStateRequest {
                experiment_id: p.experiment_id.clone(),
                state: p.status,
            };
            let updated = ctx.api.update_state(&request).await?;
            invalidate_experiment_cache(ctx);
            format!(
                "Experiment '{}' is now in status '{}'.",
                updated.name, updated.state
            )
        }
        ActionParams::Delete(p) => {
            let name = experiment_names(ctx)
                .await
                .ok()
                .and_then(|names| {
                    names
                        .iter()
                        .find(|n| n.id == p.experiment_id)
                        .map(|n| n.name.clone())
                })
                .unwrap_or_else(|| p.experiment_id.clone());
            ctx.api.delete_experiment(&p.experiment_id).await?;
            invalidate_experiment_cache(ctx);
            format!("Deleted experiment '{name}'. This cannot be undone.")
        }
        ActionParams::InitUser(p) => {
            let request = InitUserRequest {
                group: p.group.clone(),
                working_group: p.working_group.clone(),
            };
            let user = ctx.api.init_user(&p.user_id, &request).await?;
            format!("Initialized experiment user '{}'.", user.id)
        }
        ActionParams::Assignments(p) => {
            let request = AssignRequest {
                context: p.context.clone(),
            };
            let response = ctx.api.assign(&p.user_id, &request).await?;
            if response.data.is_empty() {
                format!("User '{}' has no assignments in context '{}'.", p.user_id, p.context)
            } else {
                response
                    .data
                    .iter()
                    .map(|a| {
                        let codes: Vec<&str> = a
                            .assigned_condition
                            .iter()
                            .map(|c| c.condition_code.as_str())
                            .collect();
                        format!(
                            "{} / {}: {}",
                            a.site,
                            a.target,
                            codes.join(", ")
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
        ActionParams::Mark(p) => {
            let request = MarkRequest {
                data: MarkData {
                    site: p.decision_point.site.clone(),
                    target: p.decision_point.target.clone(),
                    assigned_condition: Some(MarkAssignedCondition {
                        id: None,
                        condition_code: p.assigned_condition.condition_code.clone(),
                        experiment_id: p.assigned_condition.experiment_id.clone(),
                    }),
                },
                status: p.status,
            };
            let marked = ctx.api.mark(&p.user_id, &request).await?;
            format!(
                "Marked decision point {} / {} for user '{}' with condition '{}'.",
                marked.site, marked.target, p.user_id, p.assigned_condition.condition_code
            )
        }
    };
    Ok(result)
}

fn stage_pending_action(ctx: &mut TurnContext<'_>, args: &Value) -> Result<String> {
    let action = required_action(args)?;
    let params = args.get("params").cloned().unwrap_or(Value::Null);
    if !params.is_object() {
        return Err(AgentError::Validation(
            "set_pending_action requires a 'params' object".into(),
        ));
    }
    let missing = missing_required(action, &params);
    let reply = if missing.is_empty() {
        format!(
            "Action {} is staged with all required parameters. Ask the user to confirm.",
            action.name()
        )
    } else {
        format!(
            "Action {} is staged but still missing: {}. Ask the user for these.",
            action.name(),
            missing.join(", ")
        )
    };
    ctx.state.pending_action = Some(PendingAction {
        action,
        params,
        missing,
    });
    Ok(reply)
}

async fn context_metadata(ctx: &mut TurnContext<'_>) -> Result<ContextMetadataResponse> {
    if let Some(cached) = &ctx.state.cached.context_metadata {
        return Ok(cached.clone());
    }
    let metadata = ctx.api.context_metadata().await?;
    ctx.state.cached.context_metadata = Some(metadata.clone());
    Ok(metadata)
}

async fn experiment_names(ctx: &mut TurnContext<'_>) -> Result<Vec<ExperimentName>> {
    if let Some(cached) = &ctx.state.cached.experiment_names {
        return Ok(cached.clone());
    }
    let names = ctx.api.experiment_names().await?;
    ctx.state.cached.experiment_names = Some(names.clone());
    Ok(names)
}

fn invalidate_experiment_cache(ctx: &mut TurnContext<'_>) {
    ctx.state.cached.experiment_names = None;
    ctx.state.cached.experiments = None;
}

/// Accepts `experiment_id` directly or resolves an exact `experiment_name`
/// through the names listing.
async fn resolve_experiment_id(ctx: &mut TurnContext<'_>, args: &Value) -> Result<String> {
    if let Some(id) = args.get("experiment_id").and_then(Value::as_str) {
        if !id.trim().is_empty() {
            return Ok(id.to_string());
        }
    }
    let Some(name) = args.get("experiment_name").and_then(Value::as_str) else {
        return Err(AgentError::Validation(
            "provide either experiment_id or experiment_name".into(),
        ));
    };
    let names = experiment_names(ctx).await?;
    names
        .iter()
        .find(|n| n.name.eq_ignore_ascii_case(name))
        .map(|n| n.id.clone())
        .ok_or_else(|| AgentError::NotFound(format!("no experiment named '{name}'")))
}

fn required_str(args: &Value, key: &str) -> Result<String> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| AgentError::Validation(format!("missing required argument '{key}'")))
}

fn required_action(args: &Value) -> Result<ActionType> {
    let name = required_str(args, "action")?;
    ActionType::from_name(&name)
        .ok_or_else(|| AgentError::Validation(format!("unknown action '{name}'")))
}

fn pretty(value: &Value) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

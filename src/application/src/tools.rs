//! Closed tool registry. Every tool the model may call is an enum variant;
//! dispatch is a match, so an unknown or misspelled tool name can never reach
//! arbitrary code.

use domain::actions::{ActionType, ALL_ACTIONS};
use domain::chat::ToolSchema;
use serde_json::json;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    GetCoreTerms,
    GetAssignmentTerms,
    GetActionSchema,
    GetAvailableContexts,
    GetConditionsForContext,
    GetDecisionPointsForContext,
    GetGroupTypesForContext,
    GetHealthStatus,
    GetExperimentNames,
    GetExperimentDetails,
    SetPendingAction,
    Action(ActionType),
}

impl Tool {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetCoreTerms => "get_core_terms",
            Self::GetAssignmentTerms => "get_assignment_terms",
            Self::GetActionSchema => "get_action_schema",
            Self::GetAvailableContexts => "get_available_contexts",
            Self::GetConditionsForContext => "get_conditions_for_context",
            Self::GetDecisionPointsForContext => "get_decision_points_for_context",
            Self::GetGroupTypesForContext => "get_group_types_for_context",
            Self::GetHealthStatus => "get_health_status",
            Self::GetExperimentNames => "get_experiment_names",
            Self::GetExperimentDetails => "get_experiment_details",
            Self::SetPendingAction => "set_pending_action",
            Self::Action(action) => action.name(),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        if let Some(action) = ActionType::from_name(name) {
            return Some(Self::Action(action));
        }
        [
            Self::GetCoreTerms,
            Self::GetAssignmentTerms,
            Self::GetActionSchema,
            Self::GetAvailableContexts,
            Self::GetConditionsForContext,
            Self::GetDecisionPointsForContext,
            Self::GetGroupTypesForContext,
            Self::GetHealthStatus,
            Self::GetExperimentNames,
            Self::GetExperimentDetails,
            Self::SetPendingAction,
        ]
        .into_iter()
        .find(|tool| tool.name() == name)
    }

    fn description(&self) -> String {
        match self {
            Self::GetCoreTerms => "Get basic A/B testing and platform terminology.".into(),
            Self::GetAssignmentTerms => {
                "Get assignment rules, consistency, and algorithm information.".into()
            }
            Self::GetActionSchema => {
                "Get the parameter schema and validation rules for one action.".into()
            }
            Self::GetAvailableContexts => "List the app contexts experiments can run in.".into(),
            Self::GetConditionsForContext => {
                "List the condition codes available in an app context.".into()
            }
            Self::GetDecisionPointsForContext => {
                "List the sites and targets available in an app context.".into()
            }
            Self::GetGroupTypesForContext => {
                "List the group types available in an app context.".into()
            }
            Self::GetHealthStatus => "Check that the experiment service is reachable.".into(),
            Self::GetExperimentNames => "List all experiments by name and id.".into(),
            Self::GetExperimentDetails => {
                "Fetch one experiment, by id or by exact name, in simplified form.".into()
            }
            Self::SetPendingAction => {
                "Stage an action for execution once the user confirms. Report any \
                 parameters that are still missing."
                    .into()
            }
            Self::Action(action) => match action {
                ActionType::CreateExperiment => {
                    "Create a new experiment from staged parameters.".into()
                }
                ActionType::UpdateExperiment => {
                    "Apply a partial update to an existing experiment.".into()
                }
                ActionType::UpdateExperimentStatus => {
                    "Change an experiment's status.".into()
                }
                ActionType::DeleteExperiment => {
                    "Permanently delete an experiment. Irreversible.".into()
                }
                ActionType::InitExperimentUser => {
                    "Initialize a simulated user, optionally with group memberships.".into()
                }
                ActionType::GetDecisionPointAssignments => {
                    "Get the condition assignments a user receives in a context.".into()
                }
                ActionType::MarkDecisionPoint => {
                    "Record that a simulated user visited a decision point.".into()
                }
            },
        }
    }

    fn input_schema(&self) -> serde_json::Value {
        let object = |properties: serde_json::Value, required: &[&str]| {
            json!({
                "type": "object",
                "properties": properties,
                "required": required,
            })
        };
        match self {
            Self::GetCoreTerms
            | Self::GetAssignmentTerms
            | Self::GetAvailableContexts
            | Self::GetHealthStatus
            | Self::GetExperimentNames => object(json!({}), &[]),
            Self::GetActionSchema => object(
                json!({
                    "action": {
                        "type": "string",
                        "enum": ALL_ACTIONS.iter().map(|a| a.name()).collect::<Vec<_>>(),
                    }
                }),
                &["action"],
            ),
            Self::GetConditionsForContext
            | Self::GetDecisionPointsForContext
            | Self::GetGroupTypesForContext => object(
                json!({"context": {"type": "string"}}),
                &["context"],
            ),
            Self::GetExperimentDetails => object(
                json!({
                    "experiment_id": {"type": "string"},
                    "experiment_name": {"type": "string"}
                }),
                &[],
            ),
            Self::SetPendingAction => object(
                json!({
                    "action": {
                        "type": "string",
                        "enum": ALL_ACTIONS.iter().map(|a| a.name()).collect::<Vec<_>>(),
                    },
                    "params": {"type": "object"}
                }),
                &["action", "params"],
            ),
            // Action tools accept the action's own parameter object directly.
            Self::Action(_) => object(json!({}), &[]),
        }
    }

    pub fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description(),
            input_schema: self.input_schema(),
        }
    }
}

pub fn analyzer_tools() -> Vec<Tool> {
    vec![
        Tool::GetCoreTerms,
        Tool::GetAssignmentTerms,
        Tool::GetAvailableContexts,
        Tool::GetHealthStatus,
        Tool::GetExperimentNames,
    ]
}

pub fn gatherer_tools() -> Vec<Tool> {
    vec![
        Tool::GetCoreTerms,
        Tool::GetAssignmentTerms,
        Tool::GetActionSchema,
        Tool::GetAvailableContexts,
        Tool::GetConditionsForContext,
        Tool::GetDecisionPointsForContext,
        Tool::GetGroupTypesForContext,
        Tool::GetHealthStatus,
        Tool::GetExperimentNames,
        Tool::GetExperimentDetails,
        Tool::SetPendingAction,
    ]
}

pub fn executor_tools() -> Vec<Tool> {
    ALL_ACTIONS.iter().map(|a| Tool::Action(*a)).collect()
}

pub fn response_tools() -> Vec<Tool> {
    vec![Tool::GetCoreTerms]
}

/// Merge the stage tool sets, deduplicating by name with fixed priority:
/// gatherer > executor > analyzer > response.
pub fn merged_tools() -> Vec<Tool> {
    let mut by_name: BTreeMap<&'static str, Tool> = BTreeMap::new();
    for set in [
        response_tools(),
        analyzer_tools(),
        executor_tools(),
        gatherer_tools(),
    ] {
        for tool in set {
            by_name.insert(tool.name(), tool);
        }
    }
    by_name.into_values().collect()
}

pub fn schemas(tools: &[Tool]) -> Vec<ToolSchema> {
    tools.iter().map(|t| t.schema()).collect()
}

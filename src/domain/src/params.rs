//! Typed parameters for each action. The model supplies loose JSON; these
//! structs are the only path from that JSON into execution, so every action
//! is validated at construction and duck typing stops here.

use crate::actions::ActionType;
use crate::enums::{
    AssignmentUnit, ConsistencyRule, ExperimentState, FilterMode, MarkedDecisionPointStatus,
    PostExperimentRule,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use shared::{AgentError, Result};
use std::collections::BTreeMap;

/// Accepts both `"ctx"` and `["ctx"]` for context fields; the model is
/// inconsistent about wrapping single contexts.
fn string_or_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}

fn opt_string_or_list<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    string_or_list(deserializer).map(Some)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionPointSpec {
    pub site: String,
    pub target: String,
    #[serde(default)]
    pub exclude_if_reached: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionSpec {
    pub code: String,
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    #[serde(rename = "type")]
    pub group_type: String,
    pub group_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRuleSpec {
    pub rule: PostExperimentRule,
    #[serde(default)]
    pub condition_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateExperimentParams {
    pub name: String,
    #[serde(deserialize_with = "string_or_list")]
    pub context: Vec<String>,
    pub decision_points: Vec<DecisionPointSpec>,
    pub conditions: Vec<ConditionSpec>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub assignment_unit: Option<AssignmentUnit>,
    #[serde(default)]
    pub consistency_rule: Option<ConsistencyRule>,
    #[serde(default)]
    pub group_type: Option<String>,
    #[serde(default)]
    pub filter_mode: Option<FilterMode>,
    #[serde(default)]
    pub post_experiment_rule: Option<PostRuleSpec>,
    #[serde(default)]
    pub inclusion_users: Option<Vec<String>>,
    #[serde(default)]
    pub inclusion_groups: Option<Vec<GroupSpec>>,
    #[serde(default)]
    pub exclusion_users: Option<Vec<String>>,
    #[serde(default)]
    pub exclusion_groups: Option<Vec<GroupSpec>>,
}

/// Partial update: a present field overrides the stored experiment, an absent
/// field preserves it. `Option` is the presence marker, so none of these
/// default to a value.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct UpdateExperimentParams {
    pub experiment_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "opt_string_or_list")]
    pub context: Option<Vec<String>>,
    #[serde(default)]
    pub assignment_unit: Option<AssignmentUnit>,
    #[serde(default)]
    pub consistency_rule: Option<ConsistencyRule>,
    #[serde(default)]
    pub group_type: Option<String>,
    #[serde(default)]
    pub filter_mode: Option<FilterMode>,
    #[serde(default)]
    pub conditions: Option<Vec<ConditionSpec>>,
    #[serde(default)]
    pub decision_points: Option<Vec<DecisionPointSpec>>,
    #[serde(default)]
    pub post_experiment_rule: Option<PostRuleSpec>,
    #[serde(default)]
    pub inclusion_users: Option<Vec<String>>,
    #[serde(default)]
    pub inclusion_groups: Option<Vec<GroupSpec>>,
    #[serde(default)]
    pub exclusion_users: Option<Vec<String>>,
    #[serde(default)]
    pub exclusion_groups: Option<Vec<GroupSpec>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpdateStatusParams {
    pub experiment_id: String,
    pub status: ExperimentState,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeleteExperimentParams {
    pub experiment_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InitUserParams {
    pub user_id: String,
    #[serde(default)]
    pub group: Option<BTreeMap<String, Vec<String>>>,
    #[serde(default)]
    pub working_group: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssignmentQueryParams {
    pub user_id: String,
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DecisionPointRef {
    pub site: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssignedConditionRef {
    pub condition_code: String,
    pub experiment_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MarkDecisionPointParams {
    pub user_id: String,
    pub decision_point: DecisionPointRef,
    pub assigned_condition: AssignedConditionRef,
    #[serde(default)]
    pub status: Option<MarkedDecisionPointStatus>,
}

/// The validated form of a pending action's parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionParams {
    Create(CreateExperimentParams),
    Update(UpdateExperimentParams),
    UpdateStatus(UpdateStatusParams),
    Delete(DeleteExperimentParams),
    InitUser(InitUserParams),
    Assignments(AssignmentQueryParams),
    Mark(MarkDecisionPointParams),
}

impl ActionParams {
    /// Parse and validate the model-supplied arguments for one action.
    /// Missing required keys are reported together rather than one by one.
    pub fn parse(action: ActionType, raw: &Value) -> Result<Self> {
        let missing = missing_required(action, raw);
        if !missing.is_empty() {
            return Err(AgentError::Validation(format!(
                "{} is missing required parameters: {}",
                action.name(),
                missing.join(", ")
            )));
        }

        let parse_err = |e: serde_json::Error| {
            AgentError::Validation(format!("invalid parameters for {}: {}", action.name(), e))
        };

        let params = match action {
            ActionType::CreateExperiment => {
                let p: CreateExperimentParams =
                    serde_json::from_value(raw.clone()).map_err(parse_err)?;
                if p.conditions.is_empty() {
                    return Err(AgentError::Validation(
                        "create_experiment requires at least one condition".into(),
                    ));
                }
                if p.decision_points.is_empty() {
                    return Err(AgentError::Validation(
                        "create_experiment requires at least one decision point".into(),
                    ));
                }
                Self::Create(p)
            }
            ActionType::UpdateExperiment => {
                Self::Update(serde_json::from_value(raw.clone()).map_err(parse_err)?)
            }
            ActionType::UpdateExperimentStatus => {
                Self::UpdateStatus(serde_json::from_value(raw.clone()).map_err(parse_err)?)
            }
            ActionType::DeleteExperiment => {
                Self::Delete(serde_json::from_value(raw.clone()).map_err(parse_err)?)
            }
            ActionType::InitExperimentUser => {
                Self::InitUser(serde_json::from_value(raw.clone()).map_err(parse_err)?)
            }
            ActionType::GetDecisionPointAssignments => {
                Self::Assignments(serde_json::from_value(raw.clone()).map_err(parse_err)?)
            }
            ActionType::MarkDecisionPoint => {
                Self::Mark(serde_json::from_value(raw.clone()).map_err(parse_err)?)
            }
        };
        Ok(params)
    }
}

/// Required keys that are absent, null, or empty in the raw arguments.
pub fn missing_required(action: ActionType, raw: &Value) -> Vec<String> {
    action
        .required_params()
        .iter()
        .filter(|key| match raw.get(**key) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(Value::Array(items)) => items.is_empty(),
            Some(_) => false,
        })
        .map(|key| key.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_params_accept_bare_context_string() {
        let raw = json!({
            "name": "Math Hints",
            "context": "assign-prog",
            "decision_points": [{"site": "SelectSection", "target": "abs_plot"}],
            "conditions": [{"code": "control", "weight": 50}, {"code": "variant", "weight": 50}]
        });
        match ActionParams::parse(ActionType::CreateExperiment, &raw).unwrap() {
            ActionParams::Create(p) => {
                assert_eq!(p.context, vec!["assign-prog"]);
                assert!(!p.decision_points[0].exclude_if_reached);
            }
            other => panic!("unexpected params: {other:?}"),
        }
    }

    #[test]
    fn missing_required_reports_all_absent_keys() {
        let raw = json!({"name": "X", "conditions": []});
        let missing = missing_required(ActionType::CreateExperiment, &raw);
        assert_eq!(missing, vec!["context", "decision_points", "conditions"]);
    }

    #[test]
    fn parse_rejects_missing_params_with_validation_error() {
        let raw = json!({"name": "X"});
        let err = ActionParams::parse(ActionType::CreateExperiment, &raw).unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
    }

    #[test]
    fn status_param_uses_wire_string() {
        let raw = json!({"experiment_id": "e-1", "status": "enrolling"});
        match ActionParams::parse(ActionType::UpdateExperimentStatus, &raw).unwrap() {
            ActionParams::UpdateStatus(p) => assert_eq!(p.status, ExperimentState::Enrolling),
            other => panic!("unexpected params: {other:?}"),
        }
    }

    #[test]
    fn update_params_track_field_presence() {
        let raw = json!({"experiment_id": "e-1", "description": "new words"});
        match ActionParams::parse(ActionType::UpdateExperiment, &raw).unwrap() {
            ActionParams::Update(p) => {
                assert_eq!(p.description.as_deref(), Some("new words"));
                assert!(p.name.is_none());
                assert!(p.conditions.is_none());
            }
            other => panic!("unexpected params: {other:?}"),
        }
    }

    #[test]
    fn mark_params_require_nested_structures() {
        let raw = json!({
            "user_id": "user123",
            "decision_point": {"site": "SelectSection", "target": "abs_plot"},
            "assigned_condition": {"condition_code": "variant", "experiment_id": "e-1"}
        });
        assert!(ActionParams::parse(ActionType::MarkDecisionPoint, &raw).is_ok());
    }
}

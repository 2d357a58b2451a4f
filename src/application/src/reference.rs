//! Static reference tables and context-metadata lookups the model can query
//! while gathering parameters. The terminology tables mirror how the platform
//! documentation explains its concepts.

use domain::actions::ActionType;
use domain::wire::ContextMetadataResponse;
use serde_json::{json, Value};
use shared::{AgentError, Result};

pub fn core_terms() -> Value {
    json!({
        "app_context": "Indicates where the experiment will run (e.g., 'assign-prog', 'mastering'). Available options are read from the context metadata.",
        "experiment": "A controlled test comparing different versions of content or features to determine which performs better.",
        "condition": "A specific version or variant in an experiment (e.g., 'control', 'treatment').",
        "assignment": "The process of giving users specific conditions when they reach decision points.",
        "decision_point": "A location in the app where experiment assignment occurs, defined by site and target.",
        "enrollment": "The process of users being included in an experiment when status is 'enrolling'.",
        "consistency_rule": "Rules ensuring users get the same assignment across sessions (individual or group).",
        "unit_of_assignment": "Specifies the level at which conditions are assigned (individual or group).",
        "post_experiment_rule": "What happens to participants after the experiment ends (continue or assign to a specific condition).",
        "partition": "Another term for decision point, where assignments happen in the application."
    })
}

pub fn assignment_terms() -> Value {
    json!({
        "individual_assignment": "Each user gets independently assigned to conditions based on random assignment.",
        "group_assignment": "Users are assigned based on group membership (e.g., school, class, teacher).",
        "individual_consistency": "Same user always gets the same condition throughout the experiment.",
        "group_consistency": "Users in the same working group always get the same condition.",
        "random_algorithm": "Conditions assigned using weighted randomization based on condition weights.",
        "post_rule_continue": "After the experiment ends, users keep their current assigned conditions.",
        "post_rule_assign": "After the experiment ends, all users get assigned to a specific condition.",
        "enrolling_status": "Experiment is actively running and assigning conditions to users.",
        "inactive_status": "Experiment is not running, all users get the default condition.",
        "enrollment_complete": "Experiment has stopped enrolling new users, the post-experiment rule applies."
    })
}

/// Parameter schema for one action, phrased for the model.
pub fn action_schema(action: ActionType) -> Value {
    match action {
        ActionType::CreateExperiment => json!({
            "required_parameters": {
                "name": "string - Experiment name (must be unique)",
                "context": "string - App context where the experiment runs (must exist in context metadata)",
                "decision_points": "array - Objects with {site, target, exclude_if_reached}",
                "conditions": "array - Objects with {code, weight}; weights must sum to 100"
            },
            "optional_parameters": {
                "description": "string", "tags": "array of strings",
                "assignment_unit": "string - 'individual' or 'group'",
                "consistency_rule": "string - 'individual', 'experiment' or 'group'",
                "group_type": "string - required when assignment_unit is 'group'",
                "filter_mode": "string - 'includeAll' or 'excludeAll' (default excludeAll)",
                "post_experiment_rule": "object - {rule: 'continue'|'assign', condition_code}",
                "inclusion_users": "array of user ids", "inclusion_groups": "array of {type, group_id}",
                "exclusion_users": "array of user ids", "exclusion_groups": "array of {type, group_id}"
            },
            "validation_rules": {
                "conditions": "At least one condition, weights sum to exactly 100",
                "decision_points": "At least one decision point; site/target should exist in the context"
            }
        }),
        ActionType::UpdateExperiment => json!({
            "required_parameters": {"experiment_id": "string - id of the experiment to update"},
            "optional_parameters": {
                "name": "string", "description": "string", "tags": "array",
                "context": "string", "assignment_unit": "string", "consistency_rule": "string",
                "group_type": "string", "filter_mode": "string",
                "conditions": "array of {code, weight} (replaces all conditions)",
                "decision_points": "array of {site, target, exclude_if_reached} (replaces all)",
                "post_experiment_rule": "object - {rule, condition_code}",
                "inclusion_users": "array", "inclusion_groups": "array",
                "exclusion_users": "array", "exclusion_groups": "array"
            },
            "notes": "Only provided fields change; everything else keeps its stored value."
        }),
        ActionType::UpdateExperimentStatus => json!({
            "required_parameters": {
                "experiment_id": "string",
                "status": "string - 'inactive', 'preview', 'scheduled', 'enrolling', 'enrollmentComplete', 'cancelled', 'archived' or 'draft'"
            },
            "status_meanings": {
                "inactive": "Not running, all users get the default condition",
                "enrolling": "Actively assigning conditions to users",
                "enrollmentComplete": "Stopped enrolling, post-experiment rule applies",
                "cancelled": "Permanently stopped"
            }
        }),
        ActionType::DeleteExperiment => json!({
            "required_parameters": {"experiment_id": "string - id of the experiment to delete"},
            "warning": "Deletion is permanent and cannot be undone."
        }),
        ActionType::InitExperimentUser => json!({
            "required_parameters": {"user_id": "string"},
            "optional_parameters": {
                "group": "object - map of group type to list of group ids, e.g. {\"schoolId\": [\"school1\"]}",
                "working_group": "object - map of group type to a single group id"
            }
        }),
        ActionType::GetDecisionPointAssignments => json!({
            "required_parameters": {
                "user_id": "string",
                "context": "string - app context to query assignments for"
            }
        }),
        ActionType::MarkDecisionPoint => json!({
            "required_parameters": {
                "user_id": "string",
                "decision_point": "object - {site, target}",
                "assigned_condition": "object - {condition_code, experiment_id}"
            },
            "optional_parameters": {
                "status": "string - 'condition applied', 'condition not applied' or 'no condition assigned'"
            }
        }),
    }
}

pub fn available_contexts(metadata: &ContextMetadataResponse) -> Vec<String> {
    metadata.context_metadata.keys().cloned().collect()
}

fn context_or_err<'a>(
    metadata: &'a ContextMetadataResponse,
    context: &str,
) -> Result<&'a domain::wire::ContextMetadata> {
    metadata.context_metadata.get(context).ok_or_else(|| {
        AgentError::Gathering(format!(
            "Context '{}' not found. Available contexts: {}",
            context,
            available_contexts(metadata).join(", ")
        ))
    })
}

pub fn conditions_for_context(
    metadata: &ContextMetadataResponse,
    context: &str,
) -> Result<Vec<String>> {
    Ok(context_or_err(metadata, context)?.conditions.clone())
}

pub fn group_types_for_context(
    metadata: &ContextMetadataResponse,
    context: &str,
) -> Result<Vec<String>> {
    Ok(context_or_err(metadata, context)?.group_types.clone())
}

/// Sites and targets that may form decision points in the given context.
pub fn decision_points_for_context(
    metadata: &ContextMetadataResponse,
    context: &str,
) -> Result<Value> {
    let ctx = context_or_err(metadata, context)?;
    Ok(json!({
        "sites": ctx.sites,
        "targets": ctx.targets,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::wire::ContextMetadata;

    fn metadata() -> ContextMetadataResponse {
        let mut response = ContextMetadataResponse::default();
        response.context_metadata.insert(
            "assign-prog".into(),
            ContextMetadata {
                conditions: vec!["control".into(), "variant".into()],
                group_types: vec!["schoolId".into()],
                sites: vec!["SelectSection".into()],
                targets: vec!["abs_plot".into()],
            },
        );
        response
    }

    #[test]
    fn unknown_context_lists_available_ones() {
        let err = conditions_for_context(&metadata(), "mastering").unwrap_err();
        let text = err.to_string();
        assert!(text.contains("'mastering' not found"));
        assert!(text.contains("assign-prog"));
    }

    #[test]
    fn decision_points_expose_sites_and_targets() {
        let value = decision_points_for_context(&metadata(), "assign-prog").unwrap();
        assert_eq!(value["sites"][0], "SelectSection");
        assert_eq!(value["targets"][0], "abs_plot");
    }

    #[test]
    fn every_action_has_a_schema_with_required_parameters() {
        for action in domain::actions::ALL_ACTIONS {
            let schema = action_schema(*action);
            assert!(schema.get("required_parameters").is_some(), "{action}");
        }
    }
}

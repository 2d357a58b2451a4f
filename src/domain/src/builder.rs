//! Request transformation and merge engine. Builds full service payloads from
//! the simplified parameters the model works with, converts fetched
//! experiments back into request form, and reconciles partial updates onto
//! that base. All validation here happens before any network call.

use crate::enums::{
    AssignmentAlgorithm, AssignmentUnit, ConsistencyRule, ExperimentState, ExperimentType,
    FilterMode, PostExperimentRule, SegmentType,
};
use crate::params::{
    ConditionSpec, CreateExperimentParams, DecisionPointSpec, GroupSpec, PostRuleSpec,
    UpdateExperimentParams,
};
use crate::wire::{
    Experiment, ExperimentRequest, GroupRef, IndividualRef, RequestCondition, RequestPartition,
    SegmentEnvelope, SegmentSpec,
};
use shared::{AgentError, Result};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Marker segment the service expects when filter mode is includeAll: a
/// single "All"/"All" group entry replacing any supplied inclusion lists.
fn include_all_sentinel() -> Vec<GroupSpec> {
    vec![GroupSpec {
        group_type: "All".to_string(),
        group_id: "All".to_string(),
    }]
}

fn build_segment(users: &[String], groups: &[GroupSpec]) -> SegmentEnvelope {
    SegmentEnvelope {
        segment: SegmentSpec {
            individual_for_segment: users
                .iter()
                .map(|user_id| IndividualRef {
                    user_id: user_id.clone(),
                })
                .collect(),
            group_for_segment: groups
                .iter()
                .map(|g| GroupRef {
                    group_id: g.group_id.clone(),
                    group_type: g.group_type.clone(),
                })
                .collect(),
            sub_segments: Vec::new(),
            segment_type: SegmentType::Private,
        },
    }
}

/// Fresh ids for each condition plus the code-to-id table used to resolve
/// post-rule condition references.
fn build_conditions(
    specs: &[ConditionSpec],
) -> (Vec<RequestCondition>, BTreeMap<String, String>) {
    let mut code_to_id = BTreeMap::new();
    let conditions = specs
        .iter()
        .enumerate()
        .map(|(i, spec)| {
            let id = Uuid::new_v4().to_string();
            code_to_id.insert(spec.code.clone(), id.clone());
            RequestCondition {
                id,
                condition_code: spec.code.clone(),
                assignment_weight: spec.weight,
                order: i as u32,
                name: spec.code.clone(),
            }
        })
        .collect();
    (conditions, code_to_id)
}

fn build_partitions(specs: &[DecisionPointSpec]) -> Vec<RequestPartition> {
    specs
        .iter()
        .enumerate()
        .map(|(i, dp)| RequestPartition {
            id: Uuid::new_v4().to_string(),
            site: dp.site.clone(),
            target: dp.target.clone(),
            order: i as u32,
            exclude_if_reached: dp.exclude_if_reached,
        })
        .collect()
}

/// Condition weights must sum to exactly 100 before a request leaves the
/// process. Summed wide: the model can hand us weights near u32::MAX.
fn validate_weights(conditions: &[RequestCondition]) -> Result<()> {
    let total: u64 = conditions.iter().map(|c| u64::from(c.assignment_weight)).sum();
    if total != 100 {
        return Err(AgentError::Validation(format!(
            "condition weights must sum to 100, got {total}"
        )));
    }
    Ok(())
}

/// Resolve a post-rule's condition code against the code-to-id table, falling
/// back to the conditions already in the request. An assign rule that names
/// an unknown code is rejected rather than silently dropped.
fn resolve_revert_to(
    rule: &PostRuleSpec,
    code_to_id: &BTreeMap<String, String>,
    conditions: &[RequestCondition],
) -> Result<Option<String>> {
    match rule.rule {
        PostExperimentRule::Assign => {
            let code = rule.condition_code.as_deref().ok_or_else(|| {
                AgentError::Validation(
                    "post_experiment_rule 'assign' requires a condition_code".into(),
                )
            })?;
            if let Some(id) = code_to_id.get(code) {
                return Ok(Some(id.clone()));
            }
            if let Some(cond) = conditions.iter().find(|c| c.condition_code == code) {
                return Ok(Some(cond.id.clone()));
            }
            Err(AgentError::Validation(format!(
                "post_experiment_rule references unknown condition code '{code}'"
            )))
        }
        PostExperimentRule::Continue => Ok(None),
        PostExperimentRule::Revert => Ok(None),
    }
}

/// Build a complete create payload from simplified parameters, filling the
/// service's required defaults.
pub fn build_create_request(params: &CreateExperimentParams) -> Result<ExperimentRequest> {
    let (conditions, code_to_id) = build_conditions(&params.conditions);
    validate_weights(&conditions)?;
    let partitions = build_partitions(&params.decision_points);

    let filter_mode = params.filter_mode.unwrap_or(FilterMode::ExcludeAll);
    let (inclusion_users, inclusion_groups) = if filter_mode == FilterMode::IncludeAll {
        (Vec::new(), include_all_sentinel())
    } else {
        (
            params.inclusion_users.clone().unwrap_or_default(),
            params.inclusion_groups.clone().unwrap_or_default(),
        )
    };

    let (post_rule, revert_to) = match &params.post_experiment_rule {
        Some(rule) => (
            rule.rule,
            resolve_revert_to(rule, &code_to_id, &conditions)?,
        ),
        None => (PostExperimentRule::Continue, None),
    };

    Ok(ExperimentRequest {
        id: None,
        name: params.name.clone(),
        description: params.description.clone().unwrap_or_default(),
        consistency_rule: params.consistency_rule.unwrap_or(ConsistencyRule::Individual),
        assignment_unit: params.assignment_unit.unwrap_or(AssignmentUnit::Individual),
        group: params.group_type.clone(),
        experiment_type: ExperimentType::Simple,
        context: params.context.clone(),
        assignment_algorithm: AssignmentAlgorithm::Random,
        tags: params.tags.clone().unwrap_or_default(),
        conditions,
        partitions,
        experiment_segment_inclusion: build_segment(&inclusion_users, &inclusion_groups),
        experiment_segment_exclusion: build_segment(
            &params.exclusion_users.clone().unwrap_or_default(),
            &params.exclusion_groups.clone().unwrap_or_default(),
        ),
        filter_mode,
        queries: Vec::new(),
        state: ExperimentState::Inactive,
        post_experiment_rule: post_rule,
        revert_to,
    })
}

/// Convert a fetched experiment back into request form so a partial update
/// can be applied on top of it. Ids and order are preserved.
pub fn experiment_to_request(experiment: &Experiment) -> ExperimentRequest {
    let conditions = experiment
        .conditions
        .iter()
        .enumerate()
        .map(|(i, c)| RequestCondition {
            id: c.id.clone(),
            condition_code: c.condition_code.clone(),
            assignment_weight: c.assignment_weight,
            order: c.order.unwrap_or(i as u32),
            name: c.name.clone().unwrap_or_else(|| c.condition_code.clone()),
        })
        .collect();

    let partitions = experiment
        .partitions
        .iter()
        .enumerate()
        .map(|(i, p)| RequestPartition {
            id: p.id.clone(),
            site: p.site.clone(),
            target: p.target.clone(),
            order: p.order.unwrap_or(i as u32),
            exclude_if_reached: p.exclude_if_reached,
        })
        .collect();

    let segment_from = |seg: &Option<crate::wire::ExperimentSegment>| match seg {
        Some(env) => SegmentEnvelope {
            segment: SegmentSpec {
                individual_for_segment: env.segment.individual_for_segment.clone(),
                group_for_segment: env.segment.group_for_segment.clone(),
                sub_segments: env.segment.sub_segments.clone(),
                segment_type: env.segment.segment_type,
            },
        },
        None => build_segment(&[], &[]),
    };

    ExperimentRequest {
        id: Some(experiment.id.clone()),
        name: experiment.name.clone(),
        description: experiment.description.clone(),
        consistency_rule: experiment.consistency_rule,
        assignment_unit: experiment.assignment_unit,
        group: experiment.group.clone(),
        experiment_type: experiment.experiment_type,
        context: experiment.context.clone(),
        assignment_algorithm: experiment.assignment_algorithm,
        tags: experiment.tags.clone(),
        conditions,
        partitions,
        experiment_segment_inclusion: segment_from(&experiment.experiment_segment_inclusion),
        experiment_segment_exclusion: segment_from(&experiment.experiment_segment_exclusion),
        filter_mode: experiment.filter_mode,
        queries: experiment.queries.clone(),
        state: experiment.state,
        post_experiment_rule: experiment.post_experiment_rule,
        revert_to: experiment.revert_to.clone(),
    }
}

/// Merge a partial update onto a base request. Fields present in the params
/// override the base; absent fields preserve it, so an empty update returns
/// the base unchanged.
pub fn apply_partial_update(
    base: &ExperimentRequest,
    params: &UpdateExperimentParams,
) -> Result<ExperimentRequest> {
    let mut updated = base.clone();

    if let Some(name) = &params.name {
        updated.name = name.clone();
    }
    if let Some(description) = &params.description {
        updated.description = description.clone();
    }
    if let Some(tags) = &params.tags {
        updated.tags = tags.clone();
    }
    if let Some(context) = &params.context {
        updated.context = context.clone();
    }
    if let Some(unit) = params.assignment_unit {
        updated.assignment_unit = unit;
    }
    if let Some(rule) = params.consistency_rule {
        updated.consistency_rule = rule;
    }
    if let Some(group_type) = &params.group_type {
        updated.group = Some(group_type.clone());
    }
    if let Some(mode) = params.filter_mode {
        updated.filter_mode = mode;
    }

    // Replacing conditions refreshes the code-to-id table; otherwise the
    // base conditions provide it for post-rule resolution.
    let code_to_id = match &params.conditions {
        Some(specs) => {
            let (conditions, map) = build_conditions(specs);
            updated.conditions = conditions;
            map
        }
        None => updated
            .conditions
            .iter()
            .map(|c| (c.condition_code.clone(), c.id.clone()))
            .collect(),
    };
    validate_weights(&updated.conditions)?;

    if let Some(decision_points) = &params.decision_points {
        updated.partitions = build_partitions(decision_points);
    }

    // Inclusion segment changes when any of its inputs change. includeAll
    // forces the sentinel; otherwise absent keys preserve the base lists.
    let touch_inclusion = params.inclusion_users.is_some()
        || params.inclusion_groups.is_some()
        || params.filter_mode.is_some();
    if touch_inclusion {
        let (users, groups) = if params.filter_mode == Some(FilterMode::IncludeAll) {
            (Vec::new(), include_all_sentinel())
        } else {
            let existing = &base.experiment_segment_inclusion.segment;
            let users = params.inclusion_users.clone().unwrap_or_else(|| {
                existing
                    .individual_for_segment
                    .iter()
                    .map(|ind| ind.user_id.clone())
                    .collect()
            });
            let groups = params.inclusion_groups.clone().unwrap_or_else(|| {
                existing
                    .group_for_segment
                    .iter()
                    .map(|g| GroupSpec {
                        group_type: g.group_type.clone(),
                        group_id: g.group_id.clone(),
                    })
                    .collect()
            });
            (users, groups)
        };
        updated.experiment_segment_inclusion = build_segment(&users, &groups);
    }

    if params.exclusion_users.is_some() || params.exclusion_groups.is_some() {
        let existing = &base.experiment_segment_exclusion.segment;
        let users = params.exclusion_users.clone().unwrap_or_else(|| {
            existing
                .individual_for_segment
                .iter()
                .map(|ind| ind.user_id.clone())
                .collect()
        });
        let groups = params.exclusion_groups.clone().unwrap_or_else(|| {
            existing
                .group_for_segment
                .iter()
                .map(|g| GroupSpec {
                    group_type: g.group_type.clone(),
                    group_id: g.group_id.clone(),
                })
                .collect()
        });
        updated.experiment_segment_exclusion = build_segment(&users, &groups);
    }

    if let Some(rule) = &params.post_experiment_rule {
        updated.post_experiment_rule = rule.rule;
        updated.revert_to = resolve_revert_to(rule, &code_to_id, &updated.conditions)?;
    }

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_params() -> CreateExperimentParams {
        serde_json::from_value(json!({
            "name": "Math Hints",
            "context": "assign-prog",
            "decision_points": [
                {"site": "SelectSection", "target": "abs_plot", "exclude_if_reached": true}
            ],
            "conditions": [
                {"code": "control", "weight": 40},
                {"code": "variant", "weight": 60}
            ]
        }))
        .unwrap()
    }

    fn base_request() -> ExperimentRequest {
        build_create_request(&create_params()).unwrap()
    }

    #[test]
    fn create_fills_service_defaults() {
        let req = base_request();
        assert_eq!(req.description, "");
        assert_eq!(req.consistency_rule, ConsistencyRule::Individual);
        assert_eq!(req.assignment_unit, AssignmentUnit::Individual);
        assert_eq!(req.experiment_type, ExperimentType::Simple);
        assert_eq!(req.assignment_algorithm, AssignmentAlgorithm::Random);
        assert_eq!(req.state, ExperimentState::Inactive);
        assert_eq!(req.post_experiment_rule, PostExperimentRule::Continue);
        assert_eq!(req.context, vec!["assign-prog"]);
        assert!(req.queries.is_empty());
        assert!(req.revert_to.is_none());
    }

    #[test]
    fn create_assigns_ids_order_and_name_defaults() {
        let req = base_request();
        assert_eq!(req.conditions.len(), 2);
        assert_ne!(req.conditions[0].id, req.conditions[1].id);
        assert_eq!(req.conditions[0].order, 0);
        assert_eq!(req.conditions[1].order, 1);
        assert_eq!(req.conditions[0].name, "control");
        assert!(req.partitions[0].exclude_if_reached);
        assert_eq!(req.partitions[0].order, 0);
    }

    #[test]
    fn create_rejects_weights_not_summing_to_100() {
        let mut params = create_params();
        params.conditions[1].weight = 70;
        let err = build_create_request(&params).unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
        assert!(err.to_string().contains("110"));
    }

    #[test]
    fn create_rejects_weights_whose_sum_exceeds_u32() {
        let mut params = create_params();
        params.conditions[0].weight = 4_000_000_000;
        params.conditions[1].weight = 500_000_000;
        let err = build_create_request(&params).unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
        assert!(err.to_string().contains("4500000000"));
    }

    #[test]
    fn include_all_overrides_supplied_inclusion_lists() {
        let mut params = create_params();
        params.filter_mode = Some(FilterMode::IncludeAll);
        params.inclusion_users = Some(vec!["user1".into()]);
        params.inclusion_groups = Some(vec![GroupSpec {
            group_type: "schoolId".into(),
            group_id: "school-7".into(),
        }]);

        let req = build_create_request(&params).unwrap();
        let segment = &req.experiment_segment_inclusion.segment;
        assert!(segment.individual_for_segment.is_empty());
        assert_eq!(segment.group_for_segment.len(), 1);
        assert_eq!(segment.group_for_segment[0].group_id, "All");
        assert_eq!(segment.group_for_segment[0].group_type, "All");
    }

    #[test]
    fn assign_rule_resolves_condition_code_to_fresh_id() {
        let mut params = create_params();
        params.post_experiment_rule = Some(PostRuleSpec {
            rule: PostExperimentRule::Assign,
            condition_code: Some("variant".into()),
        });
        let req = build_create_request(&params).unwrap();
        let variant_id = &req
            .conditions
            .iter()
            .find(|c| c.condition_code == "variant")
            .unwrap()
            .id;
        assert_eq!(req.revert_to.as_ref(), Some(variant_id));
    }

    #[test]
    fn assign_rule_with_unknown_code_is_rejected() {
        let mut params = create_params();
        params.post_experiment_rule = Some(PostRuleSpec {
            rule: PostExperimentRule::Assign,
            condition_code: Some("nonexistent".into()),
        });
        let err = build_create_request(&params).unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
    }

    #[test]
    fn empty_update_is_identity() {
        let base = base_request();
        let params = UpdateExperimentParams {
            experiment_id: "e-1".into(),
            ..Default::default()
        };
        let updated = apply_partial_update(&base, &params).unwrap();
        assert_eq!(updated, base);
    }

    #[test]
    fn update_overrides_only_present_fields() {
        let base = base_request();
        let params: UpdateExperimentParams = serde_json::from_value(json!({
            "experiment_id": "e-1",
            "description": "now with hints",
            "tags": ["math"]
        }))
        .unwrap();
        let updated = apply_partial_update(&base, &params).unwrap();
        assert_eq!(updated.description, "now with hints");
        assert_eq!(updated.tags, vec!["math"]);
        assert_eq!(updated.name, base.name);
        assert_eq!(updated.conditions, base.conditions);
    }

    #[test]
    fn update_replaces_conditions_with_fresh_ids() {
        let base = base_request();
        let params: UpdateExperimentParams = serde_json::from_value(json!({
            "experiment_id": "e-1",
            "conditions": [
                {"code": "a", "weight": 50},
                {"code": "b", "weight": 50}
            ]
        }))
        .unwrap();
        let updated = apply_partial_update(&base, &params).unwrap();
        assert_eq!(updated.conditions.len(), 2);
        assert_eq!(updated.conditions[0].condition_code, "a");
        assert!(base
            .conditions
            .iter()
            .all(|old| updated.conditions.iter().all(|new| new.id != old.id)));
    }

    #[test]
    fn update_rejects_replacement_weights_not_summing_to_100() {
        let base = base_request();
        let params: UpdateExperimentParams = serde_json::from_value(json!({
            "experiment_id": "e-1",
            "conditions": [{"code": "a", "weight": 30}]
        }))
        .unwrap();
        assert!(apply_partial_update(&base, &params).is_err());
    }

    #[test]
    fn update_include_all_forces_sentinel() {
        let base = base_request();
        let params: UpdateExperimentParams = serde_json::from_value(json!({
            "experiment_id": "e-1",
            "filter_mode": "includeAll",
            "inclusion_users": ["user1"]
        }))
        .unwrap();
        let updated = apply_partial_update(&base, &params).unwrap();
        assert_eq!(updated.filter_mode, FilterMode::IncludeAll);
        let segment = &updated.experiment_segment_inclusion.segment;
        assert!(segment.individual_for_segment.is_empty());
        assert_eq!(segment.group_for_segment[0].group_id, "All");
    }

    #[test]
    fn update_preserves_unmentioned_segment_half() {
        let mut params = create_params();
        params.inclusion_users = Some(vec!["keep-me".into()]);
        let base = build_create_request(&params).unwrap();

        let update: UpdateExperimentParams = serde_json::from_value(json!({
            "experiment_id": "e-1",
            "inclusion_groups": [{"type": "schoolId", "group_id": "school-7"}]
        }))
        .unwrap();
        let updated = apply_partial_update(&base, &update).unwrap();
        let segment = &updated.experiment_segment_inclusion.segment;
        assert_eq!(segment.individual_for_segment[0].user_id, "keep-me");
        assert_eq!(segment.group_for_segment[0].group_id, "school-7");
    }

    #[test]
    fn update_assign_rule_resolves_against_existing_conditions() {
        let base = base_request();
        let params: UpdateExperimentParams = serde_json::from_value(json!({
            "experiment_id": "e-1",
            "post_experiment_rule": {"rule": "assign", "condition_code": "control"}
        }))
        .unwrap();
        let updated = apply_partial_update(&base, &params).unwrap();
        let control_id = &base
            .conditions
            .iter()
            .find(|c| c.condition_code == "control")
            .unwrap()
            .id;
        assert_eq!(updated.revert_to.as_ref(), Some(control_id));
    }

    #[test]
    fn update_continue_rule_clears_revert_to() {
        let mut base = base_request();
        base.revert_to = Some("some-id".into());
        base.post_experiment_rule = PostExperimentRule::Assign;

        let params: UpdateExperimentParams = serde_json::from_value(json!({
            "experiment_id": "e-1",
            "post_experiment_rule": {"rule": "continue"}
        }))
        .unwrap();
        let updated = apply_partial_update(&base, &params).unwrap();
        assert_eq!(updated.post_experiment_rule, PostExperimentRule::Continue);
        assert!(updated.revert_to.is_none());
    }

    #[test]
    fn experiment_round_trips_through_request_form() {
        let raw = json!({
            "id": "e-9",
            "name": "Pilot",
            "description": "existing",
            "context": ["app"],
            "state": "enrolling",
            "consistencyRule": "individual",
            "assignmentUnit": "individual",
            "postExperimentRule": "continue",
            "filterMode": "excludeAll",
            "tags": ["pilot"],
            "conditions": [
                {"id": "c-1", "conditionCode": "control", "assignmentWeight": 100, "order": 0, "name": "control"}
            ],
            "partitions": [
                {"id": "p-1", "site": "home", "target": "banner", "order": 0, "excludeIfReached": false}
            ],
            "experimentSegmentInclusion": {"segment": {
                "individualForSegment": [{"userId": "u-1"}],
                "groupForSegment": [],
                "subSegments": [],
                "type": "private"
            }},
            "experimentSegmentExclusion": {"segment": {
                "individualForSegment": [],
                "groupForSegment": [],
                "subSegments": [],
                "type": "private"
            }}
        });
        let experiment: Experiment = serde_json::from_value(raw).unwrap();
        let req = experiment_to_request(&experiment);
        assert_eq!(req.id.as_deref(), Some("e-9"));
        assert_eq!(req.state, ExperimentState::Enrolling);
        assert_eq!(req.conditions[0].id, "c-1");
        assert_eq!(
            req.experiment_segment_inclusion.segment.individual_for_segment[0].user_id,
            "u-1"
        );
    }
}

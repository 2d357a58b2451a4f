//! User-facing read model for experiments. Lookup tools present this view to
//! the model instead of the full service payload, which keeps prompts small
//! and maps internal ids back to the condition codes users talk about.

use crate::enums::{
    AssignmentUnit, ConsistencyRule, ExperimentState, ExperimentType, FilterMode,
    PostExperimentRule,
};
use crate::params::{ConditionSpec, DecisionPointSpec, GroupSpec, PostRuleSpec};
use crate::wire::Experiment;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimplifiedExperiment {
    pub id: String,
    pub created_at: String,
    pub updated_at: String,
    pub status: ExperimentState,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub context: String,
    #[serde(rename = "type")]
    pub experiment_type: ExperimentType,
    pub assignment_unit: AssignmentUnit,
    pub group_type: String,
    pub consistency_rule: ConsistencyRule,
    pub post_experiment_rule: PostRuleSpec,
    pub decision_points: Vec<DecisionPointSpec>,
    pub conditions: Vec<ConditionSpec>,
    pub filter_mode: FilterMode,
    pub inclusion_users: Vec<String>,
    pub inclusion_groups: Vec<GroupSpec>,
    pub exclusion_users: Vec<String>,
    pub exclusion_groups: Vec<GroupSpec>,
}

fn segment_lists(
    segment: &Option<crate::wire::ExperimentSegment>,
) -> (Vec<String>, Vec<GroupSpec>) {
    match segment {
        Some(env) => (
            env.segment
                .individual_for_segment
                .iter()
                .map(|ind| ind.user_id.clone())
                .collect(),
            env.segment
                .group_for_segment
                .iter()
                .map(|g| GroupSpec {
                    group_type: g.group_type.clone(),
                    group_id: g.group_id.clone(),
                })
                .collect(),
        ),
        None => (Vec::new(), Vec::new()),
    }
}

/// The stored revertTo is a condition id; users only know codes.
fn resolve_post_rule(experiment: &Experiment) -> PostRuleSpec {
    let condition_code = match (&experiment.post_experiment_rule, &experiment.revert_to) {
        (PostExperimentRule::Assign, Some(id)) => experiment
            .conditions
            .iter()
            .find(|c| &c.id == id)
            .map(|c| c.condition_code.clone()),
        _ => None,
    };
    PostRuleSpec {
        rule: experiment.post_experiment_rule,
        condition_code,
    }
}

pub fn simplify(experiment: &Experiment) -> SimplifiedExperiment {
    let (inclusion_users, inclusion_groups) =
        segment_lists(&experiment.experiment_segment_inclusion);
    let (exclusion_users, exclusion_groups) =
        segment_lists(&experiment.experiment_segment_exclusion);

    SimplifiedExperiment {
        id: experiment.id.clone(),
        created_at: experiment.created_at.clone(),
        updated_at: experiment.updated_at.clone(),
        status: experiment.state,
        name: experiment.name.clone(),
        description: experiment.description.clone(),
        tags: experiment.tags.clone(),
        context: experiment.context.first().cloned().unwrap_or_default(),
        experiment_type: experiment.experiment_type,
        assignment_unit: experiment.assignment_unit,
        group_type: experiment.group.clone().unwrap_or_else(|| "None".into()),
        consistency_rule: experiment.consistency_rule,
        post_experiment_rule: resolve_post_rule(experiment),
        decision_points: experiment
            .partitions
            .iter()
            .map(|p| DecisionPointSpec {
                site: p.site.clone(),
                target: p.target.clone(),
                exclude_if_reached: p.exclude_if_reached,
            })
            .collect(),
        conditions: experiment
            .conditions
            .iter()
            .map(|c| ConditionSpec {
                code: c.condition_code.clone(),
                weight: c.assignment_weight,
            })
            .collect(),
        filter_mode: experiment.filter_mode,
        inclusion_users,
        inclusion_groups,
        exclusion_users,
        exclusion_groups,
    }
}

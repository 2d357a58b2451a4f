//! Request and response shapes for the experiment service. Field names follow
//! the service's camelCase JSON exactly; response structs default optional
//! collections so older payloads still deserialize.

use crate::enums::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Experiment create/update payload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub description: String,
    pub consistency_rule: ConsistencyRule,
    pub assignment_unit: AssignmentUnit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(rename = "type")]
    pub experiment_type: ExperimentType,
    pub context: Vec<String>,
    pub assignment_algorithm: AssignmentAlgorithm,
    pub tags: Vec<String>,
    pub conditions: Vec<RequestCondition>,
    pub partitions: Vec<RequestPartition>,
    pub experiment_segment_inclusion: SegmentEnvelope,
    pub experiment_segment_exclusion: SegmentEnvelope,
    pub filter_mode: FilterMode,
    pub queries: Vec<Value>,
    pub state: ExperimentState,
    pub post_experiment_rule: PostExperimentRule,
    pub revert_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestCondition {
    pub id: String,
    pub condition_code: String,
    pub assignment_weight: u32,
    pub order: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPartition {
    pub id: String,
    pub site: String,
    pub target: String,
    pub order: u32,
    pub exclude_if_reached: bool,
}

/// Wrapper the service expects around inclusion/exclusion segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentEnvelope {
    pub segment: SegmentSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentSpec {
    pub individual_for_segment: Vec<IndividualRef>,
    pub group_for_segment: Vec<GroupRef>,
    pub sub_segments: Vec<Value>,
    #[serde(rename = "type")]
    pub segment_type: SegmentType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndividualRef {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRef {
    pub group_id: String,
    #[serde(rename = "type")]
    pub group_type: String,
}

// ---------------------------------------------------------------------------
// Experiment responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub context: Vec<String>,
    pub state: ExperimentState,
    pub consistency_rule: ConsistencyRule,
    pub assignment_unit: AssignmentUnit,
    pub post_experiment_rule: PostExperimentRule,
    #[serde(default)]
    pub revert_to: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub assignment_algorithm: AssignmentAlgorithm,
    pub filter_mode: FilterMode,
    #[serde(rename = "type", default)]
    pub experiment_type: ExperimentType,
    pub conditions: Vec<ExperimentCondition>,
    pub partitions: Vec<ExperimentPartition>,
    #[serde(default)]
    pub queries: Vec<Value>,
    #[serde(default)]
    pub experiment_segment_inclusion: Option<ExperimentSegment>,
    #[serde(default)]
    pub experiment_segment_exclusion: Option<ExperimentSegment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentCondition {
    pub id: String,
    pub condition_code: String,
    pub assignment_weight: u32,
    #[serde(default)]
    pub order: Option<u32>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentPartition {
    pub id: String,
    pub site: String,
    pub target: String,
    #[serde(default)]
    pub order: Option<u32>,
    #[serde(default)]
    pub exclude_if_reached: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSegment {
    pub segment: SegmentMembers,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentMembers {
    #[serde(default)]
    pub individual_for_segment: Vec<IndividualRef>,
    #[serde(default)]
    pub group_for_segment: Vec<GroupRef>,
    #[serde(default)]
    pub sub_segments: Vec<Value>,
    #[serde(rename = "type", default)]
    pub segment_type: SegmentType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentName {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStateRequest {
    pub experiment_id: String,
    pub state: ExperimentState,
}

// ---------------------------------------------------------------------------
// System endpoints
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
}

/// Per-context metadata as the service reports it, uppercase keys included.
/// EXP_IDS carry site names and EXP_POINTS carry target names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ContextMetadata {
    #[serde(rename = "CONDITIONS", default)]
    pub conditions: Vec<String>,
    #[serde(rename = "GROUP_TYPES", default)]
    pub group_types: Vec<String>,
    #[serde(rename = "EXP_IDS", default)]
    pub sites: Vec<String>,
    #[serde(rename = "EXP_POINTS", default)]
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContextMetadataResponse {
    pub context_metadata: std::collections::BTreeMap<String, ContextMetadata>,
}

// ---------------------------------------------------------------------------
// Simulation endpoints (v6)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct InitUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<std::collections::BTreeMap<String, Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_group: Option<std::collections::BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitUserResponse {
    pub id: String,
    #[serde(default)]
    pub group: Option<std::collections::BTreeMap<String, Vec<String>>>,
    #[serde(default)]
    pub working_group: Option<std::collections::BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignRequest {
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedCondition {
    #[serde(default)]
    pub id: Option<String>,
    pub condition_code: String,
    #[serde(default)]
    pub experiment_id: Option<String>,
    #[serde(default)]
    pub payload: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentAssignment {
    pub site: String,
    pub target: String,
    pub assigned_condition: Vec<AssignedCondition>,
    #[serde(default)]
    pub experiment_type: ExperimentType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignResponse {
    pub data: Vec<ExperimentAssignment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAssignedCondition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub condition_code: String,
    pub experiment_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkData {
    pub site: String,
    pub target: String,
    pub assigned_condition: Option<MarkAssignedCondition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkRequest {
    pub data: MarkData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MarkedDecisionPointStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkResponse {
    pub id: String,
    pub user_id: String,
    pub site: String,
    pub target: String,
    #[serde(default)]
    pub experiment_id: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_camel_case_keys() {
        let req = ExperimentRequest {
            id: None,
            name: "Math Hints".into(),
            description: String::new(),
            consistency_rule: ConsistencyRule::Individual,
            assignment_unit: AssignmentUnit::Individual,
            group: None,
            experiment_type: ExperimentType::Simple,
            context: vec!["assign-prog".into()],
            assignment_algorithm: AssignmentAlgorithm::Random,
            tags: vec![],
            conditions: vec![],
            partitions: vec![],
            experiment_segment_inclusion: SegmentEnvelope {
                segment: SegmentSpec {
                    individual_for_segment: vec![],
                    group_for_segment: vec![],
                    sub_segments: vec![],
                    segment_type: SegmentType::Private,
                },
            },
            experiment_segment_exclusion: SegmentEnvelope {
                segment: SegmentSpec {
                    individual_for_segment: vec![],
                    group_for_segment: vec![],
                    sub_segments: vec![],
                    segment_type: SegmentType::Private,
                },
            },
            filter_mode: FilterMode::ExcludeAll,
            queries: vec![],
            state: ExperimentState::Inactive,
            post_experiment_rule: PostExperimentRule::Continue,
            revert_to: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["consistencyRule"], "individual");
        assert_eq!(json["assignmentUnit"], "individual");
        assert_eq!(json["type"], "Simple");
        assert_eq!(json["filterMode"], "excludeAll");
        assert_eq!(json["postExperimentRule"], "continue");
        // revertTo is always present, even when unset
        assert!(json.as_object().unwrap().contains_key("revertTo"));
        assert!(json["revertTo"].is_null());
        // unset id is omitted entirely
        assert!(!json.as_object().unwrap().contains_key("id"));
    }

    #[test]
    fn context_metadata_reads_uppercase_keys() {
        let raw = serde_json::json!({
            "contextMetadata": {
                "assign-prog": {
                    "CONDITIONS": ["control", "variant"],
                    "GROUP_TYPES": ["schoolId"],
                    "EXP_IDS": ["SelectSection"],
                    "EXP_POINTS": ["absolute_value_plot_equality"]
                }
            }
        });
        let parsed: ContextMetadataResponse = serde_json::from_value(raw).unwrap();
        let ctx = &parsed.context_metadata["assign-prog"];
        assert_eq!(ctx.conditions, vec!["control", "variant"]);
        assert_eq!(ctx.sites, vec!["SelectSection"]);
        assert_eq!(ctx.targets, vec!["absolute_value_plot_equality"]);
    }

    #[test]
    fn experiment_tolerates_missing_optional_sections() {
        let raw = serde_json::json!({
            "id": "e-1",
            "name": "Pilot",
            "context": ["app"],
            "state": "inactive",
            "consistencyRule": "individual",
            "assignmentUnit": "individual",
            "postExperimentRule": "continue",
            "filterMode": "excludeAll",
            "conditions": [
                {"id": "c-1", "conditionCode": "control", "assignmentWeight": 100}
            ],
            "partitions": []
        });
        let parsed: Experiment = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.conditions[0].condition_code, "control");
        assert!(parsed.experiment_segment_inclusion.is_none());
        assert!(parsed.revert_to.is_none());
    }
}

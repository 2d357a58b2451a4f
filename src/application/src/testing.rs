//! In-memory stand-ins for the service client and the chat model. Tests
//! script model turns and inspect exactly which service calls were made.

use async_trait::async_trait;
use domain::chat::{ModelMessage, ModelResponse, ToolSchema};
use domain::wire::{
    AssignRequest, AssignResponse, ContextMetadata, ContextMetadataResponse, Experiment,
    ExperimentAssignment, ExperimentCondition, ExperimentName, ExperimentPartition,
    ExperimentRequest, ExperimentSegment, HealthResponse, InitUserRequest, InitUserResponse,
    MarkRequest, MarkResponse, SegmentMembers, UpdateStateRequest,
};
use infrastructure::{ChatModel, ExperimentApi};
use shared::{AgentError, Result};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Chat model that replays a fixed script of responses and records every
/// transcript it was shown.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<ModelResponse>>,
    transcripts: Mutex<Vec<Vec<ModelMessage>>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            transcripts: Mutex::new(Vec::new()),
        }
    }

    pub fn transcripts(&self) -> Vec<Vec<ModelMessage>> {
        self.transcripts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn chat(
        &self,
        _system: &str,
        messages: &[ModelMessage],
        _tools: &[ToolSchema],
    ) -> Result<ModelResponse> {
        self.transcripts.lock().unwrap().push(messages.to_vec());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AgentError::api("scripted model ran out of responses"))
    }
}

/// Experiment service double. Mutations are recorded, reads come from the
/// seeded fixtures.
#[derive(Default)]
pub struct FakeApi {
    pub contexts: Mutex<Vec<String>>,
    pub names: Mutex<Vec<ExperimentName>>,
    pub experiments: Mutex<Vec<Experiment>>,
    pub assignments: Mutex<Vec<ExperimentAssignment>>,
    pub created: Mutex<Vec<ExperimentRequest>>,
    pub updated: Mutex<Vec<(String, ExperimentRequest)>>,
    pub state_updates: Mutex<Vec<UpdateStateRequest>>,
    pub deleted: Mutex<Vec<String>>,
    pub metadata_fetches: Mutex<usize>,
}

impl FakeApi {
    pub fn with_context(self, name: &str) -> Self {
        self.contexts.lock().unwrap().push(name.to_string());
        self
    }

    pub fn with_experiment_names(self, names: Vec<ExperimentName>) -> Self {
        *self.names.lock().unwrap() = names;
        self
    }

    pub fn with_sample_experiment(self, id: &str, name: &str) -> Self {
        self.experiments
            .lock()
            .unwrap()
            .push(sample_experiment(id, name));
        self
    }
}

pub fn sample_experiment(id: &str, name: &str) -> Experiment {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "createdAt": "2026-01-01T00:00:00Z",
        "updatedAt": "2026-01-01T00:00:00Z",
        "name": name,
        "description": "",
        "context": ["assign-prog"],
        "state": "inactive",
        "consistencyRule": "individual",
        "assignmentUnit": "individual",
        "postExperimentRule": "continue",
        "filterMode": "excludeAll",
        "conditions": [
            {"id": "c-1", "conditionCode": "control", "assignmentWeight": 50},
            {"id": "c-2", "conditionCode": "variant", "assignmentWeight": 50}
        ],
        "partitions": [
            {"id": "p-1", "site": "SelectSection", "target": "abs_plot"}
        ]
    }))
    .unwrap()
}

fn experiment_from_request(id: &str, request: &ExperimentRequest) -> Experiment {
    let segment = |env: &domain::wire::SegmentEnvelope| {
        Some(ExperimentSegment {
            segment: SegmentMembers {
                individual_for_segment: env.segment.individual_for_segment.clone(),
                group_for_segment: env.segment.group_for_segment.clone(),
                sub_segments: env.segment.sub_segments.clone(),
                segment_type: env.segment.segment_type,
            },
        })
    };
    Experiment {
        created_at: "2026-01-01T00:00:00Z".into(),
        updated_at: "2026-01-01T00:00:00Z".into(),
        id: id.to_string(),
        name: request.name.clone(),
        description: request.description.clone(),
        context: request.context.clone(),
        state: request.state,
        consistency_rule: request.consistency_rule,
        assignment_unit: request.assignment_unit,
        post_experiment_rule: request.post_experiment_rule,
        revert_to: request.revert_to.clone(),
        tags: request.tags.clone(),
        group: request.group.clone(),
        assignment_algorithm: request.assignment_algorithm,
        filter_mode: request.filter_mode,
        experiment_type: request.experiment_type,
        conditions: request
            .conditions
            .iter()
            .map(|c| ExperimentCondition {
                id: c.id.clone(),
                condition_code: c.condition_code.clone(),
                assignment_weight: c.assignment_weight,
                order: Some(c.order),
                name: Some(c.name.clone()),
            })
            .collect(),
        partitions: request
            .partitions
            .iter()
            .map(|p| ExperimentPartition {
                id: p.id.clone(),
                site: p.site.clone(),
                target: p.target.clone(),
                order: Some(p.order),
                exclude_if_reached: p.exclude_if_reached,
            })
            .collect(),
        queries: request.queries.clone(),
        experiment_segment_inclusion: segment(&request.experiment_segment_inclusion),
        experiment_segment_exclusion: segment(&request.experiment_segment_exclusion),
    }
}

#[async_trait]
impl ExperimentApi for FakeApi {
    async fn health(&self) -> Result<HealthResponse> {
        Ok(HealthResponse {
            name: "UpGrade".into(),
            version: "6.0.1".into(),
            description: String::new(),
        })
    }

    async fn context_metadata(&self) -> Result<ContextMetadataResponse> {
        *self.metadata_fetches.lock().unwrap() += 1;
        let mut response = ContextMetadataResponse::default();
        for context in self.contexts.lock().unwrap().iter() {
            response.context_metadata.insert(
                context.clone(),
                ContextMetadata {
                    conditions: vec!["control".into(), "variant".into()],
                    group_types: vec!["schoolId".into()],
                    sites: vec!["SelectSection".into()],
                    targets: vec!["abs_plot".into()],
                },
            );
        }
        Ok(response)
    }

    async fn experiment_names(&self) -> Result<Vec<ExperimentName>> {
        Ok(self.names.lock().unwrap().clone())
    }

    async fn list_experiments(&self) -> Result<Vec<Experiment>> {
        Ok(self.experiments.lock().unwrap().clone())
    }

    async fn get_experiment(&self, id: &str) -> Result<Experiment> {
        self.experiments
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| AgentError::NotFound(format!("experiment '{id}' does not exist")))
    }

    async fn create_experiment(&self, request: &ExperimentRequest) -> Result<Experiment> {
        self.created.lock().unwrap().push(request.clone());
        let experiment = experiment_from_request("exp-created", request);
        self.experiments.lock().unwrap().push(experiment.clone());
        Ok(experiment)
    }

    async fn update_experiment(
        &self,
        id: &str,
        request: &ExperimentRequest,
    ) -> Result<Experiment> {
        self.updated
            .lock()
            .unwrap()
            .push((id.to_string(), request.clone()));
        Ok(experiment_from_request(id, request))
    }

    async fn update_state(&self, request: &UpdateStateRequest) -> Result<Experiment> {
        self.state_updates.lock().unwrap().push(request.clone());
        let mut experiment = self
            .experiments
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == request.experiment_id)
            .cloned()
            .unwrap_or_else(|| sample_experiment(&request.experiment_id, &request.experiment_id));
        experiment.state = request.state;
        Ok(experiment)
    }

    async fn delete_experiment(&self, id: &str) -> Result<()> {
        self.deleted.lock().unwrap().push(id.to_string());
        self.experiments.lock().unwrap().retain(|e| e.id != id);
        Ok(())
    }

    async fn init_user(
        &self,
        user_id: &str,
        request: &InitUserRequest,
    ) -> Result<InitUserResponse> {
        Ok(InitUserResponse {
            id: user_id.to_string(),
            group: request.group.clone(),
            working_group: request.working_group.clone(),
        })
    }

    async fn assign(&self, _user_id: &str, _request: &AssignRequest) -> Result<AssignResponse> {
        Ok(AssignResponse {
            data: self.assignments.lock().unwrap().clone(),
        })
    }

    async fn mark(&self, user_id: &str, request: &MarkRequest) -> Result<MarkResponse> {
        Ok(MarkResponse {
            id: "mark-1".into(),
            user_id: user_id.to_string(),
            site: request.data.site.clone(),
            target: request.data.target.clone(),
            experiment_id: request
                .data
                .assigned_condition
                .as_ref()
                .map(|c| c.experiment_id.clone()),
            condition: request
                .data
                .assigned_condition
                .as_ref()
                .map(|c| c.condition_code.clone()),
        })
    }
}

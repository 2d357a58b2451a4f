//! HTTP client for the experiment service. The `ExperimentApi` trait is the
//! seam the application layer programs against; tests substitute an
//! in-memory implementation.

use crate::config::Config;
use async_trait::async_trait;
use domain::wire::{
    AssignRequest, AssignResponse, ContextMetadataResponse, Experiment, ExperimentName,
    ExperimentRequest, HealthResponse, InitUserRequest, InitUserResponse, MarkRequest,
    MarkResponse, UpdateStateRequest,
};
use reqwest::{Client, ClientBuilder, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::{AgentError, Result};
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait ExperimentApi: Send + Sync {
    async fn health(&self) -> Result<HealthResponse>;
    async fn context_metadata(&self) -> Result<ContextMetadataResponse>;
    async fn experiment_names(&self) -> Result<Vec<ExperimentName>>;
    async fn list_experiments(&self) -> Result<Vec<Experiment>>;
    async fn get_experiment(&self, id: &str) -> Result<Experiment>;
    async fn create_experiment(&self, request: &ExperimentRequest) -> Result<Experiment>;
    async fn update_experiment(&self, id: &str, request: &ExperimentRequest)
        -> Result<Experiment>;
    async fn update_state(&self, request: &UpdateStateRequest) -> Result<Experiment>;
    async fn delete_experiment(&self, id: &str) -> Result<()>;
    async fn init_user(&self, user_id: &str, request: &InitUserRequest)
        -> Result<InitUserResponse>;
    async fn assign(&self, user_id: &str, request: &AssignRequest) -> Result<AssignResponse>;
    async fn mark(&self, user_id: &str, request: &MarkRequest) -> Result<MarkResponse>;
}

#[derive(Clone)]
pub struct UpGradeClient {
    client: Arc<Client>,
    base_url: String,
    auth_token: Option<String>,
}

impl UpGradeClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_nodelay(true)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AgentError::api(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client: Arc::new(client),
            base_url: config.api_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder, what: &str) -> Result<T> {
        let response = builder
            .send()
            .await
            .map_err(|e| AgentError::api(format!("{what}: request failed: {e}")))?;
        Self::decode(response, what).await
    }

    async fn decode<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| AgentError::api(format!("{what}: invalid response body: {e}")))
        } else {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(status = status.as_u16(), %body, "{what} failed");
            Err(AgentError::from_status(
                status.as_u16(),
                format!("{what}: {} {}", status.as_u16(), body),
            ))
        }
    }
}

#[async_trait]
impl ExperimentApi for UpGradeClient {
    async fn health(&self) -> Result<HealthResponse> {
        // Health check is served unauthenticated at the service root.
        let root = self.base_url.trim_end_matches("/api").to_string();
        self.send(self.client.get(format!("{root}/")), "health check")
            .await
    }

    async fn context_metadata(&self) -> Result<ContextMetadataResponse> {
        self.send(
            self.authed(self.client.get(self.url("/experiments/contextMetaData"))),
            "context metadata",
        )
        .await
    }

    async fn experiment_names(&self) -> Result<Vec<ExperimentName>> {
        self.send(
            self.authed(self.client.get(self.url("/experiments/names"))),
            "experiment names",
        )
        .await
    }

    async fn list_experiments(&self) -> Result<Vec<Experiment>> {
        self.send(
            self.authed(self.client.get(self.url("/experiments"))),
            "list experiments",
        )
        .await
    }

    async fn get_experiment(&self, id: &str) -> Result<Experiment> {
        self.send(
            self.authed(self.client.get(self.url(&format!("/experiments/single/{id}")))),
            "get experiment",
        )
        .await
    }

    async fn create_experiment(&self, request: &ExperimentRequest) -> Result<Experiment> {
        tracing::info!(name = %request.name, "creating experiment");
        self.send(
            self.authed(self.client.post(self.url("/experiments")).json(request)),
            "create experiment",
        )
        .await
    }

    async fn update_experiment(
        &self,
        id: &str,
        request: &ExperimentRequest,
    ) -> Result<Experiment> {
        tracing::info!(%id, "updating experiment");
        self.send(
            self.authed(
                self.client
                    .put(self.url(&format!("/experiments/{id}")))
                    .json(request),
            ),
            "update experiment",
        )
        .await
    }

    async fn update_state(&self, request: &UpdateStateRequest) -> Result<Experiment> {
        tracing::info!(id = %request.experiment_id, state = %request.state, "updating experiment state");
        self.send(
            self.authed(self.client.post(self.url("/experiments/state")).json(request)),
            "update experiment state",
        )
        .await
    }

    async fn delete_experiment(&self, id: &str) -> Result<()> {
        tracing::info!(%id, "deleting experiment");
        let response = self
            .authed(self.client.delete(self.url(&format!("/experiments/{id}"))))
            .send()
            .await
            .map_err(|e| AgentError::api(format!("delete experiment: request failed: {e}")))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(AgentError::from_status(
                status.as_u16(),
                format!("delete experiment: {} {}", status.as_u16(), body),
            ))
        }
    }

    async fn init_user(
        &self,
        user_id: &str,
        request: &InitUserRequest,
    ) -> Result<InitUserResponse> {
        // Simulation endpoints identify the user by header instead of auth.
        self.send(
            self.client
                .post(self.url("/v6/init"))
                .header("User-Id", user_id)
                .json(request),
            "init user",
        )
        .await
    }

    async fn assign(&self, user_id: &str, request: &AssignRequest) -> Result<AssignResponse> {
        self.send(
            self.client
                .post(self.url("/v6/assign"))
                .header("User-Id", user_id)
                .json(request),
            "get assignments",
        )
        .await
    }

    async fn mark(&self, user_id: &str, request: &MarkRequest) -> Result<MarkResponse> {
        self.send(
            self.client
                .post(self.url("/v6/mark"))
                .header("User-Id", user_id)
                .json(request),
            "mark decision point",
        )
        .await
    }
}

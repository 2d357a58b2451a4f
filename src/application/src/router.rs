//! Stage router. Each user turn starts in Analyzing and moves through the
//! stages until Responding produces the reply. A pending confirmation
//! outranks fresh intent detection, so a bare "yes" lands on the staged
//! action instead of being re-analyzed.

use crate::agent_loop::{run_loop, LoopConfig};
use crate::context::TurnContext;
use crate::executor::execute_pending;
use crate::gate;
use crate::tools;
use domain::chat::ModelMessage;
use domain::state::{Confirmation, ConversationState, Intent, IntentKind, Role, Stage};
use infrastructure::{ChatModel, ExperimentApi};
use serde::Deserialize;
use shared::confirmation::{parse_confirmation_reply, ConfirmationReply};
use shared::{AgentError, Result};
use std::sync::Arc;

const ANALYZER_SYSTEM: &str = "\
You analyze one user message for an A/B experiment management assistant. \
Decide whether you can answer directly or whether the request needs \
experiment data or an action on the experiment service. Use the available \
tools only if a quick lookup settles the question. Reply with exactly one \
JSON object and nothing else: \
{\"intent\": \"direct_answer\" | \"needs_info\", \"confidence\": 0.0-1.0, \
\"response\": \"<your answer when intent is direct_answer, else a one-line summary>\"}";

const GATHERER_SYSTEM: &str = "\
You manage A/B experiments on behalf of the user. Use the tools to look up \
terminology, context metadata, and experiments. When the user asks for an \
action (create, update, delete, status change, or user simulation), collect \
every required parameter, validate values against the context metadata, and \
stage the action with set_pending_action. Never claim an action has run; \
staged actions execute only after the user confirms. If parameters are \
missing, ask the user for them in plain language.";

const ANALYSIS_ITERATIONS: usize = 3;
const MAX_STAGE_HOPS: usize = 8;

const CANCELLED_REPLY: &str = "Okay, I won't do that. Is there anything else I can help with?";

#[derive(Debug, Deserialize)]
struct AnalyzerVerdict {
    intent: String,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    response: Option<String>,
}

pub struct Agent {
    model: Arc<dyn ChatModel>,
    api: Arc<dyn ExperimentApi>,
    loop_config: LoopConfig,
}

impl Agent {
    pub fn new(
        model: Arc<dyn ChatModel>,
        api: Arc<dyn ExperimentApi>,
        loop_config: LoopConfig,
    ) -> Self {
        Self {
            model,
            api,
            loop_config,
        }
    }

    /// Process one user input against the conversation state and produce the
    /// assistant reply for it.
    pub async fn handle_turn(
        &self,
        state: &mut ConversationState,
        input: &str,
    ) -> Result<String> {
        state.begin_turn(input);

        // A question we already asked takes priority over everything else.
        if state.awaiting_confirmation() {
            match parse_confirmation_reply(&state.user_input) {
                ConfirmationReply::Yes => {
                    if let Some(confirmation) = &mut state.confirmation {
                        confirmation.confirmed = Some(true);
                    }
                    state.stage = Stage::Executing;
                }
                ConfirmationReply::No => {
                    state.clear_pending();
                    return Ok(self.respond(state, CANCELLED_REPLY.to_string()));
                }
                ConfirmationReply::Unclear => match gate::confirmation_prompt(
                    state.pending_action.as_ref(),
                ) {
                    Ok(prompt) => return Ok(self.respond(state, prompt)),
                    Err(err) => {
                        state.record_error(&err);
                        state.clear_pending();
                        state.stage = Stage::Responding;
                    }
                },
            }
        }

        let mut draft: Option<String> = None;
        let mut executed: Option<String> = None;

        for _ in 0..MAX_STAGE_HOPS {
            tracing::debug!(stage = state.stage.as_str(), "entering stage");
            match state.stage {
                Stage::Analyzing => {
                    // Execution output goes to the user verbatim. No second
                    // model pass rephrases it.
                    if let Some(detail) = executed.take() {
                        draft = Some(detail);
                        state.stage = Stage::Responding;
                        continue;
                    }
                    if state.confirmed()
                        && state
                            .pending_action
                            .as_ref()
                            .is_some_and(|p| p.is_ready())
                    {
                        state.stage = Stage::Executing;
                        continue;
                    }
                    // A stage failure becomes part of the reply, never a
                    // dropped turn.
                    match self.analyze(state).await {
                        Ok(Some(answer)) => {
                            draft = Some(answer);
                            state.stage = Stage::Responding;
                        }
                        Ok(None) => state.stage = Stage::GatheringInfo,
                        Err(err) => {
                            state.record_error(&err);
                            state.stage = Stage::Responding;
                        }
                    }
                }
                Stage::GatheringInfo => match self.gather(state).await {
                    Ok(text) => match &state.pending_action {
                        Some(pending) if pending.is_ready() => {
                            state.stage = Stage::Confirming;
                        }
                        _ => {
                            draft = Some(text);
                            state.stage = Stage::Responding;
                        }
                    },
                    Err(err) => {
                        state.record_error(&err);
                        state.stage = Stage::Responding;
                    }
                },
                Stage::Confirming => {
                    match gate::confirmation_prompt(state.pending_action.as_ref()) {
                        Ok(prompt) => {
                            state.confirmation = Some(Confirmation {
                                message: prompt.clone(),
                                confirmed: None,
                            });
                            draft = Some(prompt);
                        }
                        Err(err) => {
                            state.record_error(&err);
                            state.clear_pending();
                        }
                    }
                    state.stage = Stage::Responding;
                }
                Stage::Executing => {
                    let mut ctx = TurnContext::new(state, self.api.as_ref());
                    match execute_pending(&mut ctx).await {
                        Ok(detail) => {
                            state.clear_pending();
                            executed = Some(detail);
                            state.stage = Stage::Analyzing;
                        }
                        Err(err) => {
                            state.record_error(&err);
                            state.clear_pending();
                            state.stage = Stage::Responding;
                        }
                    }
                }
                Stage::Responding => {
                    let text = if state.errors.is_empty() {
                        draft
                            .take()
                            .unwrap_or_else(|| "How can I help with your experiments?".into())
                    } else {
                        issues_report(state)
                    };
                    return Ok(self.respond(state, text));
                }
            }
        }

        state.record_error(&AgentError::Unknown(
            "stage router exceeded its hop limit".into(),
        ));
        let report = issues_report(state);
        Ok(self.respond(state, report))
    }

    fn respond(&self, state: &mut ConversationState, text: String) -> String {
        state.stage = Stage::Responding;
        state.finish_turn(&text);
        text
    }

    /// Quick bounded pass deciding direct answer versus information needed.
    /// Returns the answer text for a direct answer, `None` otherwise.
    async fn analyze(&self, state: &mut ConversationState) -> Result<Option<String>> {
        let messages = transcript_from(state, 5);
        let schemas = tools::schemas(&tools::analyzer_tools());
        let config = LoopConfig {
            max_iterations: ANALYSIS_ITERATIONS,
            ..self.loop_config
        };
        let api = Arc::clone(&self.api);
        let mut ctx = TurnContext::new(state, api.as_ref());
        let outcome = run_loop(
            self.model.as_ref(),
            ANALYZER_SYSTEM,
            &mut ctx,
            messages,
            &schemas,
            config,
        )
        .await?;

        let Some(verdict) = parse_verdict(&outcome.text) else {
            tracing::debug!("analyzer verdict unparseable, gathering instead");
            return Ok(None);
        };
        let kind = match verdict.intent.as_str() {
            "direct_answer" => IntentKind::DirectAnswer,
            _ => IntentKind::NeedsInfo,
        };
        state.intent = Some(Intent {
            kind,
            confidence: verdict.confidence,
            summary: verdict.response.clone().unwrap_or_default(),
        });
        match kind {
            IntentKind::DirectAnswer => Ok(Some(
                verdict
                    .response
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or_else(|| "Understood.".into()),
            )),
            IntentKind::NeedsInfo => Ok(None),
        }
    }

    /// Full tool loop with the merged tool set.
    async fn gather(&self, state: &mut ConversationState) -> Result<String> {
        let messages = transcript_from(state, 5);
        let schemas = tools::schemas(&tools::merged_tools());
        let config = self.loop_config;
        let api = Arc::clone(&self.api);
        let mut ctx = TurnContext::new(state, api.as_ref());
        let outcome = run_loop(
            self.model.as_ref(),
            GATHERER_SYSTEM,
            &mut ctx,
            messages,
            &schemas,
            config,
        )
        .await?;
        if outcome.capped {
            tracing::warn!(iterations = outcome.iterations, "gathering loop was capped");
        }
        Ok(outcome.text)
    }
}

fn issues_report(state: &ConversationState) -> String {
    let issues = state
        .errors
        .iter()
        .map(|(category, message)| format!("{}: {}", category.as_str(), message))
        .collect::<Vec<_>>()
        .join("; ");
    format!("I encountered some issues: {issues}")
}

/// Recent conversation history as model messages. `begin_turn` has already
/// pushed the current input, so it is the last entry.
fn transcript_from(state: &ConversationState, exchanges: usize) -> Vec<ModelMessage> {
    state
        .recent_history(exchanges)
        .iter()
        .map(|turn| match turn.role {
            Role::User => ModelMessage::User(turn.content.clone()),
            Role::Assistant => ModelMessage::Assistant {
                text: turn.content.clone(),
                tool_calls: Vec::new(),
            },
        })
        .collect()
}

/// The analyzer is asked for bare JSON but models wrap it in fences often
/// enough that both forms are accepted.
fn parse_verdict(text: &str) -> Option<AnalyzerVerdict> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_end_matches("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(body.trim()).ok()
}

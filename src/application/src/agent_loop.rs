//! Bounded tool-calling loop. The model keeps requesting tools until it
//! answers in plain text or the iteration cap stops it; each tool result is
//! appended to the transcript before the next model call.

use crate::context::TurnContext;
use crate::executor::execute_tool;
use domain::chat::{ModelMessage, ToolCallResult, ToolSchema};
use infrastructure::ChatModel;
use shared::{AgentError, Result};
use std::time::Duration;

const APOLOGY: &str =
    "I apologize, but I couldn't complete your request within the allowed processing time.";

#[derive(Debug, Clone, Copy)]
pub struct LoopConfig {
    pub max_iterations: usize,
    pub iteration_timeout: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            iteration_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopOutcome {
    pub text: String,
    pub iterations: usize,
    pub capped: bool,
}

/// Drive the model until it stops asking for tools or the cap is hit.
/// Requested tools run serially in the order the model listed them.
pub async fn run_loop(
    model: &dyn ChatModel,
    system: &str,
    ctx: &mut TurnContext<'_>,
    messages: Vec<ModelMessage>,
    tools: &[ToolSchema],
    config: LoopConfig,
) -> Result<LoopOutcome> {
    let mut transcript = messages;
    let mut last_text = String::new();

    for iteration in 0..config.max_iterations {
        let response = tokio::time::timeout(
            config.iteration_timeout,
            model.chat(system, &transcript, tools),
        )
        .await
        .map_err(|_| AgentError::api("model call timed out"))??;

        if response.tool_calls.is_empty() {
            return Ok(LoopOutcome {
                text: response.text,
                iterations: iteration + 1,
                capped: false,
            });
        }

        tracing::debug!(
            iteration,
            tools = response.tool_calls.len(),
            "executing requested tools"
        );
        if !response.text.is_empty() {
            last_text = response.text.clone();
        }

        let mut results = Vec::with_capacity(response.tool_calls.len());
        for call in &response.tool_calls {
            let content = execute_tool(ctx, call).await;
            results.push(ToolCallResult {
                tool_call_id: call.id.clone(),
                content,
            });
        }

        transcript.push(ModelMessage::Assistant {
            text: response.text,
            tool_calls: response.tool_calls,
        });
        transcript.push(ModelMessage::ToolResults(results));
    }

    tracing::warn!(
        max_iterations = config.max_iterations,
        "tool loop hit its iteration cap"
    );
    let text = if last_text.is_empty() {
        APOLOGY.to_string()
    } else {
        last_text
    };
    Ok(LoopOutcome {
        text,
        iterations: config.max_iterations,
        capped: true,
    })
}

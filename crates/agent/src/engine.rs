//! The conversation engine — the turn loop for one agent invocation.
//!
//! Single-threaded per invocation: send a request, inspect the response,
//! execute any requested delegations through the dispatcher, append their
//! results to history, repeat until the model produces a final answer or
//! the turn budget runs out.

use crate::dispatcher;
use foreman_config::{AgentDef, Config};
use foreman_core::provider::{Provider, ProviderRequest, StopReason, ToolDefinition, Usage};
use foreman_core::{Error, Message, ModelRef, Result};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Hard turn budget per conversation. Depth limits bound the recursion but
/// not the number of turns at a single depth; this does.
pub const MAX_TURNS: u32 = 50;

/// The single delegation capability offered to the model.
pub const DELEGATE_TOOL: &str = "delegate";

/// Resolves a parsed model reference to a provider backend.
///
/// The engine only depends on this seam; the CLI plugs in the real router,
/// tests plug in scripted providers.
pub trait ProviderResolver: Send + Sync {
    fn resolve(&self, model_ref: &ModelRef) -> Result<Arc<dyn Provider>>;
}

/// A resolver backed by a closure; the CLI wraps the provider router in one.
pub struct ConfigResolver<F>(pub F)
where
    F: Fn(&ModelRef) -> Result<Arc<dyn Provider>> + Send + Sync;

impl<F> ProviderResolver for ConfigResolver<F>
where
    F: Fn(&ModelRef) -> Result<Arc<dyn Provider>> + Send + Sync,
{
    fn resolve(&self, model_ref: &ModelRef) -> Result<Arc<dyn Provider>> {
        (self.0)(model_ref)
    }
}

/// Terminal state of a completed conversation.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// The final answer text
    pub text: String,

    /// Which model produced the final turn
    pub model: String,

    /// Cumulative token usage across all turns of this conversation
    pub usage: Usage,

    /// Stop reason of the final turn
    pub stop_reason: StopReason,

    /// Turns taken (provider calls made by this conversation)
    pub turns: u32,

    /// Delegation requests dispatched by this conversation
    pub delegation_calls: u32,

    /// Wall-clock duration of the invocation
    pub duration: std::time::Duration,
}

/// Drives conversations for agents defined in one configuration.
pub struct Engine {
    config: Arc<Config>,
    resolver: Arc<dyn ProviderResolver>,
}

impl Engine {
    pub fn new(config: Arc<Config>, resolver: Arc<dyn ProviderResolver>) -> Self {
        Self { config, resolver }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one conversation for `agent` at the given recursion depth.
    ///
    /// Boxed because the dispatcher recursively starts nested conversations
    /// for sub-agents.
    pub fn run<'a>(
        &'a self,
        agent: &'a AgentDef,
        system_prompt: String,
        user_message: String,
        depth: u32,
    ) -> BoxFuture<'a, Result<RunOutcome>> {
        Box::pin(async move {
            let started = Instant::now();
            let model_ref = agent.model_ref(&self.config.defaults)?;
            let provider = self.resolver.resolve(&model_ref)?;

            // At the depth boundary no tool schema is offered, so the model
            // structurally cannot request further delegation.
            let tools = if agent.can_delegate() && depth < agent.delegation.max_depth {
                vec![delegate_tool(agent)]
            } else {
                Vec::new()
            };

            info!(
                agent = %agent.name,
                model = %model_ref,
                depth,
                delegation = !tools.is_empty(),
                "Starting conversation"
            );

            let mut messages = vec![Message::user(user_message)];
            let mut usage = Usage::default();
            let mut delegation_calls = 0u32;

            for turn in 1..=MAX_TURNS {
                let request = ProviderRequest {
                    model: model_ref.model.clone(),
                    system: system_prompt.clone(),
                    messages: messages.clone(),
                    temperature: agent.temperature(&self.config.defaults),
                    max_tokens: Some(agent.max_tokens(&self.config.defaults)),
                    tools: tools.clone(),
                };

                let response = provider.complete(request).await?;
                usage.add(response.usage);

                debug!(
                    agent = %agent.name,
                    turn,
                    stop_reason = %response.stop_reason,
                    tool_calls = response.tool_calls.len(),
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    "Turn complete"
                );

                if response.tool_calls.is_empty() {
                    return Ok(RunOutcome {
                        text: response.text,
                        model: response.model,
                        usage,
                        stop_reason: response.stop_reason,
                        turns: turn,
                        delegation_calls,
                        duration: started.elapsed(),
                    });
                }

                let calls = response.tool_calls.clone();
                messages.push(Message::assistant(response.text, response.tool_calls));

                delegation_calls += calls.len() as u32;
                let results = dispatcher::dispatch(self, agent, &calls, depth).await;
                debug_assert_eq!(results.len(), calls.len());
                messages.push(Message::tool_results(results));
            }

            Err(Error::TurnLimitExceeded { turns: MAX_TURNS })
        })
    }
}

/// The tool schema describing the delegation capability.
fn delegate_tool(agent: &AgentDef) -> ToolDefinition {
    ToolDefinition {
        name: DELEGATE_TOOL.into(),
        description: format!(
            "Delegate a sub-task to another agent. Available agents: {}. \
             The agent works independently and returns its final answer.",
            agent.agents.join(", ")
        ),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "agent": {
                    "type": "string",
                    "description": "Name of the agent to delegate to"
                },
                "task": {
                    "type": "string",
                    "description": "Complete description of the sub-task"
                }
            },
            "required": ["agent", "task"]
        }),
    }
}

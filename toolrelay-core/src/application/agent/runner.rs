use super::directive::{AgentDirective, parse_directive};
use super::errors::{AgentError, ToolError};
use super::instructions::compose_system_instructions;
use super::models::{AgentOptions, AgentOutcome, AgentStep, DispatchState};
use crate::application::tooling::ToolRegistry;
use crate::config::ToolCallMode;
use crate::domain::{ToolCallIntent, ToolInvocation, ToolResult, Turn};
use crate::infrastructure::model::{ModelProvider, ModelRequest, ModelResponse, ToolSpec};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Maximum correction requests for a malformed JSON action
const MAX_JSON_RETRIES: u8 = 3;

const PREVIEW_CHARS: usize = 120;

pub struct Agent<P: ModelProvider> {
    provider: Arc<P>,
    options: AgentOptions,
}

impl<P: ModelProvider> Agent<P> {
    pub fn new(provider: Arc<P>, options: AgentOptions) -> Self {
        Self { provider, options }
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    /// Handle one user prompt against `history` and the tools in `registry`.
    ///
    /// `history` is only read. The turns this run produced are returned in
    /// [`AgentOutcome::turns`] for the caller to commit.
    pub async fn run(
        &self,
        registry: &ToolRegistry,
        history: &[Turn],
        prompt: &str,
    ) -> Result<AgentOutcome, AgentError> {
        let scoped;
        let registry = match &self.options.tools {
            Some(allowed) => {
                scoped = registry.restricted(allowed);
                &scoped
            }
            None => registry,
        };
        info!(
            provider = %self.options.provider,
            model = %self.options.model,
            tools = registry.len(),
            "Agent run started"
        );
        let mode = self.options.tool_call_mode;
        let guidance = registry.instructions().await;
        let system = compose_system_instructions(
            self.options.system_prompt.as_deref(),
            mode,
            registry.tools(),
            &guidance,
        );
        let tools: Vec<ToolSpec> = match mode {
            ToolCallMode::Native => registry
                .tools()
                .iter()
                .map(|tool| ToolSpec {
                    name: tool.name().to_string(),
                    description: tool.descriptor.description.clone(),
                    parameters: tool.signature.to_json_schema(),
                })
                .collect(),
            ToolCallMode::Directive => Vec::new(),
        };

        let mut draft = vec![Turn::user(prompt)];
        let mut corrections: Vec<Turn> = Vec::new();
        let mut steps = Vec::new();
        let mut logs = vec![format!("Initial agent request: {}", summarise(prompt))];
        let mut used_ids: HashSet<String> = history
            .iter()
            .flat_map(|turn| turn.invocations())
            .map(|invocation| invocation.invocation_id.clone())
            .collect();
        let mut rounds = 0usize;
        let mut json_retries = 0u8;
        let mut state = DispatchState::AwaitingModel;

        loop {
            state = match state {
                DispatchState::AwaitingModel => {
                    let messages: Vec<Turn> = history
                        .iter()
                        .chain(draft.iter())
                        .chain(corrections.iter())
                        .cloned()
                        .collect();
                    debug!(messages = messages.len(), rounds, "Submitting agent turn to model provider");
                    let response = self
                        .provider
                        .chat(ModelRequest {
                            provider: self.options.provider.clone(),
                            model: self.options.model.clone(),
                            system: system.clone(),
                            messages,
                            tools: tools.clone(),
                            tool_call_mode: mode,
                        })
                        .await?;

                    match self.interpret(response) {
                        Ok(next) => {
                            corrections.clear();
                            next
                        }
                        Err((raw, reason)) if json_retries < MAX_JSON_RETRIES => {
                            json_retries += 1;
                            warn!(
                                attempt = json_retries,
                                max_attempts = MAX_JSON_RETRIES,
                                error = %reason,
                                "JSON action parse failed, requesting correction from model"
                            );
                            logs.push(format!(
                                "JSON parse retry attempt {json_retries}/{MAX_JSON_RETRIES}: {reason}"
                            ));
                            corrections.push(Turn::assistant(raw));
                            corrections.push(Turn::user(format!(
                                "Your last response was not a valid action ({reason}). Respond again with exactly one JSON action object."
                            )));
                            DispatchState::AwaitingModel
                        }
                        Err((raw, reason)) => {
                            warn!(error = %reason, "JSON action still malformed after retries");
                            logs.push(format!("Giving up on malformed action: {reason}"));
                            DispatchState::FinalAnswer {
                                response: raw,
                                degraded: true,
                            }
                        }
                    }
                }
                DispatchState::HandlingToolCalls { text, intents } => {
                    if rounds >= self.options.max_tool_rounds {
                        warn!(rounds, "Agent exceeded max tool rounds");
                        logs.push(format!("Stopped after {rounds} tool rounds"));
                        DispatchState::FinalAnswer {
                            response: format!(
                                "I stopped after {rounds} rounds of tool calls without reaching an answer. Please narrow the request and try again."
                            ),
                            degraded: true,
                        }
                    } else {
                        rounds += 1;
                        let invocations = assign_ids(intents, &mut used_ids);
                        info!(
                            round = rounds,
                            calls = invocations.len(),
                            "Agent requested tool execution"
                        );
                        draft.push(Turn::tool_calls(text, invocations.clone()));

                        let results = self.dispatch(registry, &invocations).await;
                        for (invocation, result) in invocations.into_iter().zip(results) {
                            let output = result.payload.render();
                            logs.push(format!(
                                "Tool '{}' executed (success: {})",
                                invocation.tool_name, !result.is_error
                            ));
                            steps.push(AgentStep {
                                invocation_id: invocation.invocation_id,
                                tool: invocation.tool_name,
                                input: invocation.arguments,
                                success: !result.is_error,
                                output,
                            });
                            draft.push(Turn::tool_result(result));
                        }
                        DispatchState::AwaitingModel
                    }
                }
                DispatchState::FinalAnswer { response, degraded } => {
                    info!(rounds, degraded, "Agent returned final response");
                    logs.push(format!("Agent final answer: {}", summarise(&response)));
                    draft.push(Turn::assistant(response.clone()));
                    return Ok(AgentOutcome {
                        response,
                        degraded,
                        rounds,
                        steps,
                        turns: draft,
                        logs,
                    });
                }
            };
        }
    }

    /// Decide the next state from a model response. `Err` carries the raw
    /// text and the parse failure of a malformed JSON action.
    fn interpret(&self, response: ModelResponse) -> Result<DispatchState, (String, String)> {
        let text = response.trimmed_text().map(str::to_string);
        if !response.tool_calls.is_empty() {
            return Ok(DispatchState::HandlingToolCalls {
                text,
                intents: response.tool_calls,
            });
        }

        let Some(text) = text else {
            warn!("Model returned an empty response");
            return Ok(DispatchState::FinalAnswer {
                response: "The model returned an empty response. Please try again.".to_string(),
                degraded: true,
            });
        };

        match self.options.tool_call_mode {
            ToolCallMode::Native => Ok(DispatchState::FinalAnswer {
                response: text,
                degraded: false,
            }),
            ToolCallMode::Directive => match parse_directive(&text) {
                Ok(AgentDirective::Final { response }) => Ok(DispatchState::FinalAnswer {
                    response,
                    degraded: false,
                }),
                Ok(AgentDirective::CallTools { calls }) => Ok(DispatchState::HandlingToolCalls {
                    text: None,
                    intents: calls,
                }),
                Err(reason) => Err((text, reason)),
            },
        }
    }

    /// Run one round of invocations. Results come back in invocation order
    /// whatever order they complete in.
    async fn dispatch(&self, registry: &ToolRegistry, invocations: &[ToolInvocation]) -> Vec<ToolResult> {
        let calls = invocations
            .iter()
            .map(|invocation| execute(registry, invocation.clone()));
        if self.options.concurrent_tools {
            join_all(calls).await
        } else {
            let mut results = Vec::with_capacity(invocations.len());
            for call in calls {
                results.push(call.await);
            }
            results
        }
    }
}

async fn execute(registry: &ToolRegistry, invocation: ToolInvocation) -> ToolResult {
    let Some(tool) = registry.resolve(&invocation.tool_name) else {
        warn!(tool = %invocation.tool_name, "Model requested unknown tool");
        return ToolError::NotFound(invocation.tool_name).into_result(invocation.invocation_id);
    };

    if let Err(source) = tool.signature.validate(&invocation.arguments) {
        warn!(tool = %invocation.tool_name, error = %source, "Rejected tool call arguments");
        return ToolError::InvalidArguments {
            tool: invocation.tool_name,
            source,
        }
        .into_result(invocation.invocation_id);
    }

    debug!(
        tool = %invocation.tool_name,
        provider = tool.provider_id(),
        invocation = %invocation.invocation_id,
        "Dispatching tool call"
    );
    let result = tool.call(invocation).await;
    if result.is_error {
        debug!(invocation = %result.invocation_id, "Tool reported an error");
    }
    result
}

/// Turn intents into invocations with ids unique within the conversation.
/// A model-supplied id is kept unless it was already used.
fn assign_ids(intents: Vec<ToolCallIntent>, used: &mut HashSet<String>) -> Vec<ToolInvocation> {
    intents
        .into_iter()
        .map(|intent| {
            let invocation_id = match intent.id {
                Some(id) if !id.trim().is_empty() && !used.contains(&id) => id,
                _ => format!("call_{}", Uuid::new_v4().simple()),
            };
            used.insert(invocation_id.clone());
            ToolInvocation {
                invocation_id,
                tool_name: intent.name,
                arguments: intent.arguments,
            }
        })
        .collect()
}

fn summarise(text: &str) -> String {
    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= PREVIEW_CHARS {
        single_line
    } else {
        let cut: String = single_line.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    }
}

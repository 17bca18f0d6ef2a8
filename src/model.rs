//! Model abstraction for LLM interactions
//!
//! The inference collaborator sits behind [`ModelProvider`]. [`OpenAIProvider`]
//! wraps the async-openai crate; [`ScriptedProvider`] and [`FnProvider`] are
//! deterministic stand-ins for tests and local runs.
//!
//! A raw [`ModelResponse`] is never acted on directly. [`Decision::classify`]
//! turns it into one of three decision kinds after checking every requested
//! function against the active handler's tools and edges.

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolType,
        CreateChatCompletionRequestArgs, FunctionCall, FunctionObjectArgs, ResponseFormat,
        ResponseFormatJsonSchema,
    },
    Client,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::agent::Agent;
use crate::error::{AgentsError, Result};
use crate::graph::RoutingGraph;
use crate::items::{Message, ModelResponse, Role, ToolCall};
use crate::tool::ToolSpec;
use crate::usage::Usage;

/// Structured-output schema requested from the model.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    pub name: String,
    pub schema: Value,
}

/// One call into the inference collaborator.
#[derive(Debug, Clone, Default)]
pub struct ModelRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSpec>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub output_schema: Option<OutputSchema>,
}

impl ModelRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            ..Default::default()
        }
    }

    /// The system message, if the request carries one.
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }

    pub fn offers_tool(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name == name)
    }
}

/// Trait for model providers
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn complete(&self, request: ModelRequest) -> Result<(ModelResponse, Usage)>;
}

/// OpenAI model provider using async-openai
pub struct OpenAIProvider {
    client: Client<OpenAIConfig>,
}

impl OpenAIProvider {
    /// Reads `OPENAI_API_KEY` from the environment.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub fn with_client(client: Client<OpenAIConfig>) -> Self {
        Self { client }
    }

    fn convert_message(msg: &Message) -> Result<ChatCompletionRequestMessage> {
        let converted = match msg.role {
            Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(msg.content.clone())
                .build()?
                .into(),
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(msg.content.clone())
                .build()?
                .into(),
            Role::Assistant => {
                let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
                if !msg.content.is_empty() {
                    builder.content(msg.content.clone());
                }

                if let Some(tool_calls) = &msg.tool_calls {
                    let openai_tool_calls: Vec<_> = tool_calls
                        .iter()
                        .map(|tc| ChatCompletionMessageToolCall {
                            id: tc.id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: FunctionCall {
                                name: tc.name.clone(),
                                arguments: tc.arguments.to_string(),
                            },
                        })
                        .collect();
                    builder.tool_calls(openai_tool_calls);
                }

                builder.build()?.into()
            }
            Role::Tool => ChatCompletionRequestToolMessageArgs::default()
                .content(msg.content.clone())
                .tool_call_id(msg.tool_call_id.clone().unwrap_or_default())
                .build()?
                .into(),
        };
        Ok(converted)
    }

    fn convert_tools(tools: &[ToolSpec]) -> Result<Vec<ChatCompletionTool>> {
        tools
            .iter()
            .map(|tool| {
                Ok(ChatCompletionToolArgs::default()
                    .r#type(ChatCompletionToolType::Function)
                    .function(
                        FunctionObjectArgs::default()
                            .name(tool.name.clone())
                            .description(tool.description.clone())
                            .parameters(tool.parameters.clone())
                            .build()?,
                    )
                    .build()?)
            })
            .collect()
    }
}

impl Default for OpenAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelProvider for OpenAIProvider {
    async fn complete(&self, request: ModelRequest) -> Result<(ModelResponse, Usage)> {
        let openai_messages = request
            .messages
            .iter()
            .map(Self::convert_message)
            .collect::<Result<Vec<_>>>()?;

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&request.model).messages(openai_messages);

        if !request.tools.is_empty() {
            args.tools(Self::convert_tools(&request.tools)?);
        }

        if let Some(temp) = request.temperature {
            args.temperature(temp);
        }

        if let Some(max) = request.max_tokens {
            args.max_completion_tokens(max);
        }

        if let Some(output) = &request.output_schema {
            args.response_format(ResponseFormat::JsonSchema {
                json_schema: ResponseFormatJsonSchema {
                    description: None,
                    name: output.name.clone(),
                    schema: Some(output.schema.clone()),
                    strict: Some(true),
                },
            });
        }

        let response = self.client.chat().create(args.build()?).await?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| AgentsError::ModelBehaviorError {
                message: "No choices in response".to_string(),
            })?;

        // Unparseable arguments are kept as a string so the tool reports them.
        let tool_calls = choice
            .message
            .tool_calls
            .iter()
            .flatten()
            .map(|tc| ToolCall {
                id: tc.id.clone(),
                name: tc.function.name.clone(),
                arguments: serde_json::from_str(&tc.function.arguments)
                    .unwrap_or_else(|_| Value::String(tc.function.arguments.clone())),
            })
            .collect();

        let model_response = ModelResponse {
            id: response.id.clone(),
            content: choice.message.content.clone(),
            tool_calls,
            finish_reason: choice.finish_reason.as_ref().map(|r| format!("{:?}", r)),
            created_at: chrono::Utc::now(),
        };

        let usage = match response.usage {
            Some(usage) => Usage::new(
                usage.prompt_tokens as usize,
                usage.completion_tokens as usize,
            ),
            None => Usage::empty(),
        };

        Ok((model_response, usage))
    }
}

enum Scripted {
    Respond(ModelResponse),
    Fail(String),
}

/// Replays a queue of canned responses and records every request it sees.
///
/// When the queue runs dry it answers with plain text `"Default response"`.
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, response: ModelResponse) -> Self {
        lock(&self.script).push_back(Scripted::Respond(response));
        self
    }

    pub fn with_message(self, content: impl Into<String>) -> Self {
        self.with_response(ModelResponse::new_message(content))
    }

    pub fn with_tool_call(self, tool_name: impl Into<String>, args: Value) -> Self {
        self.with_response(ModelResponse::new_tool_calls(vec![ToolCall::new(
            tool_name, args,
        )]))
    }

    /// Queues a call to the `transfer_to_*` function for `handler`.
    pub fn with_handoff(self, handler: &str) -> Self {
        self.with_tool_call(
            crate::handoff::handoff_tool_name(handler),
            Value::Object(Default::default()),
        )
    }

    /// Queues a collaborator failure.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        lock(&self.script).push_back(Scripted::Fail(message.into()));
        self
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<ModelRequest> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.script).len()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn complete(&self, request: ModelRequest) -> Result<(ModelResponse, Usage)> {
        lock(&self.requests).push(request);
        let next = lock(&self.script).pop_front();
        match next {
            Some(Scripted::Respond(response)) => Ok((response, Usage::new(10, 5))),
            Some(Scripted::Fail(message)) => Err(AgentsError::CollaboratorFailure { message }),
            None => Ok((
                ModelResponse::new_message("Default response"),
                Usage::new(10, 5),
            )),
        }
    }
}

type ResponderFn = dyn Fn(&ModelRequest) -> Result<ModelResponse> + Send + Sync;

/// A provider whose answer is computed by a closure over the request.
#[derive(Clone)]
pub struct FnProvider {
    responder: Arc<ResponderFn>,
    calls: Arc<AtomicUsize>,
}

impl FnProvider {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&ModelRequest) -> Result<ModelResponse> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelProvider for FnProvider {
    async fn complete(&self, request: ModelRequest) -> Result<(ModelResponse, Usage)> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = (self.responder)(&request)?;
        Ok((response, Usage::new(10, 5)))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// What the model decided for one round, validated against the graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Final text for the user.
    Text(String),

    /// One or more tools from the active handler's own set.
    ToolCalls {
        content: Option<String>,
        calls: Vec<ToolCall>,
    },

    /// A transfer along an existing edge. `calls` is everything the model
    /// requested in this round; `chosen` indexes the handoff that wins.
    Handoff {
        content: Option<String>,
        calls: Vec<ToolCall>,
        chosen: usize,
        target: String,
    },
}

impl Decision {
    /// Classifies `response` for `handler`.
    ///
    /// Every requested function must be either one of the handler's tools or
    /// one of its outgoing edges. A transfer to a handler that exists but is
    /// not adjacent is [`AgentsError::OffGraphHandoff`]; anything else
    /// unrecognised is [`AgentsError::UnknownTool`]. When several edges are
    /// requested the first one wins.
    pub fn classify(response: ModelResponse, handler: &Agent, graph: &RoutingGraph) -> Result<Self> {
        let ModelResponse {
            content,
            tool_calls,
            ..
        } = response;
        let content = content.filter(|c| !c.trim().is_empty());

        if tool_calls.is_empty() {
            return content.map(Decision::Text).ok_or_else(|| AgentsError::ModelBehaviorError {
                message: "model returned neither text nor a function call".to_string(),
            });
        }

        let mut handoff: Option<(usize, String)> = None;
        for (index, call) in tool_calls.iter().enumerate() {
            if let Some(edge) = handler.handoff_by_tool_name(&call.name) {
                if handoff.is_none() {
                    handoff = Some((index, edge.target.clone()));
                }
            } else if let Some(target) = graph.handoff_target(&call.name) {
                return Err(AgentsError::OffGraphHandoff {
                    from: handler.name().to_string(),
                    to: target.to_string(),
                });
            } else if handler.tool(&call.name).is_none() {
                return Err(AgentsError::UnknownTool {
                    handler: handler.name().to_string(),
                    tool: call.name.clone(),
                });
            }
        }

        Ok(match handoff {
            Some((chosen, target)) => Decision::Handoff {
                content,
                calls: tool_calls,
                chosen,
                target,
            },
            None => Decision::ToolCalls {
                content,
                calls: tool_calls,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handoff::Handoff;
    use crate::tool::{FunctionTool, Tool};
    use schemars::JsonSchema;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct NoArgs {}

    fn graph() -> RoutingGraph {
        let status: Arc<dyn Tool> = Arc::new(FunctionTool::lookup(
            "flight_status_tool",
            "status",
            |_: NoArgs| Ok("on time".into()),
        ));
        RoutingGraph::builder()
            .entry("Triage Agent")
            .handler(
                Agent::simple("Triage Agent", "")
                    .with_handoff(Handoff::new("Flight Status Agent", ""))
                    .with_handoff(Handoff::new("FAQ Agent", "")),
            )
            .handler(
                Agent::simple("Flight Status Agent", "")
                    .with_tool(status)
                    .with_handoff(Handoff::new("Triage Agent", "")),
            )
            .handler(Agent::simple("FAQ Agent", "").with_handoff(Handoff::new("Triage Agent", "")))
            .build()
            .unwrap()
    }

    fn calls(names: &[&str]) -> ModelResponse {
        ModelResponse::new_tool_calls(
            names
                .iter()
                .map(|n| ToolCall::new(*n, serde_json::json!({})))
                .collect(),
        )
    }

    #[test]
    fn test_message_conversion() {
        for msg in [
            Message::system("You are helpful"),
            Message::user("Hello"),
            Message::assistant("Hi there"),
            Message::assistant_with_tool_calls(
                "",
                vec![ToolCall::new("faq_lookup_tool", serde_json::json!({"question": "wifi"}))],
            ),
            Message::tool("Result", "call_123"),
        ] {
            assert!(OpenAIProvider::convert_message(&msg).is_ok());
        }
    }

    #[test]
    fn test_tool_conversion() {
        let spec = Handoff::new("FAQ Agent", "answers").as_tool_spec();
        let converted = OpenAIProvider::convert_tools(&[spec]).unwrap();
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].function.name, "transfer_to_faq_agent");
    }

    #[tokio::test]
    async fn test_scripted_provider() {
        let provider = ScriptedProvider::new()
            .with_message("First")
            .with_failure("boom")
            .with_handoff("FAQ Agent");

        let request = ModelRequest::new("gpt-4.1", vec![Message::user("hi")]);
        let (first, usage) = provider.complete(request.clone()).await.unwrap();
        assert_eq!(first.content.as_deref(), Some("First"));
        assert_eq!(usage.prompt_tokens, 10);

        let err = provider.complete(request.clone()).await.unwrap_err();
        assert!(err.is_collaborator_failure());

        let (third, _) = provider.complete(request.clone()).await.unwrap();
        assert_eq!(third.tool_calls[0].name, "transfer_to_faq_agent");

        let (fallback, _) = provider.complete(request).await.unwrap();
        assert_eq!(fallback.content.as_deref(), Some("Default response"));
        assert_eq!(provider.request_count(), 4);
        assert_eq!(provider.remaining(), 0);
    }

    #[tokio::test]
    async fn test_fn_provider_counts_calls() {
        let provider = FnProvider::new(|req: &ModelRequest| {
            Ok(ModelResponse::new_message(format!("{} messages", req.messages.len())))
        });
        let (resp, _) = provider
            .complete(ModelRequest::new("m", vec![Message::user("a"), Message::user("b")]))
            .await
            .unwrap();
        assert_eq!(resp.content.as_deref(), Some("2 messages"));
        assert_eq!(provider.call_count(), 1);
    }

    #[test]
    fn test_classify_text_and_empty() {
        let g = graph();
        let triage = g.require("Triage Agent").unwrap();
        let text = Decision::classify(ModelResponse::new_message("Hello"), triage, &g).unwrap();
        assert_eq!(text, Decision::Text("Hello".into()));

        let empty = Decision::classify(ModelResponse::new_message("  "), triage, &g);
        assert!(matches!(empty, Err(AgentsError::ModelBehaviorError { .. })));
    }

    #[test]
    fn test_classify_tool_calls_and_handoffs() {
        let g = graph();
        let status = g.require("Flight Status Agent").unwrap();

        let tools = Decision::classify(calls(&["flight_status_tool"]), status, &g).unwrap();
        assert!(matches!(tools, Decision::ToolCalls { ref calls, .. } if calls.len() == 1));

        let mixed = Decision::classify(
            calls(&["flight_status_tool", "transfer_to_triage_agent"]),
            status,
            &g,
        )
        .unwrap();
        match mixed {
            Decision::Handoff { chosen, target, calls, .. } => {
                assert_eq!(chosen, 1);
                assert_eq!(target, "Triage Agent");
                assert_eq!(calls.len(), 2);
            }
            other => panic!("expected handoff, got {other:?}"),
        }

        let triage = g.require("Triage Agent").unwrap();
        let first_wins = Decision::classify(
            calls(&["transfer_to_faq_agent", "transfer_to_flight_status_agent"]),
            triage,
            &g,
        )
        .unwrap();
        assert!(matches!(first_wins, Decision::Handoff { ref target, .. } if target == "FAQ Agent"));
    }

    #[test]
    fn test_classify_rejects_unauthorized_calls() {
        let g = graph();
        let faq = g.require("FAQ Agent").unwrap();

        let off_graph = Decision::classify(calls(&["transfer_to_flight_status_agent"]), faq, &g);
        assert!(matches!(
            off_graph,
            Err(AgentsError::OffGraphHandoff { ref from, ref to })
                if from == "FAQ Agent" && to == "Flight Status Agent"
        ));

        let not_owned = Decision::classify(calls(&["flight_status_tool"]), faq, &g);
        assert!(matches!(not_owned, Err(AgentsError::UnknownTool { .. })));

        let invented = Decision::classify(calls(&["transfer_to_ghost_agent"]), faq, &g);
        assert!(matches!(invented, Err(AgentsError::UnknownTool { .. })));
    }
}

//! # Agent (orientation)
//!
//! An `Agent` is one handler in the routing graph: a name, instructions
//! rendered from the session context, the tools it may call, the handoff
//! edges it may take, and the validation-gate checkers that screen each user
//! turn while it is active. Agents are immutable once built and are shared
//! read-only across sessions through the [`RoutingGraph`](crate::graph::RoutingGraph).

use std::sync::Arc;

use crate::context::SessionContext;
use crate::guardrail::InputGuardrail;
use crate::handoff::Handoff;
use crate::items::Message;
use crate::tool::{Tool, ToolSpec};

type InstructionsFn = dyn Fn(&SessionContext) -> String + Send + Sync;

/// Instructions for a handler, either fixed text or a pure function of the
/// session context.
///
/// Dynamic instructions are rendered again every time they are needed and
/// are never cached, since the context may change between renders.
#[derive(Clone)]
pub enum Instructions {
    Static(String),
    Dynamic(Arc<InstructionsFn>),
}

impl Instructions {
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn(&SessionContext) -> String + Send + Sync + 'static,
    {
        Instructions::Dynamic(Arc::new(f))
    }

    pub fn render(&self, ctx: &SessionContext) -> String {
        match self {
            Instructions::Static(text) => text.clone(),
            Instructions::Dynamic(f) => f(ctx),
        }
    }
}

impl From<&str> for Instructions {
    fn from(text: &str) -> Self {
        Instructions::Static(text.to_string())
    }
}

impl From<String> for Instructions {
    fn from(text: String) -> Self {
        Instructions::Static(text)
    }
}

impl std::fmt::Debug for Instructions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instructions::Static(text) => f.debug_tuple("Static").field(text).finish(),
            Instructions::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Defines the complete configuration for an [`Agent`].
#[derive(Clone)]
pub struct AgentConfig {
    /// Unique key of the handler within the routing graph.
    pub name: String,

    /// Shown to peer handlers when they decide where to route.
    pub handoff_description: Option<String>,

    pub instructions: Instructions,

    /// Ordered tool set this handler may invoke.
    pub tools: Vec<Arc<dyn Tool>>,

    /// Outgoing edges of the routing graph.
    pub handoffs: Vec<Handoff>,

    /// Checkers run by the validation gate while this handler is active.
    pub input_guardrails: Vec<Arc<dyn InputGuardrail>>,

    /// Model name passed to the inference collaborator.
    pub model: String,

    pub temperature: Option<f32>,

    pub max_tokens: Option<u32>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "Assistant".to_string(),
            handoff_description: None,
            instructions: Instructions::Static("You are a helpful assistant.".to_string()),
            tools: vec![],
            handoffs: vec![],
            input_guardrails: vec![],
            model: "gpt-4.1".to_string(),
            temperature: None,
            max_tokens: None,
        }
    }
}

/// A handler in the routing graph.
///
/// ```rust
/// use airline_agents::agent::{Agent, Instructions};
/// use airline_agents::context::{ContextField, SessionContext};
/// use airline_agents::handoff::Handoff;
///
/// let agent = Agent::simple("Flight Status Agent", "placeholder")
///     .with_instructions(Instructions::dynamic(|ctx: &SessionContext| {
///         format!("Flight number is {}.", ctx.display(ContextField::FlightNumber))
///     }))
///     .with_handoff(Handoff::new("Triage Agent", "Routes requests."));
///
/// let mut ctx = SessionContext::default();
/// assert_eq!(agent.render_instructions(&ctx), "Flight number is [unknown].");
/// ctx.write(ContextField::FlightNumber, "FLT-404");
/// assert_eq!(agent.render_instructions(&ctx), "Flight number is FLT-404.");
/// assert!(agent.handoff_to("Triage Agent").is_some());
/// ```
#[derive(Clone)]
pub struct Agent {
    pub config: AgentConfig,
}

impl Agent {
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    /// Creates an agent with just a name and fixed instructions.
    pub fn simple(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self::new(AgentConfig {
            name: name.into(),
            instructions: Instructions::Static(instructions.into()),
            ..Default::default()
        })
    }

    pub fn with_instructions(mut self, instructions: Instructions) -> Self {
        self.config.instructions = instructions;
        self
    }

    pub fn with_handoff_description(mut self, description: impl Into<String>) -> Self {
        self.config.handoff_description = Some(description.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.config.tools.push(tool);
        self
    }

    pub fn with_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.config.tools.extend(tools);
        self
    }

    pub fn with_handoff(mut self, handoff: Handoff) -> Self {
        self.config.handoffs.push(handoff);
        self
    }

    pub fn with_handoffs(mut self, handoffs: Vec<Handoff>) -> Self {
        self.config.handoffs.extend(handoffs);
        self
    }

    pub fn with_input_guardrail(mut self, guardrail: Arc<dyn InputGuardrail>) -> Self {
        self.config.input_guardrails.push(guardrail);
        self
    }

    pub fn with_input_guardrails(mut self, guardrails: Vec<Arc<dyn InputGuardrail>>) -> Self {
        self.config.input_guardrails.extend(guardrails);
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn handoff_description(&self) -> Option<&str> {
        self.config.handoff_description.as_deref()
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.config.tools
    }

    pub fn handoffs(&self) -> &[Handoff] {
        &self.config.handoffs
    }

    pub fn input_guardrails(&self) -> &[Arc<dyn InputGuardrail>] {
        &self.config.input_guardrails
    }

    /// Looks up a tool in this handler's own set.
    pub fn tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.config.tools.iter().find(|t| t.name() == name)
    }

    /// The outgoing edge to `target`, if one exists.
    pub fn handoff_to(&self, target: &str) -> Option<&Handoff> {
        self.config.handoffs.iter().find(|h| h.target == target)
    }

    /// The outgoing edge advertised under the function name `tool_name`.
    pub fn handoff_by_tool_name(&self, tool_name: &str) -> Option<&Handoff> {
        self.config
            .handoffs
            .iter()
            .find(|h| h.tool_name() == tool_name)
    }

    pub fn render_instructions(&self, ctx: &SessionContext) -> String {
        self.config.instructions.render(ctx)
    }

    /// Tools followed by handoff edges, as advertised to the model.
    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        self.config
            .tools
            .iter()
            .map(|t| ToolSpec::from_tool(t.as_ref()))
            .chain(self.config.handoffs.iter().map(Handoff::as_tool_spec))
            .collect()
    }

    /// Builds the system message from the instructions rendered against `ctx`.
    pub fn build_system_message(&self, ctx: &SessionContext) -> Message {
        let mut content = self.render_instructions(ctx);

        if !self.config.tools.is_empty() {
            content.push_str("\n\nYou have access to the following tools:\n");
            for tool in &self.config.tools {
                content.push_str(&format!("- {}: {}\n", tool.name(), tool.description()));
            }
        }

        if !self.config.handoffs.is_empty() {
            content.push_str("\n\nYou can hand off to the following agents:\n");
            for handoff in &self.config.handoffs {
                content.push_str(&format!("- {}: {}\n", handoff.target, handoff.description));
            }
        }

        Message::system(content)
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.config.name)
            .field("model", &self.config.model)
            .field("tools_count", &self.config.tools.len())
            .field("handoffs_count", &self.config.handoffs.len())
            .field("guardrails_count", &self.config.input_guardrails.len())
            .finish()
    }
}

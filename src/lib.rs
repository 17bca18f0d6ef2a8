//! # Airline customer-service agents
//!
//! A multi-handler conversational dispatch engine. Each customer message
//! enters a [`Runner`] turn that first passes a concurrent validation gate,
//! then drives the active handler through model calls, tool invocations and
//! handoffs along a validated [`RoutingGraph`] until the handler produces a
//! reply.
//!
//! ## Core Concepts
//!
//! - **Handler** ([`Agent`]): instructions, tools and outgoing handoff edges
//! - **Routing graph**: the only handoffs a handler may take, with optional
//!   hooks that write to the [`SessionContext`] on traversal
//! - **Validation gate**: checkers run concurrently on every user turn; the
//!   first trip blocks the turn
//! - **Session**: per-conversation context, history and active handler
//!
//! ## Getting Started
//!
//! ```rust
//! use airline_agents::{AirlineDesk, DeskConfig, ScriptedProvider};
//! use std::sync::Arc;
//!
//! # async fn example() -> airline_agents::Result<()> {
//! let provider = Arc::new(ScriptedProvider::new().with_message("Hello! How can I help?"));
//! let desk = AirlineDesk::from_config(DeskConfig::default(), provider)?;
//!
//! let reply = desk.respond(None, "hi").await?;
//! println!("[{}] {}", reply.active_handler, reply.response);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod airline;
pub mod config;
pub mod context;
pub mod desk;
pub mod error;
pub mod graph;
pub mod guardrail;
pub mod handoff;
pub mod ids;
pub mod items;
pub mod model;
pub mod retry;
pub mod runner;
pub mod server;
pub mod session;
pub mod tool;
pub mod usage;

pub use agent::{Agent, AgentConfig, Instructions};
pub use config::{ConfigBuilder, DeskConfig, RetryConfig};
pub use context::{ContextField, SessionContext, UNKNOWN_PLACEHOLDER};
pub use desk::{AirlineDesk, DeskReply, ReplyKind};
pub use error::{AgentsError, Result};
pub use graph::{RoutingGraph, RoutingGraphBuilder};
pub use guardrail::{
    is_conversational_filler, CheckerVerdict, GateResult, InputGuardrail, LlmChecker,
    ValidationGate, Verdict,
};
pub use handoff::{handoff_tool_name, Handoff, HandoffHook};
pub use items::{Message, ModelResponse, Role, RunItem, ToolCall};
pub use model::{
    Decision, FnProvider, ModelProvider, ModelRequest, OpenAIProvider, OutputSchema,
    ScriptedProvider,
};
pub use retry::{retry_async, RetryPolicy};
pub use runner::{LoopState, RunConfig, Runner, TurnOutcome, TurnResult};
pub use session::{InMemorySessionStore, Session, SessionHandle, SessionStore};
pub use tool::{FunctionTool, Tool, ToolEffect, ToolRegistry, ToolResult, ToolSpec};
pub use usage::{Usage, UsageStats};

//! # Runner (orientation)
//!
//! The `Runner` drives one user turn through the dispatch loop:
//!
//! ```text
//! Idle(h) --gate allow--> AwaitingModel(h) --text--> Done
//!    |                        |    ^   \--tool call--> ExecutingTool(h, t) --+
//!    +--gate block--> Blocked |    +-------------------------------------------+
//!                             +--handoff--> TransitioningHandoff(h, h') --hook--> AwaitingModel(h')
//! ```
//!
//! The gate runs once, in `Idle`, against the new user turn. Model rounds
//! triggered by tool results are not re-validated since no new user input
//! arrived. Instructions are rendered from the session context at the start
//! of every model round, so a hook's writes are always visible to the
//! handler it hands off to.
//!
//! History and the active handler are committed to the session only when the
//! turn reaches `Done` or `Blocked`. Context writes made by tools and hooks
//! before a fatal error stay in place.

use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, info, instrument, warn};

use crate::config::RetryConfig;
use crate::error::{AgentsError, Result};
use crate::graph::RoutingGraph;
use crate::guardrail::{GateResult, ValidationGate};
use crate::items::{Message, Role, RunItem, ToolCall};
use crate::model::{Decision, ModelProvider, ModelRequest};
use crate::retry::retry_async;
use crate::session::Session;
use crate::usage::UsageStats;

/// Configuration for a single turn.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Maximum model rounds before the turn fails with
    /// [`AgentsError::MaxTurnsExceeded`].
    pub max_turns: usize,

    /// Overrides every handler's model when set.
    pub model: Option<String>,

    /// Overrides every handler's temperature when set.
    pub temperature: Option<f32>,

    /// Backoff for failed model rounds.
    pub retry: RetryConfig,

    /// Assistant reply recorded in history when the gate blocks a turn.
    pub refusal_message: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_turns: 10,
            model: None,
            temperature: None,
            retry: RetryConfig::default(),
            refusal_message: "Sorry, I can only answer questions related to airline travel."
                .to_string(),
        }
    }
}

/// States of the dispatch loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopState {
    Idle { handler: String },
    AwaitingModel { handler: String },
    ExecutingTool { handler: String, tool: String },
    TransitioningHandoff { from: String, to: String },
    Blocked { reason: String, checker: String },
    Done { output: String },
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Blocked { .. } | LoopState::Done { .. })
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopState::Idle { handler } => write!(f, "Idle({handler})"),
            LoopState::AwaitingModel { handler } => write!(f, "AwaitingModel({handler})"),
            LoopState::ExecutingTool { handler, tool } => {
                write!(f, "ExecutingTool({handler}, {tool})")
            }
            LoopState::TransitioningHandoff { from, to } => {
                write!(f, "TransitioningHandoff({from}, {to})")
            }
            LoopState::Blocked { checker, .. } => write!(f, "Blocked({checker})"),
            LoopState::Done { .. } => write!(f, "Done"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Done { output: String },
    Blocked { reason: String, checker: String },
}

/// Everything one turn produced.
#[derive(Debug, Clone)]
pub struct TurnResult {
    pub outcome: TurnOutcome,
    pub items: Vec<RunItem>,
    /// Handler active when the turn ended; the next turn starts here.
    pub active_handler: String,
    pub usage: UsageStats,
    /// Every state the loop passed through, in order.
    pub transitions: Vec<LoopState>,
}

impl TurnResult {
    pub fn is_blocked(&self) -> bool {
        matches!(self.outcome, TurnOutcome::Blocked { .. })
    }

    pub fn final_output(&self) -> Option<&str> {
        match &self.outcome {
            TurnOutcome::Done { output } => Some(output),
            TurnOutcome::Blocked { .. } => None,
        }
    }

    /// Number of handoff hooks that ran during the turn.
    pub fn hooks_run(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item, RunItem::Handoff(h) if h.hook_ran))
            .count()
    }

    /// Outputs of the tools that were called, skipped calls included.
    /// Handoff acknowledgements are not tool outputs.
    pub fn tool_outputs(&self) -> impl Iterator<Item = &crate::items::ToolOutputItem> {
        self.items.iter().filter_map(|item| match item {
            RunItem::ToolOutput(out) => Some(out),
            _ => None,
        })
    }
}

/// Drives turns through the dispatch loop.
pub struct Runner;

impl Runner {
    /// Processes `input` as the next user turn of `session`.
    ///
    /// On success the turn's messages are appended to the session history
    /// and the session's active handler is updated. On error neither is
    /// touched.
    #[instrument(
        name = "turn",
        skip_all,
        fields(session_id = %session.id, handler = %session.active_handler)
    )]
    pub async fn run_turn(
        graph: &RoutingGraph,
        provider: &dyn ModelProvider,
        session: &mut Session,
        input: &str,
        config: &RunConfig,
    ) -> Result<TurnResult> {
        info!("Starting turn");

        let mut turn = TurnState::default();
        let mut current = session.active_handler.clone();
        let mut state = LoopState::Idle {
            handler: current.clone(),
        };

        let outcome = loop {
            debug!(state = %state, "dispatch state");
            turn.transitions.push(state.clone());

            state = match state {
                LoopState::Idle { handler } => {
                    let agent = graph.require(&handler)?;
                    let gate = ValidationGate::evaluate_recording(
                        agent.input_guardrails(),
                        &session.history,
                        input,
                        &mut turn.usage,
                    )
                    .await?;

                    turn.messages.push(Message::user(input));
                    turn.items.push(RunItem::message(&handler, Role::User, input));

                    match gate {
                        GateResult::Allow => LoopState::AwaitingModel { handler },
                        GateResult::Block { reason, checker } => {
                            info!(checker = %checker, "Turn blocked by validation gate");
                            turn.items.push(RunItem::gate_trip(&handler, &checker, &reason));
                            turn.messages.push(Message::assistant(&config.refusal_message));
                            LoopState::Blocked { reason, checker }
                        }
                    }
                }

                LoopState::AwaitingModel { handler } => {
                    turn.rounds += 1;
                    if turn.rounds > config.max_turns {
                        warn!(max_turns = config.max_turns, "Model round limit reached");
                        return Err(AgentsError::MaxTurnsExceeded {
                            max_turns: config.max_turns,
                        });
                    }

                    let agent = graph.require(&handler)?;
                    let model = config
                        .model
                        .clone()
                        .unwrap_or_else(|| agent.config.model.clone());

                    let mut messages = Vec::with_capacity(session.history.len() + turn.messages.len() + 1);
                    messages.push(agent.build_system_message(&session.context));
                    messages.extend(session.history.iter().cloned());
                    messages.extend(turn.messages.iter().cloned());

                    let request = ModelRequest {
                        model: model.clone(),
                        messages,
                        tools: agent.tool_specs(),
                        temperature: config.temperature.or(agent.config.temperature),
                        max_tokens: agent.config.max_tokens,
                        output_schema: None,
                    };

                    debug!(round = turn.rounds, model = %model, "Requesting model decision");
                    let (response, usage) =
                        retry_async("model round", &config.retry, || provider.complete(request.clone()))
                            .await?;
                    turn.usage.record(&model, &handler, usage);

                    let decision = Decision::classify(response, agent, graph).map_err(|e| {
                        warn!(error = %e, "Rejected model decision");
                        e
                    })?;

                    match decision {
                        Decision::Text(output) => {
                            turn.messages.push(Message::assistant(&output));
                            turn.items
                                .push(RunItem::message(&handler, Role::Assistant, &output));
                            LoopState::Done { output }
                        }
                        Decision::ToolCalls { content, calls } => {
                            turn.record_calls(&handler, content, &calls);
                            turn.pending.extend(calls);
                            turn.next_tool_or_model(handler)
                        }
                        Decision::Handoff {
                            content,
                            calls,
                            chosen,
                            target,
                        } => {
                            turn.messages.push(Message::assistant_with_tool_calls(
                                content.unwrap_or_default(),
                                calls.clone(),
                            ));
                            for (index, call) in calls.iter().enumerate() {
                                if index == chosen {
                                    turn.items.push(RunItem::tool_call(&handler, call));
                                    turn.handoff_call = Some(call.clone());
                                } else {
                                    turn.skip(call, &format!("transfer to {target} takes precedence"));
                                }
                            }
                            LoopState::TransitioningHandoff {
                                from: handler,
                                to: target,
                            }
                        }
                    }
                }

                LoopState::ExecutingTool { handler, tool } => {
                    let Some(call) = turn.pending.pop_front() else {
                        return Err(AgentsError::ModelBehaviorError {
                            message: format!("{handler} entered tool execution with nothing pending"),
                        });
                    };
                    // Exposure is per handler; the registry itself is global.
                    if graph.require(&handler)?.tool(&tool).is_none() {
                        return Err(AgentsError::UnknownTool {
                            handler: handler.clone(),
                            tool: tool.clone(),
                        });
                    }

                    debug!(tool = %tool, "Executing tool");
                    match graph
                        .registry()
                        .invoke(&tool, &mut session.context, call.arguments.clone())
                        .await
                    {
                        Ok(result) => {
                            turn.messages.push(Message::tool(&result.output, &call.id));
                            turn.items
                                .push(RunItem::tool_output(&call, &result.output, None));
                            if result.is_final {
                                while let Some(rest) = turn.pending.pop_front() {
                                    turn.skip(&rest, "turn already completed");
                                }
                                LoopState::Done {
                                    output: result.output,
                                }
                            } else {
                                turn.next_tool_or_model(handler)
                            }
                        }
                        Err(e @ AgentsError::ToolExecutionError { .. }) => {
                            warn!(tool = %tool, error = %e, "Tool failed; reporting to model");
                            let reply = format!("Error: {e}");
                            turn.messages.push(Message::tool(&reply, &call.id));
                            turn.items
                                .push(RunItem::tool_output(&call, reply, Some(e.to_string())));
                            turn.next_tool_or_model(handler)
                        }
                        Err(e) => {
                            warn!(tool = %tool, error = %e, "Tool failed fatally");
                            return Err(e);
                        }
                    }
                }

                LoopState::TransitioningHandoff { from, to } => {
                    let edge = graph
                        .edge(&from, &to)
                        .ok_or_else(|| AgentsError::OffGraphHandoff {
                            from: from.clone(),
                            to: to.clone(),
                        })?;
                    let hook_ran = edge.run_hook(&mut session.context);
                    info!(from = %from, to = %to, hook_ran, "Handoff");

                    // The ack pairs the transfer call in history; the handoff item records it.
                    if let Some(call) = turn.handoff_call.take() {
                        let ack = serde_json::json!({ "handoff": to, "ack": true }).to_string();
                        turn.messages.push(Message::tool(ack, &call.id));
                    }
                    turn.items.push(RunItem::handoff(&from, &to, hook_ran));

                    current = to.clone();
                    LoopState::AwaitingModel { handler: to }
                }

                LoopState::Blocked { reason, checker } => {
                    break TurnOutcome::Blocked { reason, checker };
                }

                LoopState::Done { output } => {
                    break TurnOutcome::Done { output };
                }
            };
        };

        session.history.extend(turn.messages);
        session.active_handler = current.clone();
        session.touch();

        info!(active_handler = %current, rounds = turn.rounds, "Turn finished");

        Ok(TurnResult {
            outcome,
            items: turn.items,
            active_handler: current,
            usage: turn.usage,
            transitions: turn.transitions,
        })
    }
}

/// Uncommitted output of the turn in progress.
#[derive(Default)]
struct TurnState {
    messages: Vec<Message>,
    items: Vec<RunItem>,
    pending: VecDeque<ToolCall>,
    handoff_call: Option<ToolCall>,
    usage: UsageStats,
    transitions: Vec<LoopState>,
    rounds: usize,
}

impl TurnState {
    fn record_calls(&mut self, handler: &str, content: Option<String>, calls: &[ToolCall]) {
        self.messages.push(Message::assistant_with_tool_calls(
            content.unwrap_or_default(),
            calls.to_vec(),
        ));
        for call in calls {
            self.items.push(RunItem::tool_call(handler, call));
        }
    }

    /// Answers a call that will not run, keeping every call id paired with a reply.
    fn skip(&mut self, call: &ToolCall, why: &str) {
        let reply = format!("Skipped: {why}");
        self.messages.push(Message::tool(&reply, &call.id));
        self.items
            .push(RunItem::tool_output(call, reply, Some("skipped".to_string())));
    }

    fn next_tool_or_model(&self, handler: String) -> LoopState {
        match self.pending.front() {
            Some(call) => LoopState::ExecutingTool {
                tool: call.name.clone(),
                handler,
            },
            None => LoopState::AwaitingModel { handler },
        }
    }
}

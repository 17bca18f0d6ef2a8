//! # Service desk
//!
//! `AirlineDesk` is the entry point the transport calls once per request.
//! It owns the shared routing graph, the inference provider and the session
//! store, runs the turn, and turns every outcome into text for the customer:
//!
//! | outcome                        | reply                     |
//! |--------------------------------|---------------------------|
//! | `Done`                         | the turn's output         |
//! | `Blocked`                      | refusal message           |
//! | collaborator failure           | apology message           |
//! | protocol or precondition error | internal-error message    |

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::airline::{build_airline_graph, standing_checkers};
use crate::config::DeskConfig;
use crate::error::Result;
use crate::graph::RoutingGraph;
use crate::model::ModelProvider;
use crate::runner::{RunConfig, Runner, TurnOutcome, TurnResult};
use crate::session::{InMemorySessionStore, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    Answer,
    Refusal,
    Apology,
    InternalError,
}

/// What the customer sees for one request.
#[derive(Debug, Clone)]
pub struct DeskReply {
    pub conversation_id: String,
    pub response: String,
    pub kind: ReplyKind,
    /// Handler the next turn of this conversation starts on.
    pub active_handler: String,
    /// Present when the turn completed (answered or blocked).
    pub turn: Option<TurnResult>,
}

pub struct AirlineDesk {
    graph: Arc<RoutingGraph>,
    provider: Arc<dyn ModelProvider>,
    store: Arc<dyn SessionStore>,
    config: DeskConfig,
}

impl AirlineDesk {
    pub fn new(
        graph: Arc<RoutingGraph>,
        provider: Arc<dyn ModelProvider>,
        store: Arc<dyn SessionStore>,
        config: DeskConfig,
    ) -> Self {
        Self {
            graph,
            provider,
            store,
            config,
        }
    }

    /// The airline graph guarded by both standing checkers, with one
    /// provider serving handlers and checkers alike and an in-memory store.
    pub fn from_config(config: DeskConfig, provider: Arc<dyn ModelProvider>) -> Result<Self> {
        let checkers = standing_checkers(
            provider.clone(),
            &config.checker_model,
            config.retry.clone(),
        );
        let graph = build_airline_graph(&config.model, checkers)?;
        Ok(Self::new(
            Arc::new(graph),
            provider,
            Arc::new(InMemorySessionStore::new()),
            config,
        ))
    }

    pub fn graph(&self) -> &RoutingGraph {
        &self.graph
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            max_turns: self.config.max_turns,
            model: None,
            temperature: self.config.temperature,
            retry: self.config.retry.clone(),
            refusal_message: self.config.refusal_message.clone(),
        }
    }

    /// Handles one customer message.
    ///
    /// A missing or unknown `conversation_id` starts a new conversation.
    /// Only session-store failures surface as `Err`; every turn failure is
    /// mapped to a reply.
    pub async fn respond(&self, conversation_id: Option<&str>, message: &str) -> Result<DeskReply> {
        let existing = match conversation_id {
            Some(id) => self.store.get(id).await?,
            None => None,
        };
        let handle = match existing {
            Some(handle) => handle,
            None => {
                if let Some(id) = conversation_id {
                    info!(conversation_id = %id, "Unknown conversation; starting a new one");
                }
                self.store.create(self.graph.entry()).await?
            }
        };

        let mut session = handle.lock().await;
        let turn = Runner::run_turn(
            &self.graph,
            self.provider.as_ref(),
            &mut session,
            message,
            &self.run_config(),
        )
        .await;

        let (response, kind, turn) = match turn {
            Ok(result) => match &result.outcome {
                TurnOutcome::Done { output } => (output.clone(), ReplyKind::Answer, Some(result)),
                TurnOutcome::Blocked { .. } => (
                    self.config.refusal_message.clone(),
                    ReplyKind::Refusal,
                    Some(result),
                ),
            },
            Err(e) if e.is_collaborator_failure() => {
                warn!(error = %e, "Inference collaborator unavailable");
                (self.config.apology_message.clone(), ReplyKind::Apology, None)
            }
            Err(e) => {
                error!(error = %e, "Turn failed");
                (
                    self.config.internal_error_message.clone(),
                    ReplyKind::InternalError,
                    None,
                )
            }
        };

        Ok(DeskReply {
            conversation_id: session.id.clone(),
            response,
            kind,
            active_handler: session.active_handler.clone(),
            turn,
        })
    }

    /// Drops conversations idle for longer than the configured TTL.
    pub async fn purge_expired(&self) -> Result<usize> {
        self.store.purge_expired(self.config.session_ttl).await
    }
}

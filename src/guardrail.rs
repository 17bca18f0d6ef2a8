//! # Validation gate (orientation)
//!
//! Before a handler sees a user turn, every checker bound to that handler
//! judges the turn. Checkers run concurrently and the gate blocks on the
//! first trip it observes; the checkers still in flight are dropped. A trip
//! is not an error: it becomes the `Blocked` outcome of the turn.
//!
//! Checkers judge the latest user turn only. They may be given earlier
//! messages for context, and they never see the session context.

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::config::RetryConfig;
use crate::error::{AgentsError, Result};
use crate::items::{Message, Role};
use crate::model::{ModelProvider, ModelRequest, OutputSchema};
use crate::retry::retry_async;
use crate::usage::{Usage, UsageStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Trip,
}

/// Outcome of one checker on one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckerVerdict {
    pub verdict: Verdict,
    pub reasoning: String,
    /// Model that produced the verdict, when one was called.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub usage: Usage,
}

impl CheckerVerdict {
    fn new(verdict: Verdict, reasoning: impl Into<String>) -> Self {
        Self {
            verdict,
            reasoning: reasoning.into(),
            model: None,
            usage: Usage::empty(),
        }
    }

    pub fn pass(reasoning: impl Into<String>) -> Self {
        Self::new(Verdict::Pass, reasoning)
    }

    pub fn trip(reasoning: impl Into<String>) -> Self {
        Self::new(Verdict::Trip, reasoning)
    }

    /// Attaches the cost of the inference call behind this verdict.
    pub fn with_usage(mut self, model: impl Into<String>, usage: Usage) -> Self {
        self.model = Some(model.into());
        self.usage = usage;
        self
    }

    pub fn is_trip(&self) -> bool {
        self.verdict == Verdict::Trip
    }
}

/// A validation-gate checker.
#[async_trait]
pub trait InputGuardrail: Send + Sync {
    fn name(&self) -> &str;

    /// Judges `turn`. `history` holds the messages before it.
    async fn check(&self, history: &[Message], turn: &str) -> Result<CheckerVerdict>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateResult {
    Allow,
    Block { reason: String, checker: String },
}

impl GateResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateResult::Allow)
    }
}

pub struct ValidationGate;

impl ValidationGate {
    /// Runs every checker concurrently against the same input.
    ///
    /// Returns `Block` as soon as any checker trips and `Allow` once all have
    /// passed. A checker error is returned as soon as it is observed.
    pub async fn evaluate(
        checkers: &[Arc<dyn InputGuardrail>],
        history: &[Message],
        turn: &str,
    ) -> Result<GateResult> {
        Self::evaluate_recording(checkers, history, turn, &mut UsageStats::new()).await
    }

    /// Like [`evaluate`](Self::evaluate), recording the cost of every checker
    /// that finished into `usage` under the checker's name.
    pub async fn evaluate_recording(
        checkers: &[Arc<dyn InputGuardrail>],
        history: &[Message],
        turn: &str,
        usage: &mut UsageStats,
    ) -> Result<GateResult> {
        let mut pending: FuturesUnordered<_> = checkers
            .iter()
            .map(|checker| async move { (checker.name(), checker.check(history, turn).await) })
            .collect();

        while let Some((name, outcome)) = pending.next().await {
            let verdict = outcome?;
            debug!(checker = name, verdict = ?verdict.verdict, "checker finished");
            if let Some(model) = &verdict.model {
                usage.record(model, name, verdict.usage.clone());
            }
            if verdict.is_trip() {
                return Ok(GateResult::Block {
                    reason: verdict.reasoning,
                    checker: name.to_string(),
                });
            }
        }

        Ok(GateResult::Allow)
    }
}

const FILLER: &[&str] = &[
    "hi", "hello", "hey", "hi there", "hello there", "hey there", "good morning",
    "good afternoon", "good evening", "ok", "okay", "k", "ok thanks", "okay thanks",
    "thanks", "thank you", "thank you so much", "thanks a lot", "thx", "ty", "yes", "yeah",
    "yep", "no", "nope", "sure", "cool", "great", "perfect", "got it", "sounds good",
    "alright", "bye", "goodbye", "see you",
];

/// Whether `turn` is pure conversational filler ("hi", "ok", "thanks").
///
/// Only known filler words qualify. A turn with no words at all (symbols,
/// punctuation, an empty string) is not filler and goes to the checkers.
pub fn is_conversational_filler(turn: &str) -> bool {
    let normalized: String = turn
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect::<String>()
        .to_lowercase();
    let normalized = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
    FILLER.contains(&normalized.as_str())
}

/// A checker that asks a model for a structured yes/no judgement.
///
/// The model answers `{"reasoning": "...", "<field>": bool}`; `false` in the
/// verdict field trips the gate. Pure filler passes without a model call.
pub struct LlmChecker {
    name: String,
    instructions: String,
    verdict_field: String,
    model: String,
    provider: Arc<dyn ModelProvider>,
    retry: RetryConfig,
}

impl LlmChecker {
    pub fn new(
        name: impl Into<String>,
        instructions: impl Into<String>,
        verdict_field: impl Into<String>,
        provider: Arc<dyn ModelProvider>,
    ) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            verdict_field: verdict_field.into(),
            model: "gpt-4.1-mini".to_string(),
            provider,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn verdict_field(&self) -> &str {
        &self.verdict_field
    }

    fn output_schema(&self) -> OutputSchema {
        OutputSchema {
            name: format!("{}_output", self.verdict_field),
            schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "reasoning": { "type": "string" },
                    self.verdict_field.as_str(): { "type": "boolean" }
                },
                "required": ["reasoning", self.verdict_field.as_str()],
                "additionalProperties": false
            }),
        }
    }

    fn build_request(&self, history: &[Message], turn: &str) -> ModelRequest {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(self.instructions.clone()));
        messages.extend(
            history
                .iter()
                .filter(|m| matches!(m.role, Role::User | Role::Assistant) && !m.content.is_empty())
                .map(|m| Message {
                    role: m.role,
                    content: m.content.clone(),
                    tool_call_id: None,
                    tool_calls: None,
                }),
        );
        messages.push(Message::user(turn));

        ModelRequest {
            model: self.model.clone(),
            messages,
            output_schema: Some(self.output_schema()),
            ..Default::default()
        }
    }

    fn parse_verdict(&self, content: Option<&str>) -> Result<CheckerVerdict> {
        let raw = content.ok_or_else(|| AgentsError::ModelBehaviorError {
            message: format!("{} returned no verdict", self.name),
        })?;
        let value: serde_json::Value = serde_json::from_str(raw)?;
        let passed = value
            .get(&self.verdict_field)
            .and_then(serde_json::Value::as_bool)
            .ok_or_else(|| AgentsError::ModelBehaviorError {
                message: format!("{} verdict is missing '{}'", self.name, self.verdict_field),
            })?;
        let reasoning = value
            .get("reasoning")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(if passed {
            CheckerVerdict::pass(reasoning)
        } else {
            CheckerVerdict::trip(reasoning)
        })
    }
}

#[async_trait]
impl InputGuardrail for LlmChecker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, history: &[Message], turn: &str) -> Result<CheckerVerdict> {
        if is_conversational_filler(turn) {
            return Ok(CheckerVerdict::pass("conversational filler"));
        }

        let request = self.build_request(history, turn);
        let (response, usage) =
            retry_async(&self.name, &self.retry, || self.provider.complete(request.clone())).await?;

        Ok(self
            .parse_verdict(response.content.as_deref())?
            .with_usage(&self.model, usage))
    }
}

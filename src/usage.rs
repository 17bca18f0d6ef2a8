//! # Token usage tracking
//!
//! [`Usage`] is what a single inference call reports; [`UsageStats`]
//! aggregates it over a turn, broken down by model and by handler so the
//! cost of checker calls and handler rounds can be told apart. Checker calls
//! are keyed by the checker's name in `by_handler`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Add;

/// Token usage for a single inference call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
    /// Number of API requests folded into this value.
    pub request_count: usize,
}

impl Usage {
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            request_count: 1,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn add_usage(&mut self, other: &Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
        self.request_count += other.request_count;
    }
}

impl Add for Usage {
    type Output = Self;

    fn add(mut self, other: Self) -> Self {
        self.add_usage(&other);
        self
    }
}

/// Aggregated usage across one turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageStats {
    pub total: Usage,
    pub by_model: HashMap<String, Usage>,
    pub by_handler: HashMap<String, Usage>,
}

impl UsageStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one call made on behalf of `handler` against `model`.
    pub fn record(&mut self, model: &str, handler: &str, usage: Usage) {
        self.total.add_usage(&usage);
        self.by_model
            .entry(model.to_string())
            .and_modify(|u| u.add_usage(&usage))
            .or_insert_with(|| usage.clone());
        self.by_handler
            .entry(handler.to_string())
            .and_modify(|u| u.add_usage(&usage))
            .or_insert(usage);
    }

    pub fn merge(&mut self, other: UsageStats) {
        self.total.add_usage(&other.total);
        for (model, usage) in other.by_model {
            self.by_model.entry(model).or_default().add_usage(&usage);
        }
        for (handler, usage) in other.by_handler {
            self.by_handler.entry(handler).or_default().add_usage(&usage);
        }
    }
}

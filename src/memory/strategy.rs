//! Retention strategies for the model-facing view of conversation history

use serde::{Deserialize, Serialize};

use crate::domain::{Message, MessageBody};
use crate::token::TokenCounter;

/// How much history reaches the model on each call
///
/// Strategies shape the view handed to the model; the stored log stays
/// complete. A system message at index 0 is pinned and never evicted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RetentionStrategy {
    /// Send everything
    Full,
    /// Keep the last N messages
    SlidingWindow { size: usize },
    /// Keep the most recent messages fitting a token budget
    TokenBudget { max_tokens: u32 },
}

impl Default for RetentionStrategy {
    fn default() -> Self {
        Self::Full
    }
}

impl RetentionStrategy {
    /// Build the model-facing view of a message log.
    ///
    /// Every strategy reduces to choosing where the kept suffix of the
    /// unpinned history begins.
    pub fn apply(&self, log: &[Message], counter: &TokenCounter) -> Vec<Message> {
        let (pinned, history) = split_pinned(log);

        let keep_from = match self {
            RetentionStrategy::Full => 0,
            RetentionStrategy::SlidingWindow { size } => history.len().saturating_sub(*size),
            RetentionStrategy::TokenBudget { max_tokens } => {
                let pinned_cost: u32 = pinned.iter().map(|m| counter.count_message(m)).sum();
                suffix_within_budget(history, max_tokens.saturating_sub(pinned_cost), counter)
            }
        };

        pinned
            .iter()
            .chain(&history[keep_from..])
            .cloned()
            .collect()
    }
}

/// Split off a leading system message; it is never subject to eviction.
fn split_pinned(log: &[Message]) -> (&[Message], &[Message]) {
    match log.first() {
        Some(first) if matches!(first.body, MessageBody::System { .. }) => log.split_at(1),
        _ => log.split_at(0),
    }
}

/// Index where the longest affordable suffix of `history` begins.
fn suffix_within_budget(history: &[Message], budget: u32, counter: &TokenCounter) -> usize {
    let mut remaining = budget;
    let mut start = history.len();
    for (index, message) in history.iter().enumerate().rev() {
        let cost = counter.count_message(message);
        if cost > remaining {
            break;
        }
        remaining -= cost;
        start = index;
    }
    start
}

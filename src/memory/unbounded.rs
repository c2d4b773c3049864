//! Unbounded in-process conversation memory

use std::sync::RwLock;

use super::ConversationMemory;
use crate::domain::Message;
use crate::token::TokenCounter;

/// Append-only message log with no retention limit
///
/// Keeps every message for the lifetime of the run. Long conversations can
/// outgrow a model's context window; pair with a retention strategy when
/// building the LLM view.
pub struct UnboundedMemory {
    messages: RwLock<Vec<Message>>,
    counter: TokenCounter,
}

impl UnboundedMemory {
    /// Create an empty memory
    pub fn new() -> Self {
        Self {
            messages: RwLock::new(Vec::new()),
            counter: TokenCounter::new(),
        }
    }
}

impl Default for UnboundedMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationMemory for UnboundedMemory {
    fn append(&self, message: Message) {
        self.messages.write().unwrap().push(message);
    }

    fn snapshot(&self) -> Vec<Message> {
        self.messages.read().unwrap().clone()
    }

    fn clear(&self) {
        self.messages.write().unwrap().clear();
    }

    fn len(&self) -> usize {
        self.messages.read().unwrap().len()
    }

    fn approx_token_count(&self) -> u32 {
        let messages = self.messages.read().unwrap();
        self.counter.count_messages(&messages)
    }
}

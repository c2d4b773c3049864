//! Conversation memory
//!
//! An ordered, append-only log of messages, owned by one run. Retention
//! strategies shape the view handed to the model without touching the
//! stored log.

mod strategy;
mod unbounded;

pub use strategy::*;
pub use unbounded::UnboundedMemory;

use crate::domain::Message;

/// Trait for conversation memory backends
pub trait ConversationMemory: Send + Sync {
    /// Append a message; messages are immutable once appended
    fn append(&self, message: Message);

    /// Ordered snapshot of the full log
    fn snapshot(&self) -> Vec<Message>;

    /// Drop all messages
    fn clear(&self);

    /// Number of messages in the log
    fn len(&self) -> usize;

    /// Whether the log is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Approximate token count of the whole log
    fn approx_token_count(&self) -> u32;
}

//! Token accounting utilities

mod counter;

pub use counter::TokenCounter;

//! Completion models, prompts, and the completion port.

pub mod client;
pub mod prompts;
pub mod types;

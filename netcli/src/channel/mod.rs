//! Channel layer for prompt detection and command execution.
//!
//! This module turns a raw [`Transport`](crate::transport::Transport) into
//! something that can run one command and return its output, using
//! pattern-based prompt detection and ANSI stripping.

mod buffer;
mod patterns;
mod prompt;

pub use buffer::PatternBuffer;
pub use patterns::compile_prompt_pattern;
pub use prompt::{ChannelConfig, PromptChannel};

//! Raw interactive-shell transport.
//!
//! A [`Transport`] moves opaque text to and from a remote shell. It knows
//! nothing about prompts or commands; [`PromptChannel`](crate::channel::PromptChannel)
//! layers that on top.

pub mod config;
mod ssh;

pub use config::{AuthMethod, HostKeyVerification, SshConfig};
pub use ssh::SshTransport;

use async_trait::async_trait;

use crate::error::Result;

/// Byte-level access to an interactive shell session.
#[async_trait]
pub trait Transport: Send {
    /// Write raw text to the shell.
    async fn send(&mut self, data: &str) -> Result<()>;

    /// Read the next chunk of output. `Ok(None)` means end of stream.
    async fn read(&mut self) -> Result<Option<Vec<u8>>>;

    /// Whether the session is still connected.
    fn is_open(&self) -> bool;

    /// Close the session.
    async fn close(&mut self) -> Result<()>;
}

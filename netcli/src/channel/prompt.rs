//! Prompt-delimited command execution over a raw transport.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, trace};

use super::buffer::PatternBuffer;
use crate::dialect::{Dialect, VendorBehavior};
use crate::error::{ChannelError, CliError, Result};
use crate::transport::Transport;

/// Configuration for prompt channel behavior.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Longest silence tolerated while waiting for the prompt.
    pub read_timeout: Duration,

    /// Search depth for prompt matching.
    pub search_depth: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(120),
            search_depth: 1000,
        }
    }
}

/// Runs one command at a time against an interactive shell.
///
/// Each line of a command is sent separately; output is collected until the
/// dialect's prompt shows up at the end of the buffer, then normalized and
/// checked for failure markers.
pub struct PromptChannel<T> {
    transport: T,
    dialect: Arc<Dialect>,
    behavior: Arc<dyn VendorBehavior>,
    buffer: PatternBuffer,
    config: ChannelConfig,
    /// A prompt is still owed by a command that timed out.
    stale: bool,
}

impl<T: Transport> PromptChannel<T> {
    /// Create a channel over an already connected transport.
    pub fn new(transport: T, dialect: Arc<Dialect>, config: ChannelConfig) -> Self {
        Self {
            behavior: dialect.behavior(),
            buffer: PatternBuffer::new(config.search_depth),
            transport,
            dialect,
            config,
            stale: false,
        }
    }

    /// Wait for the initial prompt and run the dialect's on_open commands.
    pub async fn open(&mut self) -> Result<()> {
        self.read_until_prompt().await?;
        for command in self.dialect.on_open_commands.clone() {
            self.execute(&command).await?;
        }
        debug!("{} channel ready", self.dialect.name);
        Ok(())
    }

    /// Execute a (possibly multi-line) command and return its normalized output.
    ///
    /// After a read timeout the device may still answer the abandoned
    /// command. That late output is drained up to its prompt before the next
    /// command is sent; if no prompt shows up within `read_timeout` the next
    /// command fails without being sent.
    pub async fn execute(&mut self, command: &str) -> Result<String> {
        let start = Instant::now();
        if self.stale {
            self.resync().await?;
        }
        let lines: Vec<&str> = if command.is_empty() {
            vec![""]
        } else {
            command.lines().collect()
        };

        let mut outputs = Vec::with_capacity(lines.len());
        for line in lines {
            self.buffer.clear();
            self.send_line(line).await?;

            let raw = self.read_until_prompt().await?;
            let output = self.behavior.normalize_output(&raw, line);

            let failure = self
                .dialect
                .failure_in(&output)
                .or_else(|| self.behavior.detect_failure(&output));
            if let Some(message) = failure {
                debug!("command {:?} failed: {}", line, message);
                return Err(CliError::CommandFailed {
                    command: command.to_string(),
                    message,
                }
                .into());
            }

            if !output.is_empty() {
                outputs.push(output);
            }
        }

        trace!("command {:?} completed in {:?}", command, start.elapsed());
        Ok(outputs.join("\n"))
    }

    async fn resync(&mut self) -> Result<()> {
        debug!("{}: draining output of a timed out command", self.dialect.name);
        let discarded = self.read_until_prompt().await?;
        trace!("discarded {} bytes of late output", discarded.len());
        self.stale = false;
        Ok(())
    }

    async fn send_line(&mut self, line: &str) -> Result<()> {
        let data = format!("{}\n", line);
        match self.transport.send(&data).await {
            Ok(()) => Ok(()),
            Err(_) if !self.transport.is_open() => Err(CliError::Disconnected.into()),
            Err(e) => Err(e),
        }
    }

    /// Read until the prompt matches the buffer tail; returns output before the prompt.
    async fn read_until_prompt(&mut self) -> Result<String> {
        loop {
            if let Some(output) = self.buffer.take_before(&self.dialect.prompt) {
                return Ok(String::from_utf8_lossy(&output).into_owned());
            }

            match tokio::time::timeout(self.config.read_timeout, self.transport.read()).await {
                Err(_) => {
                    self.stale = true;
                    return Err(ChannelError::PatternTimeout(self.config.read_timeout).into());
                }
                Ok(Ok(Some(chunk))) => self.buffer.extend(&chunk),
                Ok(Ok(None)) => return Err(CliError::Disconnected.into()),
                Ok(Err(_)) if !self.transport.is_open() => {
                    return Err(CliError::Disconnected.into());
                }
                Ok(Err(e)) => return Err(e),
            }
        }
    }

    /// Whether the underlying transport is still connected.
    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    /// The dialect this channel speaks.
    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// Close the underlying transport.
    pub async fn close(&mut self) -> Result<()> {
        self.transport.close().await
    }
}

//! Resilient command execution.
//!
//! A session's commands flow through a chain of layers, each owning the one
//! it wraps:
//!
//! ```text
//! ReadCachingCli (optional)
//!   -> TreeCacheCli      answers section reads from a parsed dump
//!     -> TimeoutCli      per-command deadline, shutdown gate
//!       -> KeepaliveCli  idle heartbeats
//!         -> QueuedCli   one command at a time, FIFO
//!           -> PromptChannel -> Transport
//! ```
//!
//! [`SessionBuilder`] assembles the chain; [`Session::close`] tears it down
//! outermost first.

mod builder;
mod command;
mod config;
mod inflight;
mod keepalive;
mod queue;
mod read_cache;
mod session;
mod timeout;
mod tree_cache;

pub use builder::SessionBuilder;
pub use command::{Command, CommandKind};
pub use config::StackConfig;
pub use inflight::{InFlight, InFlightGuard};
pub use keepalive::KeepaliveCli;
pub use queue::QueuedCli;
pub use read_cache::{ReadCache, ReadCachingCli};
pub use session::Session;
pub use timeout::TimeoutCli;
pub use tree_cache::{TreeCache, TreeCacheCli};

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// One layer of the command execution stack.
#[async_trait]
pub trait Cli: Send + Sync {
    /// Run a command that does not change device state.
    async fn execute_read(&self, command: Command) -> Result<String>;

    /// Run a command that changes device state.
    async fn execute_write(&self, command: Command) -> Result<String>;

    /// Dispatch on the command kind.
    async fn execute(&self, command: Command) -> Result<String> {
        if command.is_write() {
            self.execute_write(command).await
        } else {
            self.execute_read(command).await
        }
    }

    /// Tear down this layer and the layers it wraps.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<C: Cli + ?Sized> Cli for Arc<C> {
    async fn execute_read(&self, command: Command) -> Result<String> {
        (**self).execute_read(command).await
    }

    async fn execute_write(&self, command: Command) -> Result<String> {
        (**self).execute_write(command).await
    }

    async fn close(&self) -> Result<()> {
        (**self).close().await
    }
}

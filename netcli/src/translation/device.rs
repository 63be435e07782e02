//! What readers and writers get to talk to the device.

use std::sync::Arc;

use futures_util::future::join_all;
use tokio::runtime::Handle;

use crate::cli::{Cli, Command};
use crate::error::Result;

/// Handle given to translation handlers.
///
/// Cheap to clone; every clone talks to the same session stack.
#[derive(Clone)]
pub struct DeviceAccess {
    id: Arc<str>,
    cli: Arc<dyn Cli>,
    executor: Handle,
}

impl DeviceAccess {
    pub fn new(id: impl Into<String>, cli: Arc<dyn Cli>, executor: Handle) -> Self {
        Self {
            id: Arc::from(id.into()),
            cli,
            executor,
        }
    }

    /// Device identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The session's command stack.
    pub fn cli(&self) -> &Arc<dyn Cli> {
        &self.cli
    }

    /// Runtime for scheduling work on behalf of this device.
    pub fn executor(&self) -> &Handle {
        &self.executor
    }

    pub async fn read(&self, command: &str) -> Result<String> {
        self.cli.execute_read(Command::read(command)).await
    }

    pub async fn write(&self, command: &str) -> Result<String> {
        self.cli.execute_write(Command::write(command)).await
    }

    /// Submit several reads at once; outputs come back in argument order.
    pub async fn read_many(&self, commands: &[&str]) -> Result<Vec<String>> {
        join_all(commands.iter().map(|command| self.read(command)))
            .await
            .into_iter()
            .collect()
    }
}

impl std::fmt::Debug for DeviceAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceAccess").field("id", &self.id).finish()
    }
}

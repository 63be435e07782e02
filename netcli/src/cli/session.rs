//! One device's live connection and its command stack.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};
use tokio::runtime::Handle;

use super::{
    Cli, Command, KeepaliveCli, QueuedCli, ReadCache, ReadCachingCli, StackConfig, TimeoutCli,
    TreeCache, TreeCacheCli,
};
use crate::channel::PromptChannel;
use crate::dialect::Dialect;
use crate::error::Result;
use crate::translation::DeviceAccess;
use crate::transport::Transport;

/// A connected device session.
///
/// Owns the transport (inside the queue worker) and every layer wrapping
/// it. Call [`close`](Self::close) to tear it down: new commands are
/// rejected, heartbeats stop, in-flight commands get a bounded grace period
/// and the transport is released last.
pub struct Session {
    id: String,
    dialect: Arc<Dialect>,
    cli: Arc<dyn Cli>,
    tree_cache: Option<Arc<TreeCache>>,
    read_cache: Option<Arc<ReadCache>>,
    executor: Handle,
    closed: AtomicBool,
}

impl Session {
    /// Assemble the stack around an opened channel.
    pub(crate) fn assemble<T: Transport + 'static>(
        id: String,
        channel: PromptChannel<T>,
        dialect: Arc<Dialect>,
        config: &StackConfig,
        executor: Handle,
    ) -> Self {
        let queue = QueuedCli::spawn(id.clone(), channel, config.teardown_timeout);
        let keepalive = KeepaliveCli::new(queue, dialect.heartbeat_command.clone(), config);
        let timeout = TimeoutCli::new(keepalive, executor.clone(), config);

        let tree_cache = dialect
            .sections
            .clone()
            .map(|grammar| Arc::new(TreeCache::new(grammar)));
        let mut cli: Arc<dyn Cli> = match &tree_cache {
            Some(cache) => Arc::new(TreeCacheCli::new(timeout, Arc::clone(cache))),
            None => Arc::new(timeout),
        };

        let read_cache = config
            .read_cache_capacity
            .map(|capacity| Arc::new(ReadCache::new(capacity)));
        if let Some(cache) = &read_cache {
            cli = Arc::new(ReadCachingCli::new(cli, Arc::clone(cache)));
        }

        info!("{}: session ready ({})", id, dialect.name);
        Self {
            id,
            dialect,
            cli,
            tree_cache,
            read_cache,
            executor,
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// The outermost layer of the stack.
    pub fn cli(&self) -> Arc<dyn Cli> {
        Arc::clone(&self.cli)
    }

    /// Runtime used for command workers.
    pub fn executor(&self) -> &Handle {
        &self.executor
    }

    /// Run a command through the full stack.
    pub async fn execute(&self, command: Command) -> Result<String> {
        self.cli.execute(command).await
    }

    /// Run a read command.
    pub async fn read(&self, command: &str) -> Result<String> {
        self.cli.execute_read(Command::read(command)).await
    }

    /// Run a write command.
    pub async fn write(&self, command: &str) -> Result<String> {
        self.cli.execute_write(Command::write(command)).await
    }

    pub fn tree_cache(&self) -> Option<&Arc<TreeCache>> {
        self.tree_cache.as_ref()
    }

    pub fn read_cache(&self) -> Option<&Arc<ReadCache>> {
        self.read_cache.as_ref()
    }

    /// Invalidate every cache; the next reads hit the device.
    pub fn clear_caches(&self) {
        if let Some(cache) = &self.tree_cache {
            cache.clear();
        }
        if let Some(cache) = &self.read_cache {
            cache.clear();
        }
    }

    /// Handle passed to translation readers and writers.
    pub fn device_access(&self) -> DeviceAccess {
        DeviceAccess::new(self.id.clone(), self.cli(), self.executor.clone())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Tear the session down. Calling it again is a no-op.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!("{}: closing session", self.id);
        self.cli.close().await
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.is_closed() {
            warn!("Session {} dropped without explicit close", self.id);
        }
    }
}

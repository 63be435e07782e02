//! Per-command deadlines and the shutdown gate.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;

use super::{Cli, Command, CommandKind, InFlight, StackConfig};
use crate::error::{CliError, Result};

/// Enforces a deadline on every command.
///
/// Each call runs as its own task on the worker runtime, gated by a
/// semaphore, so a stuck transport never blocks the caller past the
/// deadline. An expired call is abandoned rather than cancelled: it keeps
/// its in-flight slot until it finishes and `close` waits for it.
pub struct TimeoutCli<C> {
    inner: Arc<C>,
    timeout: Duration,
    executor: Handle,
    permits: Arc<Semaphore>,
    inflight: InFlight,
    shutdown: AtomicBool,
    teardown_timeout: Duration,
}

impl<C: Cli + 'static> TimeoutCli<C> {
    pub fn new(inner: C, executor: Handle, config: &StackConfig) -> Self {
        Self {
            inner: Arc::new(inner),
            timeout: config.command_timeout,
            executor,
            permits: Arc::new(Semaphore::new(config.worker_concurrency)),
            inflight: InFlight::new(),
            shutdown: AtomicBool::new(false),
            teardown_timeout: config.teardown_timeout,
        }
    }

    /// Whether `close` has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Operations still running, including abandoned ones.
    pub fn in_flight(&self) -> usize {
        self.inflight.count()
    }

    async fn run(&self, command: Command) -> Result<String> {
        if self.is_shutting_down() {
            return Err(CliError::ShuttingDown.into());
        }

        let guard = self.inflight.enter();
        let inner = Arc::clone(&self.inner);
        let permits = Arc::clone(&self.permits);
        let raw = command.raw().to_string();

        let task = self.executor.spawn(async move {
            let _guard = guard;
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|_| CliError::ShuttingDown)?;
            match command.kind() {
                CommandKind::Read => inner.execute_read(command).await,
                CommandKind::Write => inner.execute_write(command).await,
            }
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(CliError::WorkerFailed(e.to_string()).into()),
            Err(_) => {
                debug!("command {:?} abandoned after {:?}", raw, self.timeout);
                Err(CliError::CommandTimeout {
                    command: raw,
                    timeout: self.timeout,
                }
                .into())
            }
        }
    }
}

#[async_trait]
impl<C: Cli + 'static> Cli for TimeoutCli<C> {
    async fn execute_read(&self, command: Command) -> Result<String> {
        self.run(command).await
    }

    async fn execute_write(&self, command: Command) -> Result<String> {
        self.run(command).await
    }

    async fn close(&self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);

        if !self.inflight.wait_idle(self.teardown_timeout).await {
            warn!(
                "{} commands still in flight after {:?}, closing anyway",
                self.inflight.count(),
                self.teardown_timeout
            );
        }

        self.inner.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::testing::ScriptedCli;

    fn config() -> StackConfig {
        StackConfig {
            command_timeout: Duration::from_secs(5),
            teardown_timeout: Duration::from_secs(20),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_passes_result_through() {
        let inner = Arc::new(ScriptedCli::new().respond("show version", "1.0"));
        let cli = TimeoutCli::new(Arc::clone(&inner), Handle::current(), &config());

        let out = cli.execute_read(Command::read("show version")).await.unwrap();
        assert_eq!(out, "1.0");
        assert_eq!(cli.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires() {
        let inner = Arc::new(ScriptedCli::new().with_delay(Duration::from_secs(10)));
        let cli = TimeoutCli::new(Arc::clone(&inner), Handle::current(), &config());

        let err = cli.execute_read(Command::read("show tech")).await.unwrap_err();
        match err {
            Error::Cli(CliError::CommandTimeout { command, timeout }) => {
                assert_eq!(command, "show tech");
                assert_eq!(timeout, Duration::from_secs(5));
            }
            other => panic!("unexpected error: {other}"),
        }
        // abandoned, not cancelled
        assert_eq!(cli.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_shutting_down_never_reaches_inner() {
        let inner = Arc::new(ScriptedCli::new());
        let cli = TimeoutCli::new(Arc::clone(&inner), Handle::current(), &config());

        cli.close().await.unwrap();
        let err = cli.execute_write(Command::write("reload")).await.unwrap_err();
        assert!(matches!(err, Error::Cli(CliError::ShuttingDown)));
        assert!(inner.calls().is_empty());
        assert!(inner.was_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_waits_for_abandoned_work() {
        let inner = Arc::new(ScriptedCli::new().with_delay(Duration::from_secs(10)));
        let cli = TimeoutCli::new(Arc::clone(&inner), Handle::current(), &config());

        let _ = cli.execute_read(Command::read("show tech")).await;
        let started = tokio::time::Instant::now();
        cli.close().await.unwrap();

        assert_eq!(cli.in_flight(), 0);
        assert_eq!(started.elapsed(), Duration::from_secs(5));
        assert!(inner.was_closed());
    }
}

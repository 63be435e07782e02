//! Idle heartbeats that detect silently dropped sessions.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, trace, warn};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::{Cli, Command, StackConfig};
use crate::error::Result;

/// Last time a command went through the layer.
#[derive(Debug)]
struct Activity {
    start: Instant,
    last_ms: AtomicU64,
}

impl Activity {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            last_ms: AtomicU64::new(0),
        }
    }

    fn touch(&self) {
        let ms = self.start.elapsed().as_millis() as u64;
        self.last_ms.fetch_max(ms, Ordering::SeqCst);
    }

    fn idle(&self) -> Duration {
        let last = Duration::from_millis(self.last_ms.load(Ordering::SeqCst));
        self.start.elapsed().saturating_sub(last)
    }
}

#[derive(Debug, Clone)]
struct Heartbeat {
    command: String,
    interval: Duration,
    timeout: Duration,
    backoff: Duration,
}

/// Sends the dialect's heartbeat command whenever the session sits idle.
///
/// A single background task runs the heartbeats, so they never overlap.
/// Failures are logged and followed by a longer backoff; callers of
/// `execute_read`/`execute_write` never see them.
pub struct KeepaliveCli<C> {
    inner: Arc<C>,
    activity: Arc<Activity>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
    teardown_timeout: Duration,
}

impl<C: Cli + 'static> KeepaliveCli<C> {
    /// Wrap `inner` and start the heartbeat task on the current runtime.
    pub fn new(inner: C, heartbeat_command: impl Into<String>, config: &StackConfig) -> Self {
        let inner = Arc::new(inner);
        let activity = Arc::new(Activity::new());
        let (shutdown, shutdown_rx) = watch::channel(false);

        let heartbeat = Heartbeat {
            command: heartbeat_command.into(),
            interval: config.heartbeat_interval,
            timeout: config.heartbeat_timeout,
            backoff: config.backoff_interval,
        };
        let task = tokio::spawn(heartbeat_loop(
            Arc::clone(&inner),
            Arc::clone(&activity),
            heartbeat,
            shutdown_rx,
        ));

        Self {
            inner,
            activity,
            shutdown,
            task: Mutex::new(Some(task)),
            teardown_timeout: config.teardown_timeout,
        }
    }

    /// The wrapped layer.
    pub fn inner(&self) -> &C {
        &self.inner
    }
}

async fn heartbeat_loop<C: Cli>(
    inner: Arc<C>,
    activity: Arc<Activity>,
    heartbeat: Heartbeat,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        let idle = activity.idle();
        let pause = if idle >= heartbeat.interval {
            let ping = Command::read(heartbeat.command.clone()).skip_cache();
            let result = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                result = tokio::time::timeout(heartbeat.timeout, inner.execute_read(ping)) => result,
            };

            match result {
                Ok(Ok(_)) => {
                    trace!("heartbeat ok");
                    heartbeat.interval
                }
                Ok(Err(e)) => {
                    warn!("heartbeat failed: {}", e);
                    heartbeat.backoff
                }
                Err(_) => {
                    warn!("heartbeat timed out after {:?}", heartbeat.timeout);
                    heartbeat.backoff
                }
            }
        } else {
            heartbeat.interval - idle
        };

        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(pause) => {}
        }
    }
    debug!("heartbeat task stopped");
}

#[async_trait]
impl<C: Cli + 'static> Cli for KeepaliveCli<C> {
    async fn execute_read(&self, command: Command) -> Result<String> {
        self.activity.touch();
        let result = self.inner.execute_read(command).await;
        self.activity.touch();
        result
    }

    async fn execute_write(&self, command: Command) -> Result<String> {
        self.activity.touch();
        let result = self.inner.execute_write(command).await;
        self.activity.touch();
        result
    }

    async fn close(&self) -> Result<()> {
        let _ = self.shutdown.send(true);

        let task = self.task.lock().await.take();
        if let Some(mut task) = task {
            if tokio::time::timeout(self.teardown_timeout, &mut task)
                .await
                .is_err()
            {
                warn!("heartbeat task did not stop within {:?}", self.teardown_timeout);
                task.abort();
            }
        }

        self.inner.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedCli;
    use tokio::time::sleep;

    fn config() -> StackConfig {
        StackConfig {
            heartbeat_interval: Duration::from_secs(10),
            heartbeat_timeout: Duration::from_secs(2),
            backoff_interval: Duration::from_secs(30),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeats_while_idle() {
        let inner = Arc::new(ScriptedCli::new());
        let cli = KeepaliveCli::new(Arc::clone(&inner), "", &config());

        sleep(Duration::from_secs(35)).await;
        assert_eq!(inner.count(""), 3);
        cli.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_postpones_heartbeat() {
        let inner = Arc::new(ScriptedCli::new().respond("show clock", "12:00"));
        let cli = KeepaliveCli::new(Arc::clone(&inner), "", &config());

        sleep(Duration::from_secs(5)).await;
        cli.execute_read(Command::read("show clock")).await.unwrap();

        sleep(Duration::from_secs(7)).await;
        assert_eq!(inner.count(""), 0);

        sleep(Duration::from_secs(4)).await;
        assert_eq!(inner.count(""), 1);
        cli.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_backs_off() {
        let inner = Arc::new(ScriptedCli::new().fail_on(""));
        let cli = KeepaliveCli::new(Arc::clone(&inner), "", &config());

        sleep(Duration::from_secs(35)).await;
        assert_eq!(inner.count(""), 1);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(inner.count(""), 2);

        // heartbeat failures never reach callers
        assert!(cli.execute_read(Command::read("show clock")).await.is_ok());
        cli.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_heartbeat_times_out() {
        let inner = Arc::new(ScriptedCli::new().with_delay(Duration::from_secs(5)));
        let cli = KeepaliveCli::new(Arc::clone(&inner), "", &config());

        // heartbeat at 10s gives up at 12s, next attempt at 42s
        sleep(Duration::from_secs(40)).await;
        assert_eq!(inner.count(""), 1);
        sleep(Duration::from_secs(5)).await;
        assert_eq!(inner.count(""), 2);
        cli.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_stops_heartbeats_and_closes_inner() {
        let inner = Arc::new(ScriptedCli::new());
        let cli = KeepaliveCli::new(Arc::clone(&inner), "", &config());

        cli.close().await.unwrap();
        assert!(inner.was_closed());

        sleep(Duration::from_secs(60)).await;
        assert_eq!(inner.count(""), 0);
    }
}

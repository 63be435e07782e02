//! Strictly ordered command queue in front of a prompt channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use tokio::task::JoinHandle;

use super::{Cli, Command};
use crate::channel::PromptChannel;
use crate::error::{CliError, Result};
use crate::transport::Transport;

struct Job {
    command: Command,
    respond: oneshot::Sender<Result<String>>,
}

/// Serializes every command of one session onto a single worker task.
///
/// The worker owns the channel, so transport I/O of two commands can never
/// interleave. Commands run in submission order. Once the transport is lost
/// the running command fails with `Disconnected`, everything already queued
/// is flushed with the same error and later submissions fail without
/// touching the transport.
///
/// Closing lets the running command finish within `teardown_timeout`;
/// commands that have not started yet fail with `ShuttingDown`.
pub struct QueuedCli {
    id: String,
    jobs: RwLock<Option<mpsc::UnboundedSender<Job>>>,
    alive: Arc<AtomicBool>,
    closing: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    teardown_timeout: Duration,
}

impl QueuedCli {
    /// Spawn the worker on the current runtime. The channel must already be open.
    pub fn spawn<T: Transport + 'static>(
        id: impl Into<String>,
        channel: PromptChannel<T>,
        teardown_timeout: Duration,
    ) -> Self {
        let id = id.into();
        let alive = Arc::new(AtomicBool::new(channel.is_open()));
        let closing = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::unbounded_channel();

        let worker = tokio::spawn(run_worker(
            id.clone(),
            channel,
            rx,
            Arc::clone(&alive),
            Arc::clone(&closing),
        ));

        Self {
            id,
            jobs: RwLock::new(Some(tx)),
            alive,
            closing,
            worker: Mutex::new(Some(worker)),
            teardown_timeout,
        }
    }

    /// Whether the transport is still believed to be connected.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn submit(&self, command: Command) -> Result<String> {
        if !self.is_alive() {
            return Err(CliError::Disconnected.into());
        }

        let (tx, rx) = oneshot::channel();
        {
            let jobs = self.jobs.read().await;
            let sender = jobs.as_ref().ok_or(CliError::ShuttingDown)?;
            sender
                .send(Job {
                    command,
                    respond: tx,
                })
                .map_err(|_| CliError::Disconnected)?;
        }

        rx.await.map_err(|_| {
            if self.closing.load(Ordering::SeqCst) {
                CliError::ShuttingDown
            } else {
                CliError::WorkerFailed(format!("{}: queue worker dropped the command", self.id))
            }
        })?
    }
}

async fn run_worker<T: Transport>(
    id: String,
    mut channel: PromptChannel<T>,
    mut rx: mpsc::UnboundedReceiver<Job>,
    alive: Arc<AtomicBool>,
    closing: Arc<AtomicBool>,
) {
    while let Some(job) = rx.recv().await {
        if !alive.load(Ordering::SeqCst) {
            let _ = job.respond.send(Err(CliError::Disconnected.into()));
            continue;
        }
        if closing.load(Ordering::SeqCst) {
            let _ = job.respond.send(Err(CliError::ShuttingDown.into()));
            continue;
        }

        debug!("{}: executing {:?}", id, job.command.raw());
        let result = channel.execute(job.command.raw()).await;

        let lost = matches!(&result, Err(e) if e.is_disconnected()) || !channel.is_open();
        let _ = job.respond.send(result);

        if lost {
            alive.store(false, Ordering::SeqCst);
            warn!("{}: transport disconnected", id);

            let mut flushed = 0;
            while let Ok(job) = rx.try_recv() {
                let _ = job.respond.send(Err(CliError::Disconnected.into()));
                flushed += 1;
            }
            if flushed > 0 {
                debug!("{}: flushed {} queued commands", id, flushed);
            }
        }
    }

    alive.store(false, Ordering::SeqCst);
    if let Err(e) = channel.close().await {
        debug!("{}: error closing transport: {}", id, e);
    }
    info!("{}: queue worker stopped", id);
}

#[async_trait]
impl Cli for QueuedCli {
    async fn execute_read(&self, command: Command) -> Result<String> {
        self.submit(command).await
    }

    async fn execute_write(&self, command: Command) -> Result<String> {
        self.submit(command).await
    }

    /// Stop intake, let the running command finish, then close the transport.
    async fn close(&self) -> Result<()> {
        self.closing.store(true, Ordering::SeqCst);
        self.jobs.write().await.take();

        let worker = self.worker.lock().await.take();
        if let Some(mut worker) = worker {
            match tokio::time::timeout(self.teardown_timeout, &mut worker).await {
                Ok(joined) => joined.map_err(|e| CliError::WorkerFailed(e.to_string()))?,
                Err(_) => {
                    warn!(
                        "{}: queue worker did not stop within {:?}, aborting",
                        self.id, self.teardown_timeout
                    );
                    worker.abort();
                    self.alive.store(false, Ordering::SeqCst);
                }
            }
        }
        Ok(())
    }
}

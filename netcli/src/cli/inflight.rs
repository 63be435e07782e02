//! Outstanding-operation tracking for bounded, event-driven teardown.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct State {
    count: AtomicUsize,
    idle: Notify,
}

/// Counts operations that are still running against a session.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    state: Arc<State>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation. It stays counted until the guard is dropped.
    pub fn enter(&self) -> InFlightGuard {
        self.state.count.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            state: Arc::clone(&self.state),
        }
    }

    /// Number of operations currently in flight.
    pub fn count(&self) -> usize {
        self.state.count.load(Ordering::SeqCst)
    }

    /// Wait until nothing is in flight. Returns `false` if `bound` elapsed first.
    pub async fn wait_idle(&self, bound: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.state.idle.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                if self.count() == 0 {
                    return;
                }
                notified.await;
            }
        };

        tokio::time::timeout(bound, wait).await.is_ok()
    }
}

/// Keeps one operation counted while alive.
#[derive(Debug)]
pub struct InFlightGuard {
    state: Arc<State>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.state.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.state.idle.notify_waiters();
        }
    }
}

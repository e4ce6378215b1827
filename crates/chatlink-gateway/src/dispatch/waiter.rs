//! One-shot waiters
//!
//! A waiter parks a caller until a dispatched event satisfies its predicate.
//! Each dispatch resolves at most one waiter, the oldest one that matches.

use super::predicate::Predicate;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;

/// Why a wait ended without an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WaitError {
    #[error("No matching event within {0:?}")]
    Timeout(Duration),

    /// The client shut down while waiting
    #[error("Wait cancelled")]
    Cancelled,
}

struct Waiter {
    id: u64,
    event: String,
    predicate: Predicate,
    tx: oneshot::Sender<Arc<Value>>,
}

/// Pending waiters, oldest first
#[derive(Default)]
pub(crate) struct Waiters {
    pending: Mutex<Vec<Waiter>>,
    next_id: AtomicU64,
}

impl Waiters {
    /// Wait for an event named `event` whose payload satisfies `predicate`
    pub(crate) async fn wait_for(
        &self,
        event: &str,
        predicate: Predicate,
        timeout: Duration,
    ) -> Result<Arc<Value>, WaitError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().push(Waiter {
            id,
            event: event.to_string(),
            predicate,
            tx,
        });

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(data)) => Ok(data),
            Ok(Err(_)) => Err(WaitError::Cancelled),
            Err(_) => {
                self.remove(id);
                Err(WaitError::Timeout(timeout))
            }
        }
    }

    fn remove(&self, id: u64) {
        self.pending.lock().retain(|w| w.id != id);
    }

    /// Hand `data` to the oldest live waiter that matches; drop abandoned ones
    ///
    /// Returns whether a waiter was resolved.
    pub(crate) fn resolve(&self, names: &[String], data: &Arc<Value>) -> bool {
        let mut pending = self.pending.lock();
        pending.retain(|w| !w.tx.is_closed());

        let mut index = 0;
        while index < pending.len() {
            let waiter = &pending[index];
            let matches = names.iter().any(|n| *n == waiter.event)
                && std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| (waiter.predicate)(data)))
                    .unwrap_or(false);

            if matches {
                let waiter = pending.remove(index);
                if waiter.tx.send(Arc::clone(data)).is_ok() {
                    return true;
                }
                // Receiver dropped between the prune and now
                continue;
            }
            index += 1;
        }
        false
    }

    /// Fail every pending wait with `Cancelled`
    pub(crate) fn cancel_all(&self) {
        self.pending.lock().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

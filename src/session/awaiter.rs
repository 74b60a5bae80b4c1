use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::warn;

enum Slot {
    /// No waiter and no value yet
    Empty,
    /// A `wait` call is suspended on this sender
    Waiting(oneshot::Sender<Option<String>>),
    /// Resolved before anyone waited; the value is retained for the waiter
    Resolved(Option<String>),
    /// Resolution already consumed; further resolves are no-ops
    Done,
}

/// Single-slot completion primitive bridging the event-driven recognition
/// callback into a bounded asynchronous wait.
///
/// Resolves exactly once: a second resolution attempt is a safe no-op, never
/// a double-delivery. At most one `wait` may be outstanding at a time.
#[derive(Clone)]
pub struct FinalResultAwaiter {
    slot: Arc<Mutex<Slot>>,
}

impl Default for FinalResultAwaiter {
    fn default() -> Self {
        Self::new()
    }
}

impl FinalResultAwaiter {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::Empty)),
        }
    }

    /// Resolve the awaiter with a transcript (or `None` for cancellation,
    /// error, or silence). Only the first resolution takes effect.
    pub fn resolve(&self, result: Option<String>) {
        let mut slot = self.lock();
        match std::mem::replace(&mut *slot, Slot::Done) {
            Slot::Empty => *slot = Slot::Resolved(result),
            Slot::Waiting(tx) => {
                // Receiver may already be gone if the wait timed out.
                let _ = tx.send(result);
            }
            Slot::Resolved(first) => *slot = Slot::Resolved(first),
            Slot::Done => {}
        }
    }

    /// Wait for the resolution, bounded by `timeout`. Returns the transcript,
    /// or `None` if the awaiter resolved empty or the timeout elapsed first.
    pub async fn wait(&self, timeout: Duration) -> Option<String> {
        let rx = {
            let mut slot = self.lock();
            match std::mem::replace(&mut *slot, Slot::Done) {
                Slot::Resolved(result) => return result,
                Slot::Empty => {
                    let (tx, rx) = oneshot::channel();
                    *slot = Slot::Waiting(tx);
                    rx
                }
                Slot::Waiting(tx) => {
                    warn!("final-result wait already outstanding");
                    *slot = Slot::Waiting(tx);
                    return None;
                }
                Slot::Done => return None,
            }
        };

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => None,
            Err(_) => {
                // Timed out: retire the slot so a late resolve is a no-op.
                *self.lock() = Slot::Done;
                None
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

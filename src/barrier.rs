//! Counting barrier that runs the final flush exactly once.

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Counts down a known amount of completions.
#[derive(Debug)]
pub struct CompletionBarrier {
    expected: usize,
    remaining: AtomicUsize,
}

impl CompletionBarrier {
    pub fn new(expected: usize) -> Self {
        CompletionBarrier {
            expected,
            remaining: AtomicUsize::new(expected),
        }
    }

    /// Records one completion. Returns `true` only for the completion that
    /// brings the count to zero; completions past zero are rejected.
    pub fn complete(&self) -> bool {
        let result = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |remaining| {
                remaining.checked_sub(1)
            });

        match result {
            Ok(previous) => previous == 1,
            Err(_) => {
                warn!(
                    target: "anvil-convert",
                    "Completion after all {} expected completions", self.expected
                );
                false
            }
        }
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    pub fn is_done(&self) -> bool {
        self.remaining() == 0
    }
}

type Flush<R> = Box<dyn FnOnce() -> R + Send>;

/// Runs `flush` on whichever thread records the last completion and hands its
/// outcome to a waiter on any other thread.
pub struct FlushCoordinator<R> {
    barrier: CompletionBarrier,
    /// Taken by the flushing thread; the sender is dropped once the outcome
    /// was sent, so waiters never block on a flush that already happened.
    flush: Mutex<Option<(Flush<R>, Sender<R>)>>,
    receiver: Receiver<R>,
}

impl<R: Send + 'static> FlushCoordinator<R> {
    /// With `expected == 0` the flush runs before `new` returns.
    pub fn new<F>(expected: usize, flush: F) -> Self
    where
        F: FnOnce() -> R + Send + 'static,
    {
        let (sender, receiver) = bounded(1);
        let flush: Flush<R> = Box::new(flush);
        let coordinator = FlushCoordinator {
            barrier: CompletionBarrier::new(expected),
            flush: Mutex::new(Some((flush, sender))),
            receiver,
        };

        if expected == 0 {
            coordinator.run_flush();
        }

        coordinator
    }

    /// Records one completion, running the flush if it was the last one.
    pub fn complete(&self) -> bool {
        if self.barrier.complete() {
            self.run_flush();
            true
        } else {
            false
        }
    }

    pub fn remaining(&self) -> usize {
        self.barrier.remaining()
    }

    pub fn is_done(&self) -> bool {
        self.barrier.is_done()
    }

    /// Blocks until the flush has run and returns its outcome. Only the first
    /// waiter receives it; `None` once it was taken or when the flush panicked.
    pub fn wait(&self) -> Option<R> {
        self.receiver.recv().ok()
    }

    /// Like `wait`, but gives up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<R> {
        self.receiver.recv_timeout(timeout).ok()
    }

    fn run_flush(&self) {
        let flush = self
            .flush
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some((flush, sender)) = flush {
            debug!(target: "anvil-convert", "All {} completions recorded, flushing", self.barrier.expected());

            match panic::catch_unwind(AssertUnwindSafe(flush)) {
                // The receiver lives as long as the coordinator, so this cannot fail.
                Ok(outcome) => {
                    let _ = sender.send(outcome);
                }
                Err(_) => error!(target: "anvil-convert", "Flush panicked"),
            }
        }
    }
}

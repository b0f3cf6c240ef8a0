//! Background generation with completions delivered on the owner's thread.
//!
//! [`WorkQueue::submit`] runs the generate closure on a rayon worker and
//! ships the outcome back over a channel. Nothing is applied until the owner
//! calls [`WorkQueue::drain`], which runs each completion callback against the
//! owner's context `C`. Callbacks therefore never race with the tick loop.
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use rayon::ThreadPoolBuilder;
use tracing::trace;

use crate::error::{TaskError, WorkQueueError};

/// Handle that stops a submitted task's result from being applied.
///
/// Cancelling does not interrupt work already running; the result is simply
/// dropped at drain time.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Outcome of one [`WorkQueue::drain`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Completions whose callbacks ran.
    pub applied: usize,
    /// Completions dropped because their token was cancelled.
    pub discarded: usize,
}

impl DrainReport {
    fn add(&mut self, other: DrainReport) {
        self.applied += other.applied;
        self.discarded += other.discarded;
    }
}

type Completion<C> = Box<dyn FnOnce(&mut C) + Send>;

struct Finished<C> {
    token: CancellationToken,
    apply: Completion<C>,
}

pub struct WorkQueue<C> {
    pool: rayon::ThreadPool,
    tx: Sender<Finished<C>>,
    rx: Receiver<Finished<C>>,
    in_flight: Arc<AtomicUsize>,
}

impl<C: 'static> WorkQueue<C> {
    /// Create a queue backed by `worker_threads` workers (0 = one per core).
    pub fn new(worker_threads: usize) -> Result<Self, WorkQueueError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(worker_threads)
            .thread_name(|i| format!("relief-worker-{i}"))
            .build()?;
        let (tx, rx) = unbounded();
        Ok(Self { pool, tx, rx, in_flight: Arc::new(AtomicUsize::new(0)) })
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Tasks submitted whose completions have not been drained yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run `generate` on a worker; `on_complete` runs later, inside
    /// [`drain`](Self::drain), with the result or the panic it raised.
    pub fn submit<T, G, F>(&self, generate: G, on_complete: F) -> CancellationToken
    where
        T: Send + 'static,
        G: FnOnce() -> T + Send + 'static,
        F: FnOnce(Result<T, TaskError>, &mut C) + Send + 'static,
    {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let tx = self.tx.clone();
        self.in_flight.fetch_add(1, Ordering::AcqRel);

        self.pool.spawn(move || {
            let apply: Completion<C> = if task_token.is_cancelled() {
                // Skip the work; drain discards this entry without calling it.
                Box::new(|_: &mut C| {})
            } else {
                let result = catch_unwind(AssertUnwindSafe(generate)).map_err(|p| TaskError::Panicked(panic_message(p)));
                Box::new(move |ctx: &mut C| on_complete(result, ctx))
            };
            let finished = Finished { token: task_token, apply };
            // The receiver lives as long as the queue; a send failure means
            // the owner is gone and nobody wants the result.
            let _ = tx.send(finished);
        });

        token
    }

    /// Apply every completion that has arrived, without blocking.
    pub fn drain(&self, ctx: &mut C) -> DrainReport {
        let mut report = DrainReport::default();
        while let Ok(finished) = self.rx.try_recv() {
            report.add(self.apply(finished, ctx));
        }
        if report != DrainReport::default() {
            trace!(applied = report.applied, discarded = report.discarded, "drained completions");
        }
        report
    }

    /// Apply completions until nothing is in flight or `timeout` elapses.
    pub fn drain_blocking(&self, ctx: &mut C, timeout: Duration) -> DrainReport {
        let deadline = Instant::now() + timeout;
        let mut report = self.drain(ctx);
        while self.in_flight() > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(finished) => report.add(self.apply(finished, ctx)),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        report
    }

    fn apply(&self, finished: Finished<C>, ctx: &mut C) -> DrainReport {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        if finished.token.is_cancelled() {
            DrainReport { applied: 0, discarded: 1 }
        } else {
            (finished.apply)(ctx);
            DrainReport { applied: 1, discarded: 0 }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("unknown panic payload")
    }
}

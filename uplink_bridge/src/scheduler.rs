//! Async task scheduler
//!
//! A task is split in two phases:
//!
//! - the worker phase runs the blocking native call on tokio's blocking
//!   pool. It sees the native runtime and the task input, nothing else;
//! - the completion phase runs on the async runtime driving the bridge. It
//!   gets the input back together with the worker's output and the handle
//!   registry, classifies the outcome and produces the result.
//!
//! The result travels over a `oneshot` channel, so it is delivered at most
//! once. The task input is dropped by the completion phase on every path,
//! which is what releases pinned buffers.
//!
//! A semaphore caps how many workers run at once. A task can be canceled
//! while it waits for a slot; once the worker phase has started it always
//! runs to completion.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::{oneshot, Notify, Semaphore};
use tracing::{debug, trace, warn};
use uplink_runtime::StorageRuntime;

use crate::error::StorageError;
use crate::registry::HandleRegistry;

const QUEUED: u8 = 0;
const RUNNING: u8 = 1;
const CANCELED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Cancels a task that has not started its worker phase yet.
#[derive(Clone)]
pub struct CancelHandle {
    id: TaskId,
    operation: &'static str,
    state: Arc<AtomicU8>,
    notify: Arc<Notify>,
}

impl CancelHandle {
    /// `true` if the task will reject with `Canceled`. `false` if the worker
    /// already started, or the task was canceled before.
    pub fn cancel(&self) -> bool {
        let canceled = self
            .state
            .compare_exchange(QUEUED, CANCELED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if canceled {
            debug!(task = self.operation, id = self.id.0, "cancel requested");
            self.notify.notify_one();
        } else {
            trace!(task = self.operation, id = self.id.0, "cancel ignored");
        }
        canceled
    }
}

/// Result slot of a submitted task.
pub struct Pending<T> {
    id: TaskId,
    operation: &'static str,
    cancel: CancelHandle,
    rx: oneshot::Receiver<Result<T, StorageError>>,
}

impl<T> Pending<T> {
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    #[must_use]
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// See [`CancelHandle::cancel`].
    pub fn cancel(&self) -> bool {
        self.cancel.cancel()
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T, StorageError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let operation = self.operation;
        self.rx.poll_unpin(cx).map(|received| {
            received.unwrap_or_else(|_| {
                Err(StorageError::internal(format!(
                    "{operation}: completion was dropped"
                )))
            })
        })
    }
}

/// Decrements the in-flight counter however the control task ends.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct Scheduler {
    runtime: Arc<dyn StorageRuntime>,
    registry: Arc<Mutex<HandleRegistry>>,
    slots: Arc<Semaphore>,
    next_id: AtomicU64,
    in_flight: Arc<AtomicUsize>,
}

impl Scheduler {
    #[must_use]
    pub fn new(
        runtime: Arc<dyn StorageRuntime>,
        registry: Arc<Mutex<HandleRegistry>>,
        worker_threads: usize,
    ) -> Self {
        Self {
            runtime,
            registry,
            slots: Arc::new(Semaphore::new(worker_threads.max(1))),
            next_id: AtomicU64::new(1),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Tasks submitted and not yet completed.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Queue a task. Must be called from within a tokio runtime.
    ///
    /// `work` runs on a blocking thread and must only call the native
    /// runtime. `complete` runs on the async side with the registry locked.
    pub fn submit<I, O, T, W, C>(
        &self,
        operation: &'static str,
        input: I,
        work: W,
        complete: C,
    ) -> Pending<T>
    where
        I: Send + 'static,
        O: Send + 'static,
        T: Send + 'static,
        W: FnOnce(&dyn StorageRuntime, &mut I) -> O + Send + 'static,
        C: FnOnce(I, O, &mut HandleRegistry) -> Result<T, StorageError> + Send + 'static,
    {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let cancel = CancelHandle {
            id,
            operation,
            state: Arc::new(AtomicU8::new(QUEUED)),
            notify: Arc::new(Notify::new()),
        };
        let (tx, rx) = oneshot::channel();
        let task = Task {
            id,
            operation,
            runtime: Arc::clone(&self.runtime),
            registry: Arc::clone(&self.registry),
            slots: Arc::clone(&self.slots),
            cancel: cancel.clone(),
        };
        let in_flight = InFlight::enter(&self.in_flight);
        debug!(task = operation, id = id.0, "submit");

        tokio::spawn(async move {
            let outcome = task.run(input, work, complete).await;
            match &outcome {
                Ok(_) => debug!(task = operation, id = id.0, "resolved"),
                Err(e) => debug!(task = operation, id = id.0, code = e.code, error = %e, "rejected"),
            }
            drop(in_flight);
            if tx.send(outcome).is_err() {
                trace!(task = operation, id = id.0, "result discarded by caller");
            }
        });

        Pending {
            id,
            operation,
            cancel,
            rx,
        }
    }
}

struct Task {
    id: TaskId,
    operation: &'static str,
    runtime: Arc<dyn StorageRuntime>,
    registry: Arc<Mutex<HandleRegistry>>,
    slots: Arc<Semaphore>,
    cancel: CancelHandle,
}

impl Task {
    async fn run<I, O, T, W, C>(self, input: I, work: W, complete: C) -> Result<T, StorageError>
    where
        I: Send + 'static,
        O: Send + 'static,
        W: FnOnce(&dyn StorageRuntime, &mut I) -> O + Send + 'static,
        C: FnOnce(I, O, &mut HandleRegistry) -> Result<T, StorageError>,
    {
        let Self {
            id,
            operation,
            runtime,
            registry,
            slots,
            cancel,
        } = self;

        let permit = tokio::select! {
            biased;
            () = cancel.notify.notified() => None,
            permit = slots.acquire_owned() => Some(permit),
        };
        let permit = match permit {
            Some(Ok(permit)) => permit,
            Some(Err(_)) => {
                drop(input);
                return Err(StorageError::internal(format!(
                    "{operation}: worker pool is closed"
                )));
            }
            None => {
                drop(input);
                return Err(StorageError::canceled(operation));
            }
        };

        let state = Arc::clone(&cancel.state);
        let joined = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let mut input = input;
            if state
                .compare_exchange(QUEUED, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return (input, None);
            }
            trace!(task = operation, id = id.0, "worker start");
            let output = work(runtime.as_ref(), &mut input);
            trace!(task = operation, id = id.0, "worker done");
            (input, Some(output))
        })
        .await;

        match joined {
            Ok((input, Some(output))) => {
                let mut registry = registry.lock();
                complete(input, output, &mut registry)
            }
            Ok((input, None)) => {
                drop(input);
                Err(StorageError::canceled(operation))
            }
            Err(err) => {
                warn!(task = operation, id = id.0, error = %err, "worker failed");
                Err(StorageError::internal(format!(
                    "{operation}: worker failed: {err}"
                )))
            }
        }
    }
}

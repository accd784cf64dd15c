//! Bridge context
//!
//! One `Bridge` owns the native runtime, the handle registry and the task
//! scheduler. Clones share all three. Every host call goes through
//! [`Bridge::call`]: the operation is looked up by name, its arguments are
//! validated against the registry, and a task is queued.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uplink_runtime::StorageRuntime;

use crate::config::BridgeConfig;
use crate::error::{BridgeError, ErrorClasses, StorageError};
use crate::marshal::Args;
use crate::ops::{Operation, OperationTable};
use crate::registry::HandleRegistry;
use crate::scheduler::{Pending, Scheduler};
use crate::value::Value;

struct Inner {
    runtime: Arc<dyn StorageRuntime>,
    registry: Arc<Mutex<HandleRegistry>>,
    scheduler: Scheduler,
    operations: OperationTable,
}

#[derive(Clone)]
pub struct Bridge {
    inner: Arc<Inner>,
}

impl Bridge {
    #[must_use]
    pub fn new(runtime: Arc<dyn StorageRuntime>) -> Self {
        Self::with_config(runtime, &BridgeConfig::default())
    }

    #[must_use]
    pub fn with_config(runtime: Arc<dyn StorageRuntime>, config: &BridgeConfig) -> Self {
        let registry = Arc::new(Mutex::new(HandleRegistry::new()));
        let scheduler = Scheduler::new(
            Arc::clone(&runtime),
            Arc::clone(&registry),
            config.worker_threads,
        );
        let operations = OperationTable::build();
        info!(
            workers = config.worker_threads,
            operations = operations.len(),
            "bridge ready"
        );
        Self {
            inner: Arc::new(Inner {
                runtime,
                registry,
                scheduler,
                operations,
            }),
        }
    }

    /// Issue an operation by its host-visible name.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Unknown operations and invalid arguments fail here, synchronously,
    /// without creating a task.
    pub fn call(&self, name: &str, args: Vec<Value>) -> Result<Pending<Value>, BridgeError> {
        let operation = self.inner.operations.get(name).ok_or_else(|| {
            BridgeError::type_error(format!("unknown operation '{name}'"))
        })?;
        let args = {
            let registry = self.inner.registry.lock();
            Args::extract(operation.name, operation.params, args, &registry)
        };
        let args = args.inspect_err(|e| debug!(task = operation.name, error = %e, "rejected call"))?;
        operation.invoke(self, args)
    }

    /// Issue an operation and wait for its result.
    ///
    /// # Errors
    /// Synchronous validation failures and task rejections alike.
    pub async fn call_async(&self, name: &str, args: Vec<Value>) -> Result<Value, BridgeError> {
        Ok(self.call(name, args)?.await?)
    }

    pub fn operations(&self) -> impl Iterator<Item = &'static Operation> + '_ {
        self.inner.operations.iter()
    }

    #[must_use]
    pub fn registry_is_empty(&self) -> bool {
        self.inner.registry.lock().is_empty()
    }

    #[must_use]
    pub fn open_handles(&self) -> usize {
        self.inner.registry.lock().len()
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.scheduler.in_flight()
    }

    /// Error class hierarchy rooted at the host's base exception type.
    #[must_use]
    pub fn init_error_classes(&self, host_base: Option<&str>) -> ErrorClasses {
        ErrorClasses::init(host_base)
    }

    /// Release every resource the host forgot to free.
    ///
    /// Returns the number of leaked handles.
    pub async fn shutdown(&self) -> usize {
        let leaked = self.inner.registry.lock().drain();
        if leaked.is_empty() {
            debug!("shutdown: no leaked handles");
            return 0;
        }
        for entry in &leaked {
            warn!(raw = %entry.raw, kind = entry.kind.name(), label = %entry.label, "releasing leaked handle");
        }
        let count = leaked.len();
        let runtime = Arc::clone(&self.inner.runtime);
        let released = tokio::task::spawn_blocking(move || {
            for entry in leaked {
                entry.release(runtime.as_ref());
            }
        })
        .await;
        if let Err(e) = released {
            warn!(error = %e, "shutdown: release failed");
        }
        count
    }

    /// Queue a task on this bridge's scheduler.
    pub(crate) fn submit<I, O, T, W, C>(
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
        self.inner.scheduler.submit(operation, input, work, complete)
    }
}

//! Host-visible operations
//!
//! Each submodule contributes a static slice of operations. An operation is
//! its name, its positional parameter list and an entry point that turns
//! validated arguments into a queued task.

mod access;
mod bucket;
mod debug;
mod download;
mod edge;
mod encryption;
mod listing;
mod multipart;
mod object;
mod project;
mod upload;

use std::collections::HashMap;

use tracing::debug;
use uplink_runtime::{Config, NativeError, NativeResult};

use crate::bridge::Bridge;
use crate::error::{BridgeError, StorageError};
use crate::marshal::{Args, Options, Param};
use crate::scheduler::Pending;
use crate::value::Value;

type Invoke = fn(&Bridge, Args) -> Result<Pending<Value>, BridgeError>;

pub struct Operation {
    pub name: &'static str,
    pub params: &'static [Param],
    invoke: Invoke,
}

impl Operation {
    pub(crate) const fn new(name: &'static str, params: &'static [Param], invoke: Invoke) -> Self {
        Self {
            name,
            params,
            invoke,
        }
    }

    pub(crate) fn invoke(&self, bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
        (self.invoke)(bridge, args)
    }
}

const GROUPS: &[&[Operation]] = &[
    access::OPERATIONS,
    project::OPERATIONS,
    bucket::OPERATIONS,
    &bucket::CURSOR,
    object::OPERATIONS,
    &object::CURSOR,
    upload::OPERATIONS,
    download::OPERATIONS,
    encryption::OPERATIONS,
    multipart::OPERATIONS,
    &multipart::PART_CURSOR,
    &multipart::UPLOAD_CURSOR,
    edge::OPERATIONS,
    debug::OPERATIONS,
];

pub(crate) struct OperationTable {
    by_name: HashMap<&'static str, &'static Operation>,
    order: Vec<&'static Operation>,
}

impl OperationTable {
    pub(crate) fn build() -> Self {
        let mut table = Self {
            by_name: HashMap::new(),
            order: Vec::new(),
        };
        for group in GROUPS {
            for operation in *group {
                table.register(operation);
            }
        }
        table
    }

    fn register(&mut self, operation: &'static Operation) {
        let previous = self.by_name.insert(operation.name, operation);
        debug_assert!(previous.is_none(), "duplicate operation {}", operation.name);
        self.order.push(operation);
    }

    pub(crate) fn get(&self, name: &str) -> Option<&'static Operation> {
        self.by_name.get(name).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &'static Operation> + '_ {
        self.order.iter().copied()
    }
}

fn reject(operation: &str, error: NativeError) -> StorageError {
    debug!(task = operation, code = error.code, "native call failed");
    StorageError::from_native(error)
}

/// Map a native outcome into the taxonomy.
fn classify<T>(operation: &str, result: NativeResult<T>) -> Result<T, StorageError> {
    result.map_err(|e| reject(operation, e))
}

/// Host-side `config` map of the `config*` operations.
fn config_from(options: &Options<'_>) -> Result<Config, BridgeError> {
    let dial_timeout = options.integer("dialTimeoutMilliseconds", 0)?;
    Ok(Config {
        user_agent: options.string("userAgent")?,
        dial_timeout_milliseconds: i32::try_from(dial_timeout).map_err(|_| {
            BridgeError::range_error("dialTimeoutMilliseconds is out of range")
        })?,
        temp_directory: options.string("tempDirectory")?,
    })
}

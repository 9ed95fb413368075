//! A fault-tolerant MapReduce scheduler.
//!
//! A single coordinator hands out map and reduce tasks to a pool of
//! stateless workers, re-issuing any task whose worker goes quiet for too
//! long. Data lives on a filesystem shared by every worker.

use std::fmt;
use std::fmt::Formatter;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod client;
pub mod layout;
pub mod rpc;

/////////////////////////////////////////////////////////////////////////////
// Scheduling defaults
/////////////////////////////////////////////////////////////////////////////

/// A running task whose last dispatch is older than this becomes eligible
/// for reassignment.
pub const TASK_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a worker sleeps after the coordinator answers `Wait`.
pub const WAIT_BACKOFF: Duration = Duration::from_secs(10);

/// Pause between finishing a task and asking for the next one.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How long the coordinator keeps answering after the job is done.
///
/// Long enough for a worker that was told to `Wait` just before completion
/// to wake up and still receive `Shutdown`.
pub const SHUTDOWN_LINGER: Duration =
    Duration::from_secs(WAIT_BACKOFF.as_secs() + 2 * POLL_INTERVAL.as_secs());

/////////////////////////////////////////////////////////////////////////////
// MapReduce application types
/////////////////////////////////////////////////////////////////////////////

/// The output of an application map function.
pub type MapOutput = anyhow::Result<Vec<KeyValue>>;

/// A map function takes the name of an input file and its contents.
///
/// It returns the key-value pairs emitted for that input, in any order.
pub type MapFn = fn(input: &str, contents: &str) -> MapOutput;

/// A reduce function takes in a key and every value emitted for that key,
/// in the order they were read. It returns an [`anyhow::Result`]
/// containing a single output value.
pub type ReduceFn = fn(key: &str, values: &[String]) -> anyhow::Result<String>;

/// A map reduce application.
#[derive(Copy, Clone)]
pub struct Workload {
    pub map_fn: MapFn,
    pub reduce_fn: ReduceFn,
}

/////////////////////////////////////////////////////////////////////////////
// Key-value pairs
/////////////////////////////////////////////////////////////////////////////

/// A single key-value pair.
///
/// This is also the on-disk shape of an intermediate record.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct KeyValue {
    /// The key.
    pub key: String,

    /// The value.
    pub value: String,
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.key, self.value)
    }
}

impl KeyValue {
    /// Construct a new key-value pair from the given key and value.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Get the key of this key-value pair.
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the value of this key-value pair.
    #[inline]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Consumes the key-value pair and returns the key.
    #[inline]
    pub fn into_key(self) -> String {
        self.key
    }

    /// Consumes the key-value pair and returns the value.
    #[inline]
    pub fn into_value(self) -> String {
        self.value
    }
}

/////////////////////////////////////////////////////////////////////////////
// Partitioning
/////////////////////////////////////////////////////////////////////////////

const FNV32_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV32_PRIME: u32 = 0x0100_0193;

/// Hashes an intermediate key with 32-bit FNV-1a, masked to a non-negative
/// value. Compute a reduce bucket for a given key by calculating
/// `ihash(key) % n_reduce`, or use [`partition_for`].
pub fn ihash(key: &[u8]) -> u32 {
    let hash = key.iter().fold(FNV32_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV32_PRIME)
    });
    hash & 0x7fff_ffff
}

/// The reduce partition a key is routed to.
///
/// `n_reduce` must be non-zero.
#[inline]
pub fn partition_for(key: &str, n_reduce: u32) -> u32 {
    ihash(key.as_bytes()) % n_reduce
}

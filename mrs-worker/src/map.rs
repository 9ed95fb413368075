use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::{debug, info};

use common::rpc::TaskId;
use common::{layout, partition_for, KeyValue, Workload};

use crate::error::TaskError;
use crate::persist::write_atomically;

/// Run one map task.
///
/// Reads `input`, feeds it to the workload's map function and writes one
/// intermediate file per reduce partition into `work_dir`, including empty
/// ones. Each file is replaced atomically, so a retried task overwrites
/// whatever an earlier attempt left behind. Returns the number of records
/// emitted.
pub fn perform_map(
    workload: &Workload,
    input: &str,
    task_id: TaskId,
    n_reduce: u32,
    work_dir: &Path,
) -> Result<usize, TaskError> {
    info!("starting map task {task_id} on `{input}`");

    let bytes = fs::read(input).map_err(|source| TaskError::Read {
        path: input.into(),
        source,
    })?;
    // invalid UTF-8 is replaced, never a failure
    let contents = String::from_utf8_lossy(&bytes);

    let mut records = (workload.map_fn)(input, &contents).map_err(|cause| {
        TaskError::MapFunction {
            input: input.to_string(),
            cause,
        }
    })?;
    let emitted = records.len();

    // stable, so values of one key keep their emission order
    records.sort_by(|a, b| a.key.cmp(&b.key));

    let mut buckets: Vec<Vec<KeyValue>> = (0..n_reduce).map(|_| Vec::new()).collect();
    for kv in records {
        let partition = partition_for(kv.key(), n_reduce);
        buckets[partition as usize].push(kv);
    }

    for (partition, bucket) in buckets.iter().enumerate() {
        let partition = partition as u32;
        let dest = layout::intermediate_path(work_dir, task_id, partition);
        write_atomically(work_dir, &dest, |w| {
            for kv in bucket {
                serde_json::to_writer(&mut *w, kv)?;
                w.write_all(b"\n")?;
            }
            Ok(())
        })?;
        debug!("wrote {} records to {}", bucket.len(), dest.display());
    }

    info!("map task {task_id} done, {emitted} records over {n_reduce} partitions");
    Ok(emitted)
}

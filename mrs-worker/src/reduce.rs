use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::{debug, info, warn};

use common::rpc::TaskId;
use common::{layout, KeyValue, Workload};

use crate::error::TaskError;
use crate::persist::write_atomically;

/// What a reduce task ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOutcome {
    /// The shard was written with this many keys.
    Written { keys: usize },

    /// An earlier execution already published the shard and started
    /// cleaning up its inputs.
    AlreadyPublished,
}

/// Run one reduce task over every intermediate file of `partition`.
///
/// Values are grouped by key in map-task order, keys are reduced in
/// ascending byte order and the shard `mr-out-{partition}` is replaced
/// atomically. Consumed intermediate files are deleted afterwards.
pub fn perform_reduce(
    workload: &Workload,
    partition: u32,
    map_count: u32,
    work_dir: &Path,
) -> Result<ReduceOutcome, TaskError> {
    info!("starting reduce task {partition} over {map_count} map outputs");

    let inputs = list_intermediates(work_dir, partition, map_count)?;
    let output = layout::output_path(work_dir, partition);

    if inputs.len() < map_count as usize {
        if output.exists() {
            info!(
                "reduce task {partition}: {} already published, nothing to do",
                output.display()
            );
            return Ok(ReduceOutcome::AlreadyPublished);
        }
        return Err(TaskError::IncompleteInput {
            partition,
            found: inputs.len(),
            expected: map_count as usize,
        });
    }

    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (_, path) in &inputs {
        decode_into(path, &mut groups)?;
    }

    let keys = groups.len();
    write_atomically(work_dir, &output, |w| {
        for (key, values) in &groups {
            let reduced = (workload.reduce_fn)(key, values).map_err(|cause| {
                TaskError::ReduceFunction {
                    key: key.clone(),
                    cause,
                }
            })?;
            writeln!(w, "{key} {reduced}")?;
        }
        Ok(())
    })?;

    for (_, path) in &inputs {
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("failed to remove {}: {e}", path.display()),
        }
    }

    info!("reduce task {partition} done, {keys} keys written to {}", output.display());
    Ok(ReduceOutcome::Written { keys })
}

/// Intermediate files of `partition` written by map tasks `0..map_count`,
/// ordered by map task.
fn list_intermediates(
    work_dir: &Path,
    partition: u32,
    map_count: u32,
) -> Result<Vec<(TaskId, PathBuf)>, TaskError> {
    let pattern = format!(
        "{}/{}",
        Pattern::escape(&work_dir.to_string_lossy()),
        layout::intermediate_pattern(partition)
    );

    let mut found = Vec::new();
    for entry in glob::glob(&pattern).map_err(|e| TaskError::List(e.to_string()))? {
        let path = entry.map_err(|e| TaskError::List(e.to_string()))?;
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        match layout::parse_intermediate_name(name) {
            Some((task, p)) if p == partition && task < map_count => found.push((task, path)),
            _ => debug!("skipping {}", path.display()),
        }
    }

    found.sort_by_key(|(task, _)| *task);
    Ok(found)
}

/// Append every record of one intermediate file to `groups`.
///
/// Malformed data ends the file's record stream; anything decoded before it
/// is kept.
fn decode_into(path: &Path, groups: &mut BTreeMap<String, Vec<String>>) -> Result<(), TaskError> {
    let file = File::open(path).map_err(|source| TaskError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let stream = serde_json::Deserializer::from_reader(BufReader::new(file)).into_iter::<KeyValue>();
    for record in stream {
        match record {
            Ok(kv) => groups.entry(kv.key).or_default().push(kv.value),
            Err(e) if e.is_io() => {
                return Err(TaskError::Decode {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
            Err(e) => {
                warn!("stopped reading {} at malformed record: {e}", path.display());
                break;
            }
        }
    }
    Ok(())
}

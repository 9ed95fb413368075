//! Deterministic file names for intermediate and output data.
//!
//! Every process can compute any address from `(task, partition)` or
//! `partition` alone, so nothing about the layout is ever communicated.

use std::path::{Path, PathBuf};

use crate::rpc::TaskId;

const INTERMEDIATE_PREFIX: &str = "mr-int-";
const OUTPUT_PREFIX: &str = "mr-out-";

/// File name of the intermediate bucket written by map task `task` for
/// reduce partition `partition`.
pub fn intermediate_name(task: TaskId, partition: u32) -> String {
    format!("{INTERMEDIATE_PREFIX}{task}-{partition}")
}

pub fn intermediate_path(dir: &Path, task: TaskId, partition: u32) -> PathBuf {
    dir.join(intermediate_name(task, partition))
}

/// Glob pattern, relative to the work directory, matching every
/// intermediate file of one partition.
pub fn intermediate_pattern(partition: u32) -> String {
    format!("{INTERMEDIATE_PREFIX}*-{partition}")
}

/// Recover `(task, partition)` from an intermediate file name.
///
/// Returns `None` for anything that is not exactly `mr-int-{task}-{partition}`.
pub fn parse_intermediate_name(name: &str) -> Option<(TaskId, u32)> {
    let rest = name.strip_prefix(INTERMEDIATE_PREFIX)?;
    let (task, partition) = rest.split_once('-')?;
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(task) || !all_digits(partition) {
        return None;
    }
    Some((task.parse().ok()?, partition.parse().ok()?))
}

/// File name of the final output shard for `partition`.
pub fn output_name(partition: u32) -> String {
    format!("{OUTPUT_PREFIX}{partition}")
}

pub fn output_path(dir: &Path, partition: u32) -> PathBuf {
    dir.join(output_name(partition))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intermediate_names_round_trip() {
        assert_eq!(intermediate_name(3, 7), "mr-int-3-7");
        assert_eq!(parse_intermediate_name("mr-int-3-7"), Some((3, 7)));
        assert_eq!(parse_intermediate_name("mr-int-12-0"), Some((12, 0)));
    }

    #[test]
    fn foreign_names_are_rejected() {
        for name in [
            "mr-out-1",
            "mr-int-3",
            "mr-int--1",
            "mr-int-a-1",
            "mr-int-1-1-1",
            ".tmpXYZ",
        ] {
            assert_eq!(parse_intermediate_name(name), None, "{name}");
        }
    }

    #[test]
    fn output_paths_live_in_the_work_dir() {
        let dir = Path::new("/tmp/job");
        assert_eq!(output_path(dir, 4), PathBuf::from("/tmp/job/mr-out-4"));
        assert_eq!(intermediate_pattern(4), "mr-int-*-4");
    }
}

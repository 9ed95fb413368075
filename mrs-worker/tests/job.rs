//! Whole jobs run in-process: a coordinator serving a Unix socket and
//! workers sharing a scratch work directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use common::client::CoordinatorClient;
use common::rpc::{Assignment, TaskKind};
use common::{layout, KeyValue, Workload};
use mrs_coordinator::{server, CoordinatorConfig, MRCoordinator};
use mrs_worker::{MRWorker, WorkerConfig, WorkerSummary};

struct Job {
    dir: TempDir,
    socket: PathBuf,
    coordinator: Arc<MRCoordinator>,
    shutdown: CancellationToken,
    server: JoinHandle<anyhow::Result<()>>,
}

impl Job {
    fn start(inputs: &[&str], config: CoordinatorConfig) -> Job {
        let dir = tempfile::tempdir().unwrap();
        let paths = inputs
            .iter()
            .enumerate()
            .map(|(i, contents)| {
                let path = dir.path().join(format!("pg-{i}.txt"));
                fs::write(&path, contents).unwrap();
                path.to_string_lossy().into_owned()
            })
            .collect();

        let socket = dir.path().join("coordinator.sock");
        let coordinator = Arc::new(MRCoordinator::new(paths, &config).unwrap());
        let listener = server::bind(&socket).unwrap();
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(server::serve(listener, coordinator.clone(), shutdown.clone()));

        Job {
            dir,
            socket,
            coordinator,
            shutdown,
            server,
        }
    }

    fn work_dir(&self) -> &Path {
        self.dir.path()
    }

    fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            work_dir: self.work_dir().to_path_buf(),
            wait_backoff: Duration::from_millis(20),
            poll_interval: Duration::from_millis(1),
        }
    }

    fn spawn_worker(&self, workload: Workload) -> JoinHandle<WorkerSummary> {
        let socket = self.socket.clone();
        let config = self.worker_config();
        tokio::spawn(async move {
            MRWorker::connect(&socket, workload, config)
                .await
                .unwrap()
                .run()
                .await
                .unwrap()
        })
    }

    /// Every output line, keyed by the first word.
    fn output(&self, n_reduce: u32) -> BTreeMap<String, String> {
        let mut lines = BTreeMap::new();
        for partition in 0..n_reduce {
            let shard = fs::read_to_string(layout::output_path(self.work_dir(), partition)).unwrap();
            let keys: Vec<_> = shard.lines().map(|l| l.split_once(' ').unwrap().0).collect();
            let mut sorted = keys.clone();
            sorted.sort();
            sorted.dedup();
            assert_eq!(keys, sorted, "shard {partition} is not sorted and unique");

            for line in shard.lines() {
                let (key, value) = line.split_once(' ').unwrap();
                assert!(
                    lines.insert(key.to_string(), value.to_string()).is_none(),
                    "{key} appears in two shards"
                );
            }
        }
        lines
    }

    fn leftover_intermediates(&self) -> usize {
        fs::read_dir(self.work_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| layout::parse_intermediate_name(&e.file_name().to_string_lossy()).is_some())
            .count()
    }

    async fn stop(self) {
        self.shutdown.cancel();
        self.server.await.unwrap().unwrap();
    }
}

fn config(n_reduce: u32, task_timeout: Duration) -> CoordinatorConfig {
    CoordinatorConfig {
        n_reduce,
        task_timeout,
        ..CoordinatorConfig::default()
    }
}

#[tokio::test]
async fn word_count_with_two_workers() {
    let job = Job::start(&["a b a", "b c"], config(2, Duration::from_secs(10)));
    let wc = workload::try_named("wc").unwrap();

    let first = job.spawn_worker(wc);
    let second = job.spawn_worker(wc);
    let first = first.await.unwrap();
    let second = second.await.unwrap();

    assert_eq!(first.maps_succeeded + second.maps_succeeded, 2);
    assert_eq!(first.reduces_succeeded + second.reduces_succeeded, 2);
    assert!(job.coordinator.is_complete().await);

    let expected: BTreeMap<String, String> = [("a", "2"), ("b", "2"), ("c", "1")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    assert_eq!(job.output(2), expected);
    assert_eq!(job.leftover_intermediates(), 0);

    job.stop().await;
}

#[tokio::test]
async fn stalled_map_is_reassigned_and_late_report_is_accepted() {
    let job = Job::start(&["x y x"], config(1, Duration::from_millis(200)));

    // A worker that takes the only map task and then goes quiet.
    let mut stalled = CoordinatorClient::connect(&job.socket).await.unwrap();
    let assignment = stalled.request_assignment().await.unwrap();
    assert!(matches!(assignment, Assignment::Map { task_id: 0, .. }));

    let summary = job.spawn_worker(workload::try_named("wc").unwrap()).await.unwrap();
    assert_eq!(summary.maps_succeeded, 1);
    assert_eq!(summary.reduces_succeeded, 1);

    // The stalled worker finally reports; it is acknowledged and changes nothing.
    stalled.report_outcome(TaskKind::Map, 0, true).await.unwrap();
    let snapshot = stalled.query_status().await.unwrap();
    assert_eq!(snapshot.map_finished, 1);
    assert_eq!(snapshot.reduce_finished, 1);
    assert!(stalled.query_done().await.unwrap());
    assert_eq!(stalled.request_assignment().await.unwrap(), Assignment::Shutdown);

    assert_eq!(job.output(1).get("x").map(String::as_str), Some("2"));
    job.stop().await;
}

static FLAKY_CALLS: AtomicUsize = AtomicUsize::new(0);

fn flaky_map(_input: &str, contents: &str) -> common::MapOutput {
    if FLAKY_CALLS.fetch_add(1, Ordering::SeqCst) == 0 {
        bail!("transient failure");
    }
    Ok(contents
        .split_whitespace()
        .map(|w| KeyValue::new(w, "1"))
        .collect())
}

fn count(_key: &str, values: &[String]) -> anyhow::Result<String> {
    Ok(values.len().to_string())
}

#[tokio::test]
async fn failed_map_is_retried() {
    let job = Job::start(&["p q p"], config(3, Duration::from_secs(10)));
    let workload = Workload {
        map_fn: flaky_map,
        reduce_fn: count,
    };

    let summary = job.spawn_worker(workload).await.unwrap();
    assert_eq!(summary.maps_failed, 1);
    assert_eq!(summary.maps_succeeded, 1);
    assert_eq!(summary.reduces_succeeded, 3);

    let output = job.output(3);
    assert_eq!(output.get("p").map(String::as_str), Some("2"));
    assert_eq!(output.get("q").map(String::as_str), Some("1"));
    job.stop().await;
}

#[tokio::test]
async fn retry_ceiling_poisons_the_job() {
    fn always_fails(_input: &str, _contents: &str) -> common::MapOutput {
        bail!("never works")
    }

    let job = Job::start(
        &["anything"],
        CoordinatorConfig {
            max_attempts: Some(2),
            ..config(1, Duration::from_secs(10))
        },
    );
    let workload = Workload {
        map_fn: always_fails,
        reduce_fn: count,
    };

    let summary = job.spawn_worker(workload).await.unwrap();
    assert_eq!(summary.maps_failed, 2);
    assert!(job.coordinator.is_done().await);
    assert!(!job.coordinator.is_complete().await);
    assert_eq!(job.coordinator.poisoned().await, Some((TaskKind::Map, 0)));
    job.stop().await;
}

//! Example MapReduce applications, looked up by name.

use common::Workload;

pub mod indexer;
pub mod vertex_degree;
pub mod wc;

/// Names accepted by [`try_named`].
pub const NAMES: &[&str] = &["wc", "indexer", "vertex-degree"];

/// Look up a workload by the name a worker was started with.
pub fn try_named(name: &str) -> Option<Workload> {
    match name {
        "wc" => Some(Workload {
            map_fn: wc::map,
            reduce_fn: wc::reduce,
        }),
        "indexer" => Some(Workload {
            map_fn: indexer::map,
            reduce_fn: indexer::reduce,
        }),
        "vertex-degree" => Some(Workload {
            map_fn: vertex_degree::map,
            reduce_fn: vertex_degree::reduce,
        }),
        _ => None,
    }
}

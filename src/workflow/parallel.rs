//! Parallel stage runner.
//!
//! Runs a batch of independent stages on scoped threads, at most
//! `max_parallel` at a time. Each stage only reads the shared results; the
//! engine records the outputs after the whole batch has joined.

use std::collections::BTreeMap;
use std::thread;

use super::engine::{StageExecutor, StageRun};
use super::error::{WorkflowError, WorkflowResult};
use super::schema::Stage;

/// Outcome of one stage in a parallel batch.
#[derive(Debug)]
pub struct ParallelResult {
    /// Position of the stage in its workflow
    pub index: usize,

    /// Stage name
    pub name: String,

    /// Rendered prompt and output, or the stage's error
    pub result: WorkflowResult<StageRun>,
}

impl ParallelResult {
    /// Whether the stage succeeded.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Run `batch` concurrently and return one result per stage, in input order.
///
/// A failing stage does not cancel its siblings.
pub fn run_parallel(
    executor: &StageExecutor<'_>,
    batch: &[(usize, &Stage)],
    requirement: &str,
    results: &BTreeMap<String, String>,
    max_parallel: usize,
) -> Vec<ParallelResult> {
    let width = max_parallel.max(1);
    let mut out = Vec::with_capacity(batch.len());

    for chunk in batch.chunks(width) {
        tracing::debug!(stages = chunk.len(), "Starting parallel batch");

        thread::scope(|scope| {
            let handles: Vec<_> = chunk
                .iter()
                .map(|&(index, stage)| {
                    let handle = scope.spawn(move || executor.execute(stage, requirement, results));
                    (index, stage, handle)
                })
                .collect();

            for (index, stage, handle) in handles {
                let result = handle.join().unwrap_or(Err(WorkflowError::Panicked));
                out.push(ParallelResult { index, name: stage.name.clone(), result });
            }
        });
    }

    out
}

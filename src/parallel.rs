//! Fan-out/fan-in over input files.
//!
//! [`ParallelExecutor`] runs one job per file on a dedicated rayon pool and
//! reduces the partial results single-threaded through [`Merge`]. At most
//! `workers * in_flight_per_worker` files are in flight at once; the next
//! batch starts only after the previous one has joined.
//!
//! The run is all-or-nothing: the first job that fails or panics aborts it
//! and no partial result is returned.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::error::{Error, Result};
use crate::stats::Merge;

/// Default files in flight per worker.
pub const DEFAULT_IN_FLIGHT_PER_WORKER: usize = 2;

/// Fixed-size worker pool with a map-then-merge driver.
pub struct ParallelExecutor {
    pool: ThreadPool,
    workers: usize,
    in_flight_per_worker: usize,
    progress: bool,
}

impl std::fmt::Debug for ParallelExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelExecutor")
            .field("workers", &self.workers)
            .field("in_flight_per_worker", &self.in_flight_per_worker)
            .field("progress", &self.progress)
            .finish()
    }
}

impl ParallelExecutor {
    /// Create a pool of `workers` threads.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if `workers` is zero or the pool cannot be built.
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(Error::config("worker pool size must be at least 1"));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("kbprep-worker-{}", i))
            .build()
            .map_err(|e| Error::config(format!("failed to build worker pool: {}", e)))?;
        Ok(Self {
            pool,
            workers,
            in_flight_per_worker: DEFAULT_IN_FLIGHT_PER_WORKER,
            progress: false,
        })
    }

    /// Cap in-flight files at `workers * n` (at least one per worker).
    #[must_use]
    pub fn with_in_flight_per_worker(mut self, n: usize) -> Self {
        self.in_flight_per_worker = n.max(1);
        self
    }

    /// Show a progress bar over files.
    #[must_use]
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Number of worker threads.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Files processed concurrently per batch.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.workers * self.in_flight_per_worker
    }

    /// Run `job` on every input and merge the partial results.
    ///
    /// `job` receives the input's position and path. Partials are merged in
    /// input order after all jobs have finished.
    ///
    /// # Errors
    ///
    /// The first job error, unchanged; a panicking job becomes
    /// [`Error::WorkerFailure`].
    pub fn run<P, F>(&self, stage: &str, inputs: &[PathBuf], job: F) -> Result<P>
    where
        P: Merge + Default + Send,
        F: Fn(usize, &Path) -> Result<P> + Sync,
    {
        let total = inputs.len();
        log::info!(
            "{}: {} files on {} workers (batches of {})",
            stage,
            total,
            self.workers,
            self.batch_size()
        );
        let bar = self.progress_bar(stage, total);

        let mut partials: Vec<P> = Vec::with_capacity(total);
        for (batch_no, batch) in inputs.chunks(self.batch_size()).enumerate() {
            let offset = batch_no * self.batch_size();
            let results: Result<Vec<P>> = self.pool.install(|| {
                batch
                    .par_iter()
                    .enumerate()
                    .map(|(j, input)| {
                        let i = offset + j;
                        log::info!("Starting {}/{}. Reading {}", i + 1, total, input.display());
                        let partial = run_isolated(input, || job(i, input.as_path()))?;
                        log::info!("Finished {}/{}. {}", i + 1, total, input.display());
                        bar.inc(1);
                        Ok(partial)
                    })
                    .collect()
            });
            match results {
                Ok(batch_partials) => partials.extend(batch_partials),
                Err(e) => {
                    bar.abandon_with_message("failed");
                    log::error!("{}: aborting run: {}", stage, e);
                    return Err(e);
                }
            }
        }
        bar.finish_and_clear();

        let mut merged = P::default();
        for partial in partials {
            merged.merge(partial);
        }
        Ok(merged)
    }

    fn progress_bar(&self, stage: &str, total: usize) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(stage.to_string());
        pb
    }
}

/// Run one job, turning a panic into [`Error::WorkerFailure`].
fn run_isolated<P>(input: &Path, f: impl FnOnce() -> Result<P>) -> Result<P> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "worker panicked".to_string());
            Err(Error::worker(input.display().to_string(), reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::AliasObservationSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default, PartialEq)]
    struct Count(u64);

    impl Merge for Count {
        fn merge(&mut self, other: Self) {
            self.0 += other.0;
        }
    }

    fn inputs(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("part_{}.jsonl", i))).collect()
    }

    #[test]
    fn merges_every_partial() {
        let exec = ParallelExecutor::new(3).unwrap().with_in_flight_per_worker(1);
        let total: Count = exec
            .run("test", &inputs(10), |i, _| Ok(Count(i as u64 + 1)))
            .unwrap();
        assert_eq!(total, Count(55));
    }

    #[test]
    fn observation_sets_union() {
        let exec = ParallelExecutor::new(2).unwrap();
        let merged: AliasObservationSet = exec
            .run("test", &inputs(4), |i, _| {
                Ok(["shared".to_string(), format!("alias{}", i)].into_iter().collect())
            })
            .unwrap();
        assert_eq!(merged.len(), 5);
    }

    #[test]
    fn first_error_aborts_run() {
        let exec = ParallelExecutor::new(2).unwrap().with_in_flight_per_worker(1);
        let started = AtomicUsize::new(0);
        let result: Result<Count> = exec.run("test", &inputs(8), |i, _| {
            started.fetch_add(1, Ordering::SeqCst);
            if i == 1 {
                Err(Error::integrity("bad index"))
            } else {
                Ok(Count(1))
            }
        });
        assert!(matches!(result, Err(Error::Integrity(_))));
        // The failing batch is the first one; later batches never start.
        assert!(started.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn panic_becomes_worker_failure() {
        let exec = ParallelExecutor::new(2).unwrap();
        let result: Result<Count> = exec.run("test", &inputs(3), |i, _| {
            if i == 2 {
                panic!("boom");
            }
            Ok(Count(1))
        });
        match result {
            Err(Error::WorkerFailure { input, reason }) => {
                assert_eq!(input, "part_2.jsonl");
                assert_eq!(reason, "boom");
            }
            other => panic!("expected worker failure, got {:?}", other),
        }
    }

    #[test]
    fn zero_workers_rejected() {
        assert!(matches!(ParallelExecutor::new(0), Err(Error::Config(_))));
    }

    #[test]
    fn empty_input_yields_default() {
        let exec = ParallelExecutor::new(1).unwrap();
        let total: Count = exec.run("test", &[], |_, _| Ok(Count(1))).unwrap();
        assert_eq!(total, Count(0));
    }
}

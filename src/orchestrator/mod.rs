//! Drives extraction across all discovered targets and folds the results.
//!
//! Workers never share mutable state: each one extracts and persists its own
//! target and hands back a [`TargetReport`]. A single aggregator, the
//! [`HarvestOrchestrator::run`] future itself, folds those reports into
//! [`RunStatistics`] as they arrive.

use std::sync::Arc;

use camino::Utf8PathBuf;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

use crate::channel::CommandChannel;
use crate::error::{HarvestError, TargetFailure};
use crate::extract::{ExtractionOutcome, Extractor};
use crate::persist::{OutcomeSink, PersistReport};
use crate::target::Target;

/// Everything one worker learnt about its target.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TargetReport {
    /// Target after the pipeline, with hostname and readiness filled in.
    pub target: Target,
    /// Extraction result.
    pub outcome: ExtractionOutcome,
    /// Persistence result.
    pub persisted: PersistReport,
}

impl TargetReport {
    /// A target succeeds when at least one of its files was saved.
    #[must_use]
    pub const fn is_successful(&self) -> bool {
        !self.persisted.saved.is_empty()
    }

    /// Extraction and persistence failures, in the order they happened.
    pub fn failures(&self) -> impl Iterator<Item = &TargetFailure> {
        self.outcome
            .failures
            .iter()
            .chain(self.persisted.failures.iter())
    }
}

/// Aggregate counters for a run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RunStatistics {
    /// Targets returned by discovery.
    pub instances_found: usize,
    /// Targets whose worker finished, successfully or not.
    pub instances_processed: usize,
    /// Targets with at least one saved file.
    pub instances_successful: usize,
    /// Files retrieved across all targets.
    pub files_extracted: usize,
    /// Diagnostics in the order they were folded.
    pub errors: Vec<String>,
    /// Saved files relative to the backup root.
    pub extracted_files: Vec<Utf8PathBuf>,
}

impl RunStatistics {
    /// Creates empty statistics for `found` targets.
    #[must_use]
    pub fn new(found: usize) -> Self {
        Self {
            instances_found: found,
            ..Self::default()
        }
    }

    /// Folds one finished target into the counters.
    pub fn record(&mut self, report: &TargetReport) {
        self.instances_processed += 1;
        self.files_extracted += report.outcome.file_count();
        if report.is_successful() {
            self.instances_successful += 1;
        }
        self.errors
            .extend(report.failures().map(ToString::to_string));
        self.extracted_files
            .extend(report.persisted.saved.iter().cloned());
    }

    fn record_crash(&mut self, err: &JoinError) {
        tracing::error!(error = %err, "worker aborted");
        self.instances_processed += 1;
        self.errors.push(format!("worker aborted: {err}"));
    }

    fn fold(&mut self, joined: Result<TargetReport, JoinError>) {
        match joined {
            Ok(report) => self.record(&report),
            Err(err) => self.record_crash(&err),
        }
    }
}

struct TargetWorker<C, S> {
    extractor: Extractor<C>,
    sink: S,
}

impl<C: CommandChannel, S: OutcomeSink> TargetWorker<C, S> {
    async fn process(&self, mut target: Target) -> TargetReport {
        let outcome = self.extractor.extract(&mut target).await;
        let persisted = self.sink.persist(&target, &outcome);
        let report = TargetReport {
            target,
            outcome,
            persisted,
        };

        if report.is_successful() {
            tracing::info!(
                host = %report.target.name,
                files = report.persisted.saved.len(),
                "completed"
            );
        } else if report.outcome.is_empty() {
            tracing::warn!(host = %report.target.name, "no files extracted");
        } else {
            tracing::error!(host = %report.target.name, "no files saved");
        }
        report
    }
}

/// Runs the extraction pipeline over many targets with bounded parallelism.
pub struct HarvestOrchestrator<C, S> {
    worker: Arc<TargetWorker<C, S>>,
}

impl<C, S> HarvestOrchestrator<C, S>
where
    C: CommandChannel + 'static,
    S: OutcomeSink + 'static,
{
    /// Creates an orchestrator that extracts with `extractor` and stores
    /// outcomes in `sink`.
    #[must_use]
    pub fn new(extractor: Extractor<C>, sink: S) -> Self {
        Self {
            worker: Arc::new(TargetWorker { extractor, sink }),
        }
    }

    /// Processes every target and returns the folded statistics.
    ///
    /// With `concurrency <= 1` targets run strictly one after another in
    /// discovery order. Otherwise at most `concurrency` workers run at once
    /// and reports are folded in completion order.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::NoTargets`] when `targets` is empty.
    pub async fn run(
        &self,
        targets: Vec<Target>,
        concurrency: usize,
    ) -> Result<RunStatistics, HarvestError> {
        if targets.is_empty() {
            return Err(HarvestError::NoTargets);
        }

        let mut stats = RunStatistics::new(targets.len());
        if concurrency <= 1 {
            tracing::info!("processing targets sequentially");
            self.run_sequential(targets, &mut stats).await;
        } else {
            tracing::info!(workers = concurrency, "processing targets concurrently");
            self.run_concurrent(targets, concurrency, &mut stats).await;
        }
        Ok(stats)
    }

    async fn run_sequential(&self, targets: Vec<Target>, stats: &mut RunStatistics) {
        let total = targets.len();
        for (index, target) in targets.into_iter().enumerate() {
            tracing::info!(position = index + 1, total, host = %target.name, "processing");
            let worker = Arc::clone(&self.worker);
            stats.fold(tokio::spawn(async move { worker.process(target).await }).await);
        }
    }

    async fn run_concurrent(
        &self,
        targets: Vec<Target>,
        concurrency: usize,
        stats: &mut RunStatistics,
    ) {
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut workers = JoinSet::new();

        for target in targets {
            while let Some(joined) = workers.try_join_next() {
                stats.fold(joined);
            }
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                tracing::error!("worker pool closed before all targets were scheduled");
                break;
            };
            let worker = Arc::clone(&self.worker);
            workers.spawn(async move {
                let report = worker.process(target).await;
                drop(permit);
                report
            });
        }

        while let Some(joined) = workers.join_next().await {
            stats.fold(joined);
        }
    }
}

#[cfg(test)]
mod tests;

//! Final run report.

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};

use crate::orchestrator::RunStatistics;

/// Overall outcome of a run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Verdict {
    /// Every discovered target succeeded.
    Complete,
    /// Some, but not all, targets succeeded.
    Partial,
    /// No target succeeded.
    Failed,
}

impl Verdict {
    /// Classifies `stats`.
    #[must_use]
    pub const fn of(stats: &RunStatistics) -> Self {
        if stats.instances_successful == 0 {
            Self::Failed
        } else if stats.instances_successful >= stats.instances_found {
            Self::Complete
        } else {
            Self::Partial
        }
    }
}

/// Success rate in tenths of a percent, rounded half up.
///
/// Nothing found counts as a rate of zero.
#[must_use]
pub fn success_rate_tenths(stats: &RunStatistics) -> usize {
    let found = stats.instances_found.max(1);
    stats
        .instances_successful
        .saturating_mul(2000)
        .saturating_add(found)
        .checked_div(found.saturating_mul(2))
        .unwrap_or_default()
}

/// Success rate as a percentage with one decimal place.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SuccessRate(usize);

impl SuccessRate {
    /// Computes the rate for `stats`.
    #[must_use]
    pub fn of(stats: &RunStatistics) -> Self {
        Self(success_rate_tenths(stats))
    }
}

impl fmt::Display for SuccessRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0.checked_div(10).unwrap_or_default();
        let tenth = self.0.checked_rem(10).unwrap_or_default();
        write!(f, "{whole}.{tenth}%")
    }
}

/// Saved files in a stable order for display.
#[must_use]
pub fn sorted_files(stats: &RunStatistics) -> Vec<&Utf8PathBuf> {
    let mut files: Vec<&Utf8PathBuf> = stats.extracted_files.iter().collect();
    files.sort();
    files
}

/// Logs the final report.
pub fn log_report(stats: &RunStatistics, backup_root: &Utf8Path) {
    tracing::info!("==================================================");
    tracing::info!("FINAL REPORT");
    tracing::info!("==================================================");
    tracing::info!("Instances found: {}", stats.instances_found);
    tracing::info!("Instances processed: {}", stats.instances_processed);
    tracing::info!("Instances successful: {}", stats.instances_successful);
    tracing::info!("Files extracted: {}", stats.files_extracted);
    tracing::info!("Backup directory: {backup_root}");

    if !stats.errors.is_empty() {
        tracing::warn!("Errors encountered: {}", stats.errors.len());
        for error in &stats.errors {
            tracing::warn!("  - {error}");
        }
    }

    if stats.instances_successful > 0 {
        tracing::info!("Extracted files:");
        for file in sorted_files(stats) {
            tracing::info!("  {file}");
        }
    }

    tracing::info!("Success rate: {}", SuccessRate::of(stats));
    match Verdict::of(stats) {
        Verdict::Complete => tracing::info!("Extraction completed successfully"),
        Verdict::Partial => tracing::warn!("Extraction completed with some failures"),
        Verdict::Failed => tracing::error!("Extraction failed completely"),
    }
}

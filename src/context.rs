//! Per-run context: the start timestamp and the paths derived from it.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDateTime;

/// `strftime` pattern used in backup and log names.
pub const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Values fixed at the start of a run and shared by every component.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunContext {
    /// Local time at which the run started.
    pub started_at: NaiveDateTime,
    /// `started_at` rendered with [`STAMP_FORMAT`].
    pub stamp: String,
    /// Directory receiving this run's backups.
    pub backup_root: Utf8PathBuf,
    /// Log file for this run.
    pub log_file: Utf8PathBuf,
}

impl RunContext {
    /// Derives the run paths from the configured roots and the start time.
    #[must_use]
    pub fn new(output_root: &Utf8Path, log_dir: &Utf8Path, started_at: NaiveDateTime) -> Self {
        let stamp = started_at.format(STAMP_FORMAT).to_string();
        Self {
            started_at,
            backup_root: output_root.join(format!("config_backups_{stamp}")),
            log_file: log_dir.join(format!("extract_appsettings_{stamp}.log")),
            stamp,
        }
    }

    /// Context for a run starting now.
    #[must_use]
    pub fn starting_now(output_root: &Utf8Path, log_dir: &Utf8Path) -> Self {
        Self::new(output_root, log_dir, chrono::Local::now().naive_local())
    }
}

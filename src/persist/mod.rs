//! Local persistence of extracted files beneath a per-run backup root.
//!
//! Each target with at least one retrieved file gets its own directory
//! holding the files verbatim plus a `metadata.json` record. Directories are
//! claimed with an exclusive `create_dir`, so two targets sharing a display
//! name never write into the same place: the second falls back to
//! `<name>__<instance id>`.

use std::io;
use std::net::IpAddr;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde::Serialize;

use crate::error::{HarvestError, TargetFailure};
use crate::extract::{BASE_FILE_NAME, ExtractionOutcome, UNKNOWN_HOSTNAME};
use crate::target::{InstanceId, ReadinessStatus, Target};

/// Name of the per-target metadata record.
pub const METADATA_FILE: &str = "metadata.json";

/// What a sink did with one target's outcome.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PersistReport {
    /// Directory claimed for the target, relative to the backup root.
    pub directory: Option<Utf8PathBuf>,
    /// Saved files relative to the backup root, in candidate order.
    pub saved: Vec<Utf8PathBuf>,
    /// Files or records that could not be written.
    pub failures: Vec<TargetFailure>,
}

/// Destination for extraction outcomes.
pub trait OutcomeSink: Send + Sync {
    /// Stores `outcome` for `target`. Outcomes without files are ignored.
    fn persist(&self, target: &Target, outcome: &ExtractionOutcome) -> PersistReport;
}

#[derive(Debug, Serialize)]
struct Metadata<'a> {
    instance_id: &'a InstanceId,
    instance_name: &'a str,
    hostname: &'a str,
    private_ip: Option<IpAddr>,
    public_ip: Option<IpAddr>,
    target_path: &'a str,
    extraction_date: String,
    files_extracted: Vec<&'a str>,
    files_count: usize,
    ssm_status: ReadinessStatus,
}

/// Writes outcomes to `<root>/<target dir>/`.
#[derive(Debug)]
pub struct BackupWriter {
    root: Utf8PathBuf,
    dir: Dir,
    target_path: String,
}

impl BackupWriter {
    /// Creates `root` (and its parents) and opens it for writing.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Backup`] when the directory cannot be created
    /// or opened.
    pub fn create(root: &Utf8Path, target_path: impl Into<String>) -> Result<Self, HarvestError> {
        let backup_error = |err: io::Error| HarvestError::Backup {
            path: root.to_path_buf(),
            message: err.to_string(),
        };
        Dir::create_ambient_dir_all(root, ambient_authority()).map_err(backup_error)?;
        let dir = Dir::open_ambient_dir(root, ambient_authority()).map_err(backup_error)?;
        Ok(Self {
            root: root.to_path_buf(),
            dir,
            target_path: target_path.into(),
        })
    }

    /// Returns the backup root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn claim_directory(&self, target: &Target) -> io::Result<Utf8PathBuf> {
        let preferred = sanitise_name(&target.name, &target.instance_id);
        match self.dir.create_dir(&preferred) {
            Ok(()) => return Ok(Utf8PathBuf::from(preferred)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
            Err(err) => return Err(err),
        }

        let fallback = format!(
            "{preferred}__{}",
            sanitise_name(&target.instance_id, &target.instance_id)
        );
        tracing::debug!(host = %target.name, directory = %fallback, "name already claimed");
        match self.dir.create_dir(&fallback) {
            Ok(()) => Ok(Utf8PathBuf::from(fallback)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                Ok(Utf8PathBuf::from(fallback))
            }
            Err(err) => Err(err),
        }
    }

    fn write_metadata(
        &self,
        directory: &Utf8Path,
        target: &Target,
        saved: &[Utf8PathBuf],
    ) -> Result<(), String> {
        let record = Metadata {
            instance_id: &target.instance_id,
            instance_name: &target.name,
            hostname: target.hostname.as_deref().unwrap_or(UNKNOWN_HOSTNAME),
            private_ip: target.private_ip,
            public_ip: target.public_ip,
            target_path: &self.target_path,
            extraction_date: chrono::Local::now().to_rfc3339(),
            files_extracted: saved.iter().filter_map(|path| path.file_name()).collect(),
            files_count: saved.len(),
            ssm_status: target.status,
        };
        let rendered = serde_json::to_string_pretty(&record).map_err(|err| err.to_string())?;
        self.dir
            .write(directory.join(METADATA_FILE), rendered)
            .map_err(|err| err.to_string())
    }
}

impl OutcomeSink for BackupWriter {
    fn persist(&self, target: &Target, outcome: &ExtractionOutcome) -> PersistReport {
        if outcome.is_empty() {
            return PersistReport::default();
        }

        let directory = match self.claim_directory(target) {
            Ok(directory) => directory,
            Err(err) => {
                tracing::error!(host = %target.name, error = %err, "cannot create target directory");
                return PersistReport {
                    directory: None,
                    saved: Vec::new(),
                    failures: vec![TargetFailure::Persistence {
                        target: target.name.clone(),
                        path: Utf8PathBuf::from(sanitise_name(&target.name, &target.instance_id)),
                        message: err.to_string(),
                    }],
                };
            }
        };

        let mut report = PersistReport {
            directory: Some(directory.clone()),
            ..PersistReport::default()
        };

        for file in &outcome.files {
            let relative = directory.join(sanitise_name(&file.name, BASE_FILE_NAME));
            match self.dir.write(&relative, &file.content) {
                Ok(()) => {
                    tracing::debug!(host = %target.name, path = %relative, "saved");
                    report.saved.push(relative);
                }
                Err(err) => {
                    tracing::error!(host = %target.name, path = %relative, error = %err, "save failed");
                    report.failures.push(TargetFailure::Persistence {
                        target: target.name.clone(),
                        path: relative,
                        message: err.to_string(),
                    });
                }
            }
        }

        if let Err(message) = self.write_metadata(&directory, target, &report.saved) {
            tracing::error!(host = %target.name, error = %message, "metadata not saved");
            report.failures.push(TargetFailure::Persistence {
                target: target.name.clone(),
                path: directory.join(METADATA_FILE),
                message,
            });
            return report;
        }

        tracing::info!(host = %target.name, directory = %directory, "metadata saved");
        report
    }
}

/// Maps a display name onto a single safe path component.
///
/// Anything outside `[A-Za-z0-9._-]` becomes `_`. Names that would still be
/// empty or consist only of dots fall back to `fallback`.
#[must_use]
pub fn sanitise_name(name: &str, fallback: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.chars().all(|ch| ch == '.') {
        if fallback == name {
            return String::from("_");
        }
        return sanitise_name(fallback, fallback);
    }
    cleaned
}

//! Configuration loading via `ortho-config`.

use std::ffi::OsString;
use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::extract::ExtractionSettings;
use crate::ssm::{AwsCliSettings, DEFAULT_AWS_BIN};

/// Remote directory searched when none is configured.
pub const DEFAULT_TARGET_PATH: &str = "D:\\Sites\\Api";
/// Name filter applied when none is configured.
pub const DEFAULT_NAME_FILTER: &str = "SI2";
/// Profile used when none is configured.
pub const DEFAULT_PROFILE: &str = "default";
/// Directory receiving log files when none is configured.
pub const DEFAULT_LOG_DIR: &str = "logs";

const APP_NAME: &str = "ssm-harvest";
const CONFIG_FILE: &str = "ssm-harvest.toml";

/// Harvest settings layered from defaults, configuration files, and
/// `SSM_HARVEST_*` environment variables. CLI flags are applied on top by the
/// binary.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "SSM_HARVEST",
    discovery(
        app_name = "ssm-harvest",
        env_var = "SSM_HARVEST_CONFIG_PATH",
        config_file_name = "ssm-harvest.toml",
        dotfile_name = ".ssm-harvest.toml",
        project_file_name = "ssm-harvest.toml"
    )
)]
pub struct HarvestConfig {
    /// Path to the `aws` executable.
    #[ortho_config(default = DEFAULT_AWS_BIN.to_owned())]
    pub aws_bin: String,
    /// AWS named profile. An empty value defers to the CLI's own resolution.
    #[ortho_config(default = DEFAULT_PROFILE.to_owned())]
    pub profile: String,
    /// AWS region; the profile's region applies when unset.
    pub region: Option<String>,
    /// Substring matched against instance `Name` tags.
    #[ortho_config(default = DEFAULT_NAME_FILTER.to_owned())]
    pub name_filter: String,
    /// Remote directory holding the configuration files.
    #[ortho_config(default = DEFAULT_TARGET_PATH.to_owned())]
    pub target_path: String,
    /// Number of targets processed at once.
    #[ortho_config(default = 3)]
    pub concurrency: usize,
    /// Directory under which the per-run backup directory is created.
    #[ortho_config(default = ".".to_owned())]
    pub output_root: String,
    /// Directory receiving the per-run log file.
    #[ortho_config(default = DEFAULT_LOG_DIR.to_owned())]
    pub log_dir: String,
    /// Wait budget for the hostname and directory checks, in seconds.
    #[ortho_config(default = 30)]
    pub command_timeout_secs: u64,
    /// Wait budget for each file fetch, in seconds.
    #[ortho_config(default = 60)]
    pub file_timeout_secs: u64,
    /// Delay between submitting a command and the first poll, in milliseconds.
    #[ortho_config(default = 3000)]
    pub poll_initial_delay_millis: u64,
    /// Delay between polls, in milliseconds.
    #[ortho_config(default = 2000)]
    pub poll_interval_millis: u64,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
    flag: Option<&'static str>,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
            flag: None,
        }
    }

    /// Names the command-line flag that also supplies this field.
    #[must_use]
    const fn with_flag(mut self, flag: &'static str) -> Self {
        self.flag = Some(flag);
        self
    }

    fn hint(&self) -> String {
        let sources = format!(
            "set {} or add {} to {CONFIG_FILE}",
            self.env_var, self.toml_key
        );
        match self.flag {
            Some(flag) => format!("pass {flag}, {sources}"),
            None => sources,
        }
    }
}

impl HarvestConfig {
    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from(APP_NAME)])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: {}",
                metadata.description,
                metadata.hint()
            )));
        }
        Ok(())
    }

    fn require_positive(value: u64, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(ConfigError::Invalid(format!(
                "{} must be at least 1: {}",
                metadata.description,
                metadata.hint()
            )));
        }
        Ok(())
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and configuration key that supply the offending value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required value is empty and
    /// [`ConfigError::Invalid`] when a numeric value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.aws_bin,
            &FieldMetadata::new("AWS CLI binary", "SSM_HARVEST_AWS_BIN", "aws_bin"),
        )?;
        Self::require_field(
            &self.name_filter,
            &FieldMetadata::new("instance name filter", "SSM_HARVEST_NAME_FILTER", "name_filter")
                .with_flag("--filter"),
        )?;
        Self::require_field(
            &self.target_path,
            &FieldMetadata::new("remote target path", "SSM_HARVEST_TARGET_PATH", "target_path")
                .with_flag("--target"),
        )?;
        Self::require_field(
            &self.output_root,
            &FieldMetadata::new("output directory", "SSM_HARVEST_OUTPUT_ROOT", "output_root")
                .with_flag("--output-dir"),
        )?;
        Self::require_field(
            &self.log_dir,
            &FieldMetadata::new("log directory", "SSM_HARVEST_LOG_DIR", "log_dir"),
        )?;
        Self::require_positive(
            u64::try_from(self.concurrency).unwrap_or(u64::MAX),
            &FieldMetadata::new("concurrency", "SSM_HARVEST_CONCURRENCY", "concurrency")
                .with_flag("--concurrent"),
        )?;
        Self::require_positive(
            self.command_timeout_secs,
            &FieldMetadata::new(
                "command timeout",
                "SSM_HARVEST_COMMAND_TIMEOUT_SECS",
                "command_timeout_secs",
            ),
        )?;
        Self::require_positive(
            self.file_timeout_secs,
            &FieldMetadata::new(
                "file timeout",
                "SSM_HARVEST_FILE_TIMEOUT_SECS",
                "file_timeout_secs",
            ),
        )?;
        Self::require_positive(
            self.poll_interval_millis,
            &FieldMetadata::new(
                "poll interval",
                "SSM_HARVEST_POLL_INTERVAL_MILLIS",
                "poll_interval_millis",
            ),
        )?;
        Ok(())
    }

    /// Settings for the `aws` executable.
    #[must_use]
    pub fn aws_settings(&self) -> AwsCliSettings {
        AwsCliSettings {
            aws_bin: self.aws_bin.clone(),
            profile: non_blank(&self.profile),
            region: self.region.as_deref().and_then(non_blank),
        }
    }

    /// Settings for the extraction pipeline.
    #[must_use]
    pub fn extraction_settings(&self) -> ExtractionSettings {
        ExtractionSettings {
            target_path: self.target_path.clone(),
            command_timeout: Duration::from_secs(self.command_timeout_secs),
            file_timeout: Duration::from_secs(self.file_timeout_secs),
        }
    }

    /// Delay before the first poll of a submitted command.
    #[must_use]
    pub const fn poll_initial_delay(&self) -> Duration {
        Duration::from_millis(self.poll_initial_delay_millis)
    }

    /// Delay between polls.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_millis)
    }

    /// Output root as a path.
    #[must_use]
    pub fn output_root_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(&self.output_root)
    }

    /// Log directory as a path.
    #[must_use]
    pub fn log_dir_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(&self.log_dir)
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configuration value is out of range.
    #[error("invalid configuration value: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

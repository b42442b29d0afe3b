//! Command-line interface definitions for the `ssm-harvest` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Extract `appsettings.json` files from Windows EC2 instances through AWS
/// Systems Manager.
///
/// Flags override values from `ssm-harvest.toml` and `SSM_HARVEST_*`
/// environment variables.
#[derive(Debug, Default, Parser)]
#[command(
    name = "ssm-harvest",
    version,
    about = "Extract appsettings.json files from Windows EC2 instances via AWS Systems Manager",
    after_help = concat!(
        "Examples:\n",
        "  ssm-harvest\n",
        "  ssm-harvest --profile prod --filter SI2\n",
        "  ssm-harvest --target 'C:\\Apps\\Config' --concurrent 5 --verbose"
    )
)]
pub(crate) struct Cli {
    /// AWS profile to use (default: `default`).
    #[arg(short = 'p', long, value_name = "PROFILE")]
    pub(crate) profile: Option<String>,
    /// AWS region; the profile's region applies when omitted.
    #[arg(long, value_name = "REGION")]
    pub(crate) region: Option<String>,
    /// Substring matched against instance `Name` tags (default: `SI2`).
    #[arg(short = 'f', long, value_name = "TEXT")]
    pub(crate) filter: Option<String>,
    /// Remote directory holding the files (default: `D:\Sites\Api`).
    #[arg(short = 't', long, value_name = "PATH")]
    pub(crate) target: Option<String>,
    /// Number of instances processed at once (default: 3).
    #[arg(short = 'c', long, value_name = "N")]
    pub(crate) concurrent: Option<usize>,
    /// Directory under which the backup directory is created (default: `.`).
    #[arg(long, value_name = "DIR")]
    pub(crate) output_dir: Option<String>,
    /// Show debug output on the console.
    #[arg(short, long)]
    pub(crate) verbose: bool,
}

//! Binary entry point for the `ssm-harvest` CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;

use ssm_harvest::config::{ConfigError, HarvestConfig};
use ssm_harvest::{
    AwsCli, BackupWriter, CommandClient, CommandRunner, Extractor, HarvestError,
    HarvestOrchestrator, RunContext, TargetDiscovery, logging, report,
};

mod cli;

use cli::Cli;

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Harvest(#[from] HarvestError),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let exit_code = tokio::select! {
        result = run(cli) => match result {
            Ok(code) => code,
            Err(err) => {
                tracing::error!(error = %err, "run aborted");
                report_error(&err);
                1
            }
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted by user");
            writeln!(io::stderr(), "interrupted").ok();
            1
        }
    };

    process::exit(exit_code);
}

async fn run(cli: Cli) -> Result<i32, CliError> {
    let mut config = HarvestConfig::load_without_cli_args()?;
    apply_overrides(&mut config, &cli);
    config.validate()?;

    let context = RunContext::starting_now(&config.output_root_path(), &config.log_dir_path());
    logging::init(&context.log_file, cli.verbose)?;

    harvest(&config, &context, AwsCli::with_process_runner(config.aws_settings())).await
}

fn apply_overrides(config: &mut HarvestConfig, cli: &Cli) {
    if let Some(profile) = &cli.profile {
        config.profile.clone_from(profile);
    }
    if let Some(region) = &cli.region {
        config.region = Some(region.clone());
    }
    if let Some(filter) = &cli.filter {
        config.name_filter.clone_from(filter);
    }
    if let Some(target) = &cli.target {
        config.target_path.clone_from(target);
    }
    if let Some(concurrent) = cli.concurrent {
        config.concurrency = concurrent;
    }
    if let Some(output_dir) = &cli.output_dir {
        config.output_root.clone_from(output_dir);
    }
}

/// Runs discovery, extraction and reporting; returns the process exit code.
async fn harvest<R>(
    config: &HarvestConfig,
    context: &RunContext,
    aws: AwsCli<R>,
) -> Result<i32, CliError>
where
    R: CommandRunner + 'static,
{
    tracing::info!("starting appsettings.json extraction");
    tracing::info!(profile = %config.profile, filter = %config.name_filter, "settings");
    tracing::info!(backup = %context.backup_root, workers = config.concurrency, "output");
    tracing::debug!(log = %context.log_file, "log file");

    let identity = aws
        .caller_identity()
        .await
        .map_err(HarvestError::Transport)?;
    tracing::info!(account = %identity.account, arn = %identity.arn, "connected to AWS");

    tracing::info!(filter = %config.name_filter, "searching Windows instances");
    let targets = aws
        .discover(&config.name_filter)
        .await
        .map_err(HarvestError::Discovery)?;
    tracing::info!(count = targets.len(), "instances found");
    for target in &targets {
        tracing::info!(
            host = %target.name,
            instance = %target.instance_id,
            private_ip = ?target.private_ip,
            "found"
        );
    }

    let writer = BackupWriter::create(&context.backup_root, config.target_path.clone())?;
    let client = CommandClient::new(aws)
        .with_initial_delay(config.poll_initial_delay())
        .with_poll_interval(config.poll_interval());
    let orchestrator =
        HarvestOrchestrator::new(Extractor::new(client, config.extraction_settings()), writer);

    let stats = orchestrator.run(targets, config.concurrency).await?;
    report::log_report(&stats, &context.backup_root);

    Ok(i32::from(stats.instances_successful == 0))
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;

//! Unit tests for the `ssm-harvest` CLI binary implementation.

use camino::Utf8Path;
use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::*;
use ssm_harvest::AwsCliSettings;
use ssm_harvest::test_support::ScriptedRunner;

const IDENTITY: &str = r#"{"Account":"123456789012","Arn":"arn:aws:iam::123456789012:user/ops"}"#;

#[fixture]
fn temp_root() -> TempDir {
    tempfile::tempdir().unwrap_or_else(|err| panic!("tempdir: {err}"))
}

fn config(root: &Utf8Path) -> HarvestConfig {
    HarvestConfig {
        aws_bin: String::from("aws"),
        profile: String::from("default"),
        region: None,
        name_filter: String::from("SI2"),
        target_path: String::from("D:\\Sites\\Api"),
        concurrency: 1,
        output_root: root.to_string(),
        log_dir: root.to_string(),
        command_timeout_secs: 5,
        file_timeout_secs: 5,
        poll_initial_delay_millis: 0,
        poll_interval_millis: 1,
    }
}

fn utf8_root(temp: &TempDir) -> &Utf8Path {
    Utf8Path::from_path(temp.path()).unwrap_or_else(|| panic!("utf-8 temp path"))
}

fn client(runner: &ScriptedRunner) -> AwsCli<ScriptedRunner> {
    AwsCli::new(AwsCliSettings::default(), runner.clone())
}

fn invocation(stdout: &str) -> String {
    serde_json::json!({
        "Status": "Success",
        "StandardOutputContent": stdout,
        "StandardErrorContent": "",
    })
    .to_string()
}

/// Queues the replies for one online host whose generic file exists.
fn script_single_host(runner: &ScriptedRunner) {
    runner.push_stdout(IDENTITY);
    runner.push_stdout(
        r#"{"Reservations":[{"Instances":[{"InstanceId":"i-1","PrivateIpAddress":"10.0.0.5","Tags":[{"Key":"Name","Value":"API-SI2-01"}]}]}]}"#,
    );
    runner.push_stdout(r#"{"InstanceInformationList":[{"InstanceId":"i-1","PingStatus":"Online"}]}"#);
    for (index, stdout) in ["WEB01\r\n", "True\r\n", "{\"Logging\":{}}", "FILE_NOT_FOUND\r\n"]
        .into_iter()
        .enumerate()
    {
        runner.push_stdout(format!(r#"{{"Command":{{"CommandId":"c-{index}"}}}}"#));
        runner.push_stdout(invocation(stdout));
    }
}

#[rstest]
#[tokio::test]
async fn harvest_saves_files_and_exits_zero(temp_root: TempDir) {
    let root = utf8_root(&temp_root);
    let cfg = config(root);
    let context = RunContext::starting_now(root, root);
    let runner = ScriptedRunner::new();
    script_single_host(&runner);

    let code = harvest(&cfg, &context, client(&runner))
        .await
        .unwrap_or_else(|err| panic!("harvest should succeed: {err}"));

    assert_eq!(code, 0);
    let saved = context.backup_root.join("API-SI2-01/appsettings.json");
    let content = std::fs::read_to_string(&saved).unwrap_or_else(|err| panic!("read {saved}: {err}"));
    assert_eq!(content, "{\"Logging\":{}}");
    assert!(context.backup_root.join("API-SI2-01/metadata.json").is_file());
    assert!(!context.backup_root.join("API-SI2-01/appsettings.WEB01.json").exists());
}

#[rstest]
#[tokio::test]
async fn credential_failure_is_fatal(temp_root: TempDir) {
    let root = utf8_root(&temp_root);
    let runner = ScriptedRunner::new();
    runner.push_failure(255, "Unable to locate credentials");

    let err = harvest(&config(root), &RunContext::starting_now(root, root), client(&runner))
        .await
        .expect_err("missing credentials should abort");

    assert!(
        matches!(err, CliError::Harvest(HarvestError::Transport(_))),
        "unexpected error: {err}"
    );
    assert_eq!(runner.invocations().len(), 1, "nothing after the identity check");
}

#[rstest]
#[tokio::test]
async fn no_matching_instances_is_a_failure(temp_root: TempDir) {
    let root = utf8_root(&temp_root);
    let runner = ScriptedRunner::new();
    runner.push_stdout(IDENTITY);
    runner.push_stdout(r#"{"Reservations":[]}"#);

    let err = harvest(&config(root), &RunContext::starting_now(root, root), client(&runner))
        .await
        .expect_err("an empty discovery should fail the run");

    assert!(
        matches!(err, CliError::Harvest(HarvestError::NoTargets)),
        "unexpected error: {err}"
    );
}

#[rstest]
#[tokio::test]
async fn offline_only_run_exits_one(temp_root: TempDir) {
    let root = utf8_root(&temp_root);
    let runner = ScriptedRunner::new();
    runner.push_stdout(IDENTITY);
    runner.push_stdout(r#"{"Reservations":[{"Instances":[{"InstanceId":"i-1"}]}]}"#);
    runner.push_stdout(r#"{"InstanceInformationList":[{"InstanceId":"i-1","PingStatus":"ConnectionLost"}]}"#);

    let code = harvest(&config(root), &RunContext::starting_now(root, root), client(&runner))
        .await
        .unwrap_or_else(|err| panic!("harvest should complete: {err}"));

    assert_eq!(code, 1);
    assert_eq!(runner.invocations().len(), 3, "no command may reach an offline host");
}

#[rstest]
fn flags_override_loaded_configuration(temp_root: TempDir) {
    let mut cfg = config(utf8_root(&temp_root));
    let cli = Cli {
        profile: Some(String::from("prod")),
        region: Some(String::from("sa-east-1")),
        filter: Some(String::from("WEB")),
        target: Some(String::from("C:\\Apps\\Config")),
        concurrent: Some(5),
        output_dir: Some(String::from("/srv/backups")),
        verbose: true,
    };

    apply_overrides(&mut cfg, &cli);

    assert_eq!(cfg.profile, "prod");
    assert_eq!(cfg.region.as_deref(), Some("sa-east-1"));
    assert_eq!(cfg.name_filter, "WEB");
    assert_eq!(cfg.target_path, "C:\\Apps\\Config");
    assert_eq!(cfg.concurrency, 5);
    assert_eq!(cfg.output_root, "/srv/backups");
}

#[rstest]
fn absent_flags_keep_configuration(temp_root: TempDir) {
    let original = config(utf8_root(&temp_root));
    let mut cfg = original.clone();

    apply_overrides(&mut cfg, &Cli::default());

    assert_eq!(cfg, original);
}

#[test]
fn cli_parses_short_flags() {
    let cli = Cli::try_parse_from(["ssm-harvest", "-p", "ops", "-f", "SI3", "-c", "1", "-v"])
        .unwrap_or_else(|err| panic!("flags should parse: {err}"));

    assert_eq!(cli.profile.as_deref(), Some("ops"));
    assert_eq!(cli.filter.as_deref(), Some("SI3"));
    assert_eq!(cli.concurrent, Some(1));
    assert!(cli.verbose);
}

#[test]
fn write_error_writes_cli_error() {
    let mut buf = Vec::new();
    write_error(&mut buf, &CliError::Harvest(HarvestError::NoTargets));
    let rendered = String::from_utf8(buf).unwrap_or_else(|err| panic!("utf8: {err}"));
    assert!(
        rendered.contains("no Windows instances matched the filter"),
        "rendered: {rendered}"
    );
}

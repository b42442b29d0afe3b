//! Unit tests for the run orchestrator.

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::*;
use crate::channel::{ChannelFuture, CommandChannel, Invocation};
use crate::command::CommandClient;
use crate::extract::ExtractionSettings;
use crate::persist::BackupWriter;
use crate::target::{CommandId, InstanceId, ReadinessStatus};
use crate::test_support::{PingReply, PollReply, ScriptedChannel};

#[fixture]
fn temp_root() -> TempDir {
    tempfile::tempdir().unwrap_or_else(|err| panic!("tempdir: {err}"))
}

fn extractor(channel: &ScriptedChannel) -> Extractor<ScriptedChannel> {
    let client = CommandClient::new(channel.clone())
        .with_initial_delay(Duration::ZERO)
        .with_poll_interval(Duration::from_millis(1));
    Extractor::new(
        client,
        ExtractionSettings {
            target_path: String::from("D:\\Sites\\Api"),
            command_timeout: Duration::from_millis(200),
            file_timeout: Duration::from_millis(200),
        },
    )
}

fn writer(temp: &TempDir) -> BackupWriter {
    let root = Utf8Path::from_path(temp.path())
        .unwrap_or_else(|| panic!("utf-8 temp path"))
        .join("backups");
    BackupWriter::create(&root, "D:\\Sites\\Api").unwrap_or_else(|err| panic!("writer: {err}"))
}

/// Online host with only the generic file present.
fn one_file_host(channel: &ScriptedChannel, id: &str, hostname: &str) {
    channel.set_online(id);
    channel.on_script(id, "COMPUTERNAME", vec![PollReply::success(hostname)]);
    channel.on_script(id, "Test-Path 'D:\\Sites\\Api'", vec![PollReply::success("True")]);
    channel.on_script(id, "appsettings.json'", vec![PollReply::success("{}")]);
    channel.on_script(id, "FILE_NOT_FOUND", vec![PollReply::success("FILE_NOT_FOUND")]);
}

fn targets(names: &[(&str, &str)]) -> Vec<Target> {
    names
        .iter()
        .map(|(id, name)| Target::new(*id, *name))
        .collect()
}

#[rstest]
#[case(1)]
#[case(3)]
#[tokio::test]
async fn two_of_three_targets_succeed(temp_root: TempDir, #[case] concurrency: usize) {
    let channel = ScriptedChannel::new();
    one_file_host(&channel, "i-1", "WEB01");
    one_file_host(&channel, "i-2", "WEB02");
    channel.set_ping("i-3", PingReply::Status(String::from("ConnectionLost")));
    let orchestrator = HarvestOrchestrator::new(extractor(&channel), writer(&temp_root));

    let stats = orchestrator
        .run(
            targets(&[("i-1", "API-1"), ("i-2", "API-2"), ("i-3", "API-3")]),
            concurrency,
        )
        .await
        .unwrap_or_else(|err| panic!("run should succeed: {err}"));

    assert_eq!(stats.instances_found, 3);
    assert_eq!(stats.instances_processed, 3);
    assert_eq!(stats.instances_successful, 2);
    assert_eq!(stats.files_extracted, 2);
    assert_eq!(stats.errors.len(), 1, "errors: {:?}", stats.errors);
    assert!(stats.errors.iter().all(|error| error.contains("API-3")));
    assert!(channel.submitted_to("i-3").is_empty());

    let mut saved = stats.extracted_files.clone();
    saved.sort();
    assert_eq!(
        saved,
        vec![
            Utf8PathBuf::from("API-1/appsettings.json"),
            Utf8PathBuf::from("API-2/appsettings.json"),
        ]
    );
}

#[rstest]
#[tokio::test]
async fn empty_target_list_is_a_run_failure(temp_root: TempDir) {
    let channel = ScriptedChannel::new();
    let orchestrator = HarvestOrchestrator::new(extractor(&channel), writer(&temp_root));

    let err = orchestrator
        .run(Vec::new(), 3)
        .await
        .expect_err("no targets should fail the run");

    assert!(matches!(err, HarvestError::NoTargets), "unexpected error: {err}");
    assert!(channel.submitted().is_empty());
}

#[rstest]
#[tokio::test]
async fn missing_directory_counts_as_processed_only(temp_root: TempDir) {
    let channel = ScriptedChannel::new();
    channel.set_online("i-1");
    channel.on_script("i-1", "COMPUTERNAME", vec![PollReply::success("WEB01")]);
    channel.on_script("i-1", "Test-Path 'D:\\Sites\\Api'", vec![PollReply::success("False")]);
    let orchestrator = HarvestOrchestrator::new(extractor(&channel), writer(&temp_root));

    let stats = orchestrator
        .run(targets(&[("i-1", "API-1")]), 1)
        .await
        .unwrap_or_else(|err| panic!("run should succeed: {err}"));

    assert_eq!(stats.instances_processed, 1);
    assert_eq!(stats.instances_successful, 0);
    assert_eq!(stats.files_extracted, 0);
    assert_eq!(stats.errors.len(), 1);
    assert!(stats.extracted_files.is_empty());
}

#[rstest]
#[tokio::test]
async fn sequential_mode_keeps_discovery_order(temp_root: TempDir) {
    let channel = ScriptedChannel::new();
    for id in ["i-1", "i-2", "i-3"] {
        channel.set_ping(id, PingReply::Unregistered);
    }
    let orchestrator = HarvestOrchestrator::new(extractor(&channel), writer(&temp_root));

    let stats = orchestrator
        .run(targets(&[("i-1", "A"), ("i-2", "B"), ("i-3", "C")]), 1)
        .await
        .unwrap_or_else(|err| panic!("run should succeed: {err}"));

    let owners: Vec<char> = stats
        .errors
        .iter()
        .filter_map(|error| error.chars().next())
        .collect();
    assert_eq!(owners, vec!['A', 'B', 'C']);
}

#[rstest]
#[case(2)]
#[case(4)]
#[case(16)]
#[tokio::test]
async fn counters_stay_consistent_under_concurrency(temp_root: TempDir, #[case] concurrency: usize) {
    let channel = ScriptedChannel::new();
    let mut all = Vec::new();
    for index in 0..8 {
        let id = format!("i-{index}");
        if matches!(index, 0 | 3 | 6) {
            channel.set_ping(id.as_str(), PingReply::Unregistered);
        } else {
            one_file_host(&channel, &id, &format!("WEB{index}"));
        }
        all.push(Target::new(id.as_str(), format!("API-{index}")));
    }
    let orchestrator = HarvestOrchestrator::new(extractor(&channel), writer(&temp_root));

    let stats = orchestrator
        .run(all, concurrency)
        .await
        .unwrap_or_else(|err| panic!("run should succeed: {err}"));

    assert_eq!(stats.instances_found, 8);
    assert_eq!(stats.instances_processed, 8);
    assert_eq!(stats.instances_successful, 5);
    assert!(stats.instances_successful <= stats.instances_processed);
    assert_eq!(stats.files_extracted, 5);
    assert_eq!(stats.extracted_files.len(), 5);
}

/// Channel whose ping takes a while and tracks how many pings overlap.
#[derive(Clone, Default)]
struct GaugeChannel {
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    submitted: Arc<AtomicUsize>,
}

impl CommandChannel for GaugeChannel {
    type Error = Infallible;

    fn ping_status<'a>(
        &'a self,
        _instance: &'a InstanceId,
    ) -> ChannelFuture<'a, Option<String>, Self::Error> {
        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst).saturating_add(1);
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Some(String::from("ConnectionLost")))
        })
    }

    fn send_command<'a>(
        &'a self,
        _instance: &'a InstanceId,
        _script: &'a str,
    ) -> ChannelFuture<'a, CommandId, Self::Error> {
        self.submitted.fetch_add(1, Ordering::SeqCst);
        Box::pin(std::future::ready(Ok(CommandId::new("unexpected"))))
    }

    fn invocation<'a>(
        &'a self,
        _instance: &'a InstanceId,
        _command: &'a CommandId,
    ) -> ChannelFuture<'a, Option<Invocation>, Self::Error> {
        Box::pin(std::future::ready(Ok(None)))
    }
}

#[rstest]
#[case(1, 1)]
#[case(2, 2)]
#[case(3, 3)]
#[case(16, 8)]
#[tokio::test]
async fn workers_never_exceed_the_concurrency_bound(
    temp_root: TempDir,
    #[case] concurrency: usize,
    #[case] expected_peak: usize,
) {
    let channel = GaugeChannel::default();
    let client = CommandClient::new(channel.clone())
        .with_initial_delay(Duration::ZERO)
        .with_poll_interval(Duration::from_millis(1));
    let extractor = Extractor::new(
        client,
        ExtractionSettings {
            target_path: String::from("D:\\Sites\\Api"),
            command_timeout: Duration::from_millis(200),
            file_timeout: Duration::from_millis(200),
        },
    );
    let orchestrator = HarvestOrchestrator::new(extractor, writer(&temp_root));
    let all: Vec<Target> = (0..8)
        .map(|index| Target::new(format!("i-{index}").as_str(), format!("API-{index}")))
        .collect();

    let stats = orchestrator
        .run(all, concurrency)
        .await
        .unwrap_or_else(|err| panic!("run should succeed: {err}"));

    assert_eq!(stats.instances_processed, 8);
    assert_eq!(stats.instances_successful, 0);
    let peak = channel.peak.load(Ordering::SeqCst);
    assert!(peak <= concurrency, "peak {peak} exceeds bound {concurrency}");
    assert_eq!(peak, expected_peak);
    assert_eq!(channel.submitted.load(Ordering::SeqCst), 0);
}

struct PanickingSink;

impl OutcomeSink for PanickingSink {
    fn persist(&self, target: &Target, _outcome: &ExtractionOutcome) -> PersistReport {
        assert_ne!(target.name, "boom", "sink exploded");
        PersistReport::default()
    }
}

#[rstest]
#[case(1)]
#[case(2)]
#[tokio::test]
async fn panicking_worker_is_counted_and_run_continues(#[case] concurrency: usize) {
    let channel = ScriptedChannel::new();
    channel.set_ping("i-1", PingReply::Unregistered);
    channel.set_ping("i-2", PingReply::Unregistered);
    let orchestrator = HarvestOrchestrator::new(extractor(&channel), PanickingSink);

    let stats = orchestrator
        .run(targets(&[("i-1", "boom"), ("i-2", "fine")]), concurrency)
        .await
        .unwrap_or_else(|err| panic!("run should succeed: {err}"));

    assert_eq!(stats.instances_processed, 2);
    assert_eq!(stats.instances_successful, 0);
    assert!(
        stats.errors.iter().any(|error| error.starts_with("worker aborted")),
        "errors: {:?}",
        stats.errors
    );
}

#[test]
fn record_folds_outcome_and_sink_failures() {
    let mut target = Target::new("i-1", "API");
    target.status = ReadinessStatus::Online;
    let report = TargetReport {
        target,
        outcome: ExtractionOutcome {
            files: vec![crate::extract::ExtractedFile {
                name: String::from("appsettings.json"),
                content: String::from("{}"),
            }],
            status: crate::extract::ExtractionStatus::Completed,
            failures: vec![TargetFailure::RemoteCommand {
                target: String::from("API"),
                step: String::from("hostname"),
                diagnostic: String::from("busy"),
            }],
        },
        persisted: PersistReport {
            directory: Some(Utf8PathBuf::from("API")),
            saved: Vec::new(),
            failures: vec![TargetFailure::Persistence {
                target: String::from("API"),
                path: Utf8PathBuf::from("API/appsettings.json"),
                message: String::from("disk full"),
            }],
        },
    };
    let mut stats = RunStatistics::new(1);

    stats.record(&report);

    assert!(!report.is_successful());
    assert_eq!(stats.instances_processed, 1);
    assert_eq!(stats.instances_successful, 0);
    assert_eq!(stats.files_extracted, 1);
    assert_eq!(
        stats.errors,
        vec![
            String::from("API: hostname failed: busy"),
            String::from("API: failed to save API/appsettings.json: disk full"),
        ]
    );
}

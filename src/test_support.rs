//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::env;
use std::ffi::OsString;
use std::future::ready;
use std::sync::{Arc, Mutex, MutexGuard as StdMutexGuard};

use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

use crate::channel::{ChannelFuture, CommandChannel, Invocation, InvocationStatus};
use crate::runner::{CommandOutput, CommandRunner, RunnerError, RunnerFuture};
use crate::target::{CommandId, InstanceId};

fn lock<T>(mutex: &Mutex<T>) -> StdMutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|err| panic!("test double lock poisoned: {err}"))
}

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic `aws` replies without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Arc<Mutex<VecDeque<CommandOutput>>>,
    invocations: Arc<Mutex<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        lock(&self.invocations).clone()
    }

    /// Pushes a successful response carrying `stdout`.
    pub fn push_stdout(&self, stdout: impl Into<String>) {
        self.push_output(Some(0), stdout, "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32, stderr: impl Into<String>) {
        self.push_output(Some(code), "", stderr);
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        lock(&self.responses).push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run<'a>(&'a self, program: &'a str, args: &'a [OsString]) -> RunnerFuture<'a> {
        lock(&self.invocations).push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
        });
        let response = lock(&self.responses)
            .pop_front()
            .ok_or_else(|| RunnerError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            });
        Box::pin(ready(response))
    }
}

/// Error raised by [`ScriptedChannel`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{0}")]
pub struct ScriptedChannelError(pub String);

/// Reply to a readiness query.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PingReply {
    /// Agent registered with this ping status.
    Status(String),
    /// Agent not registered.
    Unregistered,
    /// The query fails with this message.
    Failure(String),
}

/// Reply to one poll of a submitted command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PollReply {
    /// The channel has not registered the invocation yet.
    NotVisible,
    /// Invocation visible with the given state.
    State(Invocation),
    /// The poll fails in transport.
    TransportError(String),
}

impl PollReply {
    /// Terminal success with `stdout`.
    #[must_use]
    pub fn success(stdout: impl Into<String>) -> Self {
        Self::finished(InvocationStatus::Success, stdout, "")
    }

    /// Terminal failure with `stderr`.
    #[must_use]
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self::finished(InvocationStatus::Failed, "", stderr)
    }

    /// Non-terminal `InProgress`.
    #[must_use]
    pub fn in_progress() -> Self {
        Self::finished(InvocationStatus::InProgress, "", "")
    }

    /// Invocation in an arbitrary state.
    #[must_use]
    pub fn finished(
        status: InvocationStatus,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::State(Invocation {
            status,
            stdout: stdout.into(),
            stderr: stderr.into(),
        })
    }
}

/// Script submitted through a [`ScriptedChannel`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubmittedScript {
    /// Target instance.
    pub instance: InstanceId,
    /// Script text.
    pub script: String,
}

#[derive(Clone, Debug)]
struct ScriptRule {
    instance: InstanceId,
    pattern: String,
    submit_error: Option<String>,
    polls: Vec<PollReply>,
}

#[derive(Debug, Default)]
struct ChannelState {
    pings: HashMap<InstanceId, PingReply>,
    rules: Vec<ScriptRule>,
    pending: HashMap<CommandId, VecDeque<PollReply>>,
    submitted: Vec<SubmittedScript>,
    next_id: u32,
}

/// Command channel double driven by per-instance scripted replies.
///
/// Rules are matched in registration order by instance and a substring of
/// the submitted script. The last poll reply of a rule repeats forever.
#[derive(Clone, Debug, Default)]
pub struct ScriptedChannel {
    state: Arc<Mutex<ChannelState>>,
}

impl ScriptedChannel {
    /// Creates a channel with no registered agents.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the readiness reply for `instance`.
    pub fn set_ping(&self, instance: impl Into<InstanceId>, reply: PingReply) {
        lock(&self.state).pings.insert(instance.into(), reply);
    }

    /// Marks `instance` as `Online`.
    pub fn set_online(&self, instance: impl Into<InstanceId>) {
        self.set_ping(instance, PingReply::Status(String::from("Online")));
    }

    /// Replies to scripts containing `pattern` with `polls` in order.
    pub fn on_script(
        &self,
        instance: impl Into<InstanceId>,
        pattern: impl Into<String>,
        polls: Vec<PollReply>,
    ) {
        lock(&self.state).rules.push(ScriptRule {
            instance: instance.into(),
            pattern: pattern.into(),
            submit_error: None,
            polls,
        });
    }

    /// Rejects submission of scripts containing `pattern`.
    pub fn fail_submit(
        &self,
        instance: impl Into<InstanceId>,
        pattern: impl Into<String>,
        message: impl Into<String>,
    ) {
        lock(&self.state).rules.push(ScriptRule {
            instance: instance.into(),
            pattern: pattern.into(),
            submit_error: Some(message.into()),
            polls: Vec::new(),
        });
    }

    /// Returns every script submitted so far.
    #[must_use]
    pub fn submitted(&self) -> Vec<SubmittedScript> {
        lock(&self.state).submitted.clone()
    }

    /// Returns the scripts submitted to `instance`.
    #[must_use]
    pub fn submitted_to(&self, instance: &str) -> Vec<String> {
        lock(&self.state)
            .submitted
            .iter()
            .filter(|entry| entry.instance.as_str() == instance)
            .map(|entry| entry.script.clone())
            .collect()
    }
}

impl CommandChannel for ScriptedChannel {
    type Error = ScriptedChannelError;

    fn ping_status<'a>(
        &'a self,
        instance: &'a InstanceId,
    ) -> ChannelFuture<'a, Option<String>, Self::Error> {
        let reply = lock(&self.state)
            .pings
            .get(instance)
            .cloned()
            .unwrap_or(PingReply::Unregistered);
        let result = match reply {
            PingReply::Status(status) => Ok(Some(status)),
            PingReply::Unregistered => Ok(None),
            PingReply::Failure(message) => Err(ScriptedChannelError(message)),
        };
        Box::pin(ready(result))
    }

    fn send_command<'a>(
        &'a self,
        instance: &'a InstanceId,
        script: &'a str,
    ) -> ChannelFuture<'a, CommandId, Self::Error> {
        let mut state = lock(&self.state);
        state.submitted.push(SubmittedScript {
            instance: instance.clone(),
            script: script.to_owned(),
        });
        let rule = state
            .rules
            .iter()
            .find(|rule| &rule.instance == instance && script.contains(&rule.pattern))
            .cloned();
        let result = match rule {
            Some(ScriptRule {
                submit_error: Some(message),
                ..
            }) => Err(ScriptedChannelError(message)),
            matched => {
                state.next_id += 1;
                let id = CommandId::new(format!("cmd-{}", state.next_id));
                let polls = matched.map_or_else(
                    || vec![PollReply::failed("no scripted reply")],
                    |found| found.polls,
                );
                state.pending.insert(id.clone(), VecDeque::from(polls));
                Ok(id)
            }
        };
        drop(state);
        Box::pin(ready(result))
    }

    fn invocation<'a>(
        &'a self,
        _instance: &'a InstanceId,
        command: &'a CommandId,
    ) -> ChannelFuture<'a, Option<Invocation>, Self::Error> {
        let mut state = lock(&self.state);
        let reply = state.pending.get_mut(command).and_then(|queue| {
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        });
        drop(state);
        let result = match reply {
            Some(PollReply::NotVisible) => Ok(None),
            Some(PollReply::State(invocation)) => Ok(Some(invocation)),
            Some(PollReply::TransportError(message)) => Err(ScriptedChannelError(message)),
            None => Err(ScriptedChannelError(format!("unknown command {command}"))),
        };
        Box::pin(ready(result))
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and cleans up variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}

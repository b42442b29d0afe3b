//! SSM Run Command as a [`CommandChannel`].

use std::ffi::OsString;

use crate::channel::{ChannelFuture, CommandChannel, Invocation, InvocationStatus};
use crate::runner::CommandRunner;
use crate::target::{CommandId, InstanceId};

use super::types::{CommandInvocation, DescribeInstanceInformation, SendCommand};
use super::{AwsCli, AwsError, POWERSHELL_DOCUMENT};

impl<R: CommandRunner> AwsCli<R> {
    async fn describe_ping_status(&self, instance: &InstanceId) -> Result<Option<String>, AwsError> {
        let filter = format!("key=InstanceIds,valueSet={instance}");
        let reply: DescribeInstanceInformation = self
            .call_json(
                &["ssm", "describe-instance-information"],
                vec![
                    OsString::from("--instance-information-filter-list"),
                    OsString::from(filter),
                ],
            )
            .await?;

        Ok(reply
            .instance_information_list
            .into_iter()
            .find(|info| info.instance_id == instance.as_str())
            .map(|info| info.ping_status))
    }

    async fn submit_script(&self, instance: &InstanceId, script: &str) -> Result<CommandId, AwsError> {
        let parameters = serde_json::json!({ "commands": [script] }).to_string();
        let reply: SendCommand = self
            .call_json(
                &["ssm", "send-command"],
                vec![
                    OsString::from("--instance-ids"),
                    OsString::from(instance.as_str()),
                    OsString::from("--document-name"),
                    OsString::from(POWERSHELL_DOCUMENT),
                    OsString::from("--parameters"),
                    OsString::from(parameters),
                ],
            )
            .await?;
        Ok(CommandId::from(reply.command.command_id))
    }

    async fn fetch_invocation(
        &self,
        instance: &InstanceId,
        command: &CommandId,
    ) -> Result<Option<Invocation>, AwsError> {
        let result: Result<CommandInvocation, AwsError> = self
            .call_json(
                &["ssm", "get-command-invocation"],
                vec![
                    OsString::from("--command-id"),
                    OsString::from(command.as_str()),
                    OsString::from("--instance-id"),
                    OsString::from(instance.as_str()),
                ],
            )
            .await;

        match result {
            Ok(reply) => Ok(Some(Invocation {
                status: InvocationStatus::parse(&reply.status),
                stdout: reply.standard_output_content,
                stderr: reply.standard_error_content,
            })),
            Err(AwsError::InvocationDoesNotExist) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

impl<R: CommandRunner> CommandChannel for AwsCli<R> {
    type Error = AwsError;

    fn ping_status<'a>(
        &'a self,
        instance: &'a InstanceId,
    ) -> ChannelFuture<'a, Option<String>, Self::Error> {
        Box::pin(self.describe_ping_status(instance))
    }

    fn send_command<'a>(
        &'a self,
        instance: &'a InstanceId,
        script: &'a str,
    ) -> ChannelFuture<'a, CommandId, Self::Error> {
        Box::pin(self.submit_script(instance, script))
    }

    fn invocation<'a>(
        &'a self,
        instance: &'a InstanceId,
        command: &'a CommandId,
    ) -> ChannelFuture<'a, Option<Invocation>, Self::Error> {
        Box::pin(self.fetch_invocation(instance, command))
    }
}

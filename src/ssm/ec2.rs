//! EC2 instance listing as a [`TargetDiscovery`].

use std::ffi::OsString;
use std::net::IpAddr;

use crate::channel::ChannelFuture;
use crate::discovery::{TargetDiscovery, UNNAMED_TARGET};
use crate::runner::CommandRunner;
use crate::target::Target;

use super::types::{DescribeInstances, Ec2Instance};
use super::{AwsCli, AwsError};

impl<R: CommandRunner> AwsCli<R> {
    async fn describe_windows_instances(&self, name_filter: &str) -> Result<Vec<Target>, AwsError> {
        let reply: DescribeInstances = self
            .call_json(
                &["ec2", "describe-instances"],
                vec![
                    OsString::from("--filters"),
                    OsString::from("Name=platform,Values=windows"),
                    OsString::from("Name=instance-state-name,Values=running"),
                    OsString::from(format!("Name=tag:Name,Values=*{name_filter}*")),
                ],
            )
            .await?;

        Ok(reply
            .reservations
            .into_iter()
            .flat_map(|reservation| reservation.instances)
            .map(to_target)
            .collect())
    }
}

fn to_target(instance: Ec2Instance) -> Target {
    let name = instance.name_tag().unwrap_or(UNNAMED_TARGET).to_owned();
    Target::new(instance.instance_id, name).with_addresses(
        parse_ip(instance.private_ip_address.as_deref()),
        parse_ip(instance.public_ip_address.as_deref()),
    )
}

fn parse_ip(raw: Option<&str>) -> Option<IpAddr> {
    raw.and_then(|value| value.parse().ok())
}

impl<R: CommandRunner> TargetDiscovery for AwsCli<R> {
    type Error = AwsError;

    fn discover<'a>(
        &'a self,
        name_filter: &'a str,
    ) -> ChannelFuture<'a, Vec<Target>, Self::Error> {
        Box::pin(self.describe_windows_instances(name_filter))
    }
}

//! Readiness check: is a target's agent reachable through the channel.

use crate::channel::CommandChannel;
use crate::target::{ReadinessStatus, Target};

const ONLINE: &str = "Online";

/// Queries the channel for the target's ping status and records it.
///
/// Returns `(true, Online)` only when the agent reports `Online`. Any other
/// reported status maps to `Offline`, an unregistered agent to `NotFound`,
/// and a failed query to `Error`.
pub async fn check_readiness<C: CommandChannel>(
    channel: &C,
    target: &mut Target,
) -> (bool, ReadinessStatus) {
    let status = match channel.ping_status(&target.instance_id).await {
        Ok(Some(ping)) if ping == ONLINE => {
            tracing::info!(host = %target.name, "SSM agent online");
            ReadinessStatus::Online
        }
        Ok(Some(ping)) => {
            tracing::warn!(host = %target.name, ping = %ping, "SSM agent not online");
            ReadinessStatus::Offline
        }
        Ok(None) => {
            tracing::warn!(host = %target.name, "instance not registered with SSM");
            ReadinessStatus::NotFound
        }
        Err(err) => {
            tracing::error!(host = %target.name, error = %err, "SSM readiness query failed");
            ReadinessStatus::Error
        }
    };

    target.status = status;
    (status.is_ready(), status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{PingReply, ScriptedChannel};
    use rstest::rstest;

    #[rstest]
    #[case(PingReply::Status(String::from("Online")), true, ReadinessStatus::Online)]
    #[case(PingReply::Status(String::from("ConnectionLost")), false, ReadinessStatus::Offline)]
    #[case(PingReply::Status(String::from("Inactive")), false, ReadinessStatus::Offline)]
    #[case(PingReply::Unregistered, false, ReadinessStatus::NotFound)]
    #[case(PingReply::Failure(String::from("throttled")), false, ReadinessStatus::Error)]
    #[tokio::test]
    async fn maps_ping_replies(
        #[case] reply: PingReply,
        #[case] ready: bool,
        #[case] expected: ReadinessStatus,
    ) {
        let channel = ScriptedChannel::new();
        channel.set_ping("i-1", reply);
        let mut target = Target::new("i-1", "WEB-SI2-01");

        let result = check_readiness(&channel, &mut target).await;

        assert_eq!(result, (ready, expected));
        assert_eq!(target.status, expected);
        assert!(channel.submitted().is_empty());
    }
}

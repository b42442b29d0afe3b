//! Target discovery: which remote hosts should be processed.

use crate::channel::ChannelFuture;
use crate::target::Target;

/// Name used when an instance carries no `Name` tag.
pub const UNNAMED_TARGET: &str = "Unknown";

/// Source of eligible targets: running Windows hosts whose name contains a
/// filter string.
pub trait TargetDiscovery: Send + Sync {
    /// Discovery specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns matching targets in provider order.
    fn discover<'a>(&'a self, name_filter: &'a str)
    -> ChannelFuture<'a, Vec<Target>, Self::Error>;
}

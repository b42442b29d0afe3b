//! Remote hosts eligible for extraction and the identifiers that name them.

use std::fmt;
use std::net::IpAddr;
use std::ops::Deref;

use serde::Serialize;

macro_rules! newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw identifier.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrows the raw identifier.
            #[must_use]
            pub const fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &Self::Target {
                self.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

newtype!(
    /// Provider identifier of a managed instance (for example `i-0abc`).
    InstanceId
);
newtype!(
    /// Identifier the command channel assigns to a submitted command.
    CommandId
);

/// Connectivity of a target's management agent as last observed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub enum ReadinessStatus {
    /// Not checked yet.
    #[default]
    Unknown,
    /// Agent reachable; commands may be submitted.
    Online,
    /// Agent registered but not currently reachable.
    Offline,
    /// Agent not registered with the channel at all.
    NotFound,
    /// The readiness query itself failed.
    Error,
}

impl ReadinessStatus {
    /// Returns `true` only for [`ReadinessStatus::Online`].
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Online)
    }
}

impl fmt::Display for ReadinessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unknown => "Unknown",
            Self::Online => "Online",
            Self::Offline => "Offline",
            Self::NotFound => "NotFound",
            Self::Error => "Error",
        };
        f.write_str(label)
    }
}

/// A remote Windows host discovered for extraction.
///
/// `hostname` and `status` start empty and are filled in by the extraction
/// pipeline; a target is only ever touched by the worker processing it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Target {
    /// Provider instance identifier.
    pub instance_id: InstanceId,
    /// Display name, taken from the `Name` tag.
    pub name: String,
    /// Private address, when the provider reports one.
    pub private_ip: Option<IpAddr>,
    /// Public address, when the provider reports one.
    pub public_ip: Option<IpAddr>,
    /// Hostname reported by the host itself.
    pub hostname: Option<String>,
    /// Last observed readiness.
    pub status: ReadinessStatus,
}

impl Target {
    /// Creates a target with no addresses and unknown readiness.
    #[must_use]
    pub fn new(instance_id: impl Into<InstanceId>, name: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            name: name.into(),
            private_ip: None,
            public_ip: None,
            hostname: None,
            status: ReadinessStatus::Unknown,
        }
    }

    /// Sets the network addresses.
    #[must_use]
    pub const fn with_addresses(
        mut self,
        private_ip: Option<IpAddr>,
        public_ip: Option<IpAddr>,
    ) -> Self {
        self.private_ip = private_ip;
        self.public_ip = public_ip;
        self
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.instance_id)
    }
}

//! Endpoint data model
//!
//! [`Endpoint`] is a plain value; [`EndpointSet`] is an immutable, versioned
//! snapshot of one target's members. Snapshots are shared as
//! `Arc<EndpointSet>` between the registry and every subscriber, so a
//! publication costs one allocation no matter how many watchers exist.

#[cfg(test)]
mod endpoint_test;

use std::collections::BTreeSet;
use std::fmt;
use std::time::SystemTime;

use serde::Deserialize;
use serde::Serialize;

/// One addressable member of a target.
///
/// Field order matters: the derived `Ord` sorts by hostname, then port, then
/// weight, which is the canonical member order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint {
    pub hostname: String,
    pub port: u16,
    /// Relative weight, 0 means unweighted
    #[serde(default)]
    pub weight: u32,
}

impl Endpoint {
    pub fn new(
        hostname: impl Into<String>,
        port: u16,
        weight: u32,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            port,
            weight,
        }
    }

    /// Whether `other` addresses the same host and port, ignoring weight
    pub fn same_address(
        &self,
        other: &Endpoint,
    ) -> bool {
        self.hostname == other.hostname && self.port == other.port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}:{}@{}", self.hostname, self.port, self.weight)
    }
}

/// Immutable snapshot of a target's resolved members.
#[derive(Debug, Clone)]
pub struct EndpointSet {
    target: String,
    members: BTreeSet<Endpoint>,
    version: u64,
    observed_at: SystemTime,
}

impl EndpointSet {
    /// Placeholder published on activation, before the first resolution.
    pub fn empty(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            members: BTreeSet::new(),
            version: 0,
            observed_at: SystemTime::now(),
        }
    }

    pub(crate) fn new(
        target: impl Into<String>,
        members: BTreeSet<Endpoint>,
        version: u64,
    ) -> Self {
        Self {
            target: target.into(),
            members,
            version,
            observed_at: SystemTime::now(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Members in canonical order
    pub fn members(&self) -> &BTreeSet<Endpoint> {
        &self.members
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn observed_at(&self) -> SystemTime {
        self.observed_at
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Structural comparison of member lists, ignoring version and timestamp
    pub fn same_members(
        &self,
        other: &EndpointSet,
    ) -> bool {
        self.members == other.members
    }
}

impl PartialEq for EndpointSet {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.target == other.target && self.version == other.version && self.members == other.members
    }
}

impl Eq for EndpointSet {}

impl fmt::Display for EndpointSet {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}@v{} [", self.target, self.version)?;
        for (i, member) in self.members.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{member}")?;
        }
        write!(f, "]")
    }
}

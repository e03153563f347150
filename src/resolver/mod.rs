//! Discovery backends behind a single capability.
//!
//! The poll loop is the only caller of [`Resolver::resolve`]. Backends are
//! selected from configuration by [`build_resolver`]; the core never branches
//! on the concrete backend.

mod dns_resolver;
mod static_resolver;
pub use dns_resolver::*;
pub use static_resolver::*;


use std::sync::Arc;

#[cfg(test)]
use mockall::automock;
use tonic::async_trait;

use crate::Endpoint;
use crate::ResolveError;
use crate::ResolverConfig;

/// Longest accepted target name, matching the DNS name limit
pub const MAX_TARGET_LEN: usize = 253;

/// Shared handle to the configured backend
pub type ResolverHandle = Arc<dyn Resolver>;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Resolver: Send + Sync + 'static {
    /// Returns the current members of `target`.
    ///
    /// Pure function of external state at call time. Duplicates in the
    /// returned list are allowed and collapse into one member.
    ///
    /// # Errors
    /// - [`ResolveError::NotFound`] when the target has no known members
    /// - [`ResolveError::Transient`] on retryable backend failures
    /// - [`ResolveError::Invalid`] when the target name cannot be resolved by
    ///   this backend at all
    async fn resolve(
        &self,
        target: &str,
    ) -> Result<Vec<Endpoint>, ResolveError>;

    /// Cheap syntactic check run before a target registration is created
    fn check_target(
        &self,
        target: &str,
    ) -> Result<(), ResolveError> {
        default_check_target(target)
    }
}

/// Accepts non-empty names of at most [`MAX_TARGET_LEN`] bytes without
/// whitespace or control characters.
pub fn default_check_target(target: &str) -> Result<(), ResolveError> {
    if target.is_empty() {
        return Err(ResolveError::Invalid("target name is empty".into()));
    }
    if target.len() > MAX_TARGET_LEN {
        return Err(ResolveError::Invalid(format!(
            "target name is {} bytes, limit is {MAX_TARGET_LEN}",
            target.len()
        )));
    }
    if let Some(c) = target.chars().find(|c| c.is_whitespace() || c.is_control()) {
        return Err(ResolveError::Invalid(format!(
            "target name contains forbidden character {c:?}"
        )));
    }
    Ok(())
}

/// Builds the backend named by the configuration
pub fn build_resolver(config: &ResolverConfig) -> ResolverHandle {
    match config {
        ResolverConfig::Static { targets } => Arc::new(StaticResolver::new(targets.clone())),
        ResolverConfig::Dns { default_port } => Arc::new(DnsResolver::new(*default_port)),
    }
}

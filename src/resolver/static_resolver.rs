use std::collections::HashMap;

use dashmap::DashMap;
use tonic::async_trait;
use tracing::debug;

use crate::Endpoint;
use crate::ResolveError;
use crate::Resolver;

/// Resolver backed by an in-memory member table.
///
/// Seeded from configuration. `set_members` and `remove_target` let an
/// operator (or a test) drive membership changes; the next poll picks them up.
#[derive(Debug, Default)]
pub struct StaticResolver {
    targets: DashMap<String, Vec<Endpoint>>,
}

impl StaticResolver {
    pub fn new(targets: HashMap<String, Vec<Endpoint>>) -> Self {
        Self {
            targets: targets.into_iter().collect(),
        }
    }

    /// Replaces the member list of `target`
    pub fn set_members(
        &self,
        target: impl Into<String>,
        members: Vec<Endpoint>,
    ) {
        let target = target.into();
        debug!(target = %target, members = members.len(), "Static members replaced");
        self.targets.insert(target, members);
    }

    /// Forgets `target`; later resolutions report `NotFound`
    pub fn remove_target(
        &self,
        target: &str,
    ) -> bool {
        self.targets.remove(target).is_some()
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(
        &self,
        target: &str,
    ) -> Result<Vec<Endpoint>, ResolveError> {
        self.targets
            .get(target)
            .map(|members| members.value().clone())
            .ok_or(ResolveError::NotFound)
    }
}

//! Diff engine: minimal transition between two member sets and the single
//! point that decides whether a transition is published.

use std::collections::BTreeSet;

use crate::Endpoint;
use crate::EndpointSet;

/// Members entering and leaving a target between two snapshots.
///
/// A weight change on the same address shows up as one removal plus one
/// addition; [`EndpointDiff::reweighted`] pairs them back up for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointDiff {
    /// Members present only in the new snapshot, canonical order
    pub added: Vec<Endpoint>,
    /// Members present only in the old snapshot, canonical order
    pub removed: Vec<Endpoint>,
}

impl EndpointDiff {
    pub fn between(
        previous: &BTreeSet<Endpoint>,
        next: &BTreeSet<Endpoint>,
    ) -> Self {
        Self {
            added: next.difference(previous).cloned().collect(),
            removed: previous.difference(next).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// `(old, new)` pairs sharing hostname and port but not weight.
    ///
    /// Each addition pairs with at most one removal, so the result is never
    /// longer than either side.
    pub fn reweighted(&self) -> Vec<(&Endpoint, &Endpoint)> {
        let mut unmatched: Vec<&Endpoint> = self.added.iter().collect();
        let mut pairs = Vec::new();
        for old in &self.removed {
            if let Some(pos) = unmatched.iter().position(|new| new.same_address(old)) {
                pairs.push((old, unmatched.remove(pos)));
            }
        }
        pairs
    }
}

/// Output of an accepted transition
#[derive(Debug, Clone)]
pub struct Publication {
    pub snapshot: EndpointSet,
    pub diff: EndpointDiff,
}

/// Publishing policy.
///
/// Any change to the member set publishes, weight-only changes included.
pub fn should_publish(diff: &EndpointDiff) -> bool {
    !diff.is_empty()
}

/// Compares `candidate` against `previous` and builds the next snapshot.
///
/// Returns `None` when the policy suppresses the transition; the caller
/// then leaves the registry untouched. A produced snapshot carries
/// `previous.version() + 1`.
pub fn diff<I>(
    previous: &EndpointSet,
    candidate: I,
) -> Option<Publication>
where
    I: IntoIterator<Item = Endpoint>,
{
    let members: BTreeSet<Endpoint> = candidate.into_iter().collect();
    let diff = EndpointDiff::between(previous.members(), &members);

    if !should_publish(&diff) {
        return None;
    }

    Some(Publication {
        snapshot: EndpointSet::new(previous.target(), members, previous.version() + 1),
        diff,
    })
}

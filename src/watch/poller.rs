//! Poll/refresh loop: one task per registered target
//!
//! Resolves immediately on activation, then every `poll_interval`, or sooner
//! when [`TargetRegistry::refresh`](super::TargetRegistry::refresh) fires.
//! Resolver errors never leave this task: transient ones are retried with
//! backoff, permanent ones fail the target.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::diff::diff;
use super::registry::RegistryInner;
use super::registry::TargetPhase;
use super::registry::TargetRegistration;
use crate::metrics;
use crate::Endpoint;
use crate::ResolveError;
use crate::WatchError;

/// What the loop does after one resolve attempt
#[derive(Debug, PartialEq, Eq)]
enum Step {
    /// Sleep for the given delay, or until refreshed
    Wait(Duration),
    /// The target failed; leave the loop
    Stop,
}

pub(crate) struct PollLoop {
    registration: Arc<TargetRegistration>,
    registry: Arc<RegistryInner>,
    /// Consecutive transient failures
    failures: u32,
}

impl PollLoop {
    pub(crate) fn new(
        registration: Arc<TargetRegistration>,
        registry: Arc<RegistryInner>,
    ) -> Self {
        Self {
            registration,
            registry,
            failures: 0,
        }
    }

    pub(crate) fn spawn(self) {
        tokio::spawn(self.run());
    }

    async fn run(mut self) {
        let target = self.registration.target().to_string();
        debug!(target = %target, "Poll loop started");

        loop {
            if !self.wait_until_active().await {
                break;
            }

            let outcome = self.resolve_once().await;
            if self.registration.cancel_token().is_cancelled() {
                break;
            }

            let delay = match self.handle(outcome) {
                Step::Wait(delay) => delay,
                Step::Stop => break,
            };

            let deadline = Instant::now() + delay;
            let cancel = self.registration.cancel_token().clone();
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep_until(deadline) => {}
                _ = self.registration.refresh_notified() => {
                    trace!(target = %target, "Refresh requested");
                }
            }
        }

        debug!(target = %target, "Poll loop stopped");
    }

    /// Parks the loop while the target drains.
    ///
    /// Returns `false` once the target is gone for good.
    async fn wait_until_active(&self) -> bool {
        loop {
            let resumed = self.registration.resumed_notified();
            match self.registration.phase() {
                TargetPhase::Active => return true,
                TargetPhase::Removed | TargetPhase::Failed => return false,
                TargetPhase::Draining => {}
            }

            tokio::select! {
                _ = self.registration.cancel_token().cancelled() => return false,
                _ = resumed => {}
            }
        }
    }

    async fn resolve_once(&self) -> Result<Vec<Endpoint>, ResolveError> {
        let target = self.registration.target();
        let timeout = self.registry.config().resolve_timeout();

        match tokio::time::timeout(timeout, self.registry.resolver().resolve(target)).await {
            Ok(result) => result,
            Err(_) => Err(ResolveError::Transient(format!(
                "resolution did not finish within {}ms",
                timeout.as_millis()
            ))),
        }
    }

    fn handle(
        &mut self,
        outcome: Result<Vec<Endpoint>, ResolveError>,
    ) -> Step {
        let target = self.registration.target();
        let poll_interval = self.registry.config().poll_interval();

        match outcome {
            Ok(members) => {
                self.failures = 0;
                self.apply(members);
                Step::Wait(poll_interval)
            }
            Err(ResolveError::NotFound) => {
                self.failures = 0;
                trace!(target = %target, "Target has no members");
                self.apply(Vec::new());
                Step::Wait(poll_interval)
            }
            Err(err @ ResolveError::Transient(_)) => {
                metrics::RESOLVE_FAILURES.with_label_values(&[err.kind()]).inc();
                self.failures = self.failures.saturating_add(1);

                let backoff = self.registry.backoff();
                if backoff.exhausted(self.failures) {
                    warn!(
                        target = %target,
                        attempts = self.failures,
                        error = %err,
                        "Resolver retries exhausted"
                    );
                    self.registry.fail(
                        &self.registration,
                        WatchError::Unavailable {
                            target: target.to_string(),
                            attempts: self.failures,
                            reason: err.to_string(),
                        },
                    );
                    return Step::Stop;
                }

                let delay = backoff.delay_for(self.failures - 1);
                debug!(
                    target = %target,
                    attempt = self.failures,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient resolver failure, backing off"
                );
                Step::Wait(delay)
            }
            Err(err @ ResolveError::Invalid(_)) => {
                metrics::RESOLVE_FAILURES.with_label_values(&[err.kind()]).inc();
                self.registry.fail(
                    &self.registration,
                    WatchError::InvalidTarget {
                        target: target.to_string(),
                        reason: err.to_string(),
                    },
                );
                Step::Stop
            }
        }
    }

    /// Runs the diff against `current` and publishes an accepted transition.
    fn apply(
        &self,
        members: Vec<Endpoint>,
    ) {
        let previous = self.registration.current();
        let Some(publication) = diff(&previous, members) else {
            trace!(
                target = %self.registration.target(),
                version = previous.version(),
                "Resolved members unchanged"
            );
            return;
        };

        let reweighted = publication.diff.reweighted().len();
        debug!(
            target = %self.registration.target(),
            version = publication.snapshot.version(),
            added = publication.diff.added.len().saturating_sub(reweighted),
            removed = publication.diff.removed.len().saturating_sub(reweighted),
            reweighted,
            "Publishing endpoint set"
        );
        self.registry.publish(&self.registration, publication.snapshot);
    }
}

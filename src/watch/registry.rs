//! Target registry: one registration per watched target, fan-out to its
//! subscribers, and the per-target lifecycle
//!
//! ```text
//!  attach (first)        refCount == 0          grace expires
//! ───────────────▶ Active ─────────────▶ Draining ─────────────▶ Removed
//!                  ▲   │  ◀───────────────  │
//!                  │   │   attach in grace   │
//!          publish └───┘                     │
//!                      │ Invalid / retries exhausted
//!                      ▼
//!                    Failed
//! ```
//!
//! Every registration guards its subscriber set and phase with its own
//! mutex; `current` is an `ArcSwap` so reads never take the lock. No code
//! path holds more than one registration lock, and the target map's shard
//! locks are never held while a registration lock is taken.

use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::poller::PollLoop;
use super::session::PushOutcome;
use super::session::SessionQueue;
use super::session::SubscriberSession;
use crate::metrics;
use crate::BackoffPolicy;
use crate::EndpointSet;
use crate::OverflowPolicy;
use crate::ResolverHandle;
use crate::WatchConfig;
use crate::WatchError;

/// Lifecycle phase of a target registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetPhase {
    /// Subscribed and polled
    Active,
    /// No subscribers; polling paused until reattach or grace expiry
    Draining,
    /// Discarded after the grace period or at shutdown
    Removed,
    /// Permanently failed; every session was terminated
    Failed,
}

#[derive(Debug)]
struct RegistrationState {
    phase: TargetPhase,
    subscribers: HashMap<String, Arc<SessionQueue>>,
    /// Bumped on every Active -> Draining and Draining -> Active transition so
    /// a stale grace timer can tell it lost the race
    drain_epoch: u64,
}

/// Registry-owned state of one target
#[derive(Debug)]
pub(crate) struct TargetRegistration {
    target: String,
    current: ArcSwap<EndpointSet>,
    state: Mutex<RegistrationState>,
    /// Wakes the poll loop for an immediate resolve
    refresh: Notify,
    /// Wakes a poll loop paused while draining
    resumed: Notify,
    /// Stops the poll loop and any pending grace timer
    cancel: CancellationToken,
}

impl TargetRegistration {
    fn new(
        target: &str,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            target: target.to_string(),
            current: ArcSwap::from_pointee(EndpointSet::empty(target)),
            state: Mutex::new(RegistrationState {
                phase: TargetPhase::Active,
                subscribers: HashMap::new(),
                drain_epoch: 0,
            }),
            refresh: Notify::new(),
            resumed: Notify::new(),
            cancel,
        }
    }

    pub(crate) fn target(&self) -> &str {
        &self.target
    }

    pub(crate) fn current(&self) -> Arc<EndpointSet> {
        self.current.load_full()
    }

    pub(crate) fn phase(&self) -> TargetPhase {
        self.state.lock().phase
    }

    pub(crate) fn refresh_notified(&self) -> tokio::sync::futures::Notified<'_> {
        self.refresh.notified()
    }

    pub(crate) fn resumed_notified(&self) -> tokio::sync::futures::Notified<'_> {
        self.resumed.notified()
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Shared state behind [`TargetRegistry`] handles
pub(crate) struct RegistryInner {
    targets: DashMap<String, Arc<TargetRegistration>>,
    resolver: ResolverHandle,
    config: WatchConfig,
    backoff: BackoffPolicy,
    shutdown: CancellationToken,
    active_sessions: AtomicUsize,
    max_sessions: usize,
}

impl std::fmt::Debug for RegistryInner {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("RegistryInner")
            .field("targets", &self.targets.len())
            .field("active_sessions", &self.active_sessions)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RegistryInner {
    pub(crate) fn resolver(&self) -> &ResolverHandle {
        &self.resolver
    }

    pub(crate) fn config(&self) -> &WatchConfig {
        &self.config
    }

    pub(crate) fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    fn overflow_policy(&self) -> OverflowPolicy {
        self.config.overflow_policy
    }

    /// Replaces `current` and fans the snapshot out to every subscriber.
    ///
    /// Returns the number of sessions the snapshot was queued for.
    pub(crate) fn publish(
        self: &Arc<Self>,
        registration: &Arc<TargetRegistration>,
        snapshot: EndpointSet,
    ) -> usize {
        let snapshot = Arc::new(snapshot);
        let policy = self.overflow_policy();

        let mut state = registration.state.lock();
        if matches!(state.phase, TargetPhase::Removed | TargetPhase::Failed) {
            return 0;
        }
        registration.current.store(snapshot.clone());

        let mut delivered = 0;
        let mut overrun = Vec::new();
        for (id, queue) in state.subscribers.iter() {
            match queue.push(snapshot.clone(), policy) {
                PushOutcome::Queued => delivered += 1,
                PushOutcome::Coalesced => {
                    delivered += 1;
                    debug!(
                        target = %registration.target,
                        session_id = %id,
                        version = snapshot.version(),
                        "Coalesced pending snapshot"
                    );
                }
                PushOutcome::Overrun => overrun.push(id.clone()),
                PushOutcome::Closed => {}
            }
        }

        let dropped_any = !overrun.is_empty();
        for id in overrun {
            if let Some(queue) = state.subscribers.remove(&id) {
                warn!(
                    target = %registration.target,
                    session_id = %id,
                    capacity = queue.capacity(),
                    "Subscriber overran its queue, disconnecting"
                );
                queue.terminate(WatchError::SubscriberOverrun {
                    target: registration.target.clone(),
                    session_id: id,
                    capacity: queue.capacity(),
                });
                metrics::SUBSCRIBER_OVERRUNS
                    .with_label_values(&[registration.target.as_str()])
                    .inc();
            }
        }

        if dropped_any && state.subscribers.is_empty() && state.phase == TargetPhase::Active {
            self.begin_drain(registration, &mut state);
        }
        drop(state);

        metrics::PUBLISHED_SNAPSHOTS
            .with_label_values(&[registration.target.as_str()])
            .inc();
        delivered
    }

    /// Terminates every session of the target with `err` and removes it.
    pub(crate) fn fail(
        &self,
        registration: &Arc<TargetRegistration>,
        err: WatchError,
    ) {
        let subscribers = {
            let mut state = registration.state.lock();
            if matches!(state.phase, TargetPhase::Removed | TargetPhase::Failed) {
                return;
            }
            state.phase = TargetPhase::Failed;
            std::mem::take(&mut state.subscribers)
        };

        warn!(
            target = %registration.target,
            sessions = subscribers.len(),
            error = %err,
            "Target failed, terminating sessions"
        );
        for queue in subscribers.values() {
            queue.terminate(err.clone());
        }
        registration.cancel.cancel();
        self.forget(registration);
    }

    /// Removes the session slot; the last one out starts draining.
    pub(crate) fn detach(
        self: &Arc<Self>,
        registration: &Arc<TargetRegistration>,
        session_id: &str,
    ) {
        self.active_sessions.fetch_sub(1, Ordering::AcqRel);
        metrics::ACTIVE_SESSIONS.dec();

        let mut state = registration.state.lock();
        if state.subscribers.remove(session_id).is_none() {
            return;
        }
        debug!(
            target = %registration.target,
            session_id = %session_id,
            remaining = state.subscribers.len(),
            "Subscriber detached"
        );
        if state.subscribers.is_empty() && state.phase == TargetPhase::Active {
            self.begin_drain(registration, &mut state);
        }
    }

    fn begin_drain(
        self: &Arc<Self>,
        registration: &Arc<TargetRegistration>,
        state: &mut RegistrationState,
    ) {
        state.phase = TargetPhase::Draining;
        state.drain_epoch += 1;
        let epoch = state.drain_epoch;
        let grace = self.config.grace_period();

        info!(
            target = %registration.target,
            grace_ms = grace.as_millis() as u64,
            "Last subscriber left, draining target"
        );

        let runtime = tokio::runtime::Handle::try_current();
        if grace.is_zero() || runtime.is_err() {
            self.expire_locked(registration, state, epoch);
            return;
        }

        let registry = Arc::clone(self);
        let registration = Arc::clone(registration);
        if let Ok(handle) = runtime {
            handle.spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(grace) => {
                        registry.expire(&registration, epoch);
                    }
                    _ = registration.cancel.cancelled() => {}
                }
            });
        }
    }

    fn expire(
        &self,
        registration: &Arc<TargetRegistration>,
        epoch: u64,
    ) {
        let mut state = registration.state.lock();
        self.expire_locked(registration, &mut state, epoch);
    }

    fn expire_locked(
        &self,
        registration: &Arc<TargetRegistration>,
        state: &mut RegistrationState,
        epoch: u64,
    ) {
        if state.phase != TargetPhase::Draining
            || state.drain_epoch != epoch
            || !state.subscribers.is_empty()
        {
            return;
        }
        state.phase = TargetPhase::Removed;
        registration.cancel.cancel();
        info!(target = %registration.target, "Grace period expired, target removed");
        self.forget(registration);
    }

    /// Drops the map entry only if it still points at `registration`.
    fn forget(
        &self,
        registration: &Arc<TargetRegistration>,
    ) {
        if self
            .targets
            .remove_if(&registration.target, |_, r| Arc::ptr_eq(r, registration))
            .is_some()
        {
            metrics::ACTIVE_TARGETS.dec();
            metrics::forget_target(&registration.target);
        }
    }
}

/// Shared hub of all watched targets.
///
/// Cheap to clone; clones share every registration. Subscribers of the same
/// target share one poll loop and observe the same snapshot sequence.
#[derive(Debug, Clone)]
pub struct TargetRegistry {
    inner: Arc<RegistryInner>,
}

impl TargetRegistry {
    /// `max_sessions == 0` disables the session limit.
    pub fn new(
        resolver: ResolverHandle,
        config: WatchConfig,
        backoff: BackoffPolicy,
        max_sessions: usize,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                targets: DashMap::new(),
                resolver,
                config,
                backoff,
                shutdown: CancellationToken::new(),
                active_sessions: AtomicUsize::new(0),
                max_sessions,
            }),
        }
    }

    /// Registers a new session on `target`.
    ///
    /// The first snapshot the session yields is the target's current one:
    /// the empty version-0 placeholder for a cold target, or the cached
    /// snapshot if the target was still in its grace period.
    ///
    /// # Errors
    /// - [`WatchError::ShuttingDown`] once [`shutdown`](Self::shutdown) ran
    /// - [`WatchError::InvalidTarget`] when the resolver rejects the name
    /// - [`WatchError::TooManyWatches`] when the session limit is reached
    pub fn attach(
        &self,
        target: &str,
    ) -> Result<SubscriberSession, WatchError> {
        let inner = &self.inner;
        if inner.shutdown.is_cancelled() {
            return Err(WatchError::ShuttingDown);
        }

        inner
            .resolver
            .check_target(target)
            .map_err(|e| WatchError::InvalidTarget {
                target: target.to_string(),
                reason: e.to_string(),
            })?;

        let previous = inner.active_sessions.fetch_add(1, Ordering::AcqRel);
        if inner.max_sessions > 0 && previous >= inner.max_sessions {
            inner.active_sessions.fetch_sub(1, Ordering::AcqRel);
            return Err(WatchError::TooManyWatches(inner.max_sessions));
        }

        let attached = self.attach_counted(target);
        match &attached {
            Ok(_) => metrics::ACTIVE_SESSIONS.inc(),
            Err(_) => {
                inner.active_sessions.fetch_sub(1, Ordering::AcqRel);
            }
        }
        attached
    }

    fn attach_counted(
        &self,
        target: &str,
    ) -> Result<SubscriberSession, WatchError> {
        let inner = &self.inner;
        loop {
            let (registration, created) = match inner.targets.entry(target.to_string()) {
                Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
                Entry::Vacant(entry) => {
                    let registration = Arc::new(TargetRegistration::new(
                        target,
                        inner.shutdown.child_token(),
                    ));
                    entry.insert(Arc::clone(&registration));
                    (registration, true)
                }
            };

            if created {
                metrics::ACTIVE_TARGETS.inc();
                info!(target = %target, "Target registered, starting poll loop");
                PollLoop::new(Arc::clone(&registration), Arc::clone(inner)).spawn();
            }

            let mut state = registration.state.lock();
            match state.phase {
                TargetPhase::Removed | TargetPhase::Failed => {
                    drop(state);
                    inner.forget(&registration);
                    if inner.shutdown.is_cancelled() {
                        return Err(WatchError::ShuttingDown);
                    }
                    continue;
                }
                TargetPhase::Draining => {
                    state.phase = TargetPhase::Active;
                    state.drain_epoch += 1;
                    registration.resumed.notify_one();
                    debug!(target = %target, "Resubscribed within grace period");
                }
                TargetPhase::Active => {}
            }

            let id = nanoid::nanoid!();
            let queue = Arc::new(SessionQueue::new(inner.config.subscriber_buffer_size));
            queue.push(registration.current.load_full(), inner.overflow_policy());
            state.subscribers.insert(id.clone(), Arc::clone(&queue));
            debug!(
                target = %target,
                session_id = %id,
                subscribers = state.subscribers.len(),
                "Subscriber attached"
            );
            drop(state);

            return Ok(SubscriberSession::new(
                id,
                registration,
                Arc::clone(inner),
                queue,
            ));
        }
    }

    /// Wakes the target's poll loop for an immediate resolve.
    ///
    /// Returns `false` if the target is not registered.
    pub fn refresh(
        &self,
        target: &str,
    ) -> bool {
        match self.registration(target) {
            Some(registration) => {
                registration.refresh.notify_one();
                true
            }
            None => false,
        }
    }

    /// Last published snapshot of a registered target
    pub fn current(
        &self,
        target: &str,
    ) -> Option<Arc<EndpointSet>> {
        self.registration(target).map(|r| r.current())
    }

    pub fn phase(
        &self,
        target: &str,
    ) -> Option<TargetPhase> {
        self.registration(target).map(|r| r.phase())
    }

    /// Attached sessions of one target
    pub fn subscriber_count(
        &self,
        target: &str,
    ) -> usize {
        self.registration(target)
            .map(|r| r.state.lock().subscribers.len())
            .unwrap_or(0)
    }

    /// Registered targets, draining ones included
    pub fn target_count(&self) -> usize {
        self.inner.targets.len()
    }

    /// Attached sessions across all targets
    pub fn session_count(&self) -> usize {
        self.inner.active_sessions.load(Ordering::Acquire)
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Stops every poll loop and terminates every session with
    /// [`WatchError::ShuttingDown`]. Later attaches are refused.
    pub fn shutdown(&self) {
        let inner = &self.inner;
        inner.shutdown.cancel();

        let registrations: Vec<Arc<TargetRegistration>> =
            inner.targets.iter().map(|e| Arc::clone(e.value())).collect();

        let mut terminated = 0;
        for registration in &registrations {
            let subscribers = {
                let mut state = registration.state.lock();
                state.phase = TargetPhase::Removed;
                std::mem::take(&mut state.subscribers)
            };
            for queue in subscribers.values() {
                queue.terminate(WatchError::ShuttingDown);
            }
            terminated += subscribers.len();
            inner.forget(registration);
        }

        info!(
            targets = registrations.len(),
            sessions = terminated,
            "Target registry shut down"
        );
    }

    fn registration(
        &self,
        target: &str,
    ) -> Option<Arc<TargetRegistration>> {
        self.inner.targets.get(target).map(|e| Arc::clone(e.value()))
    }
}

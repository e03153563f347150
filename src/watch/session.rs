//! Subscriber sessions
//!
//! A session is the consumer side of one watch. The registry keeps only the
//! session's [`SessionQueue`] and pushes into it without ever waiting; the
//! session pulls from it and unregisters itself on detach or drop.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::trace;

use crate::EndpointSet;
use crate::OverflowPolicy;
use crate::WatchError;

use super::registry::RegistryInner;
use super::registry::TargetRegistration;

/// Result of pushing one snapshot into a session queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PushOutcome {
    Queued,
    /// Oldest pending snapshot dropped to make room
    Coalesced,
    /// Queue full under [`OverflowPolicy::Disconnect`]; nothing was queued
    Overrun,
    /// Session already detached or terminated
    Closed,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<Arc<EndpointSet>>,
    terminal: Option<WatchError>,
    closed: bool,
}

/// Bounded single-consumer queue of snapshots
#[derive(Debug)]
pub(crate) struct SessionQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    capacity: usize,
}

impl SessionQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            capacity: capacity.max(1),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Never blocks; applies `policy` when the queue is full.
    pub(crate) fn push(
        &self,
        snapshot: Arc<EndpointSet>,
        policy: OverflowPolicy,
    ) -> PushOutcome {
        let mut state = self.state.lock();
        if state.closed || state.terminal.is_some() {
            return PushOutcome::Closed;
        }

        let outcome = if state.pending.len() < self.capacity {
            PushOutcome::Queued
        } else {
            match policy {
                OverflowPolicy::Disconnect => return PushOutcome::Overrun,
                OverflowPolicy::Coalesce => {
                    state.pending.pop_front();
                    PushOutcome::Coalesced
                }
            }
        };
        state.pending.push_back(snapshot);
        drop(state);

        self.notify.notify_one();
        outcome
    }

    /// Discards pending snapshots; the consumer sees `err` next, then the end.
    pub(crate) fn terminate(
        &self,
        err: WatchError,
    ) {
        let mut state = self.state.lock();
        state.pending.clear();
        if !state.closed && state.terminal.is_none() {
            state.terminal = Some(err);
        }
        drop(state);

        self.notify.notify_one();
    }

    /// Ends the queue without an error
    pub(crate) fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.pending.clear();
        drop(state);

        self.notify.notify_one();
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub(crate) async fn recv(&self) -> Option<Result<Arc<EndpointSet>, WatchError>> {
        loop {
            {
                let mut state = self.state.lock();
                if let Some(snapshot) = state.pending.pop_front() {
                    return Some(Ok(snapshot));
                }
                if let Some(err) = state.terminal.take() {
                    state.closed = true;
                    return Some(Err(err));
                }
                if state.closed {
                    return None;
                }
            }
            // Single consumer: a notify_one issued while nobody waits leaves a
            // permit, so no wakeup is lost between the check and the await.
            self.notify.notified().await;
        }
    }
}

/// State needed to unregister a session from its target
struct SessionCleanup {
    registration: Arc<TargetRegistration>,
    registry: Arc<RegistryInner>,
}

/// One active watch on a target.
///
/// The first item is the target's snapshot at attach time; later items carry
/// strictly increasing versions. The session ends on [`detach`], on drop, or
/// after yielding a terminal [`WatchError`].
///
/// [`detach`]: SubscriberSession::detach
pub struct SubscriberSession {
    id: String,
    target: String,
    last_sent_version: Option<u64>,
    queue: Arc<SessionQueue>,
    cleanup: Option<SessionCleanup>,
}

impl std::fmt::Debug for SubscriberSession {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SubscriberSession")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("last_sent_version", &self.last_sent_version)
            .field("attached", &self.cleanup.is_some())
            .finish()
    }
}

impl SubscriberSession {
    pub(crate) fn new(
        id: String,
        registration: Arc<TargetRegistration>,
        registry: Arc<RegistryInner>,
        queue: Arc<SessionQueue>,
    ) -> Self {
        Self {
            id,
            target: registration.target().to_string(),
            last_sent_version: None,
            queue,
            cleanup: Some(SessionCleanup {
                registration,
                registry,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Version of the last snapshot handed to the consumer
    pub fn last_sent_version(&self) -> Option<u64> {
        self.last_sent_version
    }

    /// Whether the session is still registered with its target
    pub fn is_attached(&self) -> bool {
        self.cleanup.is_some()
    }

    /// Snapshots queued but not yet received
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Waits for the next snapshot.
    ///
    /// Returns `None` once the session has ended. A terminal error is
    /// yielded exactly once and detaches the session.
    pub async fn recv(&mut self) -> Option<Result<Arc<EndpointSet>, WatchError>> {
        if self.cleanup.is_none() {
            return None;
        }

        match self.queue.recv().await {
            Some(Ok(snapshot)) => {
                debug_assert!(
                    self.last_sent_version.map_or(true, |v| snapshot.version() > v),
                    "session {} received version {} after {:?}",
                    self.id,
                    snapshot.version(),
                    self.last_sent_version
                );
                self.last_sent_version = Some(snapshot.version());
                trace!(
                    session_id = %self.id,
                    target = %self.target,
                    version = snapshot.version(),
                    "Snapshot delivered"
                );
                Some(Ok(snapshot))
            }
            Some(Err(err)) => {
                self.detach();
                Some(Err(err))
            }
            None => {
                self.detach();
                None
            }
        }
    }

    /// Unregisters from the target. Safe to call any number of times.
    pub fn detach(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            self.queue.close();
            cleanup.registry.detach(&cleanup.registration, &self.id);
            trace!(session_id = %self.id, target = %self.target, "Session detached");
        }
    }

    /// Adapts the session into a stream; dropping the stream detaches.
    pub fn into_stream(self) -> impl Stream<Item = Result<Arc<EndpointSet>, WatchError>> + Send {
        futures::stream::unfold(self, |mut session| async move {
            session.recv().await.map(|item| (item, session))
        })
    }
}

impl Drop for SubscriberSession {
    fn drop(&mut self) {
        self.detach();
    }
}

use std::sync::Arc;
use std::time::Duration;

use crate::BackoffPolicy;
use crate::Endpoint;
use crate::EndpointSet;
use crate::OverflowPolicy;
use crate::ResolverHandle;
use crate::SubscriberSession;
use crate::TargetRegistry;
use crate::WatchConfig;
use crate::WatchError;

pub(crate) const RECV_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn ep(
    host: &str,
    port: u16,
    weight: u32,
) -> Endpoint {
    Endpoint::new(host, port, weight)
}

/// Short intervals so paused-clock tests advance quickly
pub(crate) fn test_watch_config() -> WatchConfig {
    WatchConfig {
        poll_interval_ms: 100,
        resolve_timeout_ms: 50,
        grace_period_ms: 500,
        subscriber_buffer_size: 4,
        overflow_policy: OverflowPolicy::Disconnect,
    }
}

/// No jitter so retry timing is deterministic
pub(crate) fn test_backoff(max_retries: u32) -> BackoffPolicy {
    BackoffPolicy {
        max_retries,
        base_delay_ms: 10,
        max_delay_ms: 100,
        jitter_ratio: 0.0,
    }
}

pub(crate) fn test_registry(
    resolver: ResolverHandle,
    config: WatchConfig,
) -> TargetRegistry {
    TargetRegistry::new(resolver, config, test_backoff(3), 0)
}

/// Next item of `session`, failing the test if nothing arrives in time
pub(crate) async fn next_snapshot(
    session: &mut SubscriberSession
) -> Option<Result<Arc<EndpointSet>, WatchError>> {
    tokio::time::timeout(RECV_TIMEOUT, session.recv())
        .await
        .expect("session did not yield in time")
}

/// Next item of `session`, which must be a snapshot
pub(crate) async fn expect_snapshot(session: &mut SubscriberSession) -> Arc<EndpointSet> {
    match next_snapshot(session).await {
        Some(Ok(snapshot)) => snapshot,
        other => panic!("expected a snapshot, got {other:?}"),
    }
}

/// Asserts nothing arrives on `session` within `wait`
pub(crate) async fn expect_silence(
    session: &mut SubscriberSession,
    wait: Duration,
) {
    if let Ok(item) = tokio::time::timeout(wait, session.recv()).await {
        panic!("expected no item, got {item:?}");
    }
}

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use servok::proto::v1::WatchRequest;
use servok::proto::v1::WatchResponse;
use servok::proto::EndpointWatcherClient;
use servok::start_rpc_server_with_listener;
use servok::BackoffPolicy;
use servok::Endpoint;
use servok::OverflowPolicy;
use servok::Resolver;
use servok::ServerConfig;
use servok::TargetRegistry;
use servok::WatchConfig;
use servok::WatchService;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tonic::codec::CompressionEncoding;
use tonic::transport::Channel;
use tonic::Streaming;
use tracing::error;

pub const WAIT_FOR_SERVER_READY_IN_SEC: u64 = 6;

pub const MESSAGE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TestServer {
    pub addr: SocketAddr,
    pub registry: TargetRegistry,
    shutdown_tx: watch::Sender<()>,
    handle: JoinHandle<servok::Result<()>>,
}

impl TestServer {
    pub async fn shutdown(self) -> servok::Result<()> {
        let _ = self.shutdown_tx.send(());
        self.registry.shutdown();
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(servok::SystemError::from(e).into()),
        }
    }
}

pub fn watch_config(poll_interval_ms: u64) -> WatchConfig {
    WatchConfig {
        poll_interval_ms,
        resolve_timeout_ms: 1_000,
        grace_period_ms: 200,
        subscriber_buffer_size: 4,
        overflow_policy: OverflowPolicy::Disconnect,
    }
}

pub fn backoff() -> BackoffPolicy {
    BackoffPolicy {
        max_retries: 3,
        base_delay_ms: 10,
        max_delay_ms: 100,
        jitter_ratio: 0.0,
    }
}

/// Starts a server on an ephemeral loopback port and waits until it accepts
/// connections.
pub async fn start_server(
    resolver: Arc<dyn Resolver>,
    config: WatchConfig,
    max_sessions: usize,
) -> TestServer {
    let registry = TargetRegistry::new(resolver, config, backoff(), max_sessions);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let service = WatchService::new(registry.clone());
    let handle = tokio::spawn(async move {
        start_rpc_server_with_listener(service, listener, &ServerConfig::default(), shutdown_rx)
            .await
    });

    check_server_is_ready(&addr.to_string(), WAIT_FOR_SERVER_READY_IN_SEC)
        .await
        .unwrap();

    TestServer {
        addr,
        registry,
        shutdown_tx,
        handle,
    }
}

pub async fn check_server_is_ready(
    addr: &str,
    timeout_secs: u64,
) -> std::result::Result<(), std::io::Error> {
    let timeout_duration = Duration::from_secs(timeout_secs);
    let retry_interval = Duration::from_millis(50);

    let result = time::timeout(timeout_duration, async {
        loop {
            if TcpStream::connect(addr).await.is_ok() {
                return;
            }
            error!("Server({:?}) not ready, retrying...", addr);
            time::sleep(retry_interval).await;
        }
    })
    .await;

    result.map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("Server({addr:?}) did not become ready within {timeout_secs} seconds."),
        )
    })
}

pub async fn connect(addr: SocketAddr) -> EndpointWatcherClient<Channel> {
    EndpointWatcherClient::connect(format!("http://{addr}"))
        .await
        .unwrap()
        .send_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Gzip)
}

pub async fn open_watch(
    client: &mut EndpointWatcherClient<Channel>,
    target: &str,
) -> Result<Streaming<WatchResponse>, tonic::Status> {
    client
        .watch(WatchRequest {
            target: target.to_string(),
        })
        .await
        .map(|response| response.into_inner())
}

/// Next message as domain endpoints; panics on timeout, error or end of stream
pub async fn next_endpoints(stream: &mut Streaming<WatchResponse>) -> Vec<Endpoint> {
    let message = time::timeout(MESSAGE_TIMEOUT, stream.message())
        .await
        .expect("no message in time")
        .expect("stream failed")
        .expect("stream ended");
    message.into_endpoints().unwrap()
}

/// Waits until `check` holds, polling every few milliseconds
pub async fn eventually<F>(mut check: F)
where
    F: FnMut() -> bool,
{
    time::timeout(MESSAGE_TIMEOUT, async {
        while !check() {
            time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition did not hold in time");
}

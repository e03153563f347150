//! gRPC server hosting the Watch API
//!
//! Serves [`WatchService`] next to the standard health service, with gzip
//! compression and transport parameters taken from [`ServerConfig`].

mod watch_service;
pub use watch_service::*;


use std::net::SocketAddr;
use std::time::Duration;

use futures::FutureExt;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::codec::CompressionEncoding;
use tonic::transport::server::Router;
use tonic_health::server::health_reporter;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::proto::EndpointWatcherServer;
use crate::Result;
use crate::ServerConfig;
use crate::SystemError;

/// Binds `listen_address` and serves until `shutdown_signal` fires.
pub async fn start_rpc_server(
    service: WatchService,
    listen_address: SocketAddr,
    config: &ServerConfig,
    shutdown_signal: watch::Receiver<()>,
) -> Result<()> {
    let listener = TcpListener::bind(listen_address).await.map_err(|e| {
        error!("failed to bind rpc server on {}: {:?}", listen_address, e);
        SystemError::Io(e)
    })?;
    start_rpc_server_with_listener(service, listener, config, shutdown_signal).await
}

/// Serves on an already bound listener until `shutdown_signal` fires.
pub async fn start_rpc_server_with_listener(
    service: WatchService,
    listener: TcpListener,
    config: &ServerConfig,
    mut shutdown_signal: watch::Receiver<()>,
) -> Result<()> {
    let listen_address = listener.local_addr().map_err(SystemError::Io)?;

    let (mut health_reporter, health_service) = health_reporter();
    health_reporter
        .set_serving::<EndpointWatcherServer<WatchService>>()
        .await;

    let router = build_router(service, config).add_service(health_service);

    info!("Watch service listening on {}", listen_address);
    if let Err(e) = router
        .serve_with_incoming_shutdown(
            TcpListenerStream::new(listener),
            shutdown_signal.changed().map(|_s| {
                warn!("Stopping RPC server. {}", listen_address);
            }),
        )
        .await
    {
        error!("error to start rpc server :{:?}.", e);
        return Err(SystemError::ServerUnavailable {
            addr: listen_address,
            source: Box::new(e),
        }
        .into());
    }
    debug!("rpc service finished!");
    Ok(())
}

fn build_router(
    service: WatchService,
    config: &ServerConfig,
) -> Router {
    tonic::transport::Server::builder()
        .concurrency_limit_per_connection(config.concurrency_limit_per_connection)
        .tcp_keepalive(Some(Duration::from_secs(config.tcp_keepalive_in_secs)))
        .http2_keepalive_interval(Some(Duration::from_secs(
            config.http2_keep_alive_interval_in_secs,
        )))
        .http2_keepalive_timeout(Some(Duration::from_secs(
            config.http2_keep_alive_timeout_in_secs,
        )))
        .tcp_nodelay(config.tcp_nodelay)
        .add_service(
            EndpointWatcherServer::new(service)
                .accept_compressed(CompressionEncoding::Gzip)
                .send_compressed(CompressionEncoding::Gzip),
        )
}

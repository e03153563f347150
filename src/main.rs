use servok::build_resolver;
use servok::metrics;
use servok::start_rpc_server;
use servok::Error;
use servok::Result;
use servok::ServokConfig;
use servok::SystemError;
use servok::TargetRegistry;
use servok::WatchService;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let settings = ServokConfig::new()?.validate()?;

    // Initializing Logs
    init_observability();

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    let resolver = build_resolver(&settings.resolver);
    let registry = TargetRegistry::new(
        resolver,
        settings.watch.clone(),
        settings.retry,
        settings.server.max_concurrent_watches,
    );

    if settings.monitoring.prometheus_enabled {
        tokio::spawn(metrics::start_server(
            settings.monitoring.prometheus_port,
            graceful_rx.clone(),
        ));
    }

    let listen_address = settings.server.socket_addr()?;
    let mut server = {
        let service = WatchService::new(registry.clone());
        let config = settings.server.clone();
        let shutdown = graceful_rx.clone();
        tokio::spawn(async move { start_rpc_server(service, listen_address, &config, shutdown).await })
    };

    info!("Application started. Waiting for CTRL+C signal...");
    let server_result = tokio::select! {
        result = graceful_shutdown(graceful_tx) => {
            if let Err(e) = result {
                error!("Failed to shutdown: {:?}", e);
            }
            // Ends every watch stream so the server can drain
            registry.shutdown();
            server.await
        }
        result = &mut server => {
            registry.shutdown();
            result
        }
    };

    if let Err(e) = server_result.map_err(SystemError::from)? {
        error!("rpc server stops: {:?}", e);
        return Err(e);
    }

    info!("Exiting program.");
    Ok(())
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt()).map_err(SystemError::Io)?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(SystemError::Io)?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    info!("Shutdown server..");
    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        Error::System(SystemError::SignalSenderClosed(format!(
            "Failed to send shutdown signal: {}",
            e
        )))
    })?;

    info!("Shutdown completed");
    Ok(())
}

fn init_observability() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}

use std::sync::Arc;

use feedback_bridge::encode_metrics;
use feedback_bridge::register_custom_metrics;
use feedback_bridge::Bridge;
use feedback_bridge::BridgeConfig;
use feedback_bridge::Error;
use feedback_bridge::LoggingHost;
use feedback_bridge::Result;
use feedback_bridge::TcpConnector;
use feedback_bridge::REGISTRY;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    init_observability();

    let config = BridgeConfig::new()?.validate()?;
    info!(address = %config.connection.address(), "configuration loaded");
    register_custom_metrics(&REGISTRY);

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    let connector = Arc::new(TcpConnector::from_config(&config.connection));
    let (bridge, _handle) = Bridge::new(config, connector, Arc::new(LoggingHost), graceful_rx);

    info!("Bridge started. Waiting for CTRL+C signal...");
    tokio::spawn(async {
        if let Err(e) = graceful_shutdown(graceful_tx).await {
            error!("Failed to shutdown: {:?}", e);
        }
    });

    if let Err(e) = bridge.run().await {
        error!("bridge stops: {:?}", e);
    }

    debug!("final metrics:\n{}", encode_metrics(&REGISTRY));
    info!("Exiting program.");
    Ok(())
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt()).map_err(|e| Error::Fatal(format!("SIGINT handler: {e}")))?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(|e| Error::Fatal(format!("SIGTERM handler: {e}")))?;
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

    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        Error::Fatal(format!("Failed to send shutdown signal: {e}"))
    })?;

    info!("Shutdown completed");
    Ok(())
}

fn init_observability() {
    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(base_subscriber).init();
}

/// Birdfeed - Main entry point
use birdfeed_core::console::{self, Command};
use birdfeed_core::host::MemoryHost;
use birdfeed_core::session::SessionRegistry;
use birdfeed_core::transport::HttpTransport;
use birdfeed_core::{AccountConfig, TwitterSession};
use std::env;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const EVENT_HISTORY: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    // Parse configuration
    let args: Vec<String> = env::args().collect();
    let config = AccountConfig::from_args(&args)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    let host = Arc::new(
        MemoryHost::new()
            .with_broadcast(256)
            .with_history_limit(EVENT_HISTORY),
    );
    let printer = host.subscribe().map(console::spawn_printer);

    let transport = Arc::new(
        HttpTransport::new(&config.base_url, config.request_timeout)
            .map_err(|e| anyhow::anyhow!("Transport error: {}", e))?,
    );

    // This binary is the connection-lifecycle manager: it alone writes the registry
    let registry = SessionRegistry::new();
    let session = Arc::new(TwitterSession::new(config, transport, host, registry.clone()));
    registry.register(session.id()).await;

    info!("Starting birdfeed for {}", session.config().handle);
    info!("   API: {}", session.config().base_url);
    info!("   Delivery: {:?}", session.config().delivery_mode());

    if let Err(e) = session.login().await {
        warn!("Initial friend sync failed: {}", e);
    }

    let shutdown = Arc::new(RwLock::new(false));

    let poller_handle = {
        let session = session.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { session.run_poller(shutdown).await })
    };

    let input_handle = {
        let session = session.clone();
        tokio::spawn(async move { read_commands(session).await })
    };

    wait_for_shutdown().await;
    info!("Shutdown signal received, stopping...");

    *shutdown.write().await = true;
    registry.unregister(session.id()).await;
    input_handle.abort();

    let _ = poller_handle.await;
    if let Some(printer) = printer {
        printer.abort();
    }

    info!("Stopped");
    Ok(())
}

/// Post every stdin line as a status, or `d <who> <text>` as a direct message
async fn read_commands(session: Arc<TwitterSession>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("stdin read error: {}", e);
                break;
            }
        };

        let result = match console::parse_command(&line) {
            Some(Command::Post { text }) => session.post_status(&text).await,
            Some(Command::Direct { to, text }) => session.send_direct_message(&to, &text).await,
            None => continue,
        };
        if let Err(e) = result {
            warn!("Send failed: {}", e);
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Ctrl+C received");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("SIGTERM received");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

//! apfinger binary entry point

use apfinger::{AppState, config, finger::FingerServer, tasks::TaskScope};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Load configuration from file and environment, then initialize
///    tracing/logging from its `logging` section
/// 2. Initialize metrics
/// 3. Initialize AppState (identity, signer, client)
/// 4. Start the actor / WebFinger HTTP server
/// 5. Start the Finger server
/// 6. Wait for Ctrl-C or SIGTERM, then shut both down
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration, then initialize tracing/logging from it
    let config = config::AppConfig::load()?;
    init_tracing(&config.logging);

    tracing::info!("Starting apfinger...");
    config.validate()?;
    tracing::info!(
        domain = %config.server.domain,
        default_address = %config.finger.default_address,
        "Configuration loaded"
    );

    // 2. Initialize metrics
    apfinger::metrics::init_metrics();

    // 3. Initialize application state
    let state = AppState::new(config.clone())?;

    // 4. Start HTTP server
    let app = apfinger::build_router(state.clone());
    let addr = format!("{}:{}", config.server.host, config.server.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("HTTP server listening on {}", addr);
    tracing::info!("Public URL: {}", config.server.base_url());

    let scope = TaskScope::new();
    let http_scope = scope.clone();
    let http_server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { http_scope.cancelled().await })
            .await
    });

    // 5. Start Finger server
    let finger_addr = format!("{}:{}", config.server.host, config.finger.port);
    let finger_server = FingerServer::bind(&finger_addr, state.finger_handler(), scope).await?;

    shutdown_signal().await;

    finger_server.shutdown().await;
    match http_server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "HTTP server failed"),
        Err(e) => tracing::error!(error = %e, "HTTP server task panicked"),
    }

    tracing::info!("apfinger stopped");
    Ok(())
}

/// `RUST_LOG` wins over `logging.level` when set
fn init_tracing(logging: &config::LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.filter_directives().into());

    if logging.is_json() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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

    tracing::info!("Shutdown signal received");
}

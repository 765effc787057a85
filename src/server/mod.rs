pub mod router;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use crate::bootstrap::ClientGuard;
use crate::client::LocalConnector;
use crate::config::Settings;
use crate::error::{EnvelopeError, EnvelopeResult};

/// Longest wait for the budget client to shut down
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Start the HTTP server with the given settings.
///
/// The budget client is not started here; the first API request starts it.
pub async fn start(settings: Settings) -> EnvelopeResult<()> {
    let guard = Arc::new(ClientGuard::new(
        Arc::new(LocalConnector),
        settings.client_config(),
    ));
    let bind_addr = settings.bind_address();
    let app = router::build(state::AppState::new(Arc::clone(&guard)));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| EnvelopeError::Server(format!("Failed to bind to {bind_addr}: {e}")))?;

    tracing::info!("Server listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| EnvelopeError::Server(format!("Server error: {e}")))?;

    shutdown_client(&guard).await;
    Ok(())
}

/// Shut the budget client down, waiting at most [`SHUTDOWN_TIMEOUT`]
///
/// Failures are logged only.
pub async fn shutdown_client(guard: &ClientGuard) {
    match tokio::time::timeout(SHUTDOWN_TIMEOUT, guard.shutdown()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "Budget client shutdown failed"),
        Err(_) => tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Budget client shutdown timed out"
        ),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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

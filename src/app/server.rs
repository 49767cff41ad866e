// logtail - app/server.rs
//
// Binding and serving a router until Ctrl-C (or SIGTERM on Unix).

use axum::Router;
use std::io;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Serve `app` on `bind` until a shutdown signal arrives.
///
/// In-flight requests are allowed to finish before this returns.
pub async fn serve(bind: SocketAddr, app: Router, service: &str) -> io::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    tracing::info!(service, addr = %listener.local_addr()?, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!(service, "Server stopped");
    Ok(())
}

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
            Ok(mut sig) => {
                sig.recv().await;
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

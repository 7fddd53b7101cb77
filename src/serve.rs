//! Read-only HTTP access to the cached reports for other processes.

use std::path::Path;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Router serving every file under `directory`.
pub fn router(directory: &Path) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(directory))
        .layer(TraceLayer::new_for_http())
}

/// Serve `directory` on `listener` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    directory: &Path,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(
            "Listening on {}. Visit http://localhost:{} in your browser.",
            addr,
            addr.port()
        );
    }
    axum::serve(listener, router(directory))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

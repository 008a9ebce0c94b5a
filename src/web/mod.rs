//! JSON HTTP API over [`App`](crate::app::App).
//!
//! Error responses share one shape, `{"error": {"code", "message"}}`; see
//! [`ApiError`].

mod error;
mod handlers;
mod router;

pub use error::{ApiError, ErrorBody, ErrorCode, ErrorDetail};
pub use router::create_router;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::app::App;

/// Serves the API on `addr` until the app's shutdown token fires.
pub async fn serve(app: Arc<App>, addr: SocketAddr) -> std::io::Result<()> {
    let shutdown = app.cancel_token();
    let router = create_router(app);

    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(addr = %local_addr, "Web server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("Web server stopped");
    Ok(())
}

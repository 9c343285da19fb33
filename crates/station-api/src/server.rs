//! Listener lifecycle.

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ApiConfig;

/// Bind and serve `router` until `cancel` fires.
pub async fn serve(config: &ApiConfig, router: Router, cancel: CancellationToken) -> std::io::Result<()> {
    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("Status server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;

    info!("Status server stopped");
    Ok(())
}

use std::net::SocketAddr;

use stratus_api::{ApiState, build_router};
use tracing::info;

pub async fn run(port: u16, workers: Option<usize>) -> anyhow::Result<()> {
    let router = build_router(ApiState {
        default_workers: workers,
    });
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
            }
        })
        .await?;

    info!("API server stopped");
    Ok(())
}

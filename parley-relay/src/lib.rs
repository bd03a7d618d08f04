mod config;
mod room;
mod signaling;

pub use config::*;
pub use room::*;
pub use signaling::*;

use axum::Router;
use axum::routing::get;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub fn router(service: SignalingService) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/{room}", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(service)
}

async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(json!({
        "status": "ok",
        "service": "parley-relay",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Serves the relay on an already bound listener until the task is dropped.
pub async fn serve(listener: TcpListener, service: SignalingService) -> anyhow::Result<()> {
    info!("Signaling relay listening on {}", listener.local_addr()?);
    axum::serve(listener, router(service)).await?;
    Ok(())
}

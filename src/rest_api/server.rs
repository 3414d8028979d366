//! Axum HTTP server for the REST API

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::manager::FleetManager;
use crate::{Error, Result};

use super::handlers;

/// Metrics endpoint handler
#[cfg(feature = "metrics")]
async fn metrics_handler() -> (axum::http::StatusCode, String) {
    match crate::metrics::encode_registry() {
        Ok(body) => (axum::http::StatusCode::OK, body),
        Err(e) => {
            tracing::error!("{}", e);
            (axum::http::StatusCode::INTERNAL_SERVER_ERROR, String::new())
        }
    }
}

pub fn build_router(manager: Arc<FleetManager>) -> Router {
    let router = Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/v1/management-clusters",
            post(handlers::register_management_cluster).get(handlers::list_management_clusters),
        )
        .route(
            "/api/v1/management-clusters/{key}",
            get(handlers::get_management_cluster).delete(handlers::delete_management_cluster),
        )
        .route(
            "/api/v1/clusters",
            post(handlers::create_cluster).get(handlers::list_all_clusters),
        )
        .route(
            "/api/v1/regions/{region}/clusters",
            get(handlers::list_region_clusters),
        )
        .route(
            "/api/v1/regions/{region}/clusters/{id}",
            get(handlers::get_cluster).delete(handlers::delete_cluster),
        );

    #[cfg(feature = "metrics")]
    let router = router.route("/metrics", get(metrics_handler));

    router
        .layer(TraceLayer::new_for_http())
        .with_state(manager)
}

/// Run the REST API server until ctrl-c
pub async fn run_server(manager: Arc<FleetManager>, addr: SocketAddr) -> Result<()> {
    let app = build_router(manager);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::ConfigError(format!("Failed to bind to {}: {}", addr, e)))?;
    info!("REST API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .map_err(|e| Error::ConfigError(format!("Server error: {}", e)))?;

    Ok(())
}

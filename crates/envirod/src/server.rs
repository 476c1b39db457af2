//! HTTP server for envirod.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::query::QueryService;
use crate::routes;

/// Application state shared across handlers.
pub struct AppState {
    pub query: QueryService,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(query: QueryService) -> Self {
        Self {
            query,
            start_time: Instant::now(),
        }
    }
}

/// Assemble the full API router. Split out of [`run`] so tests can drive
/// the routes without a socket.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::station_routes())
        .merge(routes::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server until the process is stopped.
pub async fn run(state: AppState, listen: &str) -> Result<()> {
    let app = router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!("Listening on http://{listen}");
    axum::serve(listener, app).await?;
    Ok(())
}

pub mod handlers;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

pub use handlers::ApiState;

/// All routes, nested under `/api`.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/search", post(handlers::handle_search))
        .route("/query", post(handlers::handle_query))
        .route("/reply", post(handlers::handle_reply))
        .route("/status", get(handlers::handle_status))
        .route("/resources", get(handlers::handle_resources))
        .route("/neighbors", get(handlers::handle_neighbors))
        .route("/daemon/shutdown", post(handlers::handle_shutdown))
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(cors)
}

/// Serve the API until the daemon shutdown signal fires.
pub async fn serve(state: ApiState, bind: &str, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind((bind, port)).await?;
    tracing::info!(bind, port, "API listening");
    serve_on(listener, state).await
}

/// Serve on an already bound listener.
pub async fn serve_on(listener: tokio::net::TcpListener, state: ApiState) -> anyhow::Result<()> {
    let mut shutdown = state.shutdown_tx.subscribe();
    let app = router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;
    tracing::info!("API stopped");
    Ok(())
}

//! The HTTP API.
//!
//! - `GET /` (or `/exec`) lists entries, newest first.
//! - `POST /` (or `/exec`) adds an entry or, with `{"action": "delete", "id": ...}`, deletes one.
//! - `GET /healthz` is a liveness check.

mod handlers;
mod state;

use crate::error::Res;
use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use handlers::{ListResponse, PostResponse};
pub use state::{AppState, RECEIPT_TIMEOUT};

/// The largest POST body accepted. A base64 phone photo is several megabytes, well past axum's
/// 2 MB default.
pub const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Creates the application router with all routes and middleware.
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route(
            "/",
            get(handlers::list_entries).post(handlers::post_entry),
        )
        .route(
            "/exec",
            get(handlers::list_entries).post(handlers::post_entry),
        )
        .route("/healthz", get(handlers::healthz))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves `app` on `bind` until Ctrl-C.
pub(crate) async fn run(app: Router, bind: SocketAddr) -> Res<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Unable to listen on {bind}"))?;
    let local = listener.local_addr().unwrap_or(bind);
    info!("Listening on http://{local}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("The HTTP server stopped unexpectedly")?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // Without a signal handler, run until the process is killed.
        std::future::pending::<()>().await;
    }
}

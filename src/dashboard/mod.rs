//! Dashboard: Axum web server for the day's bets and the bankroll.
//!
//! Serves a JSON API and a self-contained HTML page.
//! CORS enabled for local development.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    response::Html,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use routes::AppState;

/// The embedded dashboard HTML (compiled into the binary).
const DASHBOARD_HTML: &str = include_str!("templates/index.html");

/// Bind and serve until the process is stopped.
pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind dashboard to {addr}"))?;
    info!(addr = %addr, "Dashboard server listening on http://{addr}");

    axum::serve(listener, app)
        .await
        .context("Dashboard server error")
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        // Bankroll & bets of the day
        .route("/api/bankroll", get(routes::get_bankroll))
        .route("/api/propositions", get(routes::get_propositions))
        .route("/api/combined/preview", post(routes::preview_combined))
        .route(
            "/api/combined",
            post(routes::add_combined).delete(routes::clear_combined),
        )
        .route("/api/export", post(routes::export_propositions))
        // Results & review
        .route("/api/exported", get(routes::get_exported))
        .route("/api/results/preview", post(routes::preview_results))
        .route("/api/results", post(routes::save_results))
        .route("/api/history", get(routes::get_history))
        .route("/api/bankroll-curve", get(routes::get_bankroll_curve))
        .route("/api/stats", get(routes::get_stats))
        .route("/health", get(routes::health))
        // Dashboard HTML
        .route("/", get(serve_dashboard))
        .layer(cors)
        .with_state(state)
}

/// Serve the embedded HTML dashboard.
async fn serve_dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

use std::time::Duration;

use axum::{
    Router,
    routing::{get, patch},
};
use tower_http::cors::{Any, CorsLayer};

use crate::application::ExpenseService;

use super::{expenses, stats};

#[derive(Clone)]
pub struct ServerState {
    pub service: ExpenseService,
}

pub fn router(service: ExpenseService) -> Router {
    Router::new()
        .route("/api/expenses", get(expenses::list).post(expenses::create))
        .route("/api/expenses/overdue", get(expenses::overdue))
        .route("/api/expenses/unpaid", get(expenses::unpaid))
        .route("/api/expenses/recurring", get(expenses::recurring))
        .route("/api/expenses/status", get(expenses::by_status))
        .route("/api/expenses/search", get(expenses::search))
        .route("/api/expenses/period", get(expenses::period))
        .route(
            "/api/expenses/payment-method/{method}",
            get(expenses::by_payment_method),
        )
        .route("/api/expenses/stats", get(stats::summary))
        .route("/api/expenses/stats/total", get(stats::total))
        .route("/api/expenses/stats/total-overdue", get(stats::total_overdue))
        .route("/api/expenses/stats/total-unpaid", get(stats::total_unpaid))
        .route("/api/expenses/stats/count-unpaid", get(stats::count_unpaid))
        .route(
            "/api/expenses/{id}",
            get(expenses::get)
                .put(expenses::update)
                .delete(expenses::delete),
        )
        .route("/api/expenses/{id}/mark-paid", patch(expenses::mark_paid))
        .route("/api/expenses/{id}/mark-unpaid", patch(expenses::mark_unpaid))
        .route("/api/expenses/{id}/mark-overdue", patch(expenses::mark_overdue))
        .layer(cors())
        .with_state(ServerState { service })
}

/// Any origin may call the API; browsers may cache preflights for an hour.
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600))
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn run(service: ExpenseService, addr: &str) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    run_with_listener(service, listener).await
}

pub async fn run_with_listener(
    service: ExpenseService,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

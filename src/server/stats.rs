//! Aggregate endpoints. Money goes out as decimal strings ("1500.00").

use axum::{Json, extract::State};

use crate::application::ExpenseSummary;
use crate::domain::format_cents;

use super::{ServerError, router::ServerState};

pub async fn summary(State(state): State<ServerState>) -> Result<Json<ExpenseSummary>, ServerError> {
    Ok(Json(state.service.summary().await?))
}

pub async fn total(State(state): State<ServerState>) -> Result<Json<String>, ServerError> {
    Ok(Json(format_cents(state.service.total_amount().await?)))
}

pub async fn total_overdue(State(state): State<ServerState>) -> Result<Json<String>, ServerError> {
    Ok(Json(format_cents(
        state.service.total_overdue_amount().await?,
    )))
}

pub async fn total_unpaid(State(state): State<ServerState>) -> Result<Json<String>, ServerError> {
    Ok(Json(format_cents(state.service.total_unpaid_amount().await?)))
}

pub async fn count_unpaid(State(state): State<ServerState>) -> Result<Json<i64>, ServerError> {
    Ok(Json(state.service.count_unpaid().await?))
}

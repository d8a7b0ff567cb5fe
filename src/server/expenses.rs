//! Expense resource endpoints

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::{Expense, ExpenseDraft, ExpenseId};

use super::{ServerError, router::ServerState};

/// Body of a full replace. `version`, when present, must match the stored one.
#[derive(Debug, Deserialize)]
pub struct ExpenseUpdate {
    #[serde(flatten)]
    pub draft: ExpenseDraft,
    #[serde(default)]
    pub version: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub term: String,
}

#[derive(Debug, Deserialize)]
pub struct PeriodParams {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct StatusParams {
    pub paid: bool,
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServerError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ServerError::BadRequest(rejection.body_text()))
}

fn path<T>(segment: Result<Path<T>, PathRejection>) -> Result<T, ServerError> {
    segment
        .map(|Path(value)| value)
        .map_err(|rejection| ServerError::BadRequest(rejection.body_text()))
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, ServerError> {
    params
        .map(|Query(value)| value)
        .map_err(|rejection| ServerError::BadRequest(rejection.body_text()))
}

/// Handle requests for creating a new expense
pub async fn create(
    State(state): State<ServerState>,
    payload: Result<Json<ExpenseDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<Expense>), ServerError> {
    let draft = body(payload)?;
    let expense = state.service.create(draft).await?;
    Ok((StatusCode::CREATED, Json(expense)))
}

pub async fn list(State(state): State<ServerState>) -> Result<Json<Vec<Expense>>, ServerError> {
    Ok(Json(state.service.list_all().await?))
}

pub async fn get(
    State(state): State<ServerState>,
    id: Result<Path<ExpenseId>, PathRejection>,
) -> Result<Json<Expense>, ServerError> {
    let id = path(id)?;
    Ok(Json(state.service.get(id).await?))
}

/// Handle requests replacing every mutable field of an expense
pub async fn update(
    State(state): State<ServerState>,
    id: Result<Path<ExpenseId>, PathRejection>,
    payload: Result<Json<ExpenseUpdate>, JsonRejection>,
) -> Result<Json<Expense>, ServerError> {
    let id = path(id)?;
    let ExpenseUpdate { draft, version } = body(payload)?;
    Ok(Json(state.service.update(id, draft, version).await?))
}

pub async fn delete(
    State(state): State<ServerState>,
    id: Result<Path<ExpenseId>, PathRejection>,
) -> Result<StatusCode, ServerError> {
    let id = path(id)?;
    state.service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_paid(
    State(state): State<ServerState>,
    id: Result<Path<ExpenseId>, PathRejection>,
) -> Result<Json<Expense>, ServerError> {
    let id = path(id)?;
    Ok(Json(state.service.mark_paid(id).await?))
}

pub async fn mark_unpaid(
    State(state): State<ServerState>,
    id: Result<Path<ExpenseId>, PathRejection>,
) -> Result<Json<Expense>, ServerError> {
    let id = path(id)?;
    Ok(Json(state.service.mark_unpaid(id).await?))
}

pub async fn mark_overdue(
    State(state): State<ServerState>,
    id: Result<Path<ExpenseId>, PathRejection>,
) -> Result<Json<Expense>, ServerError> {
    let id = path(id)?;
    Ok(Json(state.service.mark_overdue(id).await?))
}

pub async fn by_payment_method(
    State(state): State<ServerState>,
    method: Result<Path<String>, PathRejection>,
) -> Result<Json<Vec<Expense>>, ServerError> {
    let method = path(method)?;
    Ok(Json(state.service.find_by_payment_method(&method).await?))
}

pub async fn overdue(State(state): State<ServerState>) -> Result<Json<Vec<Expense>>, ServerError> {
    Ok(Json(state.service.find_overdue().await?))
}

pub async fn unpaid(State(state): State<ServerState>) -> Result<Json<Vec<Expense>>, ServerError> {
    Ok(Json(state.service.find_unpaid().await?))
}

pub async fn recurring(
    State(state): State<ServerState>,
) -> Result<Json<Vec<Expense>>, ServerError> {
    Ok(Json(state.service.find_recurring().await?))
}

pub async fn by_status(
    State(state): State<ServerState>,
    params: Result<Query<StatusParams>, QueryRejection>,
) -> Result<Json<Vec<Expense>>, ServerError> {
    let params = query(params)?;
    Ok(Json(state.service.find_by_payment_status(params.paid).await?))
}

pub async fn search(
    State(state): State<ServerState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Vec<Expense>>, ServerError> {
    let params = query(params)?;
    Ok(Json(state.service.find_by_description(&params.term).await?))
}

pub async fn period(
    State(state): State<ServerState>,
    params: Result<Query<PeriodParams>, QueryRejection>,
) -> Result<Json<Vec<Expense>>, ServerError> {
    let params = query(params)?;
    Ok(Json(
        state
            .service
            .find_by_date_range(params.start, params.end)
            .await?,
    ))
}

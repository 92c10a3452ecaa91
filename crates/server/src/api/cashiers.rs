//! Cashier handlers: directory, visible queue and operational state.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use queuedesk_core::visibility::DEFAULT_QUEUE_LIMIT;
use queuedesk_core::{
    Cashier, CashierStatusLog, CreateCashierRequest, IntervalChange, QueueViewOptions, Ticket,
};

use super::error::ApiResult;
use super::services::SetActiveBody;
use crate::state::AppState;

/// Default page size for status history.
const DEFAULT_HISTORY_LIMIT: usize = 50;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListCashiersParams {
    pub service_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListCashiersResponse {
    pub cashiers: Vec<Cashier>,
}

/// Request body for moving a cashier to another service (or none).
#[derive(Debug, Deserialize)]
pub struct AssignServiceBody {
    pub service_id: Option<i64>,
}

/// Query parameters for the visible queue.
#[derive(Debug, Deserialize)]
pub struct QueueParams {
    pub reservation_aware: Option<bool>,
    pub include_in_attention: Option<bool>,
    pub limit: Option<usize>,
}

impl QueueParams {
    fn options(&self) -> QueueViewOptions {
        QueueViewOptions {
            reservation_aware: self.reservation_aware.unwrap_or(true),
            include_in_attention: self.include_in_attention.unwrap_or(false),
            limit: self.limit.unwrap_or(DEFAULT_QUEUE_LIMIT),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub cashier_id: i64,
    pub tickets: Vec<Ticket>,
}

/// Request body for pause / out-of-service / resume.
#[derive(Debug, Deserialize)]
pub struct StateChangeBody {
    pub user: String,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusHistoryParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct StatusHistoryResponse {
    pub cashier_id: i64,
    pub entries: Vec<CashierStatusLog>,
}

// ============================================================================
// Directory
// ============================================================================

pub async fn create_cashier(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateCashierRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Cashier>)> {
    let Json(body) = payload?;
    let cashier = state.orchestrator().create_cashier(&body)?;
    Ok((StatusCode::CREATED, Json(cashier)))
}

pub async fn list_cashiers(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListCashiersParams>,
) -> ApiResult<Json<ListCashiersResponse>> {
    let cashiers = state.orchestrator().list_cashiers(params.service_id)?;
    Ok(Json(ListCashiersResponse { cashiers }))
}

pub async fn get_cashier(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Cashier>> {
    Ok(Json(state.orchestrator().get_cashier(id)?))
}

pub async fn assign_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    payload: Result<Json<AssignServiceBody>, JsonRejection>,
) -> ApiResult<Json<Cashier>> {
    let Json(body) = payload?;
    Ok(Json(
        state
            .orchestrator()
            .assign_cashier_service(id, body.service_id)?,
    ))
}

pub async fn set_cashier_active(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    payload: Result<Json<SetActiveBody>, JsonRejection>,
) -> ApiResult<Json<Cashier>> {
    let Json(body) = payload?;
    Ok(Json(state.orchestrator().set_cashier_active(id, body.active)?))
}

// ============================================================================
// Queue
// ============================================================================

/// Ordered queue as seen from this cashier's window.
pub async fn visible_queue(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(params): Query<QueueParams>,
) -> ApiResult<Json<QueueResponse>> {
    let tickets = state
        .orchestrator()
        .list_visible_queue(id, &params.options())?;
    Ok(Json(QueueResponse {
        cashier_id: id,
        tickets,
    }))
}

// ============================================================================
// Operational state
// ============================================================================

pub async fn pause(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    payload: Result<Json<StateChangeBody>, JsonRejection>,
) -> ApiResult<Json<IntervalChange>> {
    let Json(body) = payload?;
    let change = state
        .orchestrator()
        .pause_cashier(id, body.comment.as_deref(), &body.user)
        .await?;
    Ok(Json(change))
}

pub async fn out_of_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    payload: Result<Json<StateChangeBody>, JsonRejection>,
) -> ApiResult<Json<IntervalChange>> {
    let Json(body) = payload?;
    let change = state
        .orchestrator()
        .out_of_service_cashier(id, body.comment.as_deref(), &body.user)
        .await?;
    Ok(Json(change))
}

pub async fn resume(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    payload: Result<Json<StateChangeBody>, JsonRejection>,
) -> ApiResult<Json<IntervalChange>> {
    let Json(body) = payload?;
    let change = state
        .orchestrator()
        .resume_cashier(id, body.comment.as_deref(), &body.user)
        .await?;
    Ok(Json(change))
}

pub async fn status_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(params): Query<StatusHistoryParams>,
) -> ApiResult<Json<StatusHistoryResponse>> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let entries = state.orchestrator().get_status_history(id, limit)?;
    Ok(Json(StatusHistoryResponse {
        cashier_id: id,
        entries,
    }))
}

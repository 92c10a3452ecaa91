//! Ticket API handlers.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use queuedesk_core::{
    AttendanceSpan, CreateTicketRequest, Ticket, TicketHistoryEntry, TicketStatus,
    TicketTransfer, TransferResult, TransitionRequest,
};

use super::error::ApiResult;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for a status change. The ticket id comes from the path.
#[derive(Debug, Deserialize)]
pub struct TransitionBody {
    pub to_status: TicketStatus,
    pub cashier_id: Option<i64>,
    pub acting_user_id: String,
    pub observations: Option<String>,
}

/// Request body for transfers and handoffs.
#[derive(Debug, Deserialize)]
pub struct MoveBody {
    pub to_cashier_id: i64,
    pub user: String,
    pub comment: Option<String>,
}

/// Request body for setting (or clearing, with `null`) a reservation pin.
#[derive(Debug, Deserialize)]
pub struct ReserveBody {
    pub cashier_id: Option<i64>,
    pub user: String,
}

/// Request body for the end-of-day sweep.
#[derive(Debug, Deserialize)]
pub struct SweepBody {
    /// Pending tickets issued before this day are abandoned.
    pub before_day: NaiveDate,
    pub user: String,
}

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub abandoned: usize,
    pub tickets: Vec<Ticket>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub ticket_id: i64,
    pub entries: Vec<TicketHistoryEntry>,
}

#[derive(Debug, Serialize)]
pub struct SpansResponse {
    pub ticket_id: i64,
    pub spans: Vec<AttendanceSpan>,
}

#[derive(Debug, Serialize)]
pub struct TransfersResponse {
    pub ticket_id: i64,
    pub transfers: Vec<TicketTransfer>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Issue a ticket with the next label of its service.
pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateTicketRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Ticket>)> {
    let Json(body) = payload?;
    let ticket = state.orchestrator().create_ticket(body).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Ticket>> {
    Ok(Json(state.orchestrator().get_ticket(id)?))
}

pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<HistoryResponse>> {
    let entries = state.orchestrator().ticket_history(id)?;
    Ok(Json(HistoryResponse {
        ticket_id: id,
        entries,
    }))
}

pub async fn get_spans(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<SpansResponse>> {
    let spans = state.orchestrator().attendance_spans(id)?;
    Ok(Json(SpansResponse { ticket_id: id, spans }))
}

pub async fn get_transfers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<TransfersResponse>> {
    let transfers = state.orchestrator().ticket_transfers(id)?;
    Ok(Json(TransfersResponse {
        ticket_id: id,
        transfers,
    }))
}

pub async fn transition(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    payload: Result<Json<TransitionBody>, JsonRejection>,
) -> ApiResult<Json<Ticket>> {
    let Json(body) = payload?;
    let request = TransitionRequest {
        ticket_id: id,
        to_status: body.to_status,
        cashier_id: body.cashier_id,
        acting_user_id: body.acting_user_id,
        observations: body.observations,
    };
    Ok(Json(state.orchestrator().transition(request).await?))
}

pub async fn transfer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    payload: Result<Json<MoveBody>, JsonRejection>,
) -> ApiResult<Json<TransferResult>> {
    let Json(body) = payload?;
    let result = state
        .orchestrator()
        .transfer_ticket(id, body.to_cashier_id, &body.user, body.comment.as_deref())
        .await?;
    Ok(Json(result))
}

pub async fn handoff(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    payload: Result<Json<MoveBody>, JsonRejection>,
) -> ApiResult<Json<Ticket>> {
    let Json(body) = payload?;
    let ticket = state
        .orchestrator()
        .handoff_ticket(id, body.to_cashier_id, &body.user, body.comment.as_deref())
        .await?;
    Ok(Json(ticket))
}

pub async fn reserve(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    payload: Result<Json<ReserveBody>, JsonRejection>,
) -> ApiResult<Json<Ticket>> {
    let Json(body) = payload?;
    let ticket = state
        .orchestrator()
        .reserve_ticket(id, body.cashier_id, &body.user)
        .await?;
    Ok(Json(ticket))
}

/// End-of-day sweep of pending tickets left from earlier days.
pub async fn sweep(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SweepBody>, JsonRejection>,
) -> ApiResult<Json<SweepResponse>> {
    let Json(body) = payload?;
    let tickets = state
        .orchestrator()
        .cancel_stale_pending(body.before_day, &body.user)
        .await?;
    Ok(Json(SweepResponse {
        abandoned: tickets.len(),
        tickets,
    }))
}

//! Service directory handlers.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use queuedesk_core::{CreateServiceRequest, Service};

use super::error::ApiResult;
use crate::state::AppState;

/// Request body for enabling or disabling a service or cashier.
#[derive(Debug, Deserialize)]
pub struct SetActiveBody {
    pub active: bool,
}

#[derive(Debug, Serialize)]
pub struct ListServicesResponse {
    pub services: Vec<Service>,
}

pub async fn create_service(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateServiceRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Service>)> {
    let Json(body) = payload?;
    let service = state.orchestrator().create_service(&body)?;
    Ok((StatusCode::CREATED, Json(service)))
}

pub async fn list_services(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ListServicesResponse>> {
    let services = state.orchestrator().list_services()?;
    Ok(Json(ListServicesResponse { services }))
}

pub async fn get_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Service>> {
    Ok(Json(state.orchestrator().get_service(id)?))
}

pub async fn set_service_active(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    payload: Result<Json<SetActiveBody>, JsonRejection>,
) -> ApiResult<Json<Service>> {
    let Json(body) = payload?;
    Ok(Json(state.orchestrator().set_service_active(id, body.active)?))
}

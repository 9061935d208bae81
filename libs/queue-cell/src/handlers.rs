use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{CreateEntryRequest, Initiator, TransitionRequest};
use crate::services::{QueueService, StatusNotifier};

/// Shared cell state: configuration plus the notifier's broadcast channel,
/// which must outlive individual requests so subscribers see all events.
pub struct QueueState {
    pub config: Arc<AppConfig>,
    pub notifier: StatusNotifier,
}

impl QueueState {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            config,
            notifier: StatusNotifier::new(),
        }
    }
}

fn service(state: &QueueState) -> QueueService {
    QueueService::new(&state.config, state.notifier.clone())
}

#[axum::debug_handler]
pub async fn create_entry(
    State(state): State<Arc<QueueState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<CreateEntryRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let entry = service(&state).create_entry(request, auth.token()).await?;

    Ok((StatusCode::CREATED, Json(json!(entry))))
}

#[axum::debug_handler]
pub async fn claim_next(
    State(state): State<Arc<QueueState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(station_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let entry = service(&state).claim_next(station_id, auth.token()).await?;

    Ok(Json(json!({ "entry": entry })))
}

#[axum::debug_handler]
pub async fn transition_entry(
    State(state): State<Arc<QueueState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(entry_id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<Value>, AppError> {
    let outcome = service(&state)
        .transition(entry_id, request.target_status, Initiator::Staff, auth.token())
        .await?;

    Ok(Json(json!(outcome)))
}

#[axum::debug_handler]
pub async fn get_wait_info(
    State(state): State<Arc<QueueState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let info = service(&state).wait_info(entry_id, auth.token()).await?;

    Ok(Json(json!(info)))
}

#[axum::debug_handler]
pub async fn get_flow_status(
    State(state): State<Arc<QueueState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let steps = service(&state).flow_status(entry_id, auth.token()).await?;

    Ok(Json(json!({ "steps": steps })))
}

#[axum::debug_handler]
pub async fn get_active_entry(
    State(state): State<Arc<QueueState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let entry = service(&state).active_entry(patient_id, auth.token()).await?;

    Ok(Json(json!({ "entry": entry })))
}

#[axum::debug_handler]
pub async fn get_patient_status(
    State(state): State<Arc<QueueState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let status = service(&state)
        .patient_status(patient_id, auth.token())
        .await?;

    Ok(Json(json!({ "status": status })))
}

#[axum::debug_handler]
pub async fn sweep_no_shows(
    State(state): State<Arc<QueueState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(station_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let transitioned = service(&state)
        .sweep_no_shows(station_id, auth.token())
        .await?;

    Ok(Json(json!({ "transitioned": transitioned })))
}

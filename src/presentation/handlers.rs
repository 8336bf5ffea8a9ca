// HTTP request handlers
use crate::domain::anomaly::{AnomalyRef, FixMethod};
use crate::domain::entity::EntityBound;
use crate::application::cleaning_service::{DeleteOutcome, FixOutcome};
use crate::application::scan_request::ScanRequest;
use crate::infrastructure::chunked_json::stream_items;
use crate::infrastructure::http_response::{accepts_brotli, json_response};
use crate::presentation::app_state::AppState;
use crate::presentation::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct DeleteRequest {
    pub selection: Vec<AnomalyRef>,
}

#[derive(Deserialize)]
pub struct FixRequest {
    pub selection: Vec<AnomalyRef>,
    pub method: FixMethod,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn list_entities(
    State(state): State<Arc<AppState>>,
) -> Json<BTreeMap<String, EntityBound>> {
    Json(state.entity_service.list().await)
}

pub async fn upsert_entity(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(bound): Json<EntityBound>,
) -> ApiResult<StatusCode> {
    state.entity_service.upsert(&id, bound).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_entity(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<StatusCode> {
    if state.entity_service.remove(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("Unknown entity: {}", id)))
    }
}

/// Run a scan; the result replaces the current anomaly list
pub async fn run_scan(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    Json(request): Json<ScanRequest>,
) -> ApiResult<Response> {
    let entity = state.entity_service.get(&request.entity_id).await;
    let plan = request.resolve(entity.as_ref(), &state.scan_defaults)?;
    let anomalies = state.cleaning_service.scan(&plan).await?;

    Ok(json_response(&anomalies, accepts_brotli(&headers)).await?)
}

pub async fn list_anomalies(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Response> {
    let anomalies = state.cleaning_service.anomalies().await;
    Ok(json_response(&anomalies, accepts_brotli(&headers)).await?)
}

/// Current anomaly list as NDJSON
pub async fn stream_anomalies(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    stream_items(state.cleaning_service.anomalies().await)
}

/// Context rows around one anomaly; `id` is a list position or an anomaly id
pub async fn anomaly_context(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    let reference: AnomalyRef = id
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Not an index or anomaly id: {}", id)))?;
    let rows = state.cleaning_service.context(reference).await?;
    Ok(Json(rows))
}

pub async fn delete_anomalies(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DeleteRequest>,
) -> Json<DeleteOutcome> {
    Json(state.cleaning_service.delete(&request.selection).await)
}

pub async fn fix_anomalies(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FixRequest>,
) -> Json<FixOutcome> {
    Json(
        state
            .cleaning_service
            .fix(&request.selection, request.method)
            .await,
    )
}

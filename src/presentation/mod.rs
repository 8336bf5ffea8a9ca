// Presentation layer - HTTP routing
pub mod app_state;
pub mod error;
pub mod handlers;

use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    anomaly_context, delete_anomalies, fix_anomalies, health_check, list_anomalies,
    list_entities, remove_entity, run_scan, stream_anomalies, upsert_entity,
};
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/entities", get(list_entities))
        .route("/entities/:id", put(upsert_entity).delete(remove_entity))
        .route("/scans", post(run_scan))
        .route("/anomalies", get(list_anomalies))
        .route("/anomalies/stream", get(stream_anomalies))
        .route("/anomalies/:id/context", get(anomaly_context))
        .route("/anomalies/delete", post(delete_anomalies))
        .route("/anomalies/fix", post(fix_anomalies))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

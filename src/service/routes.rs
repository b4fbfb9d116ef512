//! Reference HTTP binding of the queue operations
//!
//! JSON in, JSON out. Rejections carry `{ok: false, error, kind}` so that a
//! remote client can rebuild the typed error.

use crate::error::QueueError;
use crate::service::app::AppState;
use crate::service::health::{HealthCheck, HealthStatus};
use crate::store::QueueStore;
use crate::types::{
    Ack, CreateQueueRequest, CreateQueueResponse, ErrorBody, JoinRequest, JoinResponse,
    LeaveRequest, QueueDetail, QueueListResponse, DEFAULT_QUEUE_ID,
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error};

type SharedState = Arc<AppState>;

/// Build the router for the reference binding
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/queues", get(list_queues).post(create_queue))
        .route(
            "/api/queues/{queue_id}",
            get(queue_detail).delete(delete_queue),
        )
        .route("/api/queues/{queue_id}/join", post(join_queue))
        .route("/api/queues/{queue_id}/leave", post(leave_queue))
        .route("/api/queues/{queue_id}/clear", post(clear_queue))
        // single-queue surface targeting the default queue
        .route("/api/queue", get(legacy_detail))
        .route("/api/queue/join", post(legacy_join))
        .route("/api/queue/leave", post(legacy_leave))
        .route("/api/queue/clear", post(legacy_clear))
        .with_state(state)
}

/// Queue error rendered as an HTTP response
#[derive(Debug)]
pub struct ApiError(QueueError);

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(QueueError::validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self.0 {
            QueueError::Validation { .. } => (StatusCode::BAD_REQUEST, "validation"),
            QueueError::InvalidOperation { .. } => (StatusCode::BAD_REQUEST, "invalid_operation"),
            QueueError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            QueueError::Forbidden { .. } => (StatusCode::FORBIDDEN, "forbidden"),
            QueueError::Transport { .. }
            | QueueError::Storage { .. }
            | QueueError::Internal { .. } => {
                error!("Request failed: {}", self.0);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };

        let body = ErrorBody {
            ok: false,
            error: self.0.detail().to_string(),
            kind: Some(kind.to_string()),
        };
        (status, Json(body)).into_response()
    }
}

/// Run one store call, recording its outcome and latency
async fn tracked<T>(
    state: &AppState,
    operation: &'static str,
    call: impl Future<Output = crate::error::Result<T>>,
) -> Result<T, ApiError> {
    let timer = state.metrics().start_timer();
    let result = call.await;
    let outcome = match &result {
        Ok(_) => "ok",
        Err(err) => err.kind(),
    };
    state
        .metrics()
        .record_operation(operation, outcome, timer.stop());
    if let Err(err) = &result {
        debug!("{} rejected: {}", operation, err);
    }
    result.map_err(ApiError::from)
}

async fn list_queues(State(state): State<SharedState>) -> Result<Json<QueueListResponse>, ApiError> {
    let store = state.store();
    let queues = tracked(&state, "list", store.list()).await?;
    Ok(Json(QueueListResponse { queues }))
}

async fn create_queue(
    State(state): State<SharedState>,
    body: Result<Json<CreateQueueRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateQueueResponse>), ApiError> {
    let Json(request) = body?;
    let store = state.store();
    let queue = tracked(&state, "create", store.create(request)).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateQueueResponse { ok: true, queue }),
    ))
}

async fn queue_detail(
    State(state): State<SharedState>,
    Path(queue_id): Path<String>,
) -> Result<Json<QueueDetail>, ApiError> {
    let store = state.store();
    Ok(Json(tracked(&state, "detail", store.detail(&queue_id)).await?))
}

async fn delete_queue(
    State(state): State<SharedState>,
    Path(queue_id): Path<String>,
) -> Result<Json<Ack>, ApiError> {
    let store = state.store();
    tracked(&state, "delete", store.delete(&queue_id)).await?;
    Ok(Json(Ack::ok()))
}

async fn join_queue(
    State(state): State<SharedState>,
    Path(queue_id): Path<String>,
    body: Result<Json<JoinRequest>, JsonRejection>,
) -> Result<Json<JoinResponse>, ApiError> {
    join(&state, &queue_id, body).await
}

async fn leave_queue(
    State(state): State<SharedState>,
    Path(queue_id): Path<String>,
    body: Result<Json<LeaveRequest>, JsonRejection>,
) -> Result<Json<Ack>, ApiError> {
    leave(&state, &queue_id, body).await
}

async fn clear_queue(
    State(state): State<SharedState>,
    Path(queue_id): Path<String>,
) -> Result<Json<Ack>, ApiError> {
    clear(&state, &queue_id).await
}

async fn legacy_detail(State(state): State<SharedState>) -> Result<Json<QueueDetail>, ApiError> {
    let store = state.store();
    Ok(Json(
        tracked(&state, "detail", store.detail(DEFAULT_QUEUE_ID)).await?,
    ))
}

async fn legacy_join(
    State(state): State<SharedState>,
    body: Result<Json<JoinRequest>, JsonRejection>,
) -> Result<Json<JoinResponse>, ApiError> {
    join(&state, DEFAULT_QUEUE_ID, body).await
}

async fn legacy_leave(
    State(state): State<SharedState>,
    body: Result<Json<LeaveRequest>, JsonRejection>,
) -> Result<Json<Ack>, ApiError> {
    leave(&state, DEFAULT_QUEUE_ID, body).await
}

async fn legacy_clear(State(state): State<SharedState>) -> Result<Json<Ack>, ApiError> {
    clear(&state, DEFAULT_QUEUE_ID).await
}

async fn join(
    state: &AppState,
    queue_id: &str,
    body: Result<Json<JoinRequest>, JsonRejection>,
) -> Result<Json<JoinResponse>, ApiError> {
    let Json(request) = body?;
    let store = state.store();
    let position = tracked(state, "join", store.join(queue_id, request)).await?;
    Ok(Json(JoinResponse { ok: true, position }))
}

async fn leave(
    state: &AppState,
    queue_id: &str,
    body: Result<Json<LeaveRequest>, JsonRejection>,
) -> Result<Json<Ack>, ApiError> {
    let Json(request) = body?;
    let store = state.store();
    tracked(state, "leave", store.leave(queue_id, request)).await?;
    Ok(Json(Ack::ok()))
}

async fn clear(state: &AppState, queue_id: &str) -> Result<Json<Ack>, ApiError> {
    let store = state.store();
    tracked(state, "clear", store.clear(queue_id)).await?;
    Ok(Json(Ack::ok()))
}

/// Root endpoint handler - shows service information
async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    Json(json!({
        "service": state.config().service.name,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/api/queues", "/api/queue", "/health", "/metrics"]
    }))
}

async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let health = HealthCheck::check(&state);
    let status = match health.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(health))
}

/// Prometheus metrics endpoint handler
async fn metrics_handler(State(state): State<SharedState>) -> Response {
    let metrics = state.metrics();
    match state.store().list().await {
        Ok(queues) => metrics.update_queue_gauges(&queues),
        Err(e) => error!("Failed to refresh queue gauges: {}", e),
    }

    match metrics.encode_text() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics".to_string(),
            )
                .into_response()
        }
    }
}

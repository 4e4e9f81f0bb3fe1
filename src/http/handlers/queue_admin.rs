use crate::domain::job::WebhookJobData;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct FailedJobsQuery {
    pub limit: Option<usize>,
}

pub async fn queue_health(State(state): State<AppState>) -> impl IntoResponse {
    let health = state.queue.get_health().await;
    (axum::http::StatusCode::OK, Json(health)).into_response()
}

pub async fn list_failed(
    State(state): State<AppState>,
    Query(query): Query<FailedJobsQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(50).min(500);
    let jobs = state.queue.get_failed_jobs(limit).await;
    (
        axum::http::StatusCode::OK,
        Json(serde_json::json!({"count": jobs.len(), "jobs": jobs})),
    )
        .into_response()
}

pub async fn retry_failed(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> impl IntoResponse {
    match state.queue.retry_failed_job(&event_id).await {
        Ok(job) => (
            axum::http::StatusCode::OK,
            Json(serde_json::json!({
                "event_id": job.data.event_id,
                "state": job.state,
            })),
        )
            .into_response(),
        Err(err) => (
            axum::http::StatusCode::CONFLICT,
            Json(serde_json::json!({"error": err.to_string()})),
        )
            .into_response(),
    }
}

/// Backfill/tooling entry point. The production receiver enqueues through
/// the library call, not this route.
pub async fn enqueue_job(
    State(state): State<AppState>,
    Json(data): Json<WebhookJobData>,
) -> impl IntoResponse {
    match state.queue.enqueue(data).await {
        Ok(outcome) => {
            let job = outcome.job();
            let status = if outcome.is_duplicate() {
                axum::http::StatusCode::OK
            } else {
                axum::http::StatusCode::ACCEPTED
            };
            (
                status,
                Json(serde_json::json!({
                    "event_id": job.data.event_id,
                    "priority": job.priority,
                    "duplicate": outcome.is_duplicate(),
                })),
            )
                .into_response()
        }
        Err(err) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": err.to_string()})),
        )
            .into_response(),
    }
}

pub async fn pause(State(state): State<AppState>) -> impl IntoResponse {
    match state.queue.pause().await {
        Ok(()) => (axum::http::StatusCode::OK, Json(serde_json::json!({"paused": true}))).into_response(),
        Err(err) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": err.to_string()})),
        )
            .into_response(),
    }
}

pub async fn resume(State(state): State<AppState>) -> impl IntoResponse {
    match state.queue.resume().await {
        Ok(()) => (axum::http::StatusCode::OK, Json(serde_json::json!({"paused": false}))).into_response(),
        Err(err) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": err.to_string()})),
        )
            .into_response(),
    }
}

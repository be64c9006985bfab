use crate::intake::IntakeError;
use crate::state::AppState;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use storage::keys::is_valid_image_id;
use storage::{ImageStatus, StorageEvent};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

// JSON framing around the base64 payload
const BODY_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn router(state: AppState) -> Router {
    // base64 inflates the payload by 4/3
    let body_limit = (state.intake.max_upload_bytes() as usize)
        .saturating_mul(4)
        .div_ceil(3)
        .saturating_add(BODY_OVERHEAD_BYTES);

    Router::new()
        .route("/upload", post(upload_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub image_id: String,
    pub image_data: String,
}

async fn upload_handler(
    State(state): State<AppState>,
    payload: Result<Json<UploadRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    let intake = state.intake.clone();
    let submitted = tokio::task::spawn_blocking(move || {
        intake.submit_base64(&request.image_id, &request.image_data)
    })
    .await;

    let submission = match submitted {
        Ok(Ok(submission)) => submission,
        Ok(Err(e)) => {
            let status = match e {
                IntakeError::Duplicate(_) => StatusCode::CONFLICT,
                IntakeError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            };
            if status.is_server_error() {
                tracing::error!(error = %e, "Upload failed");
            } else {
                tracing::warn!(error = %e, "Upload rejected");
            }
            return error_response(status, e.to_string());
        }
        Err(e) => {
            tracing::error!(error = %e, "Upload task panicked or was cancelled");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "upload failed");
        }
    };

    let event = StorageEvent::object_created(
        &submission.bucket,
        &submission.stored_key,
        submission.size as u64,
    );
    // The upload is durable at this point; a lost notification leaves the
    // record pending rather than failing the request
    if let Err(e) = state.notifications.send(event).await {
        tracing::error!(
            error = %e,
            image_id = %submission.image_id,
            "Failed to queue storage notification"
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "message": "Upload successful and entry created.",
            "image_id": submission.image_id,
            "stored_key": submission.stored_key,
        })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub image_id: Option<String>,
}

async fn status_handler(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Response {
    let Some(image_id) = query.image_id.filter(|id| !id.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "image_id is required");
    };
    if !is_valid_image_id(&image_id) {
        return error_response(StatusCode::BAD_REQUEST, format!("invalid image_id {image_id:?}"));
    }

    let records = state.intake.records().clone();
    let lookup = tokio::task::spawn_blocking(move || records.get(&image_id)).await;

    match lookup {
        Ok(Ok(Some(record))) => Json(json!({
            "status": record.status,
            "result": record.result,
            "error": record.error_message,
        }))
        .into_response(),
        // Not written yet: the upload may still be in flight
        Ok(Ok(None)) => Json(json!({
            "status": ImageStatus::Pending,
            "result": null,
            "error": null,
        }))
        .into_response(),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Status lookup failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => {
            tracing::error!(error = %e, "Status task panicked or was cancelled");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "status lookup failed")
        }
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "model_loaded": (state.model_ready)(),
    }))
}

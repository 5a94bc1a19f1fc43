use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::models::NotificationResult;
use crate::startup::AppState;

/// Largest accepted relay request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// `POST /api/send-notification`
///
/// The body is taken as raw bytes so that malformed JSON is reported in the
/// relay's own result shape.
#[tracing::instrument(skip(state, body), fields(body_len = body.len()))]
pub async fn send_notification(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    match state.relay.relay_body(&state.relay_settings, &body).await {
        Ok(delivery) => (
            StatusCode::OK,
            Json(NotificationResult::delivered(delivery.message_id)),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Any non-POST request on the function-style relay route.
pub async fn function_method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(NotificationResult {
            success: false,
            message_id: None,
            error: Some("Method not allowed".to_string()),
            details: None,
        }),
    )
}

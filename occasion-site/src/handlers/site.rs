use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};

use crate::startup::AppState;

pub const ALLOWED_METHODS: &str = "GET, HEAD, POST";

/// Everything that is not a relay `POST`: GET and HEAD go to the static
/// responder, any other method is rejected.
pub async fn dispatch(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    if method == Method::GET || method == Method::HEAD {
        serve_asset(&state, &method, uri.path()).await
    } else {
        method_not_allowed().await.into_response()
    }
}

pub async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, ALLOWED_METHODS)],
        "Method Not Allowed",
    )
}

async fn serve_asset(state: &AppState, method: &Method, path: &str) -> Response {
    let asset = match state.static_files.serve(path).await {
        Ok(asset) => asset,
        Err(e) => {
            tracing::debug!(path, status = %e.status(), "Static asset not served");
            return e.into_response();
        }
    };

    let length = asset.bytes.len();
    let mut response = if *method == Method::HEAD {
        ([(header::CONTENT_TYPE, asset.content_type)], ()).into_response()
    } else {
        ([(header::CONTENT_TYPE, asset.content_type)], asset.bytes).into_response()
    };
    response
        .headers_mut()
        .insert(header::CONTENT_LENGTH, HeaderValue::from(length));

    response
}

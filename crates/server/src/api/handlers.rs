use axum::{extract::State, http::header, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;

use bookhound_core::{SanitizedConfig, SearchError, SessionError};

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    /// Whether a chat client is attached to the bridge.
    pub bridge_connected: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error half of every API handler result.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map a session error to its HTTP status.
pub fn session_error(error: &SessionError) -> ApiError {
    let status = match error {
        SessionError::Search(SearchError::DuplicateSearch { .. }) => StatusCode::CONFLICT,
        SessionError::Search(SearchError::NotFound(_)) | SessionError::ResultNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        SessionError::Search(SearchError::InvalidPhrase(_))
        | SessionError::Search(SearchError::NoSearchPeer)
        | SessionError::UnknownPeer(_)
        | SessionError::UnknownDownloader(_)
        | SessionError::InvalidDownloadDir(_)
        | SessionError::InvalidDownloadLine(_)
        | SessionError::InvalidFilename(_) => StatusCode::BAD_REQUEST,
        SessionError::Transport(_) => StatusCode::BAD_GATEWAY,
        SessionError::Archive(_) | SessionError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        bridge_connected: state.bridge().is_connected(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// Prometheus scrape endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state).await;
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}

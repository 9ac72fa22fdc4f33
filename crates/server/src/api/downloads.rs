//! Download API handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use bookhound_core::Download;

use super::handlers::{session_error, ApiError};
use crate::state::AppState;

/// Request body for a download: a result of a search, or a listing line.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DownloadBody {
    Result { search_id: Uuid, index: usize },
    Line { line: String },
}

/// The line sent to the channel.
#[derive(Debug, Serialize)]
pub struct DownloadRequestResponse {
    pub line: String,
}

#[derive(Debug, Serialize)]
pub struct ListDownloadsResponse {
    pub downloads: Vec<Download>,
    pub total: usize,
}

/// Ask a peer for a file
pub async fn request_download(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DownloadBody>,
) -> Result<(StatusCode, Json<DownloadRequestResponse>), ApiError> {
    let mut session = state.session().lock().await;
    let line = match body {
        DownloadBody::Result { search_id, index } => session.request_download(search_id, index),
        DownloadBody::Line { line } => session.request_download_line(&line),
    }
    .map_err(|e| session_error(&e))?;

    Ok((StatusCode::ACCEPTED, Json(DownloadRequestResponse { line })))
}

/// Files saved so far
pub async fn list_downloads(State(state): State<Arc<AppState>>) -> Json<ListDownloadsResponse> {
    let session = state.session().lock().await;
    let downloads = session.downloads().to_vec();
    Json(ListDownloadsResponse {
        total: downloads.len(),
        downloads,
    })
}

//! Preference and search peer handlers.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use bookhound_core::{Preferences, PreferencesUpdate};

use super::handlers::{session_error, ApiError};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PeersResponse {
    /// Search peers announced in the channel topic.
    pub peers: Vec<String>,
    pub search_peer: Option<String>,
}

pub async fn get_preferences(State(state): State<Arc<AppState>>) -> Json<Preferences> {
    let session = state.session().lock().await;
    Json(session.preferences().clone())
}

/// Apply a partial update; nothing changes if any field is rejected.
pub async fn update_preferences(
    State(state): State<Arc<AppState>>,
    Json(update): Json<PreferencesUpdate>,
) -> Result<Json<Preferences>, ApiError> {
    let mut session = state.session().lock().await;
    let preferences = session
        .update_preferences(update)
        .map_err(|e| session_error(&e))?;
    Ok(Json(preferences.clone()))
}

pub async fn list_peers(State(state): State<Arc<AppState>>) -> Json<PeersResponse> {
    let session = state.session().lock().await;
    Json(PeersResponse {
        peers: session.peers().to_vec(),
        search_peer: session.preferences().search_peer.clone(),
    })
}

//! Search API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use bookhound_core::{GroupKey, IndexedRecord, RecordGroup, Search, SearchStatus};

use super::handlers::{session_error, ApiError, ErrorResponse};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for submitting a search
#[derive(Debug, Deserialize)]
pub struct CreateSearchBody {
    /// Operator text; the search suffix is appended by the session.
    pub query: String,
}

/// Query parameters for listing searches
#[derive(Debug, Deserialize)]
pub struct ListSearchesParams {
    /// "active", "completed" or "all" (default)
    pub view: Option<String>,
}

/// Query parameters for search results
#[derive(Debug, Deserialize)]
pub struct ResultsParams {
    /// Only results advertised by this origin peer.
    pub peer: Option<String>,
    /// Ignore the preferred downloader and show every origin peer.
    #[serde(default)]
    pub all: bool,
    /// "grouped" (default), "editions" or "all"
    pub view: Option<String>,
}

/// Response for search operations
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub id: Uuid,
    pub phrase: String,
    pub peer: String,
    pub status: SearchStatus,
    /// Whether the search still waits on the peer.
    pub live: bool,
    pub expected_count: Option<u32>,
    pub result_count: usize,
    pub malformed_lines: usize,
    pub failure: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Search> for SearchResponse {
    fn from(search: &Search) -> Self {
        Self {
            id: search.id(),
            phrase: search.phrase().to_string(),
            peer: search.peer().to_string(),
            status: search.status(),
            live: search.is_live(),
            expected_count: search.expected_count(),
            result_count: search.results().len(),
            malformed_lines: search.malformed_lines(),
            failure: search.failure().map(str::to_string),
            created_at: search.created_at().to_rfc3339(),
            updated_at: search.updated_at().to_rfc3339(),
        }
    }
}

/// Response for listing searches
#[derive(Debug, Serialize)]
pub struct ListSearchesResponse {
    pub searches: Vec<SearchResponse>,
    pub total: usize,
}

/// One logical work with all its advertised copies.
///
/// Each record's `index` is what `POST /downloads` takes.
#[derive(Debug, Serialize)]
pub struct GroupResponse {
    pub name: String,
    pub key: GroupKey,
    pub records: Vec<IndexedRecord>,
}

/// Response for search results
#[derive(Debug, Serialize)]
pub struct ResultsResponse {
    pub search_id: Uuid,
    pub status: SearchStatus,
    /// Origin peer the results were narrowed to, if any.
    pub downloader: Option<String>,
    pub view: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<GroupResponse>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<IndexedRecord>>,
}

/// Response for the origin peers of a search
#[derive(Debug, Serialize)]
pub struct DownloadersResponse {
    pub search_id: Uuid,
    pub downloaders: Vec<String>,
    pub preferred: Option<String>,
}

fn bad_request(error: String) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error }))
}

impl From<RecordGroup<IndexedRecord>> for GroupResponse {
    fn from(group: RecordGroup<IndexedRecord>) -> Self {
        Self {
            name: group.display_name(),
            key: group.key,
            records: group.records,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Submit a new search
pub async fn create_search(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateSearchBody>,
) -> Result<(StatusCode, Json<SearchResponse>), ApiError> {
    let mut session = state.session().lock().await;
    let search = session
        .submit_search(&body.query)
        .map_err(|e| session_error(&e))?;
    Ok((StatusCode::CREATED, Json(SearchResponse::from(&search))))
}

/// List searches
pub async fn list_searches(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListSearchesParams>,
) -> Result<Json<ListSearchesResponse>, ApiError> {
    let session = state.session().lock().await;
    let searches: Vec<SearchResponse> = match params.view.as_deref().unwrap_or("all") {
        "active" => session
            .active_searches()
            .into_iter()
            .map(SearchResponse::from)
            .collect(),
        "completed" => session
            .completed_searches()
            .into_iter()
            .map(SearchResponse::from)
            .collect(),
        "all" => session
            .all_searches()
            .iter()
            .map(SearchResponse::from)
            .collect(),
        other => return Err(bad_request(format!("Unknown view: {}", other))),
    };

    Ok(Json(ListSearchesResponse {
        total: searches.len(),
        searches,
    }))
}

/// Get a search by ID
pub async fn get_search(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SearchResponse>, ApiError> {
    let session = state.session().lock().await;
    let search = session.search(id).map_err(|e| session_error(&e))?;
    Ok(Json(SearchResponse::from(search)))
}

/// Cancel a search (DELETE endpoint)
pub async fn cancel_search(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SearchResponse>, ApiError> {
    let mut session = state.session().lock().await;
    let before = session.search(id).map_err(|e| session_error(&e))?.status();
    let search = session.cancel_search(id).map_err(|e| session_error(&e))?;
    if search.status() != before {
        state.bridge().broadcast(super::BridgeMessage::SearchUpdate {
            search_id: id,
            status: search.status(),
        });
    }
    Ok(Json(SearchResponse::from(&search)))
}

/// Results of a search, narrowed to one origin peer unless `all` is set.
///
/// Without an explicit `peer` the preferred downloader applies.
pub async fn get_results(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<ResultsParams>,
) -> Result<Json<ResultsResponse>, ApiError> {
    let session = state.session().lock().await;
    let status = session.search(id).map_err(|e| session_error(&e))?.status();

    let downloader = if params.all {
        None
    } else {
        params
            .peer
            .filter(|p| !p.trim().is_empty())
            .or_else(|| session.preferences().preferred_downloader.clone())
    };
    let peer = downloader.as_deref();

    let view = params.view.unwrap_or_else(|| "grouped".to_string());
    let (groups, records) = match view.as_str() {
        "grouped" => {
            let groups = session
                .grouped_results(id, peer)
                .map_err(|e| session_error(&e))?;
            (Some(groups.into_iter().map(GroupResponse::from).collect()), None)
        }
        "editions" => {
            let editions = session.editions(id, peer).map_err(|e| session_error(&e))?;
            (None, Some(editions))
        }
        "all" => {
            let records = session
                .results_from(id, peer)
                .map_err(|e| session_error(&e))?;
            (None, Some(records))
        }
        other => return Err(bad_request(format!("Unknown view: {}", other))),
    };

    Ok(Json(ResultsResponse {
        search_id: id,
        status,
        downloader,
        view,
        groups,
        records,
    }))
}

/// Origin peers advertising results for a search
pub async fn get_downloaders(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DownloadersResponse>, ApiError> {
    let session = state.session().lock().await;
    let downloaders = session.downloaders(id).map_err(|e| session_error(&e))?;
    Ok(Json(DownloadersResponse {
        search_id: id,
        downloaders,
        preferred: session.preferences().preferred_downloader.clone(),
    }))
}

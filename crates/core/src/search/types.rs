//! Core search data types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::machine::ReplyBindings;
use crate::listing::Record;

// ============================================================================
// Status
// ============================================================================

/// Lifecycle status of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    /// Request sent, waiting for the peer to acknowledge it.
    Pending,
    /// Peer accepted the request and is searching.
    InProgress,
    /// Peer reported no matches.
    NoResults,
    /// Peer reported matches; the listing may still be on its way.
    ResultsFound,
    /// Rejected, timed out, cancelled, or the transport failed.
    Error,
}

impl SearchStatus {
    /// Returns true once the peer can no longer change the outcome.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SearchStatus::NoResults | SearchStatus::ResultsFound | SearchStatus::Error
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchStatus::Pending => "pending",
            SearchStatus::InProgress => "in_progress",
            SearchStatus::NoResults => "no_results",
            SearchStatus::ResultsFound => "results_found",
            SearchStatus::Error => "error",
        }
    }
}

impl fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Identity
// ============================================================================

/// Fold whitespace variance out of a phrase.
///
/// Underscores count as spaces, runs of whitespace collapse to one space,
/// and case is ignored, so "Twelve_Days  EPUB" and "twelve days epub" are
/// the same phrase.
pub fn normalize_phrase(phrase: &str) -> String {
    phrase
        .replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Identity under which at most one live search may exist.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchKey {
    pub peer: String,
    pub phrase: String,
}

impl SearchKey {
    pub fn new(peer: &str, phrase: &str) -> Self {
        Self {
            peer: peer.trim().to_lowercase(),
            phrase: normalize_phrase(phrase),
        }
    }
}

// ============================================================================
// Search
// ============================================================================

/// One outstanding or completed request to a search peer.
#[derive(Debug, Clone, Serialize)]
pub struct Search {
    pub(crate) id: Uuid,
    /// Text sent to the peer (operator input plus suffix).
    pub(crate) phrase: String,
    pub(crate) peer: String,
    pub(crate) status: SearchStatus,
    pub(crate) results: Vec<Record>,
    /// Match count announced by the peer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) expected_count: Option<u32>,
    /// Listing lines that carried the marker but failed to parse.
    pub(crate) malformed_lines: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) failure: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) bindings: ReplyBindings,
}

impl Search {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn status(&self) -> SearchStatus {
        self.status
    }

    pub fn results(&self) -> &[Record] {
        &self.results
    }

    pub fn expected_count(&self) -> Option<u32> {
        self.expected_count
    }

    pub fn malformed_lines(&self) -> usize {
        self.malformed_lines
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn key(&self) -> SearchKey {
        SearchKey::new(&self.peer, &self.phrase)
    }

    /// A search is live while the peer can still move it forward.
    pub fn is_live(&self) -> bool {
        !self.bindings.is_empty()
    }

    /// Returns true once the search left the active view.
    pub fn is_completed(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns true if `peer` is the peer this search was sent to.
    pub fn is_for_peer(&self, peer: &str) -> bool {
        self.peer.eq_ignore_ascii_case(peer.trim())
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors produced by search registration and lookup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SearchError {
    /// A live search for the same peer and phrase already exists.
    #[error("search for {phrase:?} is already outstanding with {peer} ({existing})")]
    DuplicateSearch {
        peer: String,
        phrase: String,
        existing: Uuid,
    },

    #[error("search not found: {0}")]
    NotFound(Uuid),

    /// The phrase is empty once whitespace is folded.
    #[error("invalid search phrase: {0:?}")]
    InvalidPhrase(String),

    /// No search peer is selected.
    #[error("no search peer selected")]
    NoSearchPeer,
}

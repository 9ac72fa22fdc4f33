//! Per-search reply state machine.
//!
//! Each search owns the small set of reply bindings valid for its current
//! status. An inbound message is evaluated against those bindings only; the
//! first one that fires performs the transition and replaces the whole set,
//! so a search leaves a state at most once per message.

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::types::{normalize_phrase, Search, SearchError, SearchStatus};
use crate::listing::ParsedListing;
use crate::metrics::{LISTING_RECORDS, SEARCH_OUTCOMES};

static ACCEPTED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)accepted").unwrap());
static SORRY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)sorry").unwrap());
static RESULT_COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)returned\s+(\d+)\s+match").unwrap());
static NO_MATCH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)no\s+match|sorry").unwrap());

// ============================================================================
// Bindings
// ============================================================================

/// A reply shape a search is currently waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Binding {
    /// Negative acknowledgement while pending.
    Rejected,
    /// Positive acknowledgement while pending.
    Accepted,
    /// "returned N matches" while in progress.
    ResultCount,
    /// "no matches" or an apology while in progress.
    NoResults,
    /// File offer carrying the result listing.
    Listing,
}

/// The phrase pattern of a search plus the bindings valid right now.
///
/// Order within `active` is evaluation order.
#[derive(Debug, Clone)]
pub(crate) struct ReplyBindings {
    phrase: Regex,
    active: Vec<Binding>,
}

impl ReplyBindings {
    /// Bindings of a freshly submitted search.
    pub(crate) fn pending(phrase: &str) -> Result<Self, SearchError> {
        let pattern = phrase_pattern(phrase)
            .ok_or_else(|| SearchError::InvalidPhrase(phrase.to_string()))?;
        let phrase = Regex::new(&pattern)
            .map_err(|_| SearchError::InvalidPhrase(phrase.to_string()))?;
        Ok(Self {
            phrase,
            active: vec![Binding::Rejected, Binding::Accepted],
        })
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub(crate) fn contains(&self, binding: Binding) -> bool {
        self.active.contains(&binding)
    }

    fn install(&mut self, bindings: &[Binding]) {
        self.active = bindings.to_vec();
    }

    fn clear(&mut self) {
        self.active.clear();
    }

    fn mentions_phrase(&self, text: &str) -> bool {
        self.phrase.is_match(text)
    }
}

/// Case-insensitive pattern matching the phrase with spaces and underscores
/// interchangeable. Every word is escaped.
///
/// The phrase must stand on its own: the characters around it, if any, are
/// not letters or digits, so "days" does not match inside "holidays".
pub(crate) fn phrase_pattern(phrase: &str) -> Option<String> {
    let normalized = normalize_phrase(phrase);
    if normalized.is_empty() {
        return None;
    }
    let words: Vec<String> = normalized
        .split(' ')
        .map(regex_lite::escape)
        .collect();
    Some(format!(
        r"(?i)(?:^|[^A-Za-z0-9]){}(?:$|[^A-Za-z0-9])",
        words.join(r"[\s_]+")
    ))
}

// ============================================================================
// Transitions
// ============================================================================

/// A status change of one search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub search_id: Uuid,
    pub from: SearchStatus,
    pub to: SearchStatus,
}

impl Search {
    pub(crate) fn new(
        peer: &str,
        phrase: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, SearchError> {
        let bindings = ReplyBindings::pending(phrase)?;
        Ok(Self {
            id: Uuid::new_v4(),
            phrase: phrase.trim().to_string(),
            peer: peer.trim().to_string(),
            status: SearchStatus::Pending,
            results: Vec::new(),
            expected_count: None,
            malformed_lines: 0,
            failure: None,
            created_at: now,
            updated_at: now,
            bindings,
        })
    }

    /// Returns true if `text` mentions this search's phrase.
    pub(crate) fn mentions_phrase(&self, text: &str) -> bool {
        self.bindings.mentions_phrase(text)
    }

    /// Length of the normalized phrase; longer phrases are more specific.
    pub(crate) fn specificity(&self) -> usize {
        normalize_phrase(&self.phrase).chars().count()
    }

    /// Evaluate a private message from this search's peer.
    ///
    /// Messages that do not mention the phrase never fire.
    pub(crate) fn handle_reply(&mut self, text: &str, now: DateTime<Utc>) -> Option<StatusChange> {
        if !self.bindings.mentions_phrase(text) {
            return None;
        }

        for binding in self.bindings.active.clone() {
            match binding {
                Binding::Rejected if SORRY.is_match(text) => {
                    return Some(self.fail("peer rejected the search", now));
                }
                Binding::Accepted if ACCEPTED.is_match(text) => {
                    self.bindings
                        .install(&[Binding::ResultCount, Binding::NoResults]);
                    return Some(self.transition(SearchStatus::InProgress, now));
                }
                Binding::ResultCount => {
                    let Some(caps) = RESULT_COUNT.captures(text) else {
                        continue;
                    };
                    let count = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok());
                    if count == Some(0) {
                        self.bindings.clear();
                        return Some(self.transition(SearchStatus::NoResults, now));
                    }
                    self.expected_count = count;
                    self.bindings.install(&[Binding::Listing]);
                    return Some(self.transition(SearchStatus::ResultsFound, now));
                }
                Binding::NoResults if NO_MATCH.is_match(text) => {
                    self.bindings.clear();
                    return Some(self.transition(SearchStatus::NoResults, now));
                }
                _ => {}
            }
        }
        None
    }

    /// Returns true if a file offered by `from` as `filename` is this
    /// search's listing.
    pub(crate) fn accepts_listing(&self, from: &str, filename: &str) -> bool {
        self.bindings.contains(Binding::Listing)
            && self.is_for_peer(from)
            && self.bindings.mentions_phrase(filename)
    }

    /// Store the parsed listing and drop the listing binding.
    pub(crate) fn deliver_listing(&mut self, listing: ParsedListing, now: DateTime<Utc>) {
        self.bindings.clear();
        self.malformed_lines = listing.failures.len();
        self.results = listing.records;
        self.updated_at = now;

        SEARCH_OUTCOMES
            .with_label_values(&["results_delivered"])
            .inc();
        LISTING_RECORDS
            .with_label_values(&[])
            .observe(self.results.len() as f64);
        info!(
            search_id = %self.id,
            records = self.results.len(),
            malformed = self.malformed_lines,
            expected = ?self.expected_count,
            "Listing delivered"
        );
    }

    /// Tear down all bindings and move to `error`.
    pub(crate) fn fail(&mut self, reason: &str, now: DateTime<Utc>) -> StatusChange {
        self.bindings.clear();
        self.failure = Some(reason.to_string());
        self.transition(SearchStatus::Error, now)
    }

    /// Apply the idle timeout.
    ///
    /// A search still waiting on a reply fails. A search waiting only on its
    /// listing keeps `results_found` and just stops waiting.
    pub(crate) fn expire(&mut self, timeout: Duration, now: DateTime<Utc>) -> Option<StatusChange> {
        if !self.is_live() || now - self.updated_at <= timeout {
            return None;
        }
        if self.status == SearchStatus::ResultsFound {
            self.bindings.clear();
            self.updated_at = now;
            debug!(search_id = %self.id, "Listing never arrived, dropping listing binding");
            return None;
        }
        Some(self.fail("timed out waiting for peer", now))
    }

    fn transition(&mut self, to: SearchStatus, now: DateTime<Utc>) -> StatusChange {
        let from = self.status;
        self.status = to;
        self.updated_at = now;
        if to.is_terminal() {
            SEARCH_OUTCOMES.with_label_values(&[to.as_str()]).inc();
        }
        info!(
            search_id = %self.id,
            peer = %self.peer,
            phrase = %self.phrase,
            from = %from,
            to = %to,
            "Search status changed"
        );
        StatusChange {
            search_id: self.id,
            from,
            to,
        }
    }
}

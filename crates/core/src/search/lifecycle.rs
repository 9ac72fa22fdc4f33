//! Drives searches through their state machines from chat events.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::machine::StatusChange;
use super::registry::SearchRegistry;
use super::types::{Search, SearchError};
use crate::listing::parse_lines;
use crate::metrics::SEARCHES_SUBMITTED;

/// What a private message did to the searches of its sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// At least one search changed status.
    Transitioned(Vec<StatusChange>),
    /// The sender has live searches but none of them recognized the text.
    Unmatched,
    /// The sender has no live searches.
    NoLiveSearch,
}

/// Owns the registry and applies every event to it as one step.
#[derive(Debug, Default)]
pub struct SearchLifecycle {
    registry: SearchRegistry,
    timeout: Option<Duration>,
}

impl SearchLifecycle {
    /// `timeout` of `None` lets searches wait forever.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            registry: SearchRegistry::new(),
            timeout,
        }
    }

    pub fn registry(&self) -> &SearchRegistry {
        &self.registry
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Register a new search and arm its acknowledgement bindings.
    pub fn submit(
        &mut self,
        peer: &str,
        phrase: &str,
        now: DateTime<Utc>,
    ) -> Result<&Search, SearchError> {
        let search = self.registry.register(peer, phrase, now)?;
        SEARCHES_SUBMITTED.inc();
        info!(
            search_id = %search.id(),
            peer = %search.peer(),
            phrase = %search.phrase(),
            "Search submitted"
        );
        Ok(search)
    }

    /// Offer a private message to the live searches of its sender.
    ///
    /// Only the searches whose phrase the message names most specifically
    /// see it, so a reply about "twelve days epub" leaves a search for
    /// "days epub" alone.
    pub fn on_reply(&mut self, from: &str, text: &str, now: DateTime<Utc>) -> ReplyOutcome {
        if self.registry.live_for(from).next().is_none() {
            return ReplyOutcome::NoLiveSearch;
        }

        let targets = most_specific(
            self.registry
                .live_for(from)
                .filter(|s| s.mentions_phrase(text)),
        );
        let mut changes = Vec::new();
        for id in targets {
            if let Some(change) = self
                .registry
                .get_mut(id)
                .and_then(|search| search.handle_reply(text, now))
            {
                changes.push(change);
            }
        }

        if changes.is_empty() {
            ReplyOutcome::Unmatched
        } else {
            ReplyOutcome::Transitioned(changes)
        }
    }

    /// Searches whose listing binding accepts this file offer, narrowed to
    /// the most specific phrase.
    pub fn listing_targets(&self, from: &str, filename: &str) -> Vec<Uuid> {
        most_specific(
            self.registry
                .live_for(from)
                .filter(|s| s.accepts_listing(from, filename)),
        )
    }

    /// Parse listing lines into the search's results.
    pub fn deliver_listing<S: AsRef<str>>(
        &mut self,
        id: Uuid,
        lines: &[S],
        now: DateTime<Utc>,
    ) -> Result<&Search, SearchError> {
        let search = self
            .registry
            .get_mut(id)
            .ok_or(SearchError::NotFound(id))?;
        let listing = parse_lines(lines);
        debug!(
            search_id = %id,
            ignored = listing.ignored,
            "Parsed listing"
        );
        search.deliver_listing(listing, now);
        Ok(search)
    }

    /// The listing arrived but could not be read.
    pub fn listing_unreadable(
        &mut self,
        id: Uuid,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<StatusChange, SearchError> {
        let search = self
            .registry
            .get_mut(id)
            .ok_or(SearchError::NotFound(id))?;
        warn!(search_id = %id, reason = %reason, "Listing unreadable");
        Ok(search.fail(&format!("unreadable listing: {}", reason), now))
    }

    /// The request for this search never reached the peer.
    pub fn transport_failed(
        &mut self,
        id: Uuid,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<StatusChange, SearchError> {
        let search = self
            .registry
            .get_mut(id)
            .ok_or(SearchError::NotFound(id))?;
        warn!(search_id = %id, reason = %reason, "Transport failed for search");
        Ok(search.fail(reason, now))
    }

    /// Cancel a live search. Finished searches are returned unchanged.
    pub fn cancel(&mut self, id: Uuid, now: DateTime<Utc>) -> Result<&Search, SearchError> {
        let search = self
            .registry
            .get_mut(id)
            .ok_or(SearchError::NotFound(id))?;
        if search.is_live() {
            search.fail("cancelled", now);
        } else {
            debug!(search_id = %id, status = %search.status(), "Cancel on finished search ignored");
        }
        Ok(search)
    }

    /// Apply the idle timeout to every live search.
    pub fn expire_overdue(&mut self, now: DateTime<Utc>) -> Vec<StatusChange> {
        let Some(timeout) = self.timeout else {
            return Vec::new();
        };
        let changes: Vec<StatusChange> = self
            .registry
            .live_mut()
            .filter_map(|s| s.expire(timeout, now))
            .collect();
        if !changes.is_empty() {
            info!(expired = changes.len(), "Expired overdue searches");
        }
        changes
    }
}

/// Ids of the candidates with the longest phrase, in submission order.
fn most_specific<'a>(candidates: impl Iterator<Item = &'a Search>) -> Vec<Uuid> {
    let candidates: Vec<&Search> = candidates.collect();
    let longest = candidates
        .iter()
        .map(|s| s.specificity())
        .max()
        .unwrap_or_default();
    candidates
        .into_iter()
        .filter(|s| s.specificity() == longest)
        .map(|s| s.id())
        .collect()
}

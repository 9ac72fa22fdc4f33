//! In-memory store of searches, in submission order.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::types::{normalize_phrase, Search, SearchError, SearchKey};

/// Owned store of outstanding and completed searches.
///
/// Nothing is persisted; the registry lives as long as the session.
#[derive(Debug, Default)]
pub struct SearchRegistry {
    searches: Vec<Search>,
}

impl SearchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending search.
    ///
    /// Fails with `DuplicateSearch` while a live search exists for the same
    /// peer and normalized phrase.
    pub fn register(
        &mut self,
        peer: &str,
        phrase: &str,
        now: DateTime<Utc>,
    ) -> Result<&Search, SearchError> {
        if peer.trim().is_empty() {
            return Err(SearchError::NoSearchPeer);
        }
        if normalize_phrase(phrase).is_empty() {
            return Err(SearchError::InvalidPhrase(phrase.to_string()));
        }

        let key = SearchKey::new(peer, phrase);
        if let Some(existing) = self.searches.iter().find(|s| s.is_live() && s.key() == key) {
            return Err(SearchError::DuplicateSearch {
                peer: existing.peer.clone(),
                phrase: existing.phrase.clone(),
                existing: existing.id,
            });
        }

        let search = Search::new(peer, phrase, now)?;
        self.searches.push(search);
        let last = self.searches.len() - 1;
        Ok(&self.searches[last])
    }

    pub fn get(&self, id: Uuid) -> Option<&Search> {
        self.searches.iter().find(|s| s.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: Uuid) -> Option<&mut Search> {
        self.searches.iter_mut().find(|s| s.id == id)
    }

    /// Live searches sent to `peer`, in submission order.
    pub fn live_for<'a>(&'a self, peer: &'a str) -> impl Iterator<Item = &'a Search> + 'a {
        self.searches
            .iter()
            .filter(move |s| s.is_live() && s.is_for_peer(peer))
    }

    pub(crate) fn live_mut(&mut self) -> impl Iterator<Item = &mut Search> {
        self.searches.iter_mut().filter(|s| s.is_live())
    }

    /// Searches that have not reached a terminal status.
    pub fn active(&self) -> Vec<&Search> {
        self.searches.iter().filter(|s| !s.is_completed()).collect()
    }

    /// Searches that reached a terminal status.
    pub fn completed(&self) -> Vec<&Search> {
        self.searches.iter().filter(|s| s.is_completed()).collect()
    }

    pub fn all(&self) -> &[Search] {
        &self.searches
    }

    pub fn len(&self) -> usize {
        self.searches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.searches.is_empty()
    }
}

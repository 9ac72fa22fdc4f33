//! Session controller: chat events in, searches and downloads out.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::preferences::{expand_home, Preferences, PreferencesUpdate};
use super::topic::parse_search_peers;
use super::transport::{ChatEvent, ChatTransport};
use super::SessionError;
use crate::archive::read_listing_lines;
use crate::config::Config;
use crate::listing::{
    downloaders, group_records, unique_editions, IndexedRecord, Record, RecordGroup, LINE_MARKER,
};
use crate::metrics::{DOWNLOADS_REQUESTED, UNSOLICITED_FILES};
use crate::search::{ReplyOutcome, Search, SearchError, SearchLifecycle, StatusChange};

// ============================================================================
// Settings and outcomes
// ============================================================================

/// Fixed settings of a session, taken from configuration.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub channel: String,
    pub sentinel: String,
    pub default_peer: Option<String>,
    pub suffix: String,
    pub download_dir: PathBuf,
    pub timeout: Option<Duration>,
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            channel: config.chat.channel.clone(),
            sentinel: config.search.sentinel.clone(),
            default_peer: config
                .search
                .default_peer
                .as_deref()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty()),
            suffix: config.search.suffix.trim().to_string(),
            download_dir: expand_home(&config.downloads.path),
            timeout: (config.search.timeout_secs > 0)
                .then(|| Duration::seconds(config.search.timeout_secs as i64)),
        }
    }
}

/// A file saved to the download directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Download {
    pub path: PathBuf,
    pub from: String,
    pub received_at: DateTime<Utc>,
}

/// What happened to an inbound file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// The file was the listing of these searches.
    ListingDelivered { search_ids: Vec<Uuid> },
    /// The file was a listing but could not be read; the searches failed.
    ListingUnreadable { search_ids: Vec<Uuid>, reason: String },
    /// The file matched no search and was saved as a download.
    Saved(Download),
}

/// What a chat event did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Topic parsed; carries the candidates and the selected search peer.
    PeersDiscovered {
        peers: Vec<String>,
        search_peer: Option<String>,
    },
    /// Searches changed status.
    Transitioned(Vec<StatusChange>),
    /// A search peer said something no search recognized.
    UnknownPeerAcknowledgement { from: String, text: String },
    File(FileOutcome),
    /// Nothing in the session cared about the event.
    Ignored,
}

// ============================================================================
// Controller
// ============================================================================

/// Glue between a chat transport, the search lifecycle and the operator.
///
/// Every event and operator action runs to completion before the next one;
/// hosts that receive events concurrently put the controller behind a
/// single lock.
pub struct SessionController<T: ChatTransport> {
    transport: T,
    settings: SessionSettings,
    lifecycle: SearchLifecycle,
    preferences: Preferences,
    peers: Vec<String>,
    downloads: Vec<Download>,
}

impl<T: ChatTransport> SessionController<T> {
    pub fn new(transport: T, settings: SessionSettings) -> Self {
        let preferences = Preferences {
            search_peer: settings.default_peer.clone(),
            search_suffix: settings.suffix.clone(),
            download_dir: settings.download_dir.clone(),
            preferred_downloader: None,
        };
        Self {
            transport,
            lifecycle: SearchLifecycle::new(settings.timeout),
            settings,
            preferences,
            peers: Vec::new(),
            downloads: Vec::new(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    // ------------------------------------------------------------------------
    // Inbound events
    // ------------------------------------------------------------------------

    /// Single entry point for chat events.
    pub fn handle_event(&mut self, event: ChatEvent) -> Result<EventOutcome, SessionError> {
        match event {
            ChatEvent::Joined { topic } => Ok(self.on_joined(&topic)),
            ChatEvent::PrivateMessage { from, text } => Ok(self.on_private_message(from, text)),
            ChatEvent::FileOffer {
                from,
                filename,
                data,
            } => self.on_file_offer(&from, &filename, &data).map(EventOutcome::File),
        }
    }

    fn on_joined(&mut self, topic: &str) -> EventOutcome {
        let peers = parse_search_peers(topic, &self.settings.sentinel);
        if !peers.is_empty() {
            let keep = self
                .preferences
                .search_peer
                .as_ref()
                .is_some_and(|current| peers.contains(current));
            if !keep {
                self.preferences.search_peer = peers.first().cloned();
            }
        }
        self.peers = peers.clone();
        info!(
            peers = ?peers,
            search_peer = ?self.preferences.search_peer,
            "Search peers discovered"
        );
        EventOutcome::PeersDiscovered {
            peers,
            search_peer: self.preferences.search_peer.clone(),
        }
    }

    fn on_private_message(&mut self, from: String, text: String) -> EventOutcome {
        match self.lifecycle.on_reply(&from, &text, Utc::now()) {
            ReplyOutcome::Transitioned(changes) => EventOutcome::Transitioned(changes),
            ReplyOutcome::Unmatched => {
                warn!(from = %from, text = %text, "Unrecognized reply from search peer");
                EventOutcome::UnknownPeerAcknowledgement { from, text }
            }
            ReplyOutcome::NoLiveSearch if self.is_known_peer(&from) => {
                warn!(from = %from, text = %text, "Reply from search peer with no live search");
                EventOutcome::UnknownPeerAcknowledgement { from, text }
            }
            ReplyOutcome::NoLiveSearch => {
                debug!(from = %from, "Ignoring private message");
                EventOutcome::Ignored
            }
        }
    }

    fn on_file_offer(
        &mut self,
        from: &str,
        filename: &str,
        data: &[u8],
    ) -> Result<FileOutcome, SessionError> {
        let search_ids = self.lifecycle.listing_targets(from, filename);
        if search_ids.is_empty() {
            return self.save_unsolicited(from, filename, data).map(FileOutcome::Saved);
        }

        let now = Utc::now();
        let lines = self
            .store_temporary(data)
            .and_then(|tmp| read_listing_lines(tmp.path(), filename).map_err(SessionError::from));
        match lines {
            Ok(lines) => {
                for id in &search_ids {
                    self.lifecycle.deliver_listing(*id, lines.as_slice(), now)?;
                }
                Ok(FileOutcome::ListingDelivered { search_ids })
            }
            Err(err) => {
                let reason = err.to_string();
                for id in &search_ids {
                    self.lifecycle.listing_unreadable(*id, &reason, now)?;
                }
                Ok(FileOutcome::ListingUnreadable { search_ids, reason })
            }
        }
    }

    fn store_temporary(&self, data: &[u8]) -> Result<NamedTempFile, SessionError> {
        let dir = &self.preferences.download_dir;
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| SessionError::io(dir, e))?;
        tmp.write_all(data).map_err(|e| SessionError::io(tmp.path(), e))?;
        tmp.flush().map_err(|e| SessionError::io(tmp.path(), e))?;
        Ok(tmp)
    }

    fn save_unsolicited(
        &mut self,
        from: &str,
        filename: &str,
        data: &[u8],
    ) -> Result<Download, SessionError> {
        let name = Path::new(filename)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| SessionError::InvalidFilename(filename.to_string()))?;
        let dest = self.preferences.download_dir.join(name);

        let tmp = self.store_temporary(data)?;
        tmp.persist(&dest)
            .map_err(|e| SessionError::io(&dest, e.error))?;

        UNSOLICITED_FILES.inc();
        info!(from = %from, path = %dest.display(), "New download");
        let download = Download {
            path: dest,
            from: from.to_string(),
            received_at: Utc::now(),
        };
        self.downloads.push(download.clone());
        Ok(download)
    }

    fn is_known_peer(&self, peer: &str) -> bool {
        let peer = peer.to_lowercase();
        self.peers.contains(&peer)
            || self.preferences.search_peer.as_deref() == Some(peer.as_str())
    }

    // ------------------------------------------------------------------------
    // Operator actions
    // ------------------------------------------------------------------------

    /// Submit a search for `text` to the selected search peer.
    pub fn submit_search(&mut self, text: &str) -> Result<Search, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SearchError::InvalidPhrase(text.to_string()).into());
        }
        let peer = self
            .preferences
            .search_peer
            .clone()
            .ok_or(SearchError::NoSearchPeer)?;
        let phrase = format!("{} {}", text, self.preferences.search_suffix)
            .trim()
            .to_string();

        let now = Utc::now();
        let search = self.lifecycle.submit(&peer, &phrase, now)?.clone();
        let line = format!("{}{} {}", self.settings.sentinel, peer, search.phrase());

        if let Err(err) = self.transport.send_line(&self.settings.channel, &line) {
            self.lifecycle
                .transport_failed(search.id(), &err.to_string(), now)?;
            return Err(err.into());
        }
        Ok(search)
    }

    /// Ask the origin peer of a result for its file.
    pub fn request_download(&mut self, search_id: Uuid, index: usize) -> Result<String, SessionError> {
        let record = self
            .search(search_id)?
            .results()
            .get(index)
            .ok_or(SessionError::ResultNotFound { search_id, index })?;
        let line = record.download_command();
        self.send_download(line)
    }

    /// Send an operator-chosen listing line as a download request.
    ///
    /// The line must look like `!<peer> <descriptor>`; any size suffix is
    /// dropped.
    pub fn request_download_line(&mut self, line: &str) -> Result<String, SessionError> {
        let line = line
            .split(crate::listing::INFO_MARKER)
            .next()
            .unwrap_or_default()
            .trim();
        let valid = line
            .strip_prefix(LINE_MARKER)
            .and_then(|rest| rest.split_once(' '))
            .is_some_and(|(peer, descriptor)| !peer.is_empty() && !descriptor.trim().is_empty());
        if !valid {
            return Err(SessionError::InvalidDownloadLine(line.to_string()));
        }
        self.send_download(line.to_string())
    }

    fn send_download(&mut self, line: String) -> Result<String, SessionError> {
        self.transport.send_line(&self.settings.channel, &line)?;
        DOWNLOADS_REQUESTED.inc();
        info!(line = %line, "Download requested");
        Ok(line)
    }

    pub fn cancel_search(&mut self, id: Uuid) -> Result<Search, SessionError> {
        Ok(self.lifecycle.cancel(id, Utc::now())?.clone())
    }

    /// Fail searches the peer has been silent on for too long.
    pub fn expire_overdue(&mut self, now: DateTime<Utc>) -> Vec<StatusChange> {
        self.lifecycle.expire_overdue(now)
    }

    pub fn update_preferences(
        &mut self,
        update: PreferencesUpdate,
    ) -> Result<&Preferences, SessionError> {
        let known_downloaders = self.all_downloaders();
        self.preferences
            .apply(update, &self.peers, &known_downloaders)?;
        info!(preferences = ?self.preferences, "Preferences updated");
        Ok(&self.preferences)
    }

    // ------------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------------

    pub fn search(&self, id: Uuid) -> Result<&Search, SessionError> {
        self.lifecycle
            .registry()
            .get(id)
            .ok_or_else(|| SearchError::NotFound(id).into())
    }

    pub fn active_searches(&self) -> Vec<&Search> {
        self.lifecycle.registry().active()
    }

    pub fn completed_searches(&self) -> Vec<&Search> {
        self.lifecycle.registry().completed()
    }

    pub fn all_searches(&self) -> &[Search] {
        self.lifecycle.registry().all()
    }

    /// Results of a search grouped by work, optionally from one origin peer.
    ///
    /// Every record keeps its index into the search's results.
    pub fn grouped_results(
        &self,
        id: Uuid,
        peer: Option<&str>,
    ) -> Result<Vec<RecordGroup<IndexedRecord>>, SessionError> {
        Ok(group_records(self.results_from(id, peer)?))
    }

    /// One result per distinct edition, best first.
    pub fn editions(
        &self,
        id: Uuid,
        peer: Option<&str>,
    ) -> Result<Vec<IndexedRecord>, SessionError> {
        Ok(unique_editions(self.results_from(id, peer)?))
    }

    /// Origin peers advertising results for a search.
    pub fn downloaders(&self, id: Uuid) -> Result<Vec<String>, SessionError> {
        Ok(downloaders(self.search(id)?.results()))
    }

    /// Origin peers across every search.
    pub fn all_downloaders(&self) -> Vec<String> {
        let records: Vec<Record> = self
            .all_searches()
            .iter()
            .flat_map(|s| s.results().iter().cloned())
            .collect();
        downloaders(&records)
    }

    /// Results of a search with their indices, optionally from one origin
    /// peer.
    pub fn results_from(
        &self,
        id: Uuid,
        peer: Option<&str>,
    ) -> Result<Vec<IndexedRecord>, SessionError> {
        let results = self.search(id)?.results();
        Ok(IndexedRecord::enumerate(results.iter().cloned())
            .into_iter()
            .filter(|r| peer.is_none_or(|peer| r.record.origin_peer.eq_ignore_ascii_case(peer)))
            .collect())
    }

    pub fn downloads(&self) -> &[Download] {
        &self.downloads
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }
}

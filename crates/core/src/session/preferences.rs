//! Operator preferences of a session.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::SessionError;

/// Settings the operator can change while the session runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preferences {
    /// Peer that receives new searches.
    pub search_peer: Option<String>,
    /// Text appended to every search (desired formats).
    pub search_suffix: String,
    /// Where listings are unpacked and downloads are saved.
    pub download_dir: PathBuf,
    /// Origin peer result views are narrowed to by default.
    pub preferred_downloader: Option<String>,
}

/// Partial update of [`Preferences`]. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreferencesUpdate {
    pub search_peer: Option<String>,
    pub suffix: Option<String>,
    pub download_dir: Option<String>,
    /// An empty string clears the preferred downloader.
    pub preferred_downloader: Option<String>,
}

impl Preferences {
    /// Validate and apply an update as a whole.
    ///
    /// `known_peers` and `known_downloaders` restrict the peer choices when
    /// they are non-empty.
    pub fn apply(
        &mut self,
        update: PreferencesUpdate,
        known_peers: &[String],
        known_downloaders: &[String],
    ) -> Result<(), SessionError> {
        let mut next = self.clone();

        if let Some(peer) = update.search_peer {
            let peer = peer.trim().to_lowercase();
            if peer.is_empty() || (!known_peers.is_empty() && !known_peers.contains(&peer)) {
                return Err(SessionError::UnknownPeer(peer));
            }
            next.search_peer = Some(peer);
        }

        if let Some(suffix) = update.suffix {
            next.search_suffix = suffix.trim().to_string();
        }

        if let Some(dir) = update.download_dir {
            // Empty input keeps the current directory.
            if !dir.trim().is_empty() {
                let path = expand_home(dir.trim());
                if !path.is_dir() {
                    return Err(SessionError::InvalidDownloadDir(path));
                }
                next.download_dir = path;
            }
        }

        if let Some(downloader) = update.preferred_downloader {
            let downloader = downloader.trim();
            if downloader.is_empty() {
                next.preferred_downloader = None;
            } else {
                let known = known_downloaders
                    .iter()
                    .find(|d| d.eq_ignore_ascii_case(downloader));
                match known {
                    Some(name) => next.preferred_downloader = Some(name.clone()),
                    None if known_downloaders.is_empty() => {
                        next.preferred_downloader = Some(downloader.to_string())
                    }
                    None => return Err(SessionError::UnknownDownloader(downloader.to_string())),
                }
            }
        }

        *self = next;
        Ok(())
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    match (path, home) {
        ("~", Some(home)) => home,
        (p, Some(home)) if p.starts_with("~/") => home.join(&p[2..]),
        (p, _) => Path::new(p).to_path_buf(),
    }
}

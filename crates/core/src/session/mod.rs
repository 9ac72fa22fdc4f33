//! Chat session: transport seam, topic parsing, preferences and the
//! controller that ties them to the search lifecycle.

mod controller;
mod preferences;
mod topic;
mod transport;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

use crate::archive::ArchiveError;
use crate::search::SearchError;

pub use controller::{
    Download, EventOutcome, FileOutcome, SessionController, SessionSettings,
};
pub use preferences::{expand_home, Preferences, PreferencesUpdate};
pub use topic::parse_search_peers;
pub use transport::{ChatEvent, ChatTransport, TransportError};

/// Errors produced by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Requested search peer is not among the known candidates.
    #[error("Unknown search peer: {0}")]
    UnknownPeer(String),

    /// Requested preferred downloader never advertised a result.
    #[error("Unknown downloader: {0}")]
    UnknownDownloader(String),

    #[error("Download directory does not exist: {}", .0.display())]
    InvalidDownloadDir(PathBuf),

    #[error("Search {search_id} has no result at index {index}")]
    ResultNotFound { search_id: Uuid, index: usize },

    /// Not of the form `!<peer> <descriptor>`.
    #[error("Invalid download line: {0:?}")]
    InvalidDownloadLine(String),

    #[error("Offered file has no usable name: {0:?}")]
    InvalidFilename(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SessionError {
    pub(crate) fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        SessionError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

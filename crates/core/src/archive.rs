//! Reading result listings delivered by search peers.
//!
//! Peers send listings as zip archives holding one or more text files.
//! Some send the bare text file instead.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

/// Local file header, and end of central directory for empty archives.
const ZIP_SIGNATURES: [[u8; 4]; 2] = [*b"PK\x03\x04", *b"PK\x05\x06"];

/// Errors produced while reading a listing file.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed reading zip entry: {0}")]
    Zip(#[from] ZipError),

    /// Neither a zip archive nor a plain text listing.
    #[error("unsupported listing file: {0}")]
    Unsupported(String),
}

/// Read every text line of a listing file.
///
/// `offered_name` is the name the peer gave the file; it decides whether a
/// non-zip file may be read as plain text. Empty lines are dropped.
pub fn read_listing_lines(path: &Path, offered_name: &str) -> Result<Vec<String>, ArchiveError> {
    let io_err = |source| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(io_err)?;
    let mut magic = [0u8; 4];
    let is_zip = match file.read_exact(&mut magic) {
        Ok(()) => ZIP_SIGNATURES.contains(&magic),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => false,
        Err(e) => return Err(io_err(e)),
    };

    if !is_zip {
        if !offered_name.to_ascii_lowercase().ends_with(".txt") {
            return Err(ArchiveError::Unsupported(offered_name.to_string()));
        }
        debug!(name = offered_name, "Listing is not a zip, reading as text");
        let bytes = std::fs::read(path).map_err(io_err)?;
        return Ok(split_lines(&String::from_utf8_lossy(&bytes)));
    }

    file.seek(SeekFrom::Start(0)).map_err(io_err)?;
    let mut archive = ZipArchive::new(file)?;
    let mut lines = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).map_err(io_err)?;
        debug!(entry = entry.name(), bytes = bytes.len(), "Read listing entry");
        lines.extend(split_lines(&String::from_utf8_lossy(&bytes)));
    }
    Ok(lines)
}

fn split_lines(text: &str) -> Vec<String> {
    text.split(['\r', '\n'])
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

//! Listing record types.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One parsed listing entry.
///
/// Built once per successfully parsed line and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    /// Peer advertising the file (the token right after the line marker).
    pub origin_peer: String,
    /// Author in "First Last" order.
    pub author: String,
    /// Title with trailing annotations removed.
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    /// Position within the series, kept verbatim ("09", "13.5").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_number: Option<String>,
    /// Extension of the advertised file (e.g. "rar", "epub").
    pub container_format: String,
    /// Format of the content once unpacked. Falls back to `container_format`.
    pub content_format: String,
    /// Edition annotation ("retail", "v5.0").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edition_tag: Option<String>,
    /// Two-letter uppercase annotation such as "US".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_tag: Option<String>,
    /// Annotation tokens that matched no known vocabulary, in line order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    /// Size field exactly as advertised.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_text: Option<String>,
    /// Descriptor text before the info marker; what a download request echoes.
    pub raw_filename: String,
    /// The complete input line.
    pub raw_line: String,
}

impl Record {
    /// Rank of this record's edition tag.
    pub fn edition_rank(&self) -> EditionRank {
        EditionRank::of(self.edition_tag.as_deref())
    }

    /// Line a peer expects when asked for this file.
    pub fn download_command(&self) -> String {
        format!("{}{} {}", super::LINE_MARKER, self.origin_peer, self.raw_filename)
    }
}

/// A record together with its position in the results it came from.
///
/// Grouping and edition views reorder and drop records; the index is what a
/// download request refers to, so it travels with the record.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IndexedRecord {
    pub index: usize,
    #[serde(flatten)]
    pub record: Record,
}

impl IndexedRecord {
    /// Number `records` by their position.
    pub fn enumerate<I>(records: I) -> Vec<IndexedRecord>
    where
        I: IntoIterator<Item = Record>,
    {
        records
            .into_iter()
            .enumerate()
            .map(|(index, record)| IndexedRecord { index, record })
            .collect()
    }
}

impl Borrow<Record> for IndexedRecord {
    fn borrow(&self) -> &Record {
        &self.record
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Line: {}", self.raw_line)?;
        writeln!(f, "Source: {}", self.origin_peer)?;
        writeln!(f, "Edition: {}", self.edition_tag.as_deref().unwrap_or("unknown"))?;
        writeln!(f, "Format: {}", self.content_format)?;
        writeln!(f, "Author: {}", self.author)?;
        writeln!(f, "Title: {}", self.title)?;
        if let Some(series) = &self.series {
            writeln!(
                f,
                "Series: {} ({})",
                series,
                self.series_number.as_deref().unwrap_or("?")
            )?;
        }
        writeln!(f, "Download Format: {}", self.container_format)?;
        writeln!(f, "Size: {}", self.size_text.as_deref().unwrap_or("unknown"))?;
        if let Some(country) = &self.country_tag {
            writeln!(f, "Country: {}", country)?;
        }
        write!(f, "Labels: {:?}", self.labels)
    }
}

/// Ordering of edition tags: retail beats any versioned release, which beats
/// an unknown edition. Versions compare numerically, major then minor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditionRank {
    Unknown,
    Version { major: u32, minor: u32 },
    Retail,
}

impl EditionRank {
    /// Rank an optional edition tag.
    pub fn of(tag: Option<&str>) -> Self {
        let Some(tag) = tag.map(str::trim) else {
            return EditionRank::Unknown;
        };
        if tag.eq_ignore_ascii_case("retail") {
            return EditionRank::Retail;
        }

        let Some(version) = tag.strip_prefix(['v', 'V']) else {
            return EditionRank::Unknown;
        };
        let (major, minor) = version.split_once('.').unwrap_or((version, "0"));
        match (major.parse(), minor.parse()) {
            (Ok(major), Ok(minor)) => EditionRank::Version { major, minor },
            _ => EditionRank::Unknown,
        }
    }
}

/// Stage of line decomposition that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStep {
    /// Splitting the peer name off the line.
    PeerIdentity,
    /// Isolating the descriptor from the size field.
    Descriptor,
    /// Finding the file extension at the end of the descriptor.
    ContainerFormat,
    /// Splitting the descriptor into author and title segments.
    Segments,
}

impl ParseStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseStep::PeerIdentity => "peer_identity",
            ParseStep::Descriptor => "descriptor",
            ParseStep::ContainerFormat => "container_format",
            ParseStep::Segments => "segments",
        }
    }
}

impl fmt::Display for ParseStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by the listing parser.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The line does not start with the listing marker. Callers skip these.
    #[error("not a listing line")]
    NotAListingLine,

    /// The line starts with the marker but does not fit the grammar.
    #[error("malformed listing line at {step}: {reason}: {line:?}")]
    Malformed {
        line: String,
        step: ParseStep,
        reason: &'static str,
    },
}

impl ParseError {
    /// Returns true for lines that were never listing lines to begin with.
    pub fn is_not_listing(&self) -> bool {
        matches!(self, ParseError::NotAListingLine)
    }
}

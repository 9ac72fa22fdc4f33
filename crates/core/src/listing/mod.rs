//! Listing lines advertised by peers.
//!
//! A peer answers a search with an archive of free-text listing lines. This
//! module turns those lines into structured [`Record`]s and groups them for
//! presentation.

mod grouper;
mod parser;
mod types;

pub use grouper::{downloaders, filter_by_peer, group_records, unique_editions, GroupKey, RecordGroup};
pub use parser::{
    normalize_author, parse_line, parse_lines, ParsedListing, FORMAT_VOCABULARY, INFO_MARKER,
    LINE_MARKER, SEGMENT_SEPARATOR,
};
pub use types::{EditionRank, IndexedRecord, ParseError, ParseStep, Record};

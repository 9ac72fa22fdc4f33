pub mod archive;
pub mod config;
pub mod listing;
pub mod metrics;
pub mod search;
pub mod session;
pub mod testing;

pub use archive::{read_listing_lines, ArchiveError};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use listing::{
    downloaders, filter_by_peer, group_records, normalize_author, parse_line, parse_lines,
    unique_editions, EditionRank, GroupKey, IndexedRecord, ParseError, ParseStep, ParsedListing, Record,
    RecordGroup,
};
pub use search::{
    normalize_phrase, ReplyOutcome, Search, SearchError, SearchKey, SearchLifecycle,
    SearchRegistry, SearchStatus, StatusChange,
};
pub use session::{
    expand_home, parse_search_peers, ChatEvent, ChatTransport, Download, EventOutcome,
    FileOutcome, Preferences, PreferencesUpdate, SessionController, SessionError,
    SessionSettings, TransportError,
};

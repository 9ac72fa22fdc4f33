//! Search registry and per-search lifecycle.
//!
//! A search moves through `pending → in_progress → {no_results |
//! results_found}`, with `error` reachable from any live state. Each search
//! owns the reply bindings valid for its status; [`SearchLifecycle`] routes
//! chat events to them.

mod lifecycle;
mod machine;
mod registry;
mod types;

pub use lifecycle::{ReplyOutcome, SearchLifecycle};
pub use machine::StatusChange;
pub use registry::SearchRegistry;
pub use types::{normalize_phrase, Search, SearchError, SearchKey, SearchStatus};

//! HTTP host for a bookhound session.
//!
//! Serves the operator API and the chat bridge in front of one
//! [`SessionController`](bookhound_core::SessionController).

pub mod api;
pub mod metrics;
pub mod state;

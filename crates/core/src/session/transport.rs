//! The seam between the session and the chat connection.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by a chat transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// No chat client is attached.
    #[error("Chat transport not connected")]
    NotConnected,

    /// The line could not be handed to the chat client.
    #[error("Failed to send line: {0}")]
    SendFailed(String),
}

/// Outbound half of a chat connection.
///
/// Connection management, authentication and line framing belong to the
/// implementation; the session only ever sends whole lines to a channel.
pub trait ChatTransport: Send + Sync {
    /// Returns the name of this transport implementation.
    fn name(&self) -> &str;

    /// Send one line of text to `channel`.
    fn send_line(&self, channel: &str, line: &str) -> Result<(), TransportError>;
}

/// Inbound events delivered by the chat connection, one at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// The channel was joined; carries the channel topic.
    Joined { topic: String },

    /// A private message from another user.
    PrivateMessage { from: String, text: String },

    /// A file sent to us by another user.
    #[serde(skip)]
    FileOffer {
        from: String,
        filename: String,
        data: Vec<u8>,
    },
}

//! Mock chat transport for testing.

use std::sync::{Arc, Mutex};

use crate::session::{ChatTransport, TransportError};

/// Mock implementation of the ChatTransport trait.
///
/// Records every line sent and can be told to fail the next send.
///
/// # Example
///
/// ```rust,ignore
/// use bookhound_core::testing::MockTransport;
///
/// let transport = MockTransport::new();
/// transport.send_line("#ebooks", "@searchook twelve days epub rar")?;
/// assert_eq!(transport.sent_lines().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    /// Lines sent, as (channel, line).
    sent: Arc<Mutex<Vec<(String, String)>>>,
    /// If set, the next send fails with this error.
    next_error: Arc<Mutex<Option<TransportError>>>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next send fail with `error`.
    pub fn fail_next(&self, error: TransportError) {
        *self.next_error.lock().unwrap() = Some(error);
    }

    /// All lines sent so far, as (channel, line).
    pub fn sent_lines(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Lines sent so far, without their channel.
    pub fn lines(&self) -> Vec<String> {
        self.sent_lines().into_iter().map(|(_, line)| line).collect()
    }

    /// Forget recorded lines.
    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

impl ChatTransport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    fn send_line(&self, channel: &str, line: &str) -> Result<(), TransportError> {
        if let Some(error) = self.next_error.lock().unwrap().take() {
            return Err(error);
        }
        self.sent
            .lock()
            .unwrap()
            .push((channel.to_string(), line.to_string()));
        Ok(())
    }
}

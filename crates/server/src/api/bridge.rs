//! Chat bridge: the external chat client attaches here.
//!
//! The client forwards channel joins and private messages over a WebSocket
//! and uploads received files with a multipart POST. Lines the session wants
//! to say in the channel go back down every attached socket.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Multipart, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use bookhound_core::{
    ChatEvent, ChatTransport, EventOutcome, FileOutcome, SearchStatus, StatusChange,
    TransportError,
};

use super::handlers::{session_error, ApiError, ErrorResponse};
use crate::metrics::{
    BRIDGE_CONNECTIONS_ACTIVE, BRIDGE_CONNECTIONS_TOTAL, BRIDGE_EVENTS_RECEIVED,
    BRIDGE_LAG_EVENTS, BRIDGE_MESSAGES_SENT,
};
use crate::state::{AppState, Session};

/// Message sent to bridge clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeMessage {
    /// Say `line` in `channel`.
    Send { channel: String, line: String },
    /// A search changed; clients that only relay chat lines ignore this.
    SearchUpdate {
        search_id: Uuid,
        status: SearchStatus,
    },
}

impl BridgeMessage {
    fn kind(&self) -> &'static str {
        match self {
            BridgeMessage::Send { .. } => "send",
            BridgeMessage::SearchUpdate { .. } => "search_update",
        }
    }
}

/// Fan-out of outbound bridge messages, and the session's chat transport.
#[derive(Debug, Clone)]
pub struct BridgeHub {
    sender: broadcast::Sender<BridgeMessage>,
}

impl BridgeHub {
    /// Create a new hub with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Broadcast a message to all attached clients.
    pub fn broadcast(&self, msg: BridgeMessage) {
        // Nobody listening is fine.
        let _ = self.sender.send(msg);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BridgeMessage> {
        self.sender.subscribe()
    }

    /// Whether any chat client is attached.
    pub fn is_connected(&self) -> bool {
        self.sender.receiver_count() > 0
    }

    /// Announce status changes to attached clients.
    pub fn status_changed(&self, changes: &[StatusChange]) {
        for change in changes {
            self.broadcast(BridgeMessage::SearchUpdate {
                search_id: change.search_id,
                status: change.to,
            });
        }
    }

    /// Announce the searches an event touched, with their current status.
    pub fn outcome(&self, session: &Session, outcome: &EventOutcome) {
        let touched: &[Uuid] = match outcome {
            EventOutcome::Transitioned(changes) => {
                self.status_changed(changes);
                return;
            }
            EventOutcome::File(FileOutcome::ListingDelivered { search_ids })
            | EventOutcome::File(FileOutcome::ListingUnreadable { search_ids, .. }) => search_ids,
            _ => return,
        };
        for id in touched {
            if let Ok(search) = session.search(*id) {
                self.broadcast(BridgeMessage::SearchUpdate {
                    search_id: *id,
                    status: search.status(),
                });
            }
        }
    }
}

impl Default for BridgeHub {
    fn default() -> Self {
        Self::new(256)
    }
}

impl ChatTransport for BridgeHub {
    fn name(&self) -> &str {
        "bridge"
    }

    fn send_line(&self, channel: &str, line: &str) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.sender
            .send(BridgeMessage::Send {
                channel: channel.to_string(),
                line: line.to_string(),
            })
            .map(|_| ())
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }
}

// ============================================================================
// WebSocket
// ============================================================================

/// WebSocket upgrade handler for chat clients.
pub async fn bridge_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle a single chat client connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before reading so lines sent in reply to the first event
    // reach this client.
    let mut rx = state.bridge().subscribe();

    BRIDGE_CONNECTIONS_TOTAL.inc();
    BRIDGE_CONNECTIONS_ACTIVE.inc();

    info!("Chat client attached to bridge");

    let mut send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(msg) => {
                    BRIDGE_MESSAGES_SENT.with_label_values(&[msg.kind()]).inc();

                    match serde_json::to_string(&msg) {
                        Ok(json) => {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                debug!("Bridge send failed, client disconnected");
                                break;
                            }
                        }
                        Err(e) => {
                            error!("Failed to serialize BridgeMessage: {}", e);
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Bridge client lagged, skipped {} messages", n);
                    BRIDGE_LAG_EVENTS.inc();
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Bridge channel closed");
                    break;
                }
            }
        }
    });

    let recv_state = Arc::clone(&state);
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Text(text)) => handle_text(&recv_state, text.as_str()).await,
                Ok(Message::Close(_)) => {
                    debug!("Bridge client sent close");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Bridge receive error: {}", e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    BRIDGE_CONNECTIONS_ACTIVE.dec();
    info!("Chat client detached from bridge");
}

/// Feed one inbound JSON chat event to the session.
async fn handle_text(state: &AppState, text: &str) {
    let event: ChatEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            warn!("Ignoring malformed bridge event: {}", e);
            return;
        }
    };
    let kind = match &event {
        ChatEvent::Joined { .. } => "joined",
        ChatEvent::PrivateMessage { .. } => "private_message",
        ChatEvent::FileOffer { .. } => "file_offer",
    };
    BRIDGE_EVENTS_RECEIVED.with_label_values(&[kind]).inc();

    let mut session = state.session().lock().await;
    match session.handle_event(event) {
        Ok(outcome) => {
            debug!(?outcome, "Bridge event handled");
            state.bridge().outcome(&session, &outcome);
        }
        Err(e) => warn!("Bridge event failed: {}", e),
    }
}

// ============================================================================
// File uploads
// ============================================================================

/// What the session did with an uploaded file.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FileOfferResponse {
    ListingDelivered {
        search_ids: Vec<Uuid>,
    },
    ListingUnreadable {
        search_ids: Vec<Uuid>,
        reason: String,
    },
    Saved {
        path: String,
        from: String,
    },
}

impl From<FileOutcome> for FileOfferResponse {
    fn from(outcome: FileOutcome) -> Self {
        match outcome {
            FileOutcome::ListingDelivered { search_ids } => Self::ListingDelivered { search_ids },
            FileOutcome::ListingUnreadable { search_ids, reason } => {
                Self::ListingUnreadable { search_ids, reason }
            }
            FileOutcome::Saved(download) => Self::Saved {
                path: download.path.display().to_string(),
                from: download.from,
            },
        }
    }
}

fn bad_request(error: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

/// Accept a file the chat client received (multipart: `from`, `file`).
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<FileOfferResponse>, ApiError> {
    let mut from: Option<String> = None;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("from") => match field.text().await {
                Ok(text) => from = Some(text.trim().to_string()),
                Err(e) => return Err(bad_request(&format!("Failed to read sender: {}", e))),
            },
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(bytes) => file = Some((filename, bytes.to_vec())),
                    Err(e) => {
                        return Err(bad_request(&format!("Failed to read file data: {}", e)))
                    }
                }
            }
            _ => {}
        }
    }

    let Some(from) = from.filter(|f| !f.is_empty()) else {
        return Err(bad_request("Missing 'from' field"));
    };
    let Some((filename, data)) = file else {
        return Err(bad_request("Missing 'file' field"));
    };
    if filename.is_empty() {
        return Err(bad_request("Uploaded file has no filename"));
    }

    BRIDGE_EVENTS_RECEIVED.with_label_values(&["file_offer"]).inc();
    info!(from = %from, filename = %filename, size = data.len(), "File received");

    let mut session = state.session().lock().await;
    let outcome = session
        .handle_event(ChatEvent::FileOffer {
            from,
            filename,
            data,
        })
        .map_err(|e| session_error(&e))?;
    state.bridge().outcome(&session, &outcome);

    match outcome {
        EventOutcome::File(outcome) => Ok(Json(FileOfferResponse::from(outcome))),
        other => {
            error!(?other, "File offer produced a non-file outcome");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Unexpected outcome for file offer".to_string(),
                }),
            ))
        }
    }
}

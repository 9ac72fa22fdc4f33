use tokio::sync::Mutex;

use bookhound_core::{Config, SanitizedConfig, SessionController, SessionSettings};

use crate::api::BridgeHub;

/// The session hosted by this process, talking through the bridge.
pub type Session = SessionController<BridgeHub>;

/// Shared application state
pub struct AppState {
    config: Config,
    session: Mutex<Session>,
    bridge: BridgeHub,
}

impl AppState {
    pub fn new(config: Config, bridge: BridgeHub) -> Self {
        let session = SessionController::new(bridge.clone(), SessionSettings::from(&config));
        Self {
            config,
            session: Mutex::new(session),
            bridge,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    /// The session; every event and operator action holds this lock.
    pub fn session(&self) -> &Mutex<Session> {
        &self.session
    }

    pub fn bridge(&self) -> &BridgeHub {
        &self.bridge
    }
}

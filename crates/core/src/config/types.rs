use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub chat: ChatConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub downloads: DownloadsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Chat network configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatConfig {
    /// Chat network the external client connects to.
    #[serde(default = "default_network")]
    pub network: String,
    /// Channel searches and download requests are sent to.
    #[serde(default = "default_channel")]
    pub channel: String,
    /// Nickname of the session (4 to 12 characters).
    pub nickname: String,
}

fn default_network() -> String {
    "irc.irchighway.net".to_string()
}

fn default_channel() -> String {
    "#ebooks".to_string()
}

/// Search configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Prefix addressing a peer in the channel, also used to spot peers in
    /// the topic.
    #[serde(default = "default_sentinel")]
    pub sentinel: String,
    /// Search peer used until the topic says otherwise.
    #[serde(default = "default_peer")]
    pub default_peer: Option<String>,
    /// Appended to every search phrase.
    #[serde(default = "default_suffix")]
    pub suffix: String,
    /// Seconds a search may wait on its peer; 0 waits forever.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            sentinel: default_sentinel(),
            default_peer: default_peer(),
            suffix: default_suffix(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_sentinel() -> String {
    "@".to_string()
}

fn default_peer() -> Option<String> {
    Some("searchook".to_string())
}

fn default_suffix() -> String {
    "epub rar".to_string()
}

fn default_timeout_secs() -> u64 {
    600
}

/// Downloads configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadsConfig {
    /// Download directory; a leading `~` is expanded.
    #[serde(default = "default_download_path")]
    pub path: String,
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            path: default_download_path(),
        }
    }
}

fn default_download_path() -> String {
    "~/Downloads/ebooks".to_string()
}

/// Sanitized config for API responses
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub chat: ChatConfig,
    pub search: SanitizedSearchConfig,
    pub downloads: DownloadsConfig,
}

/// Sanitized search config (timeout resolved)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSearchConfig {
    pub sentinel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_peer: Option<String>,
    pub suffix: String,
    pub timeout_enabled: bool,
    pub timeout_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            chat: config.chat.clone(),
            search: SanitizedSearchConfig {
                sentinel: config.search.sentinel.clone(),
                default_peer: config.search.default_peer.clone(),
                suffix: config.search.suffix.clone(),
                timeout_enabled: config.search.timeout_secs > 0,
                timeout_secs: config.search.timeout_secs,
            },
            downloads: config.downloads.clone(),
        }
    }
}

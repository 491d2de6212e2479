//! # Client Configuration
//!
//! Configuration management for the client engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     BIZFLOW_API_URL=https://pos.example.vn/api/v1                      │
//! │     BIZFLOW_LOCALE=en-US                                               │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/bizflow-pos/client.toml (Linux)                          │
//! │     ~/Library/Application Support/com.bizflow.pos/client.toml (macOS)  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     localhost API, 5 s polling, vi-VN                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # client.toml
//! [api]
//! base_url = "http://localhost:8080/api/v1"
//! request_timeout_secs = 30
//!
//! [stream]
//! path = "events/stream"
//! heartbeat_timeout_secs = 45
//!
//! [stream.reconnect]
//! kind = "exponential"   # transport | exponential
//! initial_interval_ms = 500
//! max_interval_secs = 60
//!
//! [notifications]
//! poll_interval_secs = 5
//!
//! [storage]
//! cart_blob = "bizflow-pos"
//! session_blob = "bizflow-auth"
//!
//! [locale]
//! tag = "vi-VN"
//! ```

use backoff::ExponentialBackoff;
use bizflow_core::Locale;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ClientError, ClientResult};

// =============================================================================
// API Settings
// =============================================================================

/// REST API location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Versioned API root; endpoint paths are joined onto it.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for a single REST request (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080/api/v1".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// =============================================================================
// Stream Settings
// =============================================================================

/// How the push channel comes back after a transport failure.
///
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  TRANSPORT (Default)               │  EXPONENTIAL                       │
/// │  ───────────────────               │  ───────────                       │
/// │  • Fixed delay between attempts    │  • 500ms, 1s, 2s, … up to max      │
/// │  • Server `retry:` hint wins       │  • Reset after a successful open   │
/// │  • Never gives up                  │  • Optional attempt cap            │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconnectPolicy {
    /// Behave like a browser event source.
    Transport {
        #[serde(default = "default_retry_ms")]
        retry_ms: u64,
    },

    /// Exponential backoff with jitter.
    Exponential {
        #[serde(default = "default_initial_interval_ms")]
        initial_interval_ms: u64,
        #[serde(default = "default_max_interval_secs")]
        max_interval_secs: u64,
        #[serde(default = "default_multiplier")]
        multiplier: f64,
        /// `None` retries forever.
        #[serde(default)]
        max_attempts: Option<u32>,
    },
}

fn default_retry_ms() -> u64 {
    3000
}
fn default_initial_interval_ms() -> u64 {
    500
}
fn default_max_interval_secs() -> u64 {
    60
}
fn default_multiplier() -> f64 {
    2.0
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Transport {
            retry_ms: default_retry_ms(),
        }
    }
}

impl ReconnectPolicy {
    /// Builds the backoff curve for the exponential policy.
    pub fn create_backoff(&self) -> Option<ExponentialBackoff> {
        match self {
            ReconnectPolicy::Transport { .. } => None,
            ReconnectPolicy::Exponential {
                initial_interval_ms,
                max_interval_secs,
                multiplier,
                ..
            } => Some(ExponentialBackoff {
                initial_interval: Duration::from_millis(*initial_interval_ms),
                current_interval: Duration::from_millis(*initial_interval_ms),
                max_interval: Duration::from_secs(*max_interval_secs),
                multiplier: *multiplier,
                max_elapsed_time: None, // No limit on total time
                ..Default::default()
            }),
        }
    }

    pub fn max_attempts(&self) -> Option<u32> {
        match self {
            ReconnectPolicy::Transport { .. } => None,
            ReconnectPolicy::Exponential { max_attempts, .. } => *max_attempts,
        }
    }
}

/// Push channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSettings {
    /// Stream endpoint, relative to the API root.
    #[serde(default = "default_stream_path")]
    pub path: String,

    /// Reconnect if no frame (heartbeat included) arrives for this long.
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_secs: u64,

    /// Connect timeout for each attempt (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Capacity of the transport → consumer channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    #[serde(default)]
    pub reconnect: ReconnectPolicy,
}

fn default_stream_path() -> String {
    "events/stream".to_string()
}
fn default_heartbeat_timeout() -> u64 {
    45
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_channel_capacity() -> usize {
    64
}

impl Default for StreamSettings {
    fn default() -> Self {
        StreamSettings {
            path: default_stream_path(),
            heartbeat_timeout_secs: default_heartbeat_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            channel_capacity: default_channel_capacity(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

// =============================================================================
// Notification Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// List endpoint, relative to the API root.
    #[serde(default = "default_notifications_path")]
    pub path: String,

    /// Interval between list polls (seconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_notifications_path() -> String {
    "notifications".to_string()
}
fn default_poll_interval() -> u64 {
    5
}

impl Default for NotificationSettings {
    fn default() -> Self {
        NotificationSettings {
            path: default_notifications_path(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

// =============================================================================
// Storage Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Directory for persisted blobs. Defaults to the platform data dir.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    #[serde(default = "default_cart_blob")]
    pub cart_blob: String,

    #[serde(default = "default_session_blob")]
    pub session_blob: String,
}

fn default_cart_blob() -> String {
    "bizflow-pos".to_string()
}
fn default_session_blob() -> String {
    "bizflow-auth".to_string()
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            data_dir: None,
            cart_blob: default_cart_blob(),
            session_blob: default_session_blob(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocaleSettings {
    #[serde(default)]
    pub tag: Locale,
}

// =============================================================================
// Main Client Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub stream: StreamSettings,

    #[serde(default)]
    pub notifications: NotificationSettings,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub locale: LocaleSettings,
}

impl ClientConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (client.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ClientResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading client config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| ClientError::ConfigLoadFailed(e.to_string()))?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load client config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ClientResult<()> {
        let base = self.base_url()?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(ClientError::InvalidUrl(format!(
                "API URL must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.notifications.poll_interval_secs == 0 {
            return Err(ClientError::InvalidConfig(
                "poll_interval_secs must be greater than 0".into(),
            ));
        }

        if self.stream.heartbeat_timeout_secs == 0 {
            return Err(ClientError::InvalidConfig(
                "heartbeat_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.stream.channel_capacity == 0 {
            return Err(ClientError::InvalidConfig(
                "channel_capacity must be greater than 0".into(),
            ));
        }

        if self.storage.cart_blob.is_empty() || self.storage.session_blob.is_empty() {
            return Err(ClientError::InvalidConfig("blob names must not be empty".into()));
        }
        if self.storage.cart_blob == self.storage.session_blob {
            return Err(ClientError::InvalidConfig(
                "cart_blob and session_blob must differ".into(),
            ));
        }

        if let ReconnectPolicy::Exponential {
            initial_interval_ms,
            max_interval_secs,
            multiplier,
            ..
        } = &self.stream.reconnect
        {
            if *multiplier < 1.0 {
                return Err(ClientError::InvalidConfig(
                    "reconnect multiplier must be at least 1.0".into(),
                ));
            }
            if Duration::from_millis(*initial_interval_ms) > Duration::from_secs(*max_interval_secs) {
                return Err(ClientError::InvalidConfig(
                    "reconnect initial interval exceeds max interval".into(),
                ));
            }
        }

        Ok(())
    }

    /// Applies `BIZFLOW_*` overrides read through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("BIZFLOW_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.api.base_url = url;
        }

        if let Some(secs) = lookup("BIZFLOW_POLL_INTERVAL_SECS") {
            if let Ok(s) = secs.parse::<u64>() {
                debug!(secs = s, "Overriding poll interval from environment");
                self.notifications.poll_interval_secs = s;
            }
        }

        if let Some(dir) = lookup("BIZFLOW_DATA_DIR") {
            self.storage.data_dir = Some(PathBuf::from(dir));
        }

        if let Some(tag) = lookup("BIZFLOW_LOCALE") {
            match tag.parse() {
                Ok(locale) => self.locale.tag = locale,
                Err(e) => warn!(locale = %tag, "Ignoring locale from environment: {}", e),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "bizflow", "pos")
            .map(|dirs| dirs.config_dir().join("client.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Parsed API root, always ending in `/` so relative joins append.
    pub fn base_url(&self) -> ClientResult<Url> {
        let mut raw = self.api.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Ok(Url::parse(&raw)?)
    }

    /// Joins a relative endpoint path onto the API root.
    pub fn endpoint(&self, path: &str) -> ClientResult<Url> {
        Ok(self.base_url()?.join(path.trim_start_matches('/'))?)
    }

    /// Directory for persisted blobs.
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.storage.data_dir.clone().or_else(|| {
            directories::ProjectDirs::from("com", "bizflow", "pos")
                .map(|dirs| dirs.data_dir().to_path_buf())
        })
    }

    pub fn locale(&self) -> Locale {
        self.locale.tag
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.notifications.poll_interval_secs)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.stream.heartbeat_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }
}

//! Uploader configuration.
//!
//! Passed explicitly into every uploader; there is no process-wide
//! endpoint state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use incoming_protocol::constants::{DEFAULT_ENDPOINT_PATH, DEFAULT_RETRY_DELAY, WS_PING_PERIOD};

/// Where and how an uploader connects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploaderConfig {
    /// Host (and optional `:port`) of the upload server.
    #[serde(default = "default_server_host")]
    pub server_host: String,

    /// Use `wss://` instead of `ws://`.
    #[serde(default)]
    pub secure: bool,

    /// Path of the upload WebSocket endpoint.
    #[serde(default = "default_endpoint_path")]
    pub endpoint_path: String,

    /// Delay before reconnecting after an unexpected disconnect, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Keepalive ping interval in seconds (0 disables pings).
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,

    /// Close a connection that stays silent this long, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_timeout_secs: Option<u64>,
}

fn default_server_host() -> String {
    "localhost:4000".into()
}

fn default_endpoint_path() -> String {
    DEFAULT_ENDPOINT_PATH.into()
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY.as_millis() as u64
}

fn default_keepalive_secs() -> u64 {
    WS_PING_PERIOD.as_secs()
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            server_host: default_server_host(),
            secure: false,
            endpoint_path: default_endpoint_path(),
            retry_delay_ms: default_retry_delay_ms(),
            keepalive_secs: default_keepalive_secs(),
            idle_timeout_secs: None,
        }
    }
}

impl UploaderConfig {
    /// Config for the given server host, everything else default.
    pub fn for_host(host: impl Into<String>) -> Self {
        Self {
            server_host: host.into(),
            ..Self::default()
        }
    }

    /// WebSocket URL of the upload endpoint.
    pub fn endpoint_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        let path = self.endpoint_path.trim_start_matches('/');
        format!("{scheme}://{}/{path}", self.server_host)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn keepalive_interval(&self) -> Option<Duration> {
        (self.keepalive_secs > 0).then(|| Duration::from_secs(self.keepalive_secs))
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }
}

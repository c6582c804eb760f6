use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use torrentdeck_rpc::{Credentials, Endpoint, RpcError};

pub const DEFAULT_PORT: u16 = 9091;
pub const DEFAULT_BASE_PATH: &str = "/transmission/rpc";
pub const DEFAULT_POLL_INTERVAL: u64 = 2;

/// Everything needed to reach one daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    pub display_name: String,
    pub hostname: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_base_path")]
    pub base_path: String,
    #[serde(default)]
    pub use_tls: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    #[serde(default = "Utc::now")]
    pub last_used: DateTime<Utc>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_base_path() -> String {
    DEFAULT_BASE_PATH.to_string()
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL
}

impl ConnectionProfile {
    pub fn new(display_name: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            hostname: hostname.into(),
            port: DEFAULT_PORT,
            base_path: default_base_path(),
            use_tls: false,
            credentials: None,
            poll_interval_seconds: DEFAULT_POLL_INTERVAL,
            last_used: Utc::now(),
        }
    }

    /// Name shown to the user; falls back to the hostname.
    pub fn label(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.hostname
        } else {
            &self.display_name
        }
    }

    pub fn endpoint(&self) -> Result<Endpoint, RpcError> {
        Endpoint::new(
            self.use_tls,
            &self.hostname,
            self.port,
            &self.base_path,
            self.credentials.as_ref(),
        )
    }

    /// Same daemon, same credentials, same cadence. Renaming a profile or
    /// touching it does not make it a different connection.
    pub fn is_equivalent(&self, other: &Self) -> bool {
        self.hostname == other.hostname
            && self.port == other.port
            && self.base_path == other.base_path
            && self.use_tls == other.use_tls
            && self.credentials == other.credentials
            && self.poll_interval_seconds == other.poll_interval_seconds
    }

    /// Poll period, never shorter than one second.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds.max(1))
    }

    pub fn touch(&mut self) {
        self.last_used = Utc::now();
    }
}

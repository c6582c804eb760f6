use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::RpcError;

/// Username/password pair for the daemon's Basic auth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    pub fn basic_authorization(&self) -> String {
        let raw = format!("{}:{}", self.username, self.password);
        format!("Basic {}", STANDARD.encode(raw))
    }
}

/// Where requests go and how they authenticate.
///
/// Built fresh from a connection profile for every session, so the
/// authorization header never outlives the profile it came from.
#[derive(Debug, Clone)]
pub struct Endpoint {
    url: Url,
    authorization: Option<String>,
}

impl Endpoint {
    pub fn new(
        use_tls: bool,
        hostname: &str,
        port: u16,
        base_path: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Self, RpcError> {
        let hostname = hostname.trim();
        if hostname.is_empty() {
            return Err(RpcError::InvalidEndpoint("hostname is empty".into()));
        }
        if port == 0 {
            return Err(RpcError::InvalidEndpoint("port must be non-zero".into()));
        }

        let scheme = if use_tls { "https" } else { "http" };
        let path = normalize_path(base_path);
        let raw = format!("{scheme}://{hostname}:{port}{path}");
        let url = Url::parse(&raw).map_err(|e| RpcError::InvalidEndpoint(format!("{raw}: {e}")))?;

        Ok(Self {
            url,
            authorization: credentials.map(Credentials::basic_authorization),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }
}

fn normalize_path(path: &str) -> String {
    let path = path.trim();
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

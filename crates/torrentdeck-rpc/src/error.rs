use thiserror::Error;

/// Errors from the daemon RPC transport.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(String),

    /// The daemon rejected the session token twice in a row.
    #[error("auth error: session token rejected after retry")]
    Auth,

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    /// The daemon answered, but with a `result` other than `success`.
    #[error("daemon error: {0}")]
    Daemon(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl From<reqwest::Error> for RpcError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

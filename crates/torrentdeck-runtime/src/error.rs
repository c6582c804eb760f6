use torrentdeck_core::DeckError;
use torrentdeck_rpc::RpcError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("engine has shut down")]
    Closed,
}

impl From<DeckError> for EngineError {
    fn from(e: DeckError) -> Self {
        match e {
            DeckError::Validation(msg) => Self::Validation(msg),
            DeckError::Io(e) => Self::Io(e),
            other => Self::Validation(other.to_string()),
        }
    }
}

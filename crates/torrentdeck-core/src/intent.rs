use tokio::sync::mpsc;

use crate::models::{TorrentId, TorrentSettings};

/// A mutation requested through a torrent handle.
#[derive(Debug, Clone, PartialEq)]
pub enum TorrentIntent {
    Start(TorrentId),
    Stop(TorrentId),
    Remove {
        id: TorrentId,
        delete_files: bool,
    },
    UpdateSettings {
        id: TorrentId,
        settings: TorrentSettings,
    },
}

impl TorrentIntent {
    pub fn id(&self) -> TorrentId {
        match self {
            Self::Start(id) | Self::Stop(id) => *id,
            Self::Remove { id, .. } | Self::UpdateSettings { id, .. } => *id,
        }
    }
}

/// Non-owning route from a torrent handle back to the engine that
/// created it.
///
/// Handles outlive the engine easily (a UI may keep a clone around), so
/// the sink holds a weak sender: once the engine is gone, intents are
/// dropped instead of keeping its queue alive.
#[derive(Debug, Clone, Default)]
pub struct IntentSink {
    tx: Option<mpsc::WeakUnboundedSender<TorrentIntent>>,
}

impl IntentSink {
    pub fn new(tx: &mpsc::UnboundedSender<TorrentIntent>) -> Self {
        Self {
            tx: Some(tx.downgrade()),
        }
    }

    /// A sink that drops everything; used for handles built outside an engine.
    pub fn detached() -> Self {
        Self::default()
    }

    /// Returns `false` when no engine received the intent.
    pub fn send(&self, intent: TorrentIntent) -> bool {
        match self.tx.as_ref().and_then(|tx| tx.upgrade()) {
            Some(tx) => tx.send(intent).is_ok(),
            None => {
                tracing::debug!(id = intent.id(), "intent dropped, engine is gone");
                false
            }
        }
    }
}

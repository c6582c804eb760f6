use std::sync::Arc;

use chrono::{DateTime, Utc};
use torrentdeck_core::models::{SessionPreferences, Torrent, TorrentId};
use torrentdeck_core::TransferTotals;

/// What observers see. A new value is published after every change.
#[derive(Debug, Clone, Default)]
pub struct SyncState {
    /// Bumped on every publish.
    pub revision: u64,
    /// Label of the active profile, `None` while idle.
    pub profile: Option<String>,
    /// Sorted by queue position.
    pub torrents: Vec<Arc<Torrent>>,
    /// `None` until the first `session-get` of this connection lands.
    pub preferences: Option<SessionPreferences>,
    pub can_start_all: bool,
    pub can_stop_all: bool,
    pub totals: TransferTotals,
    /// A poll cycle is in flight.
    pub updating: bool,
    pub suspended: bool,
    pub last_synced: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl SyncState {
    pub fn is_active(&self) -> bool {
        self.profile.is_some()
    }

    pub fn torrent(&self, id: TorrentId) -> Option<&Arc<Torrent>> {
        self.torrents.iter().find(|t| t.id() == id)
    }

    pub fn ids(&self) -> Vec<TorrentId> {
        self.torrents.iter().map(|t| t.id()).collect()
    }
}

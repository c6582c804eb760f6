use torrentdeck_rpc::types::SessionRecord;

/// Daemon-wide preferences. Speeds are in KB/s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPreferences {
    pub download_dir: String,
    pub incomplete_dir: String,
    pub incomplete_dir_enabled: bool,
    pub rename_partial_files: bool,
    pub peer_limit_global: i64,
    pub peer_limit_per_torrent: i64,
    pub speed_limit_down_enabled: bool,
    pub speed_limit_down: i64,
    pub speed_limit_up_enabled: bool,
    pub speed_limit_up: i64,
    pub alt_speed_down: i64,
    pub alt_speed_up: i64,
    pub alt_speed_enabled: bool,
    pub download_queue_size: i64,
    pub download_queue_enabled: bool,
}

impl SessionPreferences {
    /// Overwrite every field from a fresh `session-get` reply.
    pub fn merge(&mut self, record: SessionRecord) {
        *self = record.into();
    }

    /// The full `session-set` payload for these preferences.
    pub fn to_record(&self) -> SessionRecord {
        SessionRecord {
            download_dir: self.download_dir.clone(),
            incomplete_dir: self.incomplete_dir.clone(),
            incomplete_dir_enabled: self.incomplete_dir_enabled,
            rename_partial_files: self.rename_partial_files,
            peer_limit_global: self.peer_limit_global,
            peer_limit_per_torrent: self.peer_limit_per_torrent,
            speed_limit_down_enabled: self.speed_limit_down_enabled,
            speed_limit_down: self.speed_limit_down,
            speed_limit_up_enabled: self.speed_limit_up_enabled,
            speed_limit_up: self.speed_limit_up,
            alt_speed_down: self.alt_speed_down,
            alt_speed_up: self.alt_speed_up,
            alt_speed_enabled: self.alt_speed_enabled,
            download_queue_size: self.download_queue_size,
            download_queue_enabled: self.download_queue_enabled,
        }
    }

    /// Download cap currently in force, if any.
    pub fn effective_download_limit(&self) -> Option<i64> {
        if self.alt_speed_enabled {
            Some(self.alt_speed_down)
        } else if self.speed_limit_down_enabled {
            Some(self.speed_limit_down)
        } else {
            None
        }
    }

    pub fn effective_upload_limit(&self) -> Option<i64> {
        if self.alt_speed_enabled {
            Some(self.alt_speed_up)
        } else if self.speed_limit_up_enabled {
            Some(self.speed_limit_up)
        } else {
            None
        }
    }
}

impl From<SessionRecord> for SessionPreferences {
    fn from(r: SessionRecord) -> Self {
        Self {
            download_dir: r.download_dir,
            incomplete_dir: r.incomplete_dir,
            incomplete_dir_enabled: r.incomplete_dir_enabled,
            rename_partial_files: r.rename_partial_files,
            peer_limit_global: r.peer_limit_global,
            peer_limit_per_torrent: r.peer_limit_per_torrent,
            speed_limit_down_enabled: r.speed_limit_down_enabled,
            speed_limit_down: r.speed_limit_down,
            speed_limit_up_enabled: r.speed_limit_up_enabled,
            speed_limit_up: r.speed_limit_up,
            alt_speed_down: r.alt_speed_down,
            alt_speed_up: r.alt_speed_up,
            alt_speed_enabled: r.alt_speed_enabled,
            download_queue_size: r.download_queue_size,
            download_queue_enabled: r.download_queue_enabled,
        }
    }
}

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use torrentdeck_rpc::types::{FilePriority, SeedLimitMode, TorrentRecord, TorrentSetArgs, TorrentStatus};

use crate::error::DeckError;
use crate::intent::{IntentSink, TorrentIntent};
use crate::models::file::TorrentFile;

pub type TorrentId = i64;

// ── Limits & settings ───────────────────────────────────────────

/// Per-torrent bandwidth, peer and seeding limits. Speeds are in KB/s.
#[derive(Debug, Clone, PartialEq)]
pub struct TorrentLimits {
    pub peer_limit: i64,
    pub download_limit: i64,
    pub download_limited: bool,
    pub upload_limit: i64,
    pub upload_limited: bool,
    pub honors_session_limits: bool,
    /// Minutes.
    pub seed_idle_limit: i64,
    pub seed_idle_mode: SeedLimitMode,
    pub seed_ratio_limit: f64,
    pub seed_ratio_mode: SeedLimitMode,
}

impl Default for TorrentLimits {
    fn default() -> Self {
        Self {
            peer_limit: 0,
            download_limit: 0,
            download_limited: false,
            upload_limit: 0,
            upload_limited: false,
            honors_session_limits: true,
            seed_idle_limit: 0,
            seed_idle_mode: SeedLimitMode::Global,
            seed_ratio_limit: 0.0,
            seed_ratio_mode: SeedLimitMode::Global,
        }
    }
}

impl TorrentLimits {
    fn from_record(r: &TorrentRecord) -> Self {
        Self {
            peer_limit: r.peer_limit,
            download_limit: r.download_limit,
            download_limited: r.download_limited,
            upload_limit: r.upload_limit,
            upload_limited: r.upload_limited,
            honors_session_limits: r.honors_session_limits,
            seed_idle_limit: r.seed_idle_limit,
            seed_idle_mode: r.seed_idle_mode,
            seed_ratio_limit: r.seed_ratio_limit,
            seed_ratio_mode: r.seed_ratio_mode,
        }
    }
}

/// Priority and wanted flag for one file, by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSelection {
    pub priority: FilePriority,
    pub wanted: bool,
}

/// The editable part of a torrent: limits plus one selection per file.
#[derive(Debug, Clone, PartialEq)]
pub struct TorrentSettings {
    pub limits: TorrentLimits,
    pub files: Vec<FileSelection>,
}

impl TorrentSettings {
    /// Build the `torrent-set` payload for torrent `id`.
    ///
    /// Files are split into disjoint index sets per priority and per
    /// wanted flag. Sets that end up empty are left out of the payload.
    pub fn to_set_args(&self, id: TorrentId) -> TorrentSetArgs {
        let l = &self.limits;
        let mut args = TorrentSetArgs {
            ids: vec![id],
            peer_limit: Some(l.peer_limit),
            download_limit: Some(l.download_limit),
            download_limited: Some(l.download_limited),
            upload_limit: Some(l.upload_limit),
            upload_limited: Some(l.upload_limited),
            honors_session_limits: Some(l.honors_session_limits),
            seed_idle_limit: Some(l.seed_idle_limit),
            seed_idle_mode: Some(l.seed_idle_mode),
            seed_ratio_limit: Some(l.seed_ratio_limit),
            seed_ratio_mode: Some(l.seed_ratio_mode),
            ..Default::default()
        };

        for (index, file) in self.files.iter().enumerate() {
            match file.priority {
                FilePriority::Low => args.priority_low.push(index),
                FilePriority::Normal => args.priority_normal.push(index),
                FilePriority::High => args.priority_high.push(index),
            }
            if file.wanted {
                args.files_wanted.push(index);
            } else {
                args.files_unwanted.push(index);
            }
        }
        args
    }
}

// ── Torrent state ───────────────────────────────────────────────

/// Everything the daemon reports about one torrent, overwritten wholesale
/// on every successful poll.
#[derive(Debug, Clone, PartialEq)]
pub struct TorrentState {
    pub name: String,
    pub status: TorrentStatus,
    pub queue_position: i64,
    pub download_dir: String,
    pub error_code: i64,
    pub error_message: String,
    /// Bytes.
    pub total_size: i64,
    /// 0.0 ..= 1.0
    pub percent_complete: f64,
    /// Bytes per second.
    pub rate_download: i64,
    pub rate_upload: i64,
    /// Seconds; negative when unknown or not applicable.
    pub eta: i64,
    pub is_finished: bool,
    pub peers_up: i64,
    pub peers_down: i64,
    pub upload_ratio: f64,
    pub files: Vec<TorrentFile>,
    pub limits: TorrentLimits,
}

impl TorrentState {
    pub fn from_record(r: &TorrentRecord) -> Self {
        Self {
            name: r.name.clone(),
            status: r.status,
            queue_position: r.queue_position,
            download_dir: r.download_dir.clone(),
            error_code: r.error,
            error_message: r.error_string.clone(),
            total_size: r.total_size,
            percent_complete: r.percent_complete,
            rate_download: r.rate_download,
            rate_upload: r.rate_upload,
            eta: r.eta,
            is_finished: r.is_finished,
            peers_up: r.peers_getting_from_us,
            peers_down: r.peers_sending_to_us,
            upload_ratio: r.upload_ratio,
            files: TorrentFile::zip(&r.files, &r.priorities, &r.wanted),
            limits: TorrentLimits::from_record(r),
        }
    }

    pub fn size_complete(&self) -> f64 {
        self.total_size as f64 * self.percent_complete
    }

    pub fn is_stopped(&self) -> bool {
        self.status == TorrentStatus::Stopped
    }

    /// Queued or checking, not yet transferring.
    pub fn is_preparing(&self) -> bool {
        !self.is_stopped() && self.status.code() < TorrentStatus::Download.code()
    }

    pub fn has_error(&self) -> bool {
        self.error_code != 0
    }

    pub fn is_complete(&self) -> bool {
        self.is_finished || self.percent_complete >= 1.0
    }

    pub fn settings(&self) -> TorrentSettings {
        TorrentSettings {
            limits: self.limits.clone(),
            files: self
                .files
                .iter()
                .map(|f| FileSelection {
                    priority: f.priority,
                    wanted: f.wanted,
                })
                .collect(),
        }
    }

    /// Apply edited settings. The file list must line up index for index.
    pub fn apply_settings(&mut self, settings: &TorrentSettings) -> Result<(), DeckError> {
        if settings.files.len() != self.files.len() {
            return Err(DeckError::Validation(format!(
                "settings carry {} file selections, torrent has {} files",
                settings.files.len(),
                self.files.len()
            )));
        }
        self.limits = settings.limits.clone();
        for (file, selection) in self.files.iter_mut().zip(&settings.files) {
            file.priority = selection.priority;
            file.wanted = selection.wanted;
        }
        Ok(())
    }
}

// ── Handle ──────────────────────────────────────────────────────

/// Shared, reference-stable handle for one torrent.
///
/// The engine keeps the same `Arc<Torrent>` for an id for as long as the
/// id keeps showing up in polls, so observers can hold on to it. State is
/// written only by the engine; the intent methods hand work back to it.
#[derive(Debug)]
pub struct Torrent {
    id: TorrentId,
    state: RwLock<TorrentState>,
    intents: IntentSink,
}

impl Torrent {
    pub fn new(record: &TorrentRecord, intents: IntentSink) -> Self {
        Self {
            id: record.id,
            state: RwLock::new(TorrentState::from_record(record)),
            intents,
        }
    }

    pub fn id(&self) -> TorrentId {
        self.id
    }

    pub fn read(&self) -> RwLockReadGuard<'_, TorrentState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TorrentState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> TorrentState {
        self.read().clone()
    }

    pub fn queue_position(&self) -> i64 {
        self.read().queue_position
    }

    pub fn status(&self) -> TorrentStatus {
        self.read().status
    }

    /// Overwrite all fields from a fresh record.
    pub fn apply(&self, record: &TorrentRecord) {
        *self.write() = TorrentState::from_record(record);
    }

    pub fn set_status(&self, status: TorrentStatus) {
        self.write().status = status;
    }

    pub fn set_queue_position(&self, position: i64) {
        self.write().queue_position = position;
    }

    pub fn apply_settings(&self, settings: &TorrentSettings) -> Result<(), DeckError> {
        self.write().apply_settings(settings)
    }

    // Intents. Each returns whether an engine accepted it.

    pub fn start(&self) -> bool {
        self.intents.send(TorrentIntent::Start(self.id))
    }

    pub fn stop(&self) -> bool {
        self.intents.send(TorrentIntent::Stop(self.id))
    }

    pub fn remove(&self, delete_files: bool) -> bool {
        self.intents.send(TorrentIntent::Remove {
            id: self.id,
            delete_files,
        })
    }

    pub fn post_settings(&self, settings: TorrentSettings) -> bool {
        self.intents.send(TorrentIntent::UpdateSettings {
            id: self.id,
            settings,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::mpsc;
    use torrentdeck_rpc::testing::{torrent_json, torrent_record};

    use super::*;

    #[test]
    fn test_state_from_record() {
        let state = TorrentState::from_record(&torrent_record(7, 2));
        assert_eq!(state.name, "torrent-7");
        assert_eq!(state.queue_position, 2);
        assert_eq!(state.peers_up, 1);
        assert_eq!(state.peers_down, 3);
        assert_eq!(state.limits.peer_limit, 50);
        assert_eq!(state.size_complete(), 500.0);

        // priorities [-1,0,1], wanted [0,1,1]
        let files = &state.files;
        assert_eq!(files[0].priority, FilePriority::Low);
        assert!(!files[0].wanted);
        assert_eq!(files[1].priority, FilePriority::Normal);
        assert!(files[1].wanted);
        assert_eq!(files[2].priority, FilePriority::High);
        assert!(files[2].wanted);
    }

    #[test]
    fn test_derived_flags() {
        let mut state = TorrentState::from_record(&torrent_record(1, 0));
        assert!(!state.is_stopped());
        assert!(!state.is_preparing());
        assert!(!state.has_error());
        assert!(!state.is_complete());

        state.status = TorrentStatus::CheckWait;
        assert!(state.is_preparing());
        state.status = TorrentStatus::Stopped;
        assert!(state.is_stopped());
        assert!(!state.is_preparing());

        state.error_code = 3;
        assert!(state.has_error());

        state.percent_complete = 1.0;
        assert!(state.is_complete());
    }

    #[test]
    fn test_apply_settings_checks_file_count() {
        let mut state = TorrentState::from_record(&torrent_record(1, 0));
        let mut settings = state.settings();
        settings.files.pop();

        let err = state.apply_settings(&settings).unwrap_err();
        assert!(matches!(err, DeckError::Validation(_)), "got {err:?}");
    }

    #[test]
    fn test_settings_payload() {
        let state = TorrentState::from_record(&torrent_record(4, 0));
        let mut settings = state.settings();
        settings.limits.seed_ratio_mode = SeedLimitMode::Unlimited;
        settings.limits.seed_idle_mode = SeedLimitMode::Single;

        let payload = serde_json::to_value(settings.to_set_args(4)).unwrap();
        assert_eq!(payload["ids"], json!([4]));
        assert_eq!(payload["priority-low"], json!([0]));
        assert_eq!(payload["priority-normal"], json!([1]));
        assert_eq!(payload["priority-high"], json!([2]));
        assert_eq!(payload["files-wanted"], json!([1, 2]));
        assert_eq!(payload["files-unwanted"], json!([0]));
        assert_eq!(payload["seedRatioMode"], json!(2));
        assert_eq!(payload["seedIdleMode"], json!(1));
        assert_eq!(payload["peer-limit"], json!(50));
        assert!(payload.get("queuePosition").is_none());
    }

    #[test]
    fn test_settings_payload_omits_empty_sets() {
        let settings = TorrentSettings {
            limits: TorrentLimits::default(),
            files: vec![
                FileSelection {
                    priority: FilePriority::High,
                    wanted: true,
                };
                2
            ],
        };
        let payload = serde_json::to_value(settings.to_set_args(1)).unwrap();
        assert_eq!(payload["priority-high"], json!([0, 1]));
        assert_eq!(payload["files-wanted"], json!([0, 1]));
        for key in ["priority-low", "priority-normal", "files-unwanted"] {
            assert!(payload.get(key).is_none(), "{key} should be omitted");
        }
    }

    #[test]
    fn test_apply_overwrites_everything() {
        let torrent = Torrent::new(&torrent_record(1, 0), IntentSink::detached());
        let mut json = torrent_json(1, 5);
        json["name"] = json!("renamed");
        json["files"] = json!([]);
        torrent.apply(&serde_json::from_value(json).unwrap());

        let state = torrent.snapshot();
        assert_eq!(state.name, "renamed");
        assert_eq!(state.queue_position, 5);
        assert!(state.files.is_empty());
    }

    #[test]
    fn test_intents_carry_the_id() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let torrent = Torrent::new(&torrent_record(9, 0), IntentSink::new(&tx));
        let settings = torrent.read().settings();

        assert!(torrent.start());
        assert!(torrent.stop());
        assert!(torrent.remove(true));
        assert!(torrent.post_settings(settings.clone()));

        assert_eq!(rx.try_recv().unwrap(), TorrentIntent::Start(9));
        assert_eq!(rx.try_recv().unwrap(), TorrentIntent::Stop(9));
        assert_eq!(
            rx.try_recv().unwrap(),
            TorrentIntent::Remove {
                id: 9,
                delete_files: true
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            TorrentIntent::UpdateSettings { id: 9, settings }
        );
    }
}

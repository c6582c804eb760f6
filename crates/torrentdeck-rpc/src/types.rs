use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RpcError;

// ── Envelope ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    pub result: String,
    #[serde(default)]
    pub arguments: Value,
}

// ── Numeric enums ───────────────────────────────────────────────

/// Torrent activity as reported by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum TorrentStatus {
    Stopped,
    CheckWait,
    Check,
    DownloadWait,
    Download,
    SeedWait,
    Seed,
}

impl TorrentStatus {
    pub fn code(self) -> i64 {
        match self {
            Self::Stopped => 0,
            Self::CheckWait => 1,
            Self::Check => 2,
            Self::DownloadWait => 3,
            Self::Download => 4,
            Self::SeedWait => 5,
            Self::Seed => 6,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "Stopped",
            Self::CheckWait => "Queued for check",
            Self::Check => "Checking",
            Self::DownloadWait => "Queued",
            Self::Download => "Downloading",
            Self::SeedWait => "Queued for seeding",
            Self::Seed => "Seeding",
        }
    }
}

impl TryFrom<i64> for TorrentStatus {
    type Error = String;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Stopped),
            1 => Ok(Self::CheckWait),
            2 => Ok(Self::Check),
            3 => Ok(Self::DownloadWait),
            4 => Ok(Self::Download),
            5 => Ok(Self::SeedWait),
            6 => Ok(Self::Seed),
            other => Err(format!("unknown torrent status {other}")),
        }
    }
}

impl From<TorrentStatus> for i64 {
    fn from(status: TorrentStatus) -> Self {
        status.code()
    }
}

impl std::fmt::Display for TorrentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-file download priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum FilePriority {
    Low,
    #[default]
    Normal,
    High,
}

impl TryFrom<i64> for FilePriority {
    type Error = String;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            -1 => Ok(Self::Low),
            0 => Ok(Self::Normal),
            1 => Ok(Self::High),
            other => Err(format!("unknown file priority {other}")),
        }
    }
}

impl From<FilePriority> for i64 {
    fn from(priority: FilePriority) -> Self {
        match priority {
            FilePriority::Low => -1,
            FilePriority::Normal => 0,
            FilePriority::High => 1,
        }
    }
}

/// Whether a seeding limit follows the session, the torrent, or nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum SeedLimitMode {
    #[default]
    Global,
    Single,
    Unlimited,
}

impl TryFrom<i64> for SeedLimitMode {
    type Error = String;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Global),
            1 => Ok(Self::Single),
            2 => Ok(Self::Unlimited),
            other => Err(format!("unknown seed limit mode {other}")),
        }
    }
}

impl From<SeedLimitMode> for i64 {
    fn from(mode: SeedLimitMode) -> Self {
        match mode {
            SeedLimitMode::Global => 0,
            SeedLimitMode::Single => 1,
            SeedLimitMode::Unlimited => 2,
        }
    }
}

/// Older daemons send `wanted` as 0/1, newer ones as booleans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WantedFlag {
    Bool(bool),
    Int(i64),
}

impl WantedFlag {
    pub fn is_wanted(self) -> bool {
        match self {
            Self::Bool(b) => b,
            Self::Int(n) => n != 0,
        }
    }
}

// ── torrent-get ─────────────────────────────────────────────────

/// Fields requested on every torrent poll.
pub const TORRENT_FIELDS: &[&str] = &[
    "id",
    "name",
    "status",
    "error",
    "errorString",
    "totalSize",
    "eta",
    "isFinished",
    "peersGettingFromUs",
    "peersSendingToUs",
    "rateDownload",
    "rateUpload",
    "percentComplete",
    "queuePosition",
    "downloadDir",
    "uploadRatio",
    "files",
    "wanted",
    "priorities",
    "peer-limit",
    "downloadLimit",
    "downloadLimited",
    "uploadLimit",
    "uploadLimited",
    "honorsSessionLimits",
    "seedIdleLimit",
    "seedIdleMode",
    "seedRatioLimit",
    "seedRatioMode",
];

#[derive(Debug, Serialize)]
pub struct TorrentGetRequest<'a> {
    pub fields: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<&'a [i64]>,
}

#[derive(Debug, Deserialize)]
pub struct TorrentGetResponse {
    pub torrents: Vec<TorrentRecord>,
}

/// One torrent as the daemon describes it. Every field is required:
/// a record that fails to decode fails the whole poll.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentRecord {
    pub id: i64,
    pub name: String,
    pub status: TorrentStatus,
    pub error: i64,
    pub error_string: String,
    pub total_size: i64,
    pub eta: i64,
    pub is_finished: bool,
    pub peers_getting_from_us: i64,
    pub peers_sending_to_us: i64,
    pub rate_download: i64,
    pub rate_upload: i64,
    pub percent_complete: f64,
    pub queue_position: i64,
    pub download_dir: String,
    pub upload_ratio: f64,
    pub files: Vec<FileRecord>,
    pub wanted: Vec<WantedFlag>,
    pub priorities: Vec<FilePriority>,
    #[serde(rename = "peer-limit")]
    pub peer_limit: i64,
    pub download_limit: i64,
    pub download_limited: bool,
    pub upload_limit: i64,
    pub upload_limited: bool,
    pub honors_session_limits: bool,
    pub seed_idle_limit: i64,
    pub seed_idle_mode: SeedLimitMode,
    pub seed_ratio_limit: f64,
    pub seed_ratio_mode: SeedLimitMode,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub name: String,
    pub length: i64,
    pub bytes_completed: i64,
}

// ── torrent-start / stop / remove / set ─────────────────────────

#[derive(Debug, Serialize)]
pub struct IdsArgs<'a> {
    pub ids: &'a [i64],
}

#[derive(Debug, Serialize)]
pub struct RemoveArgs<'a> {
    pub ids: &'a [i64],
    #[serde(rename = "delete-local-data")]
    pub delete_local_data: bool,
}

/// Arguments for `torrent-set`. Unset fields are left out of the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentSetArgs {
    pub ids: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<i64>,
    #[serde(rename = "peer-limit", skip_serializing_if = "Option::is_none")]
    pub peer_limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_limited: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_limited: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub honors_session_limits: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed_idle_limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed_idle_mode: Option<SeedLimitMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed_ratio_limit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed_ratio_mode: Option<SeedLimitMode>,
    // The daemon reads an empty index list as "every file", so empty
    // sets must be omitted rather than sent.
    #[serde(rename = "priority-low", skip_serializing_if = "Vec::is_empty")]
    pub priority_low: Vec<usize>,
    #[serde(rename = "priority-normal", skip_serializing_if = "Vec::is_empty")]
    pub priority_normal: Vec<usize>,
    #[serde(rename = "priority-high", skip_serializing_if = "Vec::is_empty")]
    pub priority_high: Vec<usize>,
    #[serde(rename = "files-wanted", skip_serializing_if = "Vec::is_empty")]
    pub files_wanted: Vec<usize>,
    #[serde(rename = "files-unwanted", skip_serializing_if = "Vec::is_empty")]
    pub files_unwanted: Vec<usize>,
}

impl TorrentSetArgs {
    pub fn queue_position(id: i64, position: i64) -> Self {
        Self {
            ids: vec![id],
            queue_position: Some(position),
            ..Default::default()
        }
    }
}

// ── torrent-add ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
pub struct TorrentAddArgs {
    /// Base64-encoded `.torrent` content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metainfo: Option<String>,
    /// URL or magnet link the daemon fetches itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(rename = "download-dir", skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
}

impl TorrentAddArgs {
    pub fn metainfo(bytes: &[u8]) -> Self {
        Self {
            metainfo: Some(STANDARD.encode(bytes)),
            ..Default::default()
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self {
            filename: Some(url.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TorrentAddResponse {
    #[serde(rename = "torrent-added")]
    pub added: Option<TorrentRef>,
    #[serde(rename = "torrent-duplicate")]
    pub duplicate: Option<TorrentRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentRef {
    pub id: i64,
    pub name: String,
    pub hash_string: String,
}

/// What the daemon did with an added torrent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddedTorrent {
    Added(TorrentRef),
    Duplicate(TorrentRef),
}

impl TorrentAddResponse {
    pub fn into_added(self) -> Result<AddedTorrent, RpcError> {
        match (self.added, self.duplicate) {
            (Some(t), _) => Ok(AddedTorrent::Added(t)),
            (None, Some(t)) => Ok(AddedTorrent::Duplicate(t)),
            (None, None) => Err(RpcError::Protocol(
                "torrent-add reply has neither torrent-added nor torrent-duplicate".into(),
            )),
        }
    }
}

// ── session-get / session-set ───────────────────────────────────

/// Preference keys requested on every session poll.
pub const SESSION_FIELDS: &[&str] = &[
    "download-dir",
    "incomplete-dir",
    "incomplete-dir-enabled",
    "rename-partial-files",
    "peer-limit-global",
    "peer-limit-per-torrent",
    "speed-limit-down-enabled",
    "speed-limit-down",
    "speed-limit-up-enabled",
    "speed-limit-up",
    "alt-speed-down",
    "alt-speed-up",
    "alt-speed-enabled",
    "download-queue-size",
    "download-queue-enabled",
];

#[derive(Debug, Serialize)]
pub struct SessionGetRequest<'a> {
    pub fields: &'a [&'a str],
}

/// Daemon-wide preferences, same shape for `session-get` and `session-set`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SessionRecord {
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

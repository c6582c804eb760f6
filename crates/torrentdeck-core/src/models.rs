pub mod file;
pub mod preferences;
pub mod profile;
pub mod torrent;

pub use file::TorrentFile;
pub use preferences::SessionPreferences;
pub use profile::ConnectionProfile;
pub use torrent::{FileSelection, Torrent, TorrentId, TorrentLimits, TorrentSettings, TorrentState};

pub use torrentdeck_rpc::types::{FilePriority, SeedLimitMode, TorrentStatus};

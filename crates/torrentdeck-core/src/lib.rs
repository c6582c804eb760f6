pub mod config;
pub mod error;
pub mod intent;
pub mod models;
pub mod profiles;
pub mod torrent_list;

pub use config::AppConfig;
pub use error::DeckError;
pub use intent::{IntentSink, TorrentIntent};
pub use profiles::{MemoryProfileStore, ProfileStore};
pub use torrent_list::{MergeSummary, TorrentList, TransferTotals};

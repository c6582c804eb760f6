use torrentdeck_rpc::types::{FileRecord, FilePriority, WantedFlag};

/// One file inside a torrent. Files are identified by their index in the
/// torrent's file list; the daemon has no stable per-file id.
#[derive(Debug, Clone, PartialEq)]
pub struct TorrentFile {
    pub name: String,
    pub length: i64,
    pub bytes_completed: i64,
    pub priority: FilePriority,
    pub wanted: bool,
}

impl TorrentFile {
    /// Combine the three parallel arrays of a `torrent-get` record.
    ///
    /// A daemon that sends short `priorities` or `wanted` arrays gets the
    /// defaults for the missing tail: normal priority, wanted.
    pub fn zip(files: &[FileRecord], priorities: &[FilePriority], wanted: &[WantedFlag]) -> Vec<Self> {
        files
            .iter()
            .enumerate()
            .map(|(i, file)| Self {
                name: file.name.clone(),
                length: file.length,
                bytes_completed: file.bytes_completed,
                priority: priorities.get(i).copied().unwrap_or_default(),
                wanted: wanted.get(i).map_or(true, |w| w.is_wanted()),
            })
            .collect()
    }

    pub fn progress(&self) -> f64 {
        if self.length <= 0 {
            return 0.0;
        }
        self.bytes_completed as f64 / self.length as f64
    }
}

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "torrentdeck",
    version,
    about = "Remote control for a Transmission torrent daemon"
)]
pub struct Cli {
    /// Saved profile to use. Defaults to `general.default_profile`, then
    /// the most recently used one.
    #[arg(long, short, global = true)]
    pub profile: Option<String>,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Connect without a saved profile.
#[derive(Args, Default)]
pub struct ConnectionArgs {
    #[arg(long, global = true)]
    pub host: Option<String>,
    #[arg(long, global = true)]
    pub port: Option<u16>,
    /// RPC path on the daemon.
    #[arg(long, global = true)]
    pub rpc_path: Option<String>,
    #[arg(long, global = true)]
    pub tls: bool,
    #[arg(long, global = true)]
    pub user: Option<String>,
    #[arg(long, global = true)]
    pub password: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Keep polling and print a summary after every cycle.
    Watch {
        /// Stop after this many cycles.
        #[arg(long)]
        cycles: Option<usize>,
    },
    /// List torrents in queue order.
    List {
        /// Also list every torrent's files.
        #[arg(long)]
        files: bool,
    },
    /// Start torrents (all of them when no id is given).
    Start { ids: Vec<i64> },
    /// Stop torrents (all of them when no id is given).
    Stop { ids: Vec<i64> },
    /// Remove a torrent.
    Remove {
        id: i64,
        /// Delete downloaded data too.
        #[arg(long)]
        delete_files: bool,
    },
    /// Add a .torrent file, an http(s) URL or a magnet link.
    Add { source: String },
    /// Move a torrent to a queue position.
    Move { id: i64, index: usize },
    /// Change per-torrent limits.
    Limit(LimitArgs),
    /// Show daemon preferences.
    Prefs,
    /// Turn the alternative speed limits on or off.
    AltSpeed { state: Toggle },
    /// List saved profiles.
    Profiles,
    /// Write the default config file.
    ConfigInit {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args)]
pub struct LimitArgs {
    pub id: i64,
    /// Download cap in KB/s; 0 removes the cap.
    #[arg(long)]
    pub down: Option<i64>,
    /// Upload cap in KB/s; 0 removes the cap.
    #[arg(long)]
    pub up: Option<i64>,
    #[arg(long)]
    pub peers: Option<i64>,
    /// Stop seeding at this ratio.
    #[arg(long)]
    pub ratio: Option<f64>,
    /// Ignore the session-wide seed ratio for this torrent.
    #[arg(long, conflicts_with = "ratio")]
    pub seed_forever: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn enabled(self) -> bool {
        matches!(self, Self::On)
    }
}

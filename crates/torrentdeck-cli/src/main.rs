mod cli;
mod format;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use torrentdeck_core::models::{ConnectionProfile, SeedLimitMode};
use torrentdeck_core::{AppConfig, ProfileStore};
use torrentdeck_rpc::types::AddedTorrent;
use torrentdeck_rpc::{Credentials, ReqwestBackend};
use torrentdeck_runtime::{EngineHandle, SyncState};

use crate::cli::{Cli, Command, ConnectionArgs, LimitArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Cli {
        profile,
        connection,
        command,
    } = Cli::parse();
    let config = AppConfig::load().context("failed to load config")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match command {
        Command::Profiles => return list_profiles(&config),
        Command::ConfigInit { force } => return config_init(force),
        _ => {}
    }

    let profile = resolve_profile(profile.as_deref(), &connection, &config)?;
    tracing::debug!(profile = profile.label(), host = %profile.hostname, "using profile");
    let backend = ReqwestBackend::new(config.request_timeout())?;
    let engine = EngineHandle::spawn(backend);
    let state = connect(&engine, profile).await?;

    match command {
        Command::Watch { cycles } => watch(&engine, cycles).await?,
        Command::List { files } => print_torrents(&state, files),
        Command::Start { ids } => {
            if ids.is_empty() {
                engine.start_all().await?;
            }
            for id in ids {
                engine.start_torrent(id).await?;
            }
        }
        Command::Stop { ids } => {
            if ids.is_empty() {
                engine.stop_all().await?;
            }
            for id in ids {
                engine.stop_torrent(id).await?;
            }
        }
        Command::Remove { id, delete_files } => engine.remove_torrent(id, delete_files).await?,
        Command::Add { source } => add(&engine, &source).await?,
        Command::Move { id, index } => engine.move_torrent(id, index).await?,
        Command::Limit(args) => limit(&engine, &state, args).await?,
        Command::Prefs => {
            let prefs = engine
                .get_preferences()
                .await?
                .context("daemon sent no preferences")?;
            println!("download dir     {}", prefs.download_dir);
            if prefs.incomplete_dir_enabled {
                println!("incomplete dir   {}", prefs.incomplete_dir);
            }
            println!("download limit   {}", format::limit(prefs.effective_download_limit()));
            println!("upload limit     {}", format::limit(prefs.effective_upload_limit()));
            println!("alt speed        {}", if prefs.alt_speed_enabled { "on" } else { "off" });
            println!("peers            {} global, {} per torrent", prefs.peer_limit_global, prefs.peer_limit_per_torrent);
            if prefs.download_queue_enabled {
                println!("download queue   {}", prefs.download_queue_size);
            }
        }
        Command::AltSpeed { state: toggle } => {
            let mut prefs = engine
                .get_preferences()
                .await?
                .context("daemon sent no preferences")?;
            prefs.alt_speed_enabled = toggle.enabled();
            engine.set_preferences(prefs).await?;
        }
        // Handled before connecting.
        Command::Profiles | Command::ConfigInit { .. } => {}
    }

    engine.deactivate().await?;
    Ok(())
}

fn resolve_profile(
    name: Option<&str>,
    connection: &ConnectionArgs,
    config: &AppConfig,
) -> anyhow::Result<ConnectionProfile> {
    if let Some(host) = &connection.host {
        return Ok(ad_hoc_profile(host, connection, config));
    }

    let mut store = config.profile_store();
    match name.or(config.general.default_profile.as_deref()) {
        Some(name) => Ok(store.touch(name)?),
        None => store.most_recent().with_context(|| {
            format!(
                "no profiles configured; add one to {} or pass --host",
                AppConfig::config_path().display()
            )
        }),
    }
}

fn ad_hoc_profile(host: &str, args: &ConnectionArgs, config: &AppConfig) -> ConnectionProfile {
    let mut profile = ConnectionProfile::new(host, host);
    if let Some(port) = args.port {
        profile.port = port;
    }
    if let Some(path) = &args.rpc_path {
        profile.base_path = path.clone();
    }
    profile.use_tls = args.tls;
    profile.credentials = args.user.as_ref().map(|username| Credentials {
        username: username.clone(),
        password: args.password.clone().unwrap_or_default(),
    });
    profile.poll_interval_seconds = config.network.default_poll_interval;
    profile
}

/// Activate and wait for the first cycle to finish.
async fn connect(engine: &EngineHandle, profile: ConnectionProfile) -> anyhow::Result<SyncState> {
    let label = profile.label().to_string();
    engine.activate(profile).await?;
    let state = engine.wait_for(|s| !s.updating).await?;
    if let Some(error) = &state.last_error {
        bail!("cannot reach {label}: {error}");
    }
    Ok(state)
}

async fn watch(engine: &EngineHandle, cycles: Option<usize>) -> anyhow::Result<()> {
    let mut rx = engine.subscribe();
    let mut seen = 0;
    let mut printed = None;

    loop {
        let state = rx.borrow_and_update().clone();
        let outcome = (state.last_synced, state.last_error.clone());
        if !state.updating && printed.as_ref() != Some(&outcome) {
            printed = Some(outcome);
            print_summary(&state);
            seen += 1;
            if cycles.is_some_and(|max| seen >= max) {
                return Ok(());
            }
        }

        tokio::select! {
            changed = rx.changed() => changed.context("engine stopped")?,
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

async fn add(engine: &EngineHandle, source: &str) -> anyhow::Result<()> {
    let is_url = ["magnet:", "http://", "https://"]
        .iter()
        .any(|prefix| source.starts_with(prefix));
    let added = if is_url {
        engine.add_torrent_url(source).await?
    } else {
        engine
            .add_torrent_file(source)
            .await
            .with_context(|| format!("cannot add {source}"))?
    };

    match added {
        Some(AddedTorrent::Added(t)) => println!("added #{} {}", t.id, t.name),
        Some(AddedTorrent::Duplicate(t)) => println!("already present as #{} {}", t.id, t.name),
        None => bail!("not connected"),
    }
    Ok(())
}

async fn limit(engine: &EngineHandle, state: &SyncState, args: LimitArgs) -> anyhow::Result<()> {
    let torrent = state
        .torrent(args.id)
        .with_context(|| format!("no torrent #{}", args.id))?;
    let mut settings = torrent.read().settings();
    let limits = &mut settings.limits;

    if let Some(down) = args.down {
        limits.download_limited = down > 0;
        if down > 0 {
            limits.download_limit = down;
        }
    }
    if let Some(up) = args.up {
        limits.upload_limited = up > 0;
        if up > 0 {
            limits.upload_limit = up;
        }
    }
    if let Some(peers) = args.peers {
        limits.peer_limit = peers;
    }
    if let Some(ratio) = args.ratio {
        limits.seed_ratio_limit = ratio;
        limits.seed_ratio_mode = SeedLimitMode::Single;
    }
    if args.seed_forever {
        limits.seed_ratio_mode = SeedLimitMode::Unlimited;
    }

    engine.update_torrent_settings(args.id, settings).await?;
    Ok(())
}

fn print_summary(state: &SyncState) {
    let synced = state
        .last_synced
        .as_ref()
        .map(format::relative_time)
        .unwrap_or_else(|| "never".into());
    match &state.last_error {
        Some(error) => println!("[{}] error: {error}", state.profile.as_deref().unwrap_or("-")),
        None => println!(
            "[{}] {} torrents, down {} up {}, synced {synced}",
            state.profile.as_deref().unwrap_or("-"),
            state.torrents.len(),
            format::rate(state.totals.rate_download),
            format::rate(state.totals.rate_upload),
        ),
    }
}

fn print_torrents(state: &SyncState, files: bool) {
    println!(
        "{:>5}  {:<18} {:>7} {:>10} {:>12} {:>12} {:>8}  NAME",
        "ID", "STATUS", "DONE", "SIZE", "DOWN", "UP", "ETA"
    );
    for torrent in &state.torrents {
        let t = torrent.read();
        let status = if t.has_error() {
            format!("Error ({})", t.error_code)
        } else {
            t.status.to_string()
        };
        println!(
            "{:>5}  {:<18} {:>7} {:>10} {:>12} {:>12} {:>8}  {}",
            torrent.id(),
            status,
            format::percent(t.percent_complete),
            format::bytes(t.total_size),
            format::rate(t.rate_download),
            format::rate(t.rate_upload),
            format::eta(t.eta),
            t.name,
        );
        if t.has_error() {
            println!("{:>7}{}", "", t.error_message);
        }
        if files {
            for (index, file) in t.files.iter().enumerate() {
                println!(
                    "{:>7}{index:>3}. {:<6} {:>7} {}{}",
                    "",
                    format!("{:?}", file.priority),
                    format::percent(file.progress()),
                    file.name,
                    if file.wanted { "" } else { " (skipped)" },
                );
            }
        }
    }
}

fn list_profiles(config: &AppConfig) -> anyhow::Result<()> {
    let store = config.profile_store();
    let profiles = store.profiles();
    if profiles.is_empty() {
        println!("no profiles in {}", AppConfig::config_path().display());
        return Ok(());
    }
    for profile in profiles {
        let default = config.general.default_profile.as_deref() == Some(profile.label());
        let endpoint = profile.endpoint()?;
        println!(
            "{} {:<16} {}",
            if default { "*" } else { " " },
            profile.label(),
            endpoint.url()
        );
    }
    Ok(())
}

fn config_init(force: bool) -> anyhow::Result<()> {
    let path = AppConfig::config_path();
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    AppConfig::default().save()?;
    println!("wrote {}", path.display());
    Ok(())
}

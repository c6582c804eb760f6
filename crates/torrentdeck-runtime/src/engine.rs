use std::path::Path;

use tokio::sync::{mpsc, oneshot, watch};

use torrentdeck_core::models::{ConnectionProfile, SessionPreferences, TorrentId, TorrentSettings};
use torrentdeck_rpc::types::{AddedTorrent, TorrentAddArgs};
use torrentdeck_rpc::HttpBackend;

use crate::actor::Engine;
use crate::error::EngineError;
use crate::state::SyncState;

pub(crate) type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

/// Which torrents a start/stop applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Target {
    One(TorrentId),
    All,
}

pub(crate) enum Command {
    Activate {
        profile: Box<ConnectionProfile>,
        reply: Reply<()>,
    },
    Deactivate {
        reply: Reply<()>,
    },
    ForceFetch {
        reply: Reply<()>,
    },
    Suspend {
        reply: Reply<()>,
    },
    Resume {
        reply: Reply<()>,
    },
    Start {
        target: Target,
        reply: Reply<()>,
    },
    Stop {
        target: Target,
        reply: Reply<()>,
    },
    Remove {
        id: TorrentId,
        delete_files: bool,
        reply: Reply<()>,
    },
    Reorder {
        order: Vec<TorrentId>,
        reply: Reply<()>,
    },
    Move {
        id: TorrentId,
        index: usize,
        reply: Reply<()>,
    },
    UpdateSettings {
        id: TorrentId,
        settings: TorrentSettings,
        reply: Reply<()>,
    },
    Add {
        args: TorrentAddArgs,
        reply: Reply<Option<AddedTorrent>>,
    },
    GetPreferences {
        reply: Reply<Option<SessionPreferences>>,
    },
    SetPreferences {
        preferences: SessionPreferences,
        reply: Reply<()>,
    },
}

/// Cloneable front door to the engine actor.
///
/// Every network-dependent call is a no-op returning `Ok` (or `Ok(None)`)
/// while no profile is active. Mutations update the published state
/// before the daemon confirms them and resolve once it has answered.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SyncState>,
}

impl EngineHandle {
    /// Spawn an idle engine on the current tokio runtime. It stops when the
    /// last handle is dropped.
    pub fn spawn<B: HttpBackend>(backend: B) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Engine::spawn(backend, rx);
        Self { tx, state }
    }

    /// The latest published state.
    pub fn state(&self) -> SyncState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.clone()
    }

    /// Wait until the published state satisfies `predicate`.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&SyncState) -> bool,
    ) -> Result<SyncState, EngineError> {
        let mut rx = self.subscribe();
        let state = rx.wait_for(predicate).await.map_err(|_| EngineError::Closed)?;
        Ok(state.clone())
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(make(reply)).map_err(|_| EngineError::Closed)?;
        rx.await.unwrap_or_else(|_| Err(EngineError::Closed))
    }

    // ── Scheduling ──────────────────────────────────────────────

    /// Connect to `profile`, replacing any other connection, fetch right
    /// away and then poll every `poll_interval_seconds` (at least one).
    pub async fn activate(&self, profile: ConnectionProfile) -> Result<(), EngineError> {
        self.request(|reply| Command::Activate {
            profile: Box::new(profile),
            reply,
        })
        .await
    }

    pub async fn deactivate(&self) -> Result<(), EngineError> {
        self.request(|reply| Command::Deactivate { reply }).await
    }

    /// Poll now without moving the timer.
    pub async fn force_fetch(&self) -> Result<(), EngineError> {
        self.request(|reply| Command::ForceFetch { reply }).await
    }

    pub async fn suspend(&self) -> Result<(), EngineError> {
        self.request(|reply| Command::Suspend { reply }).await
    }

    pub async fn resume(&self) -> Result<(), EngineError> {
        self.request(|reply| Command::Resume { reply }).await
    }

    // ── Torrents ────────────────────────────────────────────────

    pub async fn start_torrent(&self, id: TorrentId) -> Result<(), EngineError> {
        self.request(|reply| Command::Start {
            target: Target::One(id),
            reply,
        })
        .await
    }

    pub async fn stop_torrent(&self, id: TorrentId) -> Result<(), EngineError> {
        self.request(|reply| Command::Stop {
            target: Target::One(id),
            reply,
        })
        .await
    }

    pub async fn start_all(&self) -> Result<(), EngineError> {
        self.request(|reply| Command::Start {
            target: Target::All,
            reply,
        })
        .await
    }

    pub async fn stop_all(&self) -> Result<(), EngineError> {
        self.request(|reply| Command::Stop {
            target: Target::All,
            reply,
        })
        .await
    }

    pub async fn remove_torrent(&self, id: TorrentId, delete_files: bool) -> Result<(), EngineError> {
        self.request(|reply| Command::Remove {
            id,
            delete_files,
            reply,
        })
        .await
    }

    /// Put the listed torrents first, in that order. Unlisted torrents
    /// follow in their current order.
    pub async fn reorder(&self, order: Vec<TorrentId>) -> Result<(), EngineError> {
        self.request(|reply| Command::Reorder { order, reply }).await
    }

    pub async fn move_torrent(&self, id: TorrentId, index: usize) -> Result<(), EngineError> {
        self.request(|reply| Command::Move { id, index, reply }).await
    }

    pub async fn update_torrent_settings(
        &self,
        id: TorrentId,
        settings: TorrentSettings,
    ) -> Result<(), EngineError> {
        self.request(|reply| Command::UpdateSettings {
            id,
            settings,
            reply,
        })
        .await
    }

    /// Read a `.torrent` file and add it.
    pub async fn add_torrent_file(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<Option<AddedTorrent>, EngineError> {
        let bytes = tokio::fs::read(path.as_ref()).await.map_err(|e| {
            tracing::warn!(path = %path.as_ref().display(), error = %e, "cannot read torrent file");
            e
        })?;
        self.add_torrent_bytes(&bytes).await
    }

    pub async fn add_torrent_bytes(&self, metainfo: &[u8]) -> Result<Option<AddedTorrent>, EngineError> {
        let args = TorrentAddArgs::metainfo(metainfo);
        self.request(|reply| Command::Add { args, reply }).await
    }

    /// Add by URL or magnet link; the daemon does the download.
    pub async fn add_torrent_url(&self, url: &str) -> Result<Option<AddedTorrent>, EngineError> {
        let args = TorrentAddArgs::url(url);
        self.request(|reply| Command::Add { args, reply }).await
    }

    // ── Preferences ─────────────────────────────────────────────

    /// Fetch preferences now, store them and return them.
    pub async fn get_preferences(&self) -> Result<Option<SessionPreferences>, EngineError> {
        self.request(|reply| Command::GetPreferences { reply }).await
    }

    pub async fn set_preferences(&self, preferences: SessionPreferences) -> Result<(), EngineError> {
        self.request(|reply| Command::SetPreferences { preferences, reply })
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::{json, Value};
    use torrentdeck_core::models::{FilePriority, TorrentStatus};
    use torrentdeck_rpc::testing::{session_json, success, torrent_json, ScriptedBackend};
    use torrentdeck_rpc::{HttpReply, RpcError};

    use super::*;

    const TOKEN: &str = "T1";

    fn profile(host: &str, poll_interval_seconds: u64) -> ConnectionProfile {
        let mut profile = ConnectionProfile::new(host, host);
        profile.poll_interval_seconds = poll_interval_seconds;
        profile
    }

    fn torrents(entries: &[(i64, i64)]) -> Value {
        let list: Vec<Value> = entries.iter().map(|&(id, pos)| torrent_json(id, pos)).collect();
        json!({ "torrents": list })
    }

    /// A daemon that demands the session token and answers `torrent-get`
    /// with `snapshot(n)`, where `n` counts earlier `torrent-get` calls.
    fn daemon(snapshot: impl Fn(usize) -> Value + Send + Sync + 'static) -> ScriptedBackend {
        let polls = AtomicUsize::new(0);
        ScriptedBackend::new(move |req| {
            if req.session_id != TOKEN {
                return Ok(HttpReply::conflict(TOKEN));
            }
            match req.method.as_str() {
                "torrent-get" => success(snapshot(polls.fetch_add(1, Ordering::SeqCst))),
                "session-get" => success(session_json()),
                "torrent-add" => success(json!({
                    "torrent-added": { "id": 42, "name": "new.iso", "hashString": "abcd" }
                })),
                _ => success(json!({})),
            }
        })
    }

    /// Paused-clock sleep: returns once every runnable task has parked.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    async fn connected(
        backend: &ScriptedBackend,
        entries: usize,
    ) -> (EngineHandle, SyncState) {
        let engine = EngineHandle::spawn(backend.clone());
        engine.activate(profile("nas", 60)).await.unwrap();
        let state = engine
            .wait_for(|s| !s.updating && s.torrents.len() == entries)
            .await
            .unwrap();
        (engine, state)
    }

    fn real_calls(backend: &ScriptedBackend, method: &str) -> Vec<Value> {
        backend
            .calls_for(method)
            .into_iter()
            .filter(|c| c.session_id == TOKEN)
            .map(|c| c.arguments)
            .collect()
    }

    // ── Scheduling ──────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_two_ticks_end_to_end() {
        let backend = daemon(|n| match n {
            0 => torrents(&[(7, 0)]),
            _ => torrents(&[(7, 0), (8, 1)]),
        });
        let engine = EngineHandle::spawn(backend.clone());
        engine.activate(profile("nas", 1)).await.unwrap();

        let first = engine
            .wait_for(|s| !s.updating && s.torrents.len() == 1)
            .await
            .unwrap();
        let seven = first.torrent(7).unwrap().clone();
        assert_eq!(first.profile.as_deref(), Some("nas"));
        assert!(first.preferences.is_some());
        assert!(first.last_synced.is_some());

        let second = engine
            .wait_for(|s| !s.updating && s.torrents.len() == 2)
            .await
            .unwrap();
        assert_eq!(second.ids(), vec![7, 8]);
        assert!(Arc::ptr_eq(&seven, second.torrent(7).unwrap()));

        // Each request of the first cycle paid for the handshake once.
        let first_attempts = backend.calls().iter().filter(|c| c.session_id.is_empty()).count();
        assert!((1..=2).contains(&first_attempts), "got {first_attempts}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_during_cycle_is_ignored() {
        let backend = ScriptedBackend::gated(|req| match req.method.as_str() {
            "torrent-get" => success(torrents(&[(1, 0)])),
            _ => success(session_json()),
        });
        let engine = EngineHandle::spawn(backend.clone());
        engine.activate(profile("nas", 1)).await.unwrap();
        settle().await;
        assert_eq!(backend.call_count(), 2);

        // Five periods pass with the cycle still open.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(backend.call_count(), 2);
        assert!(engine.state().updating);

        backend.release(2);
        settle().await;
        assert!(!engine.state().updating);
        assert_eq!(engine.state().ids(), vec![1]);

        tokio::time::sleep(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(backend.call_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_completion_is_dropped() {
        let backend = ScriptedBackend::gated(|req| {
            if req.method != "torrent-get" {
                return success(session_json());
            }
            if req.url.contains("old.local") {
                success(torrents(&[(1, 0)]))
            } else {
                success(torrents(&[(2, 0)]))
            }
        });
        let engine = EngineHandle::spawn(backend.clone());
        engine.activate(profile("old.local", 60)).await.unwrap();
        settle().await;
        engine.activate(profile("new.local", 60)).await.unwrap();
        settle().await;
        assert_eq!(backend.call_count(), 4);

        // The old session's requests were parked first and finish first.
        backend.release(2);
        settle().await;
        let state = engine.state();
        assert!(state.torrents.is_empty());
        assert!(state.updating);
        assert_eq!(state.profile.as_deref(), Some("new.local"));

        backend.release(2);
        let state = engine.wait_for(|s| !s.updating).await.unwrap();
        assert_eq!(state.ids(), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_fetch_during_cycle_queues_one_follow_up() {
        let backend = ScriptedBackend::gated(|req| match req.method.as_str() {
            "torrent-get" => success(torrents(&[])),
            _ => success(session_json()),
        });
        let engine = EngineHandle::spawn(backend.clone());
        engine.activate(profile("nas", 60)).await.unwrap();

        for _ in 0..3 {
            engine.force_fetch().await.unwrap();
        }
        settle().await;
        assert_eq!(backend.call_count(), 2);

        backend.release(2);
        settle().await;
        assert_eq!(backend.call_count(), 4);
        assert!(engine.state().updating);

        backend.release(2);
        settle().await;
        assert_eq!(backend.call_count(), 4);
        assert!(!engine.state().updating);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_fetch_when_idle_runs_now() {
        let backend = daemon(|_| torrents(&[]));
        let (engine, _) = connected(&backend, 0).await;
        let before = real_calls(&backend, "torrent-get").len();

        engine.force_fetch().await.unwrap();
        settle().await;
        assert_eq!(real_calls(&backend, "torrent-get").len(), before + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_suspend_stops_ticks_and_resume_resets_timer() {
        let backend = daemon(|_| torrents(&[]));
        let engine = EngineHandle::spawn(backend.clone());
        engine.activate(profile("nas", 1)).await.unwrap();
        settle().await;
        let polls = || real_calls(&backend, "torrent-get").len();
        assert_eq!(polls(), 1);

        engine.suspend().await.unwrap();
        assert!(engine.state().suspended);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(polls(), 1);

        engine.resume().await.unwrap();
        assert!(!engine.state().suspended);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(polls(), 1);
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(polls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deactivate_clears_and_is_idempotent() {
        let backend = daemon(|_| torrents(&[(1, 0)]));
        let (engine, _) = connected(&backend, 1).await;
        let calls = backend.call_count();

        engine.deactivate().await.unwrap();
        engine.deactivate().await.unwrap();
        let state = engine.state();
        assert!(!state.is_active());
        assert!(state.torrents.is_empty());
        assert!(state.preferences.is_none());

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(backend.call_count(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_equivalent_profile_is_noop() {
        let backend = daemon(|_| torrents(&[(1, 0)]));
        let (engine, _) = connected(&backend, 1).await;
        let calls = backend.call_count();

        let mut renamed = profile("nas", 60);
        renamed.display_name = "living room".into();
        engine.activate(renamed).await.unwrap();
        settle().await;

        assert_eq!(backend.call_count(), calls);
        assert_eq!(engine.state().profile.as_deref(), Some("nas"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_profile_keeps_current_session() {
        let backend = daemon(|_| torrents(&[(1, 0)]));
        let (engine, _) = connected(&backend, 1).await;

        let err = engine.activate(profile("", 60)).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)), "got {err:?}");

        let state = engine.state();
        assert_eq!(state.profile.as_deref(), Some("nas"));
        assert_eq!(state.ids(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_failure_is_recorded_and_polling_continues() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();
        let backend = ScriptedBackend::new(move |req| match req.method.as_str() {
            "torrent-get" => {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Ok(HttpReply::json(500, &json!("boom")))
                } else {
                    success(torrents(&[(3, 0)]))
                }
            }
            _ => success(session_json()),
        });
        let engine = EngineHandle::spawn(backend);
        engine.activate(profile("nas", 1)).await.unwrap();

        let failed = engine
            .wait_for(|s| !s.updating && s.last_error.is_some())
            .await
            .unwrap();
        assert!(failed.last_error.unwrap().contains("torrent-get"));
        assert!(failed.last_synced.is_none());

        let recovered = engine
            .wait_for(|s| !s.updating && s.torrents.len() == 1)
            .await
            .unwrap();
        assert!(recovered.last_error.is_none());
        assert!(recovered.last_synced.is_some());
        assert_eq!(polls.load(Ordering::SeqCst), 2);
    }

    // ── Mutations ───────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_without_session_everything_is_a_noop() {
        let backend = daemon(|_| torrents(&[]));
        let engine = EngineHandle::spawn(backend.clone());

        engine.force_fetch().await.unwrap();
        engine.start_torrent(1).await.unwrap();
        engine.stop_all().await.unwrap();
        engine.remove_torrent(1, true).await.unwrap();
        engine.reorder(vec![1, 2]).await.unwrap();
        assert!(engine.add_torrent_bytes(b"d4:infoe").await.unwrap().is_none());
        assert!(engine.get_preferences().await.unwrap().is_none());
        engine.set_preferences(SessionPreferences::default()).await.unwrap();

        settle().await;
        assert_eq!(backend.call_count(), 0);
        assert!(!engine.state().is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_stop() {
        let backend = daemon(|_| torrents(&[(1, 0), (2, 1)]));
        let (engine, state) = connected(&backend, 2).await;
        assert!(!state.can_start_all);
        assert!(state.can_stop_all);

        engine.stop_torrent(1).await.unwrap();
        let state = engine.state();
        assert_eq!(state.torrent(1).unwrap().status(), TorrentStatus::Stopped);
        assert!(state.can_start_all);
        assert_eq!(real_calls(&backend, "torrent-stop"), vec![json!({ "ids": [1] })]);

        engine.start_all().await.unwrap();
        assert!(engine.state().torrents.iter().all(|t| t.status() == TorrentStatus::Download));
        assert_eq!(real_calls(&backend, "torrent-start"), vec![json!({ "ids": [1, 2] })]);

        let err = engine.start_torrent(99).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)), "got {err:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_on_empty_list_sends_nothing() {
        let backend = daemon(|_| torrents(&[]));
        let (engine, _) = connected(&backend, 0).await;

        engine.start_all().await.unwrap();
        engine.stop_all().await.unwrap();
        assert!(backend.calls_for("torrent-start").is_empty());
        assert!(backend.calls_for("torrent-stop").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_is_local_first() {
        let backend = daemon(|_| torrents(&[(1, 0), (2, 1)]));
        let (engine, _) = connected(&backend, 2).await;

        engine.remove_torrent(2, true).await.unwrap();
        assert_eq!(engine.state().ids(), vec![1]);
        assert_eq!(
            real_calls(&backend, "torrent-remove"),
            vec![json!({ "ids": [2], "delete-local-data": true })]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reorder_sends_changed_positions_in_order() {
        let backend = daemon(|_| torrents(&[(1, 0), (2, 1), (3, 2)]));
        let (engine, _) = connected(&backend, 3).await;

        engine.reorder(vec![3]).await.unwrap();
        assert_eq!(engine.state().ids(), vec![3, 1, 2]);
        assert_eq!(
            real_calls(&backend, "torrent-set"),
            vec![
                json!({ "ids": [3], "queuePosition": 0 }),
                json!({ "ids": [1], "queuePosition": 1 }),
                json!({ "ids": [2], "queuePosition": 2 }),
            ]
        );

        let err = engine.reorder(vec![3, 77]).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)), "got {err:?}");
        assert_eq!(real_calls(&backend, "torrent-set").len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_torrent() {
        let backend = daemon(|_| torrents(&[(1, 0), (2, 1), (3, 2)]));
        let (engine, _) = connected(&backend, 3).await;

        engine.move_torrent(1, 2).await.unwrap();
        assert_eq!(engine.state().ids(), vec![2, 3, 1]);
        assert_eq!(real_calls(&backend, "torrent-set").len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_settings() {
        let backend = daemon(|_| torrents(&[(1, 0)]));
        let (engine, state) = connected(&backend, 1).await;

        let mut settings = state.torrent(1).unwrap().read().settings();
        settings.limits.download_limited = true;
        settings.limits.download_limit = 250;
        for file in &mut settings.files {
            file.priority = FilePriority::High;
            file.wanted = true;
        }
        engine.update_torrent_settings(1, settings.clone()).await.unwrap();

        assert_eq!(engine.state().torrent(1).unwrap().read().settings(), settings);
        let sent = &real_calls(&backend, "torrent-set")[0];
        assert_eq!(sent["downloadLimit"], json!(250));
        assert_eq!(sent["priority-high"], json!([0, 1, 2]));
        assert_eq!(sent["files-wanted"], json!([0, 1, 2]));
        assert!(sent.get("priority-low").is_none());
        assert!(sent.get("files-unwanted").is_none());

        settings.files.truncate(1);
        let err = engine.update_torrent_settings(1, settings).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)), "got {err:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutation_error_reaches_caller() {
        let backend = ScriptedBackend::new(|req| match req.method.as_str() {
            "torrent-get" => success(torrents(&[(1, 0)])),
            "session-get" => success(session_json()),
            _ => Ok(HttpReply::json(200, &json!({ "result": "no such torrent" }))),
        });
        let (engine, _) = connected(&backend, 1).await;

        let err = engine.stop_torrent(1).await.unwrap_err();
        assert!(matches!(err, EngineError::Rpc(RpcError::Daemon(_))), "got {err:?}");
        // No rollback: the next poll reconciles.
        assert_eq!(engine.state().torrent(1).unwrap().status(), TorrentStatus::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_torrent() {
        let backend = daemon(|_| torrents(&[]));
        let (engine, _) = connected(&backend, 0).await;

        let added = engine.add_torrent_bytes(b"d4:infoe").await.unwrap();
        assert!(matches!(added, Some(AddedTorrent::Added(ref t)) if t.id == 42));
        assert_eq!(
            real_calls(&backend, "torrent-add"),
            vec![json!({ "metainfo": "ZDQ6aW5mb2U=" })]
        );

        engine.add_torrent_url("magnet:?xt=urn:btih:abcd").await.unwrap();
        assert_eq!(
            real_calls(&backend, "torrent-add")[1],
            json!({ "filename": "magnet:?xt=urn:btih:abcd" })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_refreshes_the_list() {
        let backend = daemon(|_| torrents(&[]));
        let (engine, _) = connected(&backend, 0).await;
        let before = real_calls(&backend, "torrent-get").len();

        engine.add_torrent_bytes(b"d4:infoe").await.unwrap();
        settle().await;
        assert_eq!(real_calls(&backend, "torrent-get").len(), before + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_torrent_file() {
        let backend = daemon(|_| torrents(&[]));
        let (engine, _) = connected(&backend, 0).await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debian.torrent");
        std::fs::write(&path, b"d4:infoe").unwrap();
        assert!(engine.add_torrent_file(&path).await.unwrap().is_some());

        let err = engine
            .add_torrent_file(dir.path().join("missing.torrent"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Io(_)), "got {err:?}");
        assert_eq!(real_calls(&backend, "torrent-add").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_preferences_roundtrip() {
        let backend = daemon(|_| torrents(&[]));
        let (engine, _) = connected(&backend, 0).await;

        let mut prefs = engine.get_preferences().await.unwrap().unwrap();
        assert_eq!(prefs.download_queue_size, 5);
        assert_eq!(prefs.download_dir, "/downloads");

        prefs.alt_speed_enabled = true;
        engine.set_preferences(prefs.clone()).await.unwrap();
        assert_eq!(engine.state().preferences, Some(prefs));

        let sent = real_calls(&backend, "session-set");
        assert_eq!(sent[0]["alt-speed-enabled"], json!(true));
        assert_eq!(sent[0]["download-queue-size"], json!(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_intents_reach_the_daemon() {
        let backend = daemon(|_| torrents(&[(1, 0), (2, 1)]));
        let (engine, state) = connected(&backend, 2).await;

        let one = state.torrent(1).unwrap().clone();
        assert!(one.stop());
        let stopped = engine
            .wait_for(|s| s.torrent(1).is_some_and(|t| t.status() == TorrentStatus::Stopped))
            .await
            .unwrap();
        assert!(stopped.can_start_all);

        assert!(state.torrent(2).unwrap().remove(false));
        engine.wait_for(|s| s.torrent(2).is_none()).await.unwrap();
        settle().await;

        assert_eq!(real_calls(&backend, "torrent-stop"), vec![json!({ "ids": [1] })]);
        assert_eq!(
            real_calls(&backend, "torrent-remove"),
            vec![json!({ "ids": [2], "delete-local-data": false })]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_handles_outlive_the_engine() {
        let backend = daemon(|_| torrents(&[(1, 0)]));
        let (engine, state) = connected(&backend, 1).await;
        let torrent = state.torrent(1).unwrap().clone();

        drop(state);
        drop(engine);
        settle().await;
        assert!(!torrent.start());
    }
}

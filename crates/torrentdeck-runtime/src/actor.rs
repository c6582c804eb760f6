use std::future::Future;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};

use torrentdeck_core::models::{ConnectionProfile, SessionPreferences, TorrentId, TorrentSettings};
use torrentdeck_core::{DeckError, IntentSink, TorrentIntent, TorrentList};
use torrentdeck_rpc::types::{
    AddedTorrent, SessionRecord, TorrentAddArgs, TorrentRecord, TorrentSetArgs, TorrentStatus,
};
use torrentdeck_rpc::{HttpBackend, RpcClient, RpcError};

use crate::engine::{Command, Reply, Target};
use crate::error::EngineError;
use crate::schedule::Schedule;
use crate::state::SyncState;

/// One connection's lifetime. A new activation always gets a new id and a
/// new client, so nothing (the session token included) leaks across.
struct Session<B> {
    id: u64,
    profile: ConnectionProfile,
    client: RpcClient<B>,
}

/// Results coming back from spawned network tasks.
enum Completion {
    Torrents {
        session: u64,
        result: Result<Vec<TorrentRecord>, RpcError>,
    },
    Preferences {
        session: u64,
        result: Result<SessionRecord, RpcError>,
    },
    /// `get_preferences` asked for this one and waits on `reply`.
    RequestedPreferences {
        session: u64,
        result: Result<SessionRecord, RpcError>,
        reply: Reply<Option<SessionPreferences>>,
    },
    /// A mutation changed what the daemon would report; poll again.
    Refresh { session: u64 },
}

enum Input {
    Command(Command),
    Intent(TorrentIntent),
    Completion(Completion),
    Tick,
}

/// Owns the session, the torrent list and the scheduler state. Runs as a
/// single task; every state change happens between two `select!` rounds.
pub(crate) struct Engine<B> {
    backend: B,
    next_session: u64,
    session: Option<Session<B>>,
    torrents: TorrentList,
    preferences: Option<SessionPreferences>,
    schedule: Schedule,
    /// Legs of the current cycle still out.
    pending_legs: u8,
    refetch: bool,
    cycle_error: Option<String>,
    last_synced: Option<chrono::DateTime<Utc>>,
    last_error: Option<String>,
    revision: u64,
    state: watch::Sender<SyncState>,
    completions: mpsc::UnboundedSender<Completion>,
    // Handles only hold weak senders; this one keeps the channel open.
    _intents: mpsc::UnboundedSender<TorrentIntent>,
}

impl<B: HttpBackend> Engine<B> {
    pub fn spawn(backend: B, commands: mpsc::UnboundedReceiver<Command>) -> watch::Receiver<SyncState> {
        let (state, state_rx) = watch::channel(SyncState::default());
        let (completions, completions_rx) = mpsc::unbounded_channel();
        let (intents, intents_rx) = mpsc::unbounded_channel();

        let engine = Self {
            backend,
            next_session: 0,
            session: None,
            torrents: TorrentList::new(IntentSink::new(&intents)),
            preferences: None,
            schedule: Schedule::default(),
            pending_legs: 0,
            refetch: false,
            cycle_error: None,
            last_synced: None,
            last_error: None,
            revision: 0,
            state,
            completions,
            _intents: intents,
        };
        tokio::spawn(engine.run(commands, intents_rx, completions_rx));
        state_rx
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut intents: mpsc::UnboundedReceiver<TorrentIntent>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
    ) {
        loop {
            let input = tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => Input::Command(command),
                    None => break,
                },
                Some(intent) = intents.recv() => Input::Intent(intent),
                Some(completion) = completions.recv() => Input::Completion(completion),
                () = self.schedule.tick() => Input::Tick,
            };

            match input {
                Input::Command(command) => self.handle_command(command),
                Input::Intent(intent) => self.handle_intent(intent),
                Input::Completion(completion) => self.handle_completion(completion),
                Input::Tick => self.on_tick(),
            }
        }
        tracing::debug!("all engine handles dropped, stopping");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Activate { profile, reply } => {
                let _ = reply.send(self.activate(*profile));
            }
            Command::Deactivate { reply } => {
                self.deactivate();
                let _ = reply.send(Ok(()));
            }
            Command::ForceFetch { reply } => {
                self.force_fetch();
                let _ = reply.send(Ok(()));
            }
            Command::Suspend { reply } => {
                self.schedule.suspend();
                self.publish();
                let _ = reply.send(Ok(()));
            }
            Command::Resume { reply } => {
                self.schedule.resume();
                self.publish();
                let _ = reply.send(Ok(()));
            }
            Command::Start { target, reply } => self.set_running(target, true, reply),
            Command::Stop { target, reply } => self.set_running(target, false, reply),
            Command::Remove {
                id,
                delete_files,
                reply,
            } => self.remove(id, delete_files, reply),
            Command::Reorder { order, reply } => {
                let result = self.torrents.reorder(&order);
                self.send_positions(result, reply);
            }
            Command::Move { id, index, reply } => {
                let result = self.torrents.move_to(id, index);
                self.send_positions(result, reply);
            }
            Command::UpdateSettings {
                id,
                settings,
                reply,
            } => self.update_settings(id, settings, reply),
            Command::Add { args, reply } => self.add(args, reply),
            Command::GetPreferences { reply } => self.get_preferences(reply),
            Command::SetPreferences { preferences, reply } => {
                self.set_preferences(preferences, reply)
            }
        }
    }

    /// Intents come from torrent handles; nobody waits for their outcome,
    /// failures only get logged.
    fn handle_intent(&mut self, intent: TorrentIntent) {
        let (reply, _) = oneshot::channel();
        match intent {
            TorrentIntent::Start(id) => self.set_running(Target::One(id), true, reply),
            TorrentIntent::Stop(id) => self.set_running(Target::One(id), false, reply),
            TorrentIntent::Remove { id, delete_files } => self.remove(id, delete_files, reply),
            TorrentIntent::UpdateSettings { id, settings } => {
                self.update_settings(id, settings, reply)
            }
        }
    }

    // ── Session lifecycle ───────────────────────────────────────

    fn activate(&mut self, profile: ConnectionProfile) -> Result<(), EngineError> {
        if let Some(session) = &self.session {
            if session.profile.is_equivalent(&profile) {
                tracing::debug!(profile = profile.label(), "profile already active");
                return Ok(());
            }
        }

        let endpoint = profile
            .endpoint()
            .map_err(|e| EngineError::Validation(e.to_string()))?;

        self.teardown();
        self.next_session += 1;
        let client = RpcClient::new(self.backend.clone(), endpoint);
        tracing::info!(
            session = self.next_session,
            profile = profile.label(),
            url = %client.endpoint().url(),
            "connecting"
        );

        let period = profile.poll_interval();
        self.session = Some(Session {
            id: self.next_session,
            profile,
            client,
        });
        self.begin_cycle();
        self.schedule.arm(period);
        self.publish();
        Ok(())
    }

    fn deactivate(&mut self) {
        if let Some(session) = &self.session {
            tracing::info!(session = session.id, profile = session.profile.label(), "disconnecting");
        }
        self.teardown();
        self.publish();
    }

    /// Drop the session and everything derived from it. In-flight requests
    /// keep running; their completions carry a dead session id.
    fn teardown(&mut self) {
        self.schedule = Schedule::default();
        self.session = None;
        self.torrents.clear();
        self.preferences = None;
        self.pending_legs = 0;
        self.refetch = false;
        self.cycle_error = None;
        self.last_synced = None;
        self.last_error = None;
    }

    fn is_current(&self, session: u64) -> bool {
        self.session.as_ref().is_some_and(|s| s.id == session)
    }

    fn client(&self) -> Option<RpcClient<B>> {
        self.session.as_ref().map(|s| s.client.clone())
    }

    // ── Polling ─────────────────────────────────────────────────

    fn updating(&self) -> bool {
        self.pending_legs > 0
    }

    fn on_tick(&mut self) {
        if self.session.is_none() {
            self.deactivate();
        } else if self.updating() {
            tracing::trace!("previous cycle still in flight, skipping tick");
        } else {
            self.begin_cycle();
            self.publish();
        }
    }

    fn force_fetch(&mut self) {
        if self.session.is_none() {
            return;
        }
        if self.updating() {
            self.refetch = true;
        } else {
            self.begin_cycle();
            self.publish();
        }
    }

    /// Fire both legs of a cycle. Callers make sure none is in flight.
    fn begin_cycle(&mut self) {
        let Some(session) = &self.session else {
            return;
        };
        let id = session.id;
        let torrents_client = session.client.clone();
        let preferences_client = session.client.clone();
        self.pending_legs = 2;
        self.cycle_error = None;

        let tx = self.completions.clone();
        tokio::spawn(async move {
            let result = torrents_client.torrent_get(None).await;
            let _ = tx.send(Completion::Torrents {
                session: id,
                result,
            });
        });

        let tx = self.completions.clone();
        tokio::spawn(async move {
            let result = preferences_client.session_get().await;
            let _ = tx.send(Completion::Preferences {
                session: id,
                result,
            });
        });
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Torrents { session, result } => {
                if !self.is_current(session) {
                    tracing::trace!(session, "dropping stale torrent-get result");
                    return;
                }
                match result {
                    Ok(records) => {
                        let summary = self.torrents.merge(&records);
                        if summary.added > 0 || summary.removed > 0 {
                            tracing::debug!(
                                added = summary.added,
                                removed = summary.removed,
                                total = self.torrents.len(),
                                "torrent list changed"
                            );
                        }
                    }
                    Err(e) => self.poll_failed("torrent-get", e),
                }
                self.finish_leg();
            }
            Completion::Preferences { session, result } => {
                if !self.is_current(session) {
                    tracing::trace!(session, "dropping stale session-get result");
                    return;
                }
                match result {
                    Ok(record) => self.store_preferences(record),
                    Err(e) => self.poll_failed("session-get", e),
                }
                self.finish_leg();
            }
            Completion::RequestedPreferences {
                session,
                result,
                reply,
            } => {
                if !self.is_current(session) {
                    let _ = reply.send(Ok(None));
                    return;
                }
                match result {
                    Ok(record) => {
                        self.store_preferences(record);
                        let _ = reply.send(Ok(self.preferences.clone()));
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e.into()));
                        return;
                    }
                }
            }
            Completion::Refresh { session } => {
                if self.is_current(session) {
                    self.force_fetch();
                }
                return;
            }
        }
        self.publish();
    }

    fn store_preferences(&mut self, record: SessionRecord) {
        match &mut self.preferences {
            Some(preferences) => preferences.merge(record),
            None => self.preferences = Some(record.into()),
        }
    }

    fn poll_failed(&mut self, method: &str, error: RpcError) {
        tracing::warn!(method, error = %error, "poll failed");
        self.cycle_error.get_or_insert_with(|| format!("{method}: {error}"));
    }

    fn finish_leg(&mut self) {
        self.pending_legs = self.pending_legs.saturating_sub(1);
        if self.updating() {
            return;
        }

        match self.cycle_error.take() {
            Some(error) => self.last_error = Some(error),
            None => {
                self.last_error = None;
                self.last_synced = Some(Utc::now());
            }
        }

        if std::mem::take(&mut self.refetch) {
            tracing::trace!("running queued fetch");
            self.begin_cycle();
        }
    }

    // ── Mutations ───────────────────────────────────────────────

    /// Await `call` off the actor and hand its result to `reply`.
    fn dispatch<T, F>(&self, reply: Reply<T>, call: F)
    where
        T: Send + 'static,
        F: Future<Output = Result<T, EngineError>> + Send + 'static,
    {
        tokio::spawn(async move {
            let result = call.await;
            if let Err(e) = &result {
                tracing::warn!(error = %e, "daemon rejected mutation");
            }
            let _ = reply.send(result);
        });
    }

    fn set_running(&mut self, target: Target, running: bool, reply: Reply<()>) {
        let Some(client) = self.client() else {
            let _ = reply.send(Ok(()));
            return;
        };
        let status = if running {
            TorrentStatus::Download
        } else {
            TorrentStatus::Stopped
        };

        let ids = match target {
            Target::One(id) => match self.torrents.get(id) {
                Some(torrent) => {
                    torrent.set_status(status);
                    vec![id]
                }
                None => {
                    let _ = reply.send(Err(unknown(id)));
                    return;
                }
            },
            Target::All => self.torrents.set_all_status(status),
        };
        if ids.is_empty() {
            let _ = reply.send(Ok(()));
            return;
        }

        self.publish();
        self.dispatch(reply, async move {
            if running {
                client.torrent_start(&ids).await?;
            } else {
                client.torrent_stop(&ids).await?;
            }
            Ok::<_, EngineError>(())
        });
    }

    fn remove(&mut self, id: TorrentId, delete_files: bool, reply: Reply<()>) {
        let Some(client) = self.client() else {
            let _ = reply.send(Ok(()));
            return;
        };
        if self.torrents.remove(id).is_none() {
            let _ = reply.send(Err(unknown(id)));
            return;
        }

        self.publish();
        self.dispatch(reply, async move {
            client.torrent_remove(&[id], delete_files).await?;
            Ok::<_, EngineError>(())
        });
    }

    /// Send the positions a reorder changed, one `torrent-set` at a time.
    fn send_positions(&mut self, changed: Result<Vec<(TorrentId, i64)>, DeckError>, reply: Reply<()>) {
        let Some(client) = self.client() else {
            let _ = reply.send(Ok(()));
            return;
        };
        let changed = match changed {
            Ok(changed) => changed,
            Err(e) => {
                let _ = reply.send(Err(e.into()));
                return;
            }
        };

        self.publish();
        self.dispatch(reply, async move {
            for (id, position) in changed {
                client
                    .torrent_set(&TorrentSetArgs::queue_position(id, position))
                    .await?;
            }
            Ok::<_, EngineError>(())
        });
    }

    fn update_settings(&mut self, id: TorrentId, settings: TorrentSettings, reply: Reply<()>) {
        let Some(client) = self.client() else {
            let _ = reply.send(Ok(()));
            return;
        };
        let Some(torrent) = self.torrents.get(id) else {
            let _ = reply.send(Err(unknown(id)));
            return;
        };
        if let Err(e) = torrent.apply_settings(&settings) {
            let _ = reply.send(Err(e.into()));
            return;
        }

        let args = settings.to_set_args(id);
        self.publish();
        self.dispatch(reply, async move {
            client.torrent_set(&args).await?;
            Ok::<_, EngineError>(())
        });
    }

    fn add(&mut self, args: TorrentAddArgs, reply: Reply<Option<AddedTorrent>>) {
        let Some(session) = &self.session else {
            let _ = reply.send(Ok(None));
            return;
        };
        let id = session.id;
        let client = session.client.clone();
        let tx = self.completions.clone();

        self.dispatch(reply, async move {
            let added = client.torrent_add(&args).await?;
            match &added {
                AddedTorrent::Added(t) => {
                    tracing::info!(id = t.id, name = %t.name, "torrent added");
                    let _ = tx.send(Completion::Refresh { session: id });
                }
                AddedTorrent::Duplicate(t) => {
                    tracing::info!(id = t.id, name = %t.name, "torrent already present");
                }
            }
            Ok::<_, EngineError>(Some(added))
        });
    }

    fn get_preferences(&mut self, reply: Reply<Option<SessionPreferences>>) {
        let Some(session) = &self.session else {
            let _ = reply.send(Ok(None));
            return;
        };
        let id = session.id;
        let client = session.client.clone();
        let tx = self.completions.clone();

        tokio::spawn(async move {
            let result = client.session_get().await;
            let _ = tx.send(Completion::RequestedPreferences {
                session: id,
                result,
                reply,
            });
        });
    }

    fn set_preferences(&mut self, preferences: SessionPreferences, reply: Reply<()>) {
        let Some(client) = self.client() else {
            let _ = reply.send(Ok(()));
            return;
        };
        let record = preferences.to_record();
        self.preferences = Some(preferences);

        self.publish();
        self.dispatch(reply, async move {
            client.session_set(&record).await?;
            Ok::<_, EngineError>(())
        });
    }

    // ── Publishing ──────────────────────────────────────────────

    fn publish(&mut self) {
        self.revision += 1;
        let state = SyncState {
            revision: self.revision,
            profile: self.session.as_ref().map(|s| s.profile.label().to_string()),
            torrents: self.torrents.items().to_vec(),
            preferences: self.preferences.clone(),
            can_start_all: self.torrents.can_start_all(),
            can_stop_all: self.torrents.can_stop_all(),
            totals: self.torrents.totals(),
            updating: self.updating(),
            suspended: self.schedule.is_suspended(),
            last_synced: self.last_synced,
            last_error: self.last_error.clone(),
        };
        self.state.send_replace(state);
    }
}

fn unknown(id: TorrentId) -> EngineError {
    EngineError::Validation(format!("unknown torrent id {id}"))
}

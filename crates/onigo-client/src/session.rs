//! The per-client game session: a single-task state machine that owns every
//! timer and subscription for one player and re-derives the game view from
//! each shared-store snapshot.
//!
//! All coordination between clients goes through the store; there is no
//! server-side arbiter. The session reacts to four push sources (player
//! snapshots, game status, the event stream, position fixes), one local
//! clock tick and one phase-aligned send deadline, all multiplexed on a
//! single `select!` loop so handlers never race each other.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use onigo_core::events::{EventKind, FeedEvent};
use onigo_core::player::{DisqualifyReason, PlayerId, PlayerMap, PlayerRecord, Role};
use onigo_core::rules::{self, FinalResults};
use onigo_core::schedule;
use onigo_core::status::{GamePhase, GameStatusRecord};
use onigo_core::time::now_ms;
use onigo_store::{EventFeed, StoreClient};

use crate::config::ClientConfig;
use crate::error::GameError;
use crate::tracker::{AcquisitionError, Fix, FixStream, PositionTracker};

/// Minimum password length accepted at registration.
const MIN_PASSWORD_LEN: usize = 4;

/// The session's local view of its own player. Derived state only; the
/// store record stays authoritative.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser {
    pub id: PlayerId,
    pub username: String,
    pub role: Role,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub captured: bool,
    pub captured_by: Option<String>,
    pub disqualified: bool,
    pub onified: bool,
    pub spectator: bool,
}

impl CurrentUser {
    fn from_record(id: PlayerId, record: &PlayerRecord) -> Self {
        Self {
            id,
            username: record.username.clone(),
            role: record.role,
            lat: record.lat,
            lng: record.lng,
            captured: record.captured,
            captured_by: record.captured_by.clone(),
            disqualified: record.disqualified,
            onified: record.onified,
            spectator: false,
        }
    }
}

/// Everything the presentation layer consumes from a session.
#[derive(Debug, Clone)]
pub enum Notification {
    PhaseChanged(GamePhase),
    /// Pre-game countdown display, anchored to the shared start.
    CountdownTick(u64),
    /// Runner display: seconds until the next position send.
    SendCountdown(u64),
    /// A fresh own-position fix, with the current area membership.
    PositionUpdated { lat: f64, lng: f64, inside_area: bool },
    /// The filtered player view rebuilt from the latest snapshot.
    PlayersUpdated(Vec<(PlayerId, PlayerRecord)>),
    /// Oni display: the newest runner `updated_at` advanced.
    RunnerFreshness(u64),
    /// Seconds left before out-of-area disqualification.
    OutsideAreaWarning(u64),
    /// This player's own record flipped to captured.
    Captured { by: String },
    Disqualified(DisqualifyReason),
    /// Own capture write succeeded; rendering hint only — the view still
    /// reconciles against the next snapshot.
    CaptureConfirmed { target: PlayerId, username: String },
    /// This player re-entered play as an oni via onification.
    BecameOni,
    /// An admin reset cleared this player's flags; back in the lobby.
    Reinstated,
    ShrinkStarted { radius_m: f64 },
    ShrinkUpdated { radius_m: f64 },
    ShrinkEnded { radius_m: f64 },
    OnificationStarted,
    GameEnded(FinalResults),
    /// A feed entry (local or remote) for the narrative log.
    Feed(FeedEvent),
    /// Position acquisition failed; tracking is not auto-restarted.
    AcquisitionFailed(String),
}

/// Operations sent from the handle into the session actor.
enum Command {
    Capture {
        target: PlayerId,
        reply: oneshot::Sender<Result<(), GameError>>,
    },
    SetSpectator,
    CurrentUser {
        reply: oneshot::Sender<CurrentUser>,
    },
    GameState {
        reply: oneshot::Sender<GameStatusRecord>,
    },
    EventLog {
        reply: oneshot::Sender<Vec<FeedEvent>>,
    },
    Shutdown,
}

/// Handle to a running game session. Dropping it tears the session down,
/// cancelling every timer and subscription the actor owns.
pub struct GameSession {
    cmd_tx: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl GameSession {
    /// Register a new player and start their session.
    pub async fn register(
        cfg: Arc<ClientConfig>,
        store: StoreClient,
        fixes: FixStream,
        username: &str,
        role: Role,
        password: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Notification>), GameError> {
        if username.trim().is_empty() {
            return Err(GameError::EmptyUsername);
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(GameError::PasswordTooShort);
        }
        let (id, record) = store.register_player(username.trim(), role, password).await?;
        info!(player = %id, username, ?role, "joined game");
        Ok(Self::spawn(cfg, store, fixes, id, record))
    }

    /// Resume an existing player by credentials. Resuming while captured or
    /// disqualified lands in that terminal state — and stays eligible for
    /// onification.
    pub async fn login(
        cfg: Arc<ClientConfig>,
        store: StoreClient,
        fixes: FixStream,
        username: &str,
        password: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Notification>), GameError> {
        let Some((id, record)) = store.authenticate(username.trim(), password).await? else {
            return Err(GameError::InvalidCredentials);
        };
        info!(player = %id, username, "session resumed");
        Ok(Self::spawn(cfg, store, fixes, id, record))
    }

    fn spawn(
        cfg: Arc<ClientConfig>,
        store: StoreClient,
        fixes: FixStream,
        id: PlayerId,
        record: PlayerRecord,
    ) -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();

        // Subscribe before the actor starts so no push is missed between
        // registration and the first loop iteration.
        let players_rx = store.watch_players();
        let status_rx = store.watch_game_status();
        let events_rx = store.watch_events();

        let mut tracker = PositionTracker::new(&cfg.area, cfg.shrink.min_radius_m);
        if !record.is_neutralized() {
            tracker.start_tracking();
        }

        let driver = SessionDriver {
            me: CurrentUser::from_record(id, &record),
            game: GameStatusRecord::waiting(),
            players: PlayerMap::new(),
            feed: EventFeed::new(cfg.rules.max_events),
            tracker,
            cfg,
            store,
            notify_tx,
            send_at: None,
            outside_since: None,
            last_runner_update: 0,
            shrink_started: false,
            shrink_ended: false,
            onification_fired: false,
            ended_handled: false,
        };

        let task = tokio::spawn(driver.run(cmd_rx, players_rx, status_rx, events_rx, fixes));
        (Self { cmd_tx, task }, notify_rx)
    }

    /// Capture a runner. Fails fast on authorization or range violations
    /// without touching the store.
    pub async fn capture_player(&self, target: PlayerId) -> Result<(), GameError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Capture { target, reply })
            .map_err(|_| GameError::SessionClosed)?;
        rx.await.map_err(|_| GameError::SessionClosed)?
    }

    /// Enter spectator mode (from a captured/disqualified state).
    pub fn set_spectator_mode(&self) {
        let _ = self.cmd_tx.send(Command::SetSpectator);
    }

    pub async fn current_user(&self) -> Result<CurrentUser, GameError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::CurrentUser { reply })
            .map_err(|_| GameError::SessionClosed)?;
        rx.await.map_err(|_| GameError::SessionClosed)
    }

    pub async fn game_state(&self) -> Result<GameStatusRecord, GameError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::GameState { reply })
            .map_err(|_| GameError::SessionClosed)?;
        rx.await.map_err(|_| GameError::SessionClosed)
    }

    pub async fn is_game_active(&self) -> Result<bool, GameError> {
        Ok(self.game_state().await?.is_active())
    }

    /// The capped narrative log, newest first.
    pub async fn event_feed(&self) -> Result<Vec<FeedEvent>, GameError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::EventLog { reply })
            .map_err(|_| GameError::SessionClosed)?;
        rx.await.map_err(|_| GameError::SessionClosed)
    }

    /// Tear the session down, cancelling all owned timers and subscriptions.
    pub fn cleanup(&self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
    }
}

impl Drop for GameSession {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Sleep until an absolute unix-ms deadline; pend forever when unarmed.
/// Recomputed from the shared timestamp each loop pass, so cancellation and
/// re-arming never drift.
async fn wait_until(at_ms: Option<u64>) {
    match at_ms {
        Some(at) => {
            let delay = at.saturating_sub(now_ms());
            tokio::time::sleep(Duration::from_millis(delay)).await;
        },
        None => std::future::pending().await,
    }
}

/// Pull the next fix, pending forever once the source closes (a closed
/// source is a stopped tracker, not an error).
async fn next_fix(fixes: &mut Option<FixStream>) -> Option<Result<Fix, AcquisitionError>> {
    let Some(rx) = fixes.as_mut() else {
        return std::future::pending().await;
    };
    let item = rx.recv().await;
    if item.is_none() {
        *fixes = None;
    }
    item
}

struct SessionDriver {
    cfg: Arc<ClientConfig>,
    store: StoreClient,
    tracker: PositionTracker,
    me: CurrentUser,
    game: GameStatusRecord,
    players: PlayerMap,
    feed: EventFeed,
    notify_tx: mpsc::UnboundedSender<Notification>,
    /// Next position send on the shared grid, unix ms. `None` = not sending.
    send_at: Option<u64>,
    /// When the player left the area, unix ms. `None` = grace timer unarmed.
    outside_since: Option<u64>,
    /// Newest runner `updated_at` seen so far (oni display).
    last_runner_update: u64,
    shrink_started: bool,
    shrink_ended: bool,
    onification_fired: bool,
    ended_handled: bool,
}

impl SessionDriver {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<Command>,
        mut players_rx: broadcast::Receiver<PlayerMap>,
        mut status_rx: tokio::sync::watch::Receiver<Option<GameStatusRecord>>,
        mut events_rx: broadcast::Receiver<FeedEvent>,
        fixes: FixStream,
    ) {
        let mut fixes = Some(fixes);
        let mut clock = tokio::time::interval(Duration::from_millis(self.cfg.intervals.clock_tick_ms));
        clock.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.feed_local(EventKind::Normal, format!("{} joined the game", self.me.username));

        // Prime from the store before reacting to pushes, so a late joiner
        // lands in the correct phase with a phase-aligned send schedule.
        match self.store.game_status_once().await {
            Ok(Some(status)) => self.apply_status(status).await,
            Ok(None) => {},
            Err(e) => warn!(error = %e, "initial status read failed"),
        }
        match self.store.players_once().await {
            Ok(players) => self.on_players_snapshot(players).await,
            Err(e) => warn!(error = %e, "initial player read failed"),
        }

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    None | Some(Command::Shutdown) => break,
                    Some(cmd) => self.on_command(cmd).await,
                },
                snapshot = players_rx.recv() => match snapshot {
                    Ok(players) => self.on_players_snapshot(players).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        // Snapshots carry the full map, so skipping ahead to
                        // a fresh read loses nothing.
                        warn!(missed, "player snapshot stream lagged; resyncing");
                        if let Ok(players) = self.store.players_once().await {
                            self.on_players_snapshot(players).await;
                        }
                    },
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                changed = status_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let status = status_rx.borrow_and_update().clone();
                    if let Some(status) = status {
                        self.apply_status(status).await;
                    }
                },
                event = events_rx.recv() => match event {
                    Ok(event) => self.on_remote_event(event),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "event stream lagged; narration entries dropped");
                    },
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                fix = next_fix(&mut fixes) => match fix {
                    Some(Ok(fix)) => self.on_fix(fix).await,
                    Some(Err(e)) => {
                        warn!(error = %e, "position acquisition failed");
                        self.notify(Notification::AcquisitionFailed(e.to_string()));
                    },
                    None => debug!("position source closed"),
                },
                _ = clock.tick() => self.on_clock_tick().await,
                _ = wait_until(self.send_at) => self.on_send_due().await,
            }
        }
        debug!(player = %self.me.id, "session loop exited");
    }

    fn notify(&self, notification: Notification) {
        let _ = self.notify_tx.send(notification);
    }

    fn feed_local(&mut self, kind: EventKind, message: String) {
        let event = FeedEvent {
            kind,
            message,
            timestamp: now_ms(),
        };
        self.feed.push(event.clone());
        self.notify(Notification::Feed(event));
    }

    fn on_remote_event(&mut self, event: FeedEvent) {
        self.feed.push(event.clone());
        self.notify(Notification::Feed(event));
    }

    // =====================
    // Commands
    // =====================

    async fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::Capture { target, reply } => {
                let _ = reply.send(self.capture(target).await);
            },
            Command::SetSpectator => self.enter_spectator(),
            Command::CurrentUser { reply } => {
                let _ = reply.send(self.me.clone());
            },
            Command::GameState { reply } => {
                let _ = reply.send(self.game.clone());
            },
            Command::EventLog { reply } => {
                let _ = reply.send(self.feed.iter().cloned().collect());
            },
            Command::Shutdown => {},
        }
    }

    async fn capture(&mut self, target: PlayerId) -> Result<(), GameError> {
        if self.me.role != Role::Oni {
            return Err(GameError::NotOni);
        }
        if self.me.captured || self.me.disqualified {
            return Err(GameError::Neutralized);
        }
        let Some(record) = self.players.get(&target) else {
            return Err(GameError::UnknownPlayer(target));
        };
        let Some((target_lat, target_lng)) = record.position() else {
            return Err(GameError::NoPosition);
        };
        let username = record.username.clone();
        let Some(distance) = self.tracker.distance_to(target_lat, target_lng) else {
            return Err(GameError::NoPosition);
        };
        if !rules::capture_in_range(distance, self.cfg.rules.capture_radius_m) {
            return Err(GameError::OutOfRange { distance_m: distance });
        }

        // Unconditional write: a concurrent capture of the same target
        // resolves to the last writer.
        self.store.capture(&target, &self.me.username, now_ms()).await?;
        info!(target = %target, distance_m = distance, "capture write succeeded");

        let message = format!("{} captured {}", self.me.username, username);
        if let Err(e) = self.store.append_event(EventKind::Important, &message).await {
            warn!(error = %e, "capture narration write failed");
        }
        // Write success is the confirmation; the view still reconciles
        // against the next snapshot.
        self.notify(Notification::CaptureConfirmed { target, username });
        Ok(())
    }

    fn enter_spectator(&mut self) {
        if !self.me.captured && !self.me.disqualified {
            warn!("spectator mode is only available from captured or disqualified states");
            return;
        }
        self.me.spectator = true;
        self.stop_sending();
        self.tracker.stop_tracking();
        debug!(player = %self.me.id, "spectator mode entered");
        self.notify(Notification::PlayersUpdated(rules::visible_players(
            &self.players,
            &self.me.id,
            None,
        )));
    }

    // =====================
    // Store snapshots
    // =====================

    async fn on_players_snapshot(&mut self, players: PlayerMap) {
        self.players = players;
        self.detect_own_edges();

        if self.me.role == Role::Oni && !self.me.spectator {
            self.track_runner_freshness();
        }

        // Win evaluation is re-derived on every active snapshot; any client
        // may perform the (idempotent) terminal write.
        if self.game.status == GamePhase::Active
            && !self.ended_handled
            && let Some(winner) = rules::evaluate_win(&self.players)
        {
            info!("all runners neutralized; recording the oni win");
            if let Err(e) = self.store.mark_ended(now_ms(), Some(winner)).await {
                warn!(error = %e, "win-condition write failed; another client will land it");
            }
        }

        let viewer_role = if self.me.spectator { None } else { Some(self.me.role) };
        self.notify(Notification::PlayersUpdated(rules::visible_players(
            &self.players,
            &self.me.id,
            viewer_role,
        )));
    }

    /// Edge-detect own-record transitions across consecutive snapshots.
    /// Steady-state flags fire nothing; only the false→true (and reset's
    /// true→false) edges have side effects.
    fn detect_own_edges(&mut self) {
        let Some(mine) = self.players.get(&self.me.id).cloned() else {
            return;
        };

        if mine.captured && !self.me.captured {
            let by = mine.captured_by.clone().unwrap_or_else(|| "unknown".to_string());
            self.me.captured = true;
            self.me.captured_by = mine.captured_by.clone();
            self.enter_captured(by);
            return;
        }

        if mine.onified && !self.me.onified && (self.me.captured || self.me.disqualified) {
            self.become_oni();
            return;
        }

        // Admin reset: the store cleared flags we still hold locally.
        if (self.me.captured || self.me.disqualified) && !mine.captured && !mine.disqualified {
            info!(player = %self.me.id, "flags cleared by reset; reinstated");
            self.me.captured = false;
            self.me.captured_by = None;
            self.me.disqualified = false;
            self.me.spectator = false;
            self.tracker.start_tracking();
            self.notify(Notification::Reinstated);
        }
    }

    fn enter_captured(&mut self, by: String) {
        info!(by = %by, "captured — leaving the live game");
        self.stop_sending();
        self.tracker.stop_tracking();
        self.outside_since = None;
        self.feed_local(
            EventKind::Important,
            format!("{} was captured by {}", self.me.username, by),
        );
        self.notify(Notification::Captured { by });
    }

    fn become_oni(&mut self) {
        info!(player = %self.me.id, "onified — re-entering as oni");
        self.me.role = Role::Oni;
        self.me.captured = false;
        self.me.captured_by = None;
        self.me.disqualified = false;
        self.me.onified = true;
        self.me.spectator = false;
        self.outside_since = None;
        self.tracker.start_tracking();
        if self.game.status == GamePhase::Active {
            // Oni flow: send immediately, then on the fixed interval.
            self.send_at = Some(now_ms());
        }
        self.feed_local(
            EventKind::Important,
            format!("{} rejoined as oni", self.me.username),
        );
        self.notify(Notification::BecameOni);
    }

    fn track_runner_freshness(&mut self) {
        let latest = self
            .players
            .values()
            .filter(|p| p.role == Role::Runner && !p.is_neutralized())
            .map(|p| p.updated_at)
            .max()
            .unwrap_or(0);
        if latest > self.last_runner_update {
            self.last_runner_update = latest;
            self.notify(Notification::RunnerFreshness(latest));
        }
    }

    // =====================
    // Game status
    // =====================

    async fn apply_status(&mut self, status: GameStatusRecord) {
        let phase_changed = status.status != self.game.status;
        self.game = status;
        if !phase_changed {
            return;
        }
        info!(phase = ?self.game.status, "game phase changed");
        self.notify(Notification::PhaseChanged(self.game.status));
        match self.game.status {
            GamePhase::Waiting => self.enter_waiting(),
            GamePhase::Countdown => self.enter_countdown(),
            GamePhase::Active => self.enter_active().await,
            GamePhase::Ended => self.enter_ended().await,
        }
    }

    fn enter_waiting(&mut self) {
        self.stop_sending();
        self.outside_since = None;
        self.shrink_started = false;
        self.shrink_ended = false;
        self.onification_fired = false;
        self.ended_handled = false;
        self.tracker.reset_radius();
    }

    fn enter_countdown(&mut self) {
        self.stop_sending();
        if let Some(start) = self.game.countdown_start {
            let remaining =
                schedule::countdown_remaining_secs(start, now_ms(), self.cfg.rules.countdown_ms);
            self.notify(Notification::CountdownTick(remaining));
        }
    }

    async fn enter_active(&mut self) {
        self.ended_handled = false;
        self.shrink_started = false;
        self.shrink_ended = false;
        self.onification_fired = false;
        self.outside_since = None;
        self.tracker.reset_radius();
        if self.me.captured || self.me.disqualified || self.me.spectator {
            return;
        }
        self.start_sending().await;
    }

    async fn enter_ended(&mut self) {
        if self.ended_handled {
            return;
        }
        self.ended_handled = true;
        self.stop_sending();
        self.outside_since = None;
        match self.store.players_once().await {
            Ok(players) => {
                let results = rules::final_results(&players);
                self.feed_local(EventKind::Important, "the game has ended".to_string());
                self.notify(Notification::GameEnded(results));
            },
            Err(e) => warn!(error = %e, "final snapshot read failed"),
        }
    }

    // =====================
    // Position sending
    // =====================

    async fn start_sending(&mut self) {
        let now = now_ms();
        match self.me.role {
            Role::Oni => {
                self.send_position().await;
                self.send_at = Some(now + self.cfg.intervals.oni_send_ms);
            },
            Role::Runner => {
                let Some(start) = self.game.start_time else {
                    return;
                };
                // A client observing the transition within the first second
                // sends a first fix right away; everyone then follows the
                // shared grid, so independently-joining runners stay in
                // phase with each other.
                if now.saturating_sub(start) < 1_000 {
                    self.send_position().await;
                }
                self.send_at = Some(schedule::next_send_at_ms(
                    start,
                    now,
                    self.cfg.intervals.runner_send_ms,
                ));
            },
        }
        debug!(next_send_at = ?self.send_at, "position sending started");
    }

    fn stop_sending(&mut self) {
        if self.send_at.take().is_some() {
            debug!("position sending stopped");
        }
    }

    async fn on_send_due(&mut self) {
        // Reschedule first so a failed write does not stall the grid.
        let now = now_ms();
        match self.me.role {
            Role::Oni => self.send_at = Some(now + self.cfg.intervals.oni_send_ms),
            Role::Runner => {
                let Some(start) = self.game.start_time else {
                    self.send_at = None;
                    return;
                };
                self.send_at = Some(schedule::next_send_at_ms(
                    start,
                    now,
                    self.cfg.intervals.runner_send_ms,
                ));
            },
        }
        self.send_position().await;
    }

    async fn send_position(&mut self) {
        // Capture can land between scheduled ticks: re-check at send time,
        // not just when the timer was armed.
        if self.me.captured || self.me.disqualified || self.me.spectator {
            return;
        }
        let Some(fix) = self.tracker.position() else {
            return;
        };
        match self.store.update_position(&self.me.id, fix.lat, fix.lng, now_ms()).await {
            Ok(()) => debug!(lat = fix.lat, lng = fix.lng, "position sent"),
            Err(e) => warn!(error = %e, "position write failed"),
        }
    }

    // =====================
    // Position fixes
    // =====================

    async fn on_fix(&mut self, fix: Fix) {
        if !self.tracker.is_tracking() {
            return;
        }
        self.tracker.record_fix(fix);
        self.me.lat = Some(fix.lat);
        self.me.lng = Some(fix.lng);
        let inside = self.tracker.is_inside_game_area().unwrap_or(true);
        self.notify(Notification::PositionUpdated {
            lat: fix.lat,
            lng: fix.lng,
            inside_area: inside,
        });
        if self.game.status == GamePhase::Active
            && !self.me.captured
            && !self.me.disqualified
            && !self.me.spectator
        {
            self.check_outside_area();
        }
    }

    /// Arm or disarm the out-of-area grace timer on membership transitions.
    /// Re-entering resets the timer to unarmed; it is never paused.
    fn check_outside_area(&mut self) {
        let Some(inside) = self.tracker.is_inside_game_area() else {
            return;
        };
        if inside {
            if self.outside_since.take().is_some() {
                debug!("back inside the area; grace timer cleared");
            }
        } else if self.outside_since.is_none() {
            self.outside_since = Some(now_ms());
            info!("outside the area; grace timer armed");
            let remaining = self.cfg.rules.outside_limit_ms.div_ceil(1_000);
            self.notify(Notification::OutsideAreaWarning(remaining));
        }
    }

    // =====================
    // Clock tick
    // =====================

    async fn on_clock_tick(&mut self) {
        match self.game.status {
            GamePhase::Countdown => {
                if let Some(start) = self.game.countdown_start {
                    let remaining = schedule::countdown_remaining_secs(
                        start,
                        now_ms(),
                        self.cfg.rules.countdown_ms,
                    );
                    self.notify(Notification::CountdownTick(remaining));
                }
            },
            GamePhase::Active => {
                self.tick_outside_area().await;
                self.tick_shrink();
                self.tick_onification().await;
                self.tick_runner_countdown();
                self.tick_game_end().await;
            },
            GamePhase::Waiting | GamePhase::Ended => {},
        }
    }

    async fn tick_outside_area(&mut self) {
        let Some(since) = self.outside_since else {
            return;
        };
        let elapsed = now_ms().saturating_sub(since);
        let limit = self.cfg.rules.outside_limit_ms;
        if elapsed < limit {
            let remaining = (limit - elapsed).div_ceil(1_000);
            self.notify(Notification::OutsideAreaWarning(remaining));
            return;
        }
        // Grace period elapsed without re-entry.
        match self
            .store
            .disqualify(&self.me.id, DisqualifyReason::OutOfArea, now_ms())
            .await
        {
            Ok(()) => {
                info!("disqualified: outside the area past the grace period");
                self.me.disqualified = true;
                self.outside_since = None;
                self.stop_sending();
                self.tracker.stop_tracking();
                self.feed_local(
                    EventKind::Important,
                    format!("{} was disqualified (out of area)", self.me.username),
                );
                self.notify(Notification::Disqualified(DisqualifyReason::OutOfArea));
            },
            // The local flag only flips after the write lands; the timer
            // stays armed so the next tick retries.
            Err(e) => warn!(error = %e, "disqualification write failed; retrying next tick"),
        }
    }

    fn tick_shrink(&mut self) {
        if self.shrink_ended {
            return;
        }
        let Some(end) = self.game.end_time else {
            return;
        };
        let trigger_at = schedule::shrink_trigger_at_ms(end, self.cfg.shrink.trigger_remaining_ms);
        let now = now_ms();
        if now < trigger_at {
            return;
        }
        let radius = schedule::shrink_radius_m(
            self.cfg.area.radius_m,
            self.cfg.shrink.rate_m_per_s,
            self.cfg.shrink.min_radius_m,
            trigger_at,
            now,
        );
        self.tracker.set_current_radius(radius);
        if !self.shrink_started {
            self.shrink_started = true;
            info!(radius_m = radius, "safe-zone shrink started");
            // Narration stays local: every client derives the same event
            // from shared timestamps, so nothing is written to the store.
            self.feed_local(EventKind::Important, "the safe zone is shrinking".to_string());
            self.notify(Notification::ShrinkStarted { radius_m: radius });
        } else if radius <= self.cfg.shrink.min_radius_m {
            self.shrink_ended = true;
            info!(radius_m = radius, "safe zone reached its minimum radius");
            self.feed_local(
                EventKind::Normal,
                "the safe zone has reached its minimum size".to_string(),
            );
            self.notify(Notification::ShrinkEnded { radius_m: radius });
        } else {
            self.notify(Notification::ShrinkUpdated { radius_m: radius });
        }
    }

    async fn tick_onification(&mut self) {
        if self.onification_fired {
            return;
        }
        let Some(end) = self.game.end_time else {
            return;
        };
        if schedule::remaining_ms(end, now_ms()) > self.cfg.onification.trigger_remaining_ms {
            return;
        }
        self.onification_fired = true;
        info!("onification window reached");
        self.feed_local(
            EventKind::Important,
            "onification: captured and disqualified players rejoin as oni".to_string(),
        );
        self.notify(Notification::OnificationStarted);

        // Every client performs the same idempotent rewrites; whoever lands
        // last changes nothing.
        let targets: Vec<PlayerId> = self
            .players
            .iter()
            .filter(|(_, p)| rules::onifiable(p))
            .map(|(id, _)| id.clone())
            .collect();
        for id in targets {
            if let Err(e) = self.store.onify(&id, now_ms()).await {
                warn!(player = %id, error = %e, "onify write failed");
            }
        }
    }

    fn tick_runner_countdown(&mut self) {
        if self.me.role != Role::Runner || self.send_at.is_none() {
            return;
        }
        let Some(start) = self.game.start_time else {
            return;
        };
        let remaining = schedule::next_send_in_ms(start, now_ms(), self.cfg.intervals.runner_send_ms)
            .div_ceil(1_000);
        self.notify(Notification::SendCountdown(remaining));
    }

    async fn tick_game_end(&mut self) {
        let Some(end) = self.game.end_time else {
            return;
        };
        if now_ms() < end || self.ended_handled {
            return;
        }
        // Time expired: surviving runners win. The write is idempotent and
        // the local transition arrives through the status watch echo.
        if let Err(e) = self.store.mark_ended(end, None).await {
            warn!(error = %e, "end-of-game write failed; retrying next tick");
        }
    }
}

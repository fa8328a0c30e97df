use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use onigo_client::admin::AdminConsole;
use onigo_client::config::ClientConfig;
use onigo_client::session::{GameSession, Notification};
use onigo_client::tracker::{Fix, FixSender, fix_channel};
use onigo_core::player::{PlayerId, Role};
use onigo_core::status::GamePhase;
use onigo_store::{StoreClient, StoreHub};

pub const TEST_PASSWORD: &str = "secret99";

/// One degree of latitude is ~111.32 km.
const METERS_PER_DEG_LAT: f64 = 111_320.0;

/// A config with production semantics but test-speed timing: games that
/// would take 30 wall-clock minutes complete in a couple of seconds.
pub fn test_config() -> Arc<ClientConfig> {
    let mut cfg = ClientConfig::default();
    cfg.intervals.clock_tick_ms = 20;
    cfg.intervals.oni_send_ms = 60;
    cfg.intervals.runner_send_ms = 250;
    cfg.rules.countdown_ms = 80;
    cfg.rules.outside_limit_ms = 200;
    cfg.rules.default_duration_ms = 60_000;
    // Neither timed event fires unless a test opts in.
    cfg.shrink.trigger_remaining_ms = 0;
    cfg.onification.trigger_remaining_ms = 0;
    Arc::new(cfg)
}

/// A fix `meters` north of the area center.
pub fn fix_north(cfg: &ClientConfig, meters: f64) -> Fix {
    Fix {
        lat: cfg.area.center_lat + meters / METERS_PER_DEG_LAT,
        lng: cfg.area.center_lng,
    }
}

pub struct TestClient {
    pub id: PlayerId,
    pub session: GameSession,
    pub notes: mpsc::UnboundedReceiver<Notification>,
    pub fixes: FixSender,
    pub store: StoreClient,
}

impl TestClient {
    pub fn send_fix_north(&self, cfg: &ClientConfig, meters: f64) {
        let _ = self.fixes.send(Ok(fix_north(cfg, meters)));
    }
}

/// Register a player, start their session, and deliver a first fix at the
/// area center.
pub async fn join(hub: &StoreHub, cfg: &Arc<ClientConfig>, username: &str, role: Role) -> TestClient {
    let store = hub.client();
    let (fixes, fix_rx) = fix_channel();
    let (session, notes) = GameSession::register(
        Arc::clone(cfg),
        store.clone(),
        fix_rx,
        username,
        role,
        TEST_PASSWORD,
    )
    .await
    .expect("registration should succeed");
    let id = session.current_user().await.expect("session should be live").id;
    let client = TestClient {
        id,
        session,
        notes,
        fixes,
        store,
    };
    client.send_fix_north(cfg, 0.0);
    client
}

/// An authenticated admin console against the hub.
pub fn admin(hub: &StoreHub, cfg: &Arc<ClientConfig>) -> AdminConsole {
    let mut console = AdminConsole::new(Arc::clone(cfg), hub.client());
    console
        .login(&cfg.admin.password)
        .expect("configured admin password should authenticate");
    console
}

/// Await the first notification matching `pred`, discarding the rest.
pub async fn wait_for<F>(
    notes: &mut mpsc::UnboundedReceiver<Notification>,
    timeout_ms: u64,
    mut pred: F,
) -> Notification
where
    F: FnMut(&Notification) -> bool,
{
    tokio::time::timeout(Duration::from_millis(timeout_ms), async {
        loop {
            let note = notes.recv().await.expect("notification channel closed");
            if pred(&note) {
                return note;
            }
        }
    })
    .await
    .expect("timed out waiting for notification")
}

pub async fn wait_for_phase(
    notes: &mut mpsc::UnboundedReceiver<Notification>,
    phase: GamePhase,
    timeout_ms: u64,
) {
    wait_for(notes, timeout_ms, |n| {
        matches!(n, Notification::PhaseChanged(p) if *p == phase)
    })
    .await;
}

/// Drain everything currently queued, returning it for inspection.
pub fn drain(notes: &mut mpsc::UnboundedReceiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(note) = notes.try_recv() {
        out.push(note);
    }
    out
}

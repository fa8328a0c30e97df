//! Lifecycle tests: out-of-area grace handling, the safe-zone shrink, session
//! resumption, offline behavior and the admin reset round trip.

#[allow(dead_code)]
mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{TEST_PASSWORD, admin, drain, join, test_config, wait_for, wait_for_phase};

use onigo_client::error::GameError;
use onigo_client::session::{GameSession, Notification};
use onigo_client::tracker::fix_channel;
use onigo_core::player::{DisqualifyReason, Role};
use onigo_core::status::GamePhase;
use onigo_store::{StoreError, StoreHub};

#[tokio::test]
async fn reentering_area_before_grace_elapses_cancels_disqualification() {
    let cfg = test_config();
    let hub = StoreHub::new();
    let mut runner = join(&hub, &cfg, "r1", Role::Runner).await;

    let console = admin(&hub, &cfg);
    console.start_game(cfg.rules.default_duration_ms).await.unwrap();
    wait_for_phase(&mut runner.notes, GamePhase::Active, 2_000).await;

    // Step outside: the grace countdown arms and warns.
    runner.send_fix_north(&cfg, 3_000.0);
    wait_for(&mut runner.notes, 2_000, |n| {
        matches!(n, Notification::OutsideAreaWarning(_))
    })
    .await;

    // Back inside well before the limit: the timer resets to unarmed.
    tokio::time::sleep(Duration::from_millis(cfg.rules.outside_limit_ms / 2)).await;
    runner.send_fix_north(&cfg, 0.0);

    // Wait past where the original deadline would have been.
    tokio::time::sleep(Duration::from_millis(cfg.rules.outside_limit_ms * 2)).await;
    let disqualified = drain(&mut runner.notes)
        .iter()
        .any(|n| matches!(n, Notification::Disqualified(_)));
    assert!(!disqualified, "re-entry must cancel the grace countdown");
    assert!(!runner.store.players_once().await.unwrap()[&runner.id].disqualified);
}

#[tokio::test]
async fn staying_outside_past_grace_disqualifies() {
    let cfg = test_config();
    let hub = StoreHub::new();
    let mut runner = join(&hub, &cfg, "r1", Role::Runner).await;

    let console = admin(&hub, &cfg);
    console.start_game(cfg.rules.default_duration_ms).await.unwrap();
    wait_for_phase(&mut runner.notes, GamePhase::Active, 2_000).await;

    runner.send_fix_north(&cfg, 3_000.0);
    let note = wait_for(&mut runner.notes, 3_000, |n| {
        matches!(n, Notification::Disqualified(_))
    })
    .await;
    assert!(matches!(
        note,
        Notification::Disqualified(DisqualifyReason::OutOfArea)
    ));

    let players = runner.store.players_once().await.unwrap();
    let record = &players[&runner.id];
    assert!(record.disqualified);
    assert_eq!(record.disqualified_reason, Some(DisqualifyReason::OutOfArea));
    assert!(record.disqualified_at.is_some());

    // Disqualified players stop sending.
    let frozen_at = record.updated_at;
    tokio::time::sleep(Duration::from_millis(3 * cfg.intervals.runner_send_ms)).await;
    let players = runner.store.players_once().await.unwrap();
    assert_eq!(players[&runner.id].updated_at, frozen_at);
}

#[tokio::test]
async fn shrink_narrows_membership_until_the_floor() {
    let mut cfg = (*test_config()).clone();
    // Shrink from the first moment of the game, effectively instantly.
    cfg.shrink.trigger_remaining_ms = cfg.rules.default_duration_ms;
    cfg.shrink.rate_m_per_s = 1_000_000.0;
    let cfg = Arc::new(cfg);

    let hub = StoreHub::new();
    // Standing 1000m out: inside the 2000m circle, outside the 500m floor.
    let mut runner = join(&hub, &cfg, "r1", Role::Runner).await;
    runner.send_fix_north(&cfg, 1_000.0);

    let console = admin(&hub, &cfg);
    console.start_game(cfg.rules.default_duration_ms).await.unwrap();
    wait_for_phase(&mut runner.notes, GamePhase::Active, 2_000).await;

    wait_for(&mut runner.notes, 2_000, |n| {
        matches!(n, Notification::ShrinkStarted { .. })
    })
    .await;
    let note = wait_for(&mut runner.notes, 2_000, |n| {
        matches!(n, Notification::ShrinkEnded { .. })
    })
    .await;
    match note {
        Notification::ShrinkEnded { radius_m } => assert_eq!(radius_m, cfg.shrink.min_radius_m),
        _ => unreachable!(),
    }

    // The next fix is evaluated against the shrunk radius: the unchanged
    // position is now outside, and the grace period runs out.
    runner.send_fix_north(&cfg, 1_000.0);
    wait_for(&mut runner.notes, 3_000, |n| {
        matches!(n, Notification::Disqualified(_))
    })
    .await;
}

#[tokio::test]
async fn countdown_is_anchored_and_reaches_active() {
    let cfg = test_config();
    let hub = StoreHub::new();
    let mut runner = join(&hub, &cfg, "r1", Role::Runner).await;

    let console = admin(&hub, &cfg);
    console.start_game(cfg.rules.default_duration_ms).await.unwrap();

    wait_for_phase(&mut runner.notes, GamePhase::Countdown, 2_000).await;
    let note = wait_for(&mut runner.notes, 2_000, |n| {
        matches!(n, Notification::CountdownTick(_))
    })
    .await;
    match note {
        Notification::CountdownTick(secs) => {
            assert!(secs <= cfg.rules.countdown_ms.div_ceil(1_000));
        },
        _ => unreachable!(),
    }
    wait_for_phase(&mut runner.notes, GamePhase::Active, 2_000).await;

    let status = runner.store.game_status_once().await.unwrap().unwrap();
    let start = status.start_time.unwrap();
    assert_eq!(status.end_time.unwrap(), start + cfg.rules.default_duration_ms);
}

#[tokio::test]
async fn login_resumes_captured_state() {
    let cfg = test_config();
    let hub = StoreHub::new();
    let mut oni = join(&hub, &cfg, "h1", Role::Oni).await;
    let mut runner = join(&hub, &cfg, "r1", Role::Runner).await;

    let console = admin(&hub, &cfg);
    console.start_game(cfg.rules.default_duration_ms).await.unwrap();
    wait_for_phase(&mut runner.notes, GamePhase::Active, 2_000).await;
    wait_for(&mut oni.notes, 2_000, |n| {
        matches!(n, Notification::PlayersUpdated(view)
            if view.iter().any(|(_, p)| p.username == "r1" && p.position().is_some()))
    })
    .await;

    oni.session.capture_player(runner.id.clone()).await.unwrap();
    wait_for(&mut runner.notes, 2_000, |n| {
        matches!(n, Notification::Captured { .. })
    })
    .await;

    // The phone died; the player comes back on a fresh session.
    runner.session.cleanup();
    drop(runner);

    let (_, fix_rx) = fix_channel();
    let (resumed, _notes) =
        GameSession::login(Arc::clone(&cfg), hub.client(), fix_rx, "r1", TEST_PASSWORD)
            .await
            .unwrap();
    let me = resumed.current_user().await.unwrap();
    assert!(me.captured);
    assert_eq!(me.captured_by.as_deref(), Some("h1"));

    let err = GameSession::login(
        Arc::clone(&cfg),
        hub.client(),
        fix_channel().1,
        "r1",
        "wrong-password",
    )
    .await
    .err()
    .unwrap();
    assert!(matches!(err, GameError::InvalidCredentials));
}

#[tokio::test]
async fn offline_capture_surfaces_store_error() {
    let cfg = test_config();
    let hub = StoreHub::new();
    let mut oni = join(&hub, &cfg, "h1", Role::Oni).await;
    let mut runner = join(&hub, &cfg, "r1", Role::Runner).await;

    let console = admin(&hub, &cfg);
    console.start_game(cfg.rules.default_duration_ms).await.unwrap();
    wait_for_phase(&mut runner.notes, GamePhase::Active, 2_000).await;
    wait_for(&mut oni.notes, 2_000, |n| {
        matches!(n, Notification::PlayersUpdated(view)
            if view.iter().any(|(_, p)| p.username == "r1" && p.position().is_some()))
    })
    .await;

    oni.store.set_offline(true);
    let err = oni.session.capture_player(runner.id.clone()).await.unwrap_err();
    assert!(matches!(err, GameError::Store(StoreError::Unavailable)));
    // No optimistic flag landed anywhere.
    assert!(!runner.store.players_once().await.unwrap()[&runner.id].captured);

    oni.store.set_offline(false);
    oni.session.capture_player(runner.id.clone()).await.unwrap();
    wait_for(&mut runner.notes, 2_000, |n| {
        matches!(n, Notification::Captured { .. })
    })
    .await;
}

#[tokio::test]
async fn reset_round_trip_clears_flags_and_preserves_identity() {
    let cfg = test_config();
    let hub = StoreHub::new();
    let mut oni = join(&hub, &cfg, "h1", Role::Oni).await;
    let mut runner = join(&hub, &cfg, "r1", Role::Runner).await;

    let console = admin(&hub, &cfg);
    console.start_game(cfg.rules.default_duration_ms).await.unwrap();
    wait_for_phase(&mut oni.notes, GamePhase::Active, 2_000).await;
    wait_for(&mut oni.notes, 2_000, |n| {
        matches!(n, Notification::PlayersUpdated(view)
            if view.iter().any(|(_, p)| p.username == "r1" && p.position().is_some()))
    })
    .await;

    oni.session.capture_player(runner.id.clone()).await.unwrap();
    wait_for(&mut runner.notes, 2_000, |n| {
        matches!(n, Notification::Captured { .. })
    })
    .await;

    console.force_end(None).await.unwrap();
    wait_for_phase(&mut runner.notes, GamePhase::Ended, 2_000).await;
    wait_for(&mut oni.notes, 2_000, |n| matches!(n, Notification::GameEnded(_))).await;

    let password_before = runner.store.players_once().await.unwrap()[&runner.id]
        .password
        .clone();

    console.reset_game().await.unwrap();
    // Flags are cleared before the status write, so the reinstatement edge
    // arrives first, then the phase flip.
    wait_for(&mut runner.notes, 2_000, |n| matches!(n, Notification::Reinstated)).await;
    wait_for_phase(&mut runner.notes, GamePhase::Waiting, 2_000).await;

    let players = runner.store.players_once().await.unwrap();
    let record = &players[&runner.id];
    assert!(!record.captured && !record.disqualified);
    assert!(record.captured_by.is_none() && record.captured_at.is_none());
    assert_eq!(record.username, "r1");
    assert_eq!(record.role, Role::Runner, "role survives reset");
    assert_eq!(record.password, password_before, "credentials survive reset");
    assert_eq!(players[&oni.id].role, Role::Oni);

    let me = runner.session.current_user().await.unwrap();
    assert!(!me.captured, "local derived state reconciled with the reset");

    assert_eq!(
        runner.store.game_status_once().await.unwrap().unwrap().status,
        GamePhase::Waiting
    );
}

#[tokio::test]
async fn spectator_keeps_watching_without_sending() {
    let cfg = test_config();
    let hub = StoreHub::new();
    let mut oni = join(&hub, &cfg, "h1", Role::Oni).await;
    let mut runner = join(&hub, &cfg, "r1", Role::Runner).await;
    let r2 = join(&hub, &cfg, "r2", Role::Runner).await;

    let console = admin(&hub, &cfg);
    console.start_game(cfg.rules.default_duration_ms).await.unwrap();
    wait_for_phase(&mut runner.notes, GamePhase::Active, 2_000).await;
    wait_for(&mut oni.notes, 2_000, |n| {
        matches!(n, Notification::PlayersUpdated(view)
            if view.iter().any(|(_, p)| p.username == "r1" && p.position().is_some()))
    })
    .await;

    oni.session.capture_player(runner.id.clone()).await.unwrap();
    wait_for(&mut runner.notes, 2_000, |n| {
        matches!(n, Notification::Captured { .. })
    })
    .await;

    runner.session.set_spectator_mode();

    // A spectator sees both sides of the live game.
    let note = wait_for(&mut runner.notes, 2_000, |n| {
        matches!(n, Notification::PlayersUpdated(_))
    })
    .await;
    match note {
        Notification::PlayersUpdated(view) => {
            let names: Vec<&str> = view.iter().map(|(_, p)| p.username.as_str()).collect();
            assert!(names.contains(&"h1"));
            assert!(names.contains(&"r2"));
        },
        _ => unreachable!(),
    }

    // And never writes positions.
    let frozen_at = runner.store.players_once().await.unwrap()[&runner.id].updated_at;
    runner.send_fix_north(&cfg, 0.0);
    tokio::time::sleep(Duration::from_millis(3 * cfg.intervals.runner_send_ms)).await;
    assert_eq!(
        runner.store.players_once().await.unwrap()[&runner.id].updated_at,
        frozen_at
    );
    drop(r2);
}

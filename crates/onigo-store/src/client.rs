use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{broadcast, watch};
use tracing::debug;

use onigo_core::events::{EventKind, FeedEvent};
use onigo_core::player::{DisqualifyReason, PlayerId, PlayerMap, PlayerRecord, Role};
use onigo_core::status::{GameStatusRecord, Winner};
use onigo_core::time::now_ms;

use crate::auth::{hash_password, verify_password};
use crate::error::StoreError;
use crate::hub::StoreHub;

/// One client's handle on the shared store.
///
/// All operations are asynchronous and fallible. `set_offline(true)` models a
/// network partition: every subsequent operation fails with
/// `StoreError::Unavailable` until the partition heals. Failures are surfaced
/// to the caller and never retried here.
#[derive(Clone)]
pub struct StoreClient {
    hub: StoreHub,
    offline: Arc<AtomicBool>,
}

impl StoreClient {
    pub(crate) fn new(hub: StoreHub) -> Self {
        Self {
            hub,
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Simulate losing (or regaining) connectivity for this client only.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn guard(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        Ok(())
    }

    // =====================
    // Players
    // =====================

    /// Register a new player with a credential digest for later resumption.
    pub async fn register_player(
        &self,
        username: &str,
        role: Role,
        password: &str,
    ) -> Result<(PlayerId, PlayerRecord), StoreError> {
        self.guard()?;
        if self.hub.find_by_username(username).await.is_some() {
            return Err(StoreError::UsernameTaken(username.to_string()));
        }
        let id = PlayerId::generate();
        let mut record = PlayerRecord::new(username, role, now_ms());
        record.password = Some(hash_password(password));
        self.hub.write_player(id.clone(), record.clone()).await;
        debug!(player = %id, username, ?role, "player registered");
        Ok((id, record))
    }

    /// Authenticate by username and password. Returns the matching record on
    /// success, `None` on unknown user or wrong password.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<(PlayerId, PlayerRecord)>, StoreError> {
        self.guard()?;
        let Some((id, record)) = self.hub.find_by_username(username).await else {
            return Ok(None);
        };
        let ok = record
            .password
            .as_deref()
            .is_some_and(|digest| verify_password(password, digest));
        Ok(ok.then_some((id, record)))
    }

    pub async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<(PlayerId, PlayerRecord)>, StoreError> {
        self.guard()?;
        Ok(self.hub.find_by_username(username).await)
    }

    /// Replace a player's whole record.
    pub async fn set_player(
        &self,
        id: &PlayerId,
        record: PlayerRecord,
    ) -> Result<(), StoreError> {
        self.guard()?;
        self.hub.write_player(id.clone(), record).await;
        Ok(())
    }

    /// Merge a position fix into the record. Only `lat`/`lng`/`updated_at`
    /// are touched, so a capture landing concurrently is never erased.
    pub async fn update_position(
        &self,
        id: &PlayerId,
        lat: f64,
        lng: f64,
        at_ms: u64,
    ) -> Result<(), StoreError> {
        self.guard()?;
        self.hub
            .merge_player(id, |p| {
                p.lat = Some(lat);
                p.lng = Some(lng);
                p.updated_at = at_ms;
            })
            .await
    }

    /// Mark a player captured. Unconditional overwrite: a concurrent capture
    /// of the same target resolves to the last writer.
    pub async fn capture(
        &self,
        target: &PlayerId,
        captured_by: &str,
        at_ms: u64,
    ) -> Result<(), StoreError> {
        self.guard()?;
        let captured_by = captured_by.to_string();
        self.hub
            .merge_player(target, |p| {
                p.captured = true;
                p.captured_by = Some(captured_by);
                p.captured_at = Some(at_ms);
            })
            .await?;
        debug!(player = %target, "capture recorded");
        Ok(())
    }

    pub async fn disqualify(
        &self,
        id: &PlayerId,
        reason: DisqualifyReason,
        at_ms: u64,
    ) -> Result<(), StoreError> {
        self.guard()?;
        self.hub
            .merge_player(id, |p| {
                p.disqualified = true;
                p.disqualified_reason = Some(reason);
                p.disqualified_at = Some(at_ms);
            })
            .await?;
        debug!(player = %id, ?reason, "disqualification recorded");
        Ok(())
    }

    /// The onification rewrite: atomically clears capture/disqualification
    /// state and re-enters the player as oni.
    pub async fn onify(&self, id: &PlayerId, at_ms: u64) -> Result<(), StoreError> {
        self.guard()?;
        self.hub
            .merge_player(id, |p| {
                p.role = Role::Oni;
                p.captured = false;
                p.captured_by = None;
                p.captured_at = None;
                p.disqualified = false;
                p.disqualified_reason = None;
                p.disqualified_at = None;
                p.onified = true;
                p.onified_at = Some(at_ms);
                p.updated_at = at_ms;
            })
            .await?;
        debug!(player = %id, "onified");
        Ok(())
    }

    /// Admin reset: clear capture/disqualification flags, preserving
    /// identity, role, password and onification history.
    pub async fn reset_flags(&self, id: &PlayerId) -> Result<(), StoreError> {
        self.guard()?;
        self.hub
            .merge_player(id, |p| {
                p.captured = false;
                p.captured_by = None;
                p.captured_at = None;
                p.disqualified = false;
                p.disqualified_reason = None;
                p.disqualified_at = None;
            })
            .await
    }

    pub async fn remove_player(&self, id: &PlayerId) -> Result<(), StoreError> {
        self.guard()?;
        self.hub.remove_player(id).await;
        Ok(())
    }

    pub async fn clear_players(&self) -> Result<(), StoreError> {
        self.guard()?;
        self.hub.clear_players().await;
        Ok(())
    }

    /// One-shot read of the full player map.
    pub async fn players_once(&self) -> Result<PlayerMap, StoreError> {
        self.guard()?;
        Ok(self.hub.players().await)
    }

    /// Push stream of the full player map on every change.
    pub fn watch_players(&self) -> broadcast::Receiver<PlayerMap> {
        self.hub.subscribe_players()
    }

    // =====================
    // Game status
    // =====================

    pub async fn set_game_status(&self, status: GameStatusRecord) -> Result<(), StoreError> {
        self.guard()?;
        debug!(phase = ?status.status, "game status written");
        self.hub.set_status(status).await;
        Ok(())
    }

    /// Merge the terminal transition into the status record. Redundant
    /// identical writes from racing clients are harmless.
    pub async fn mark_ended(
        &self,
        end_ms: u64,
        winner: Option<Winner>,
    ) -> Result<(), StoreError> {
        self.guard()?;
        self.hub
            .update_status(|s| {
                s.status = onigo_core::status::GamePhase::Ended;
                s.end_time = Some(end_ms);
                if let Some(w) = winner {
                    s.winner = Some(w);
                }
            })
            .await;
        Ok(())
    }

    pub async fn game_status_once(&self) -> Result<Option<GameStatusRecord>, StoreError> {
        self.guard()?;
        Ok(self.hub.status().await)
    }

    pub fn watch_game_status(&self) -> watch::Receiver<Option<GameStatusRecord>> {
        self.hub.subscribe_status()
    }

    // =====================
    // Events
    // =====================

    pub async fn append_event(&self, kind: EventKind, message: &str) -> Result<(), StoreError> {
        self.guard()?;
        let event = FeedEvent {
            kind,
            message: message.to_string(),
            timestamp: now_ms(),
        };
        self.hub.append_event(event).await;
        Ok(())
    }

    pub async fn clear_events(&self) -> Result<(), StoreError> {
        self.guard()?;
        self.hub.clear_events().await;
        Ok(())
    }

    /// Live event stream; only events appended after subscription arrive.
    pub fn watch_events(&self) -> broadcast::Receiver<FeedEvent> {
        self.hub.subscribe_events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_and_authenticate() {
        let hub = StoreHub::new();
        let client = hub.client();

        let (id, record) = client
            .register_player("alice", Role::Runner, "secret99")
            .await
            .unwrap();
        assert_eq!(record.role, Role::Runner);
        // Password is stored as a digest, not plaintext.
        assert_ne!(record.password.as_deref(), Some("secret99"));

        let resumed = client.authenticate("alice", "secret99").await.unwrap();
        assert_eq!(resumed.unwrap().0, id);

        assert!(client.authenticate("alice", "wrong").await.unwrap().is_none());
        assert!(client.authenticate("nobody", "secret99").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_username_rejected() {
        let hub = StoreHub::new();
        let client = hub.client();
        client
            .register_player("alice", Role::Runner, "secret99")
            .await
            .unwrap();
        let err = client
            .register_player("alice", Role::Oni, "other")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UsernameTaken(_)));
    }

    #[tokio::test]
    async fn offline_client_cannot_write_but_store_survives() {
        let hub = StoreHub::new();
        let online = hub.client();
        let offline = hub.client();

        let (id, _) = online
            .register_player("alice", Role::Runner, "secret99")
            .await
            .unwrap();

        offline.set_offline(true);
        let err = offline.capture(&id, "bob", 1).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable));
        assert!(!online.players_once().await.unwrap()[&id].captured);

        // Partition heals; the same operation succeeds.
        offline.set_offline(false);
        offline.capture(&id, "bob", 2).await.unwrap();
        assert!(online.players_once().await.unwrap()[&id].captured);
    }

    #[tokio::test]
    async fn capture_is_last_writer_wins() {
        let hub = StoreHub::new();
        let client = hub.client();
        let (id, _) = client
            .register_player("runner", Role::Runner, "secret99")
            .await
            .unwrap();

        client.capture(&id, "oni_one", 10).await.unwrap();
        client.capture(&id, "oni_two", 11).await.unwrap();

        let players = client.players_once().await.unwrap();
        let record = &players[&id];
        assert!(record.captured);
        assert_eq!(record.captured_by.as_deref(), Some("oni_two"));
        assert_eq!(record.captured_at, Some(11));
    }

    #[tokio::test]
    async fn onify_clears_flags_and_flips_role() {
        let hub = StoreHub::new();
        let client = hub.client();
        let (id, _) = client
            .register_player("runner", Role::Runner, "secret99")
            .await
            .unwrap();
        client.capture(&id, "oni_one", 10).await.unwrap();

        client.onify(&id, 20).await.unwrap();

        let players = client.players_once().await.unwrap();
        let record = &players[&id];
        assert_eq!(record.role, Role::Oni);
        assert!(!record.captured);
        assert!(record.captured_by.is_none());
        assert!(record.onified);
        assert_eq!(record.onified_at, Some(20));
    }

    #[tokio::test]
    async fn reset_flags_preserves_identity_and_role() {
        let hub = StoreHub::new();
        let client = hub.client();
        let (id, _) = client
            .register_player("runner", Role::Runner, "secret99")
            .await
            .unwrap();
        client.capture(&id, "oni_one", 10).await.unwrap();
        client.onify(&id, 20).await.unwrap();
        client
            .disqualify(&id, DisqualifyReason::OutOfArea, 30)
            .await
            .unwrap();

        client.reset_flags(&id).await.unwrap();

        let players = client.players_once().await.unwrap();
        let record = &players[&id];
        assert!(!record.captured && !record.disqualified);
        assert!(record.disqualified_reason.is_none());
        assert_eq!(record.username, "runner");
        assert_eq!(record.role, Role::Oni, "role survives reset");
        assert!(record.onified, "onification history survives reset");
        assert!(record.password.is_some(), "credentials survive reset");
    }

    #[tokio::test]
    async fn position_merge_does_not_erase_capture() {
        let hub = StoreHub::new();
        let client = hub.client();
        let (id, _) = client
            .register_player("runner", Role::Runner, "secret99")
            .await
            .unwrap();
        client.capture(&id, "oni_one", 10).await.unwrap();

        // A stale position write racing the capture must not clear the flag.
        client.update_position(&id, 31.7, 130.7, 11).await.unwrap();

        let players = client.players_once().await.unwrap();
        let record = &players[&id];
        assert!(record.captured);
        assert_eq!(record.lat, Some(31.7));
    }
}

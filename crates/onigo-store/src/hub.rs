use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, watch};

use onigo_core::events::FeedEvent;
use onigo_core::player::{PlayerId, PlayerMap, PlayerRecord};
use onigo_core::status::GameStatusRecord;

use crate::client::StoreClient;
use crate::error::StoreError;

/// Default maximum number of events retained in the shared log.
const DEFAULT_MAX_STORED_EVENTS: usize = 50;

/// Default capacity of the push channels fanning changes out to clients.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// The shared realtime keyed store — the only inter-client channel.
///
/// Holds the `players/` map, the single `game_status` record and the
/// `events/` log, and pushes changes to every subscriber: the **full player
/// map on every change** (consumers diff from scratch), the current status
/// record, and an append-only event stream that late joiners do not replay.
///
/// There is no compare-and-swap anywhere; every write is last-writer-wins
/// per field. Concurrent capture collisions resolve to whichever write lands
/// last, by design.
#[derive(Clone)]
pub struct StoreHub {
    inner: Arc<RwLock<HubInner>>,
    players_tx: broadcast::Sender<PlayerMap>,
    status_tx: watch::Sender<Option<GameStatusRecord>>,
    events_tx: broadcast::Sender<FeedEvent>,
    max_stored_events: usize,
}

struct HubInner {
    players: PlayerMap,
    status: Option<GameStatusRecord>,
    events: BTreeMap<u64, FeedEvent>,
}

impl Default for StoreHub {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_STORED_EVENTS, DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a hub with configurable retention and fan-out capacity.
    pub fn with_capacity(max_stored_events: usize, channel_capacity: usize) -> Self {
        let (players_tx, _) = broadcast::channel(channel_capacity);
        let (events_tx, _) = broadcast::channel(channel_capacity);
        let (status_tx, _) = watch::channel(None);
        Self {
            inner: Arc::new(RwLock::new(HubInner {
                players: PlayerMap::new(),
                status: None,
                events: BTreeMap::new(),
            })),
            players_tx,
            status_tx,
            events_tx,
            max_stored_events,
        }
    }

    /// Open a client session against this hub.
    pub fn client(&self) -> StoreClient {
        StoreClient::new(self.clone())
    }

    // =====================
    // Players
    // =====================

    pub(crate) async fn write_player(&self, id: PlayerId, record: PlayerRecord) {
        let mut inner = self.inner.write().await;
        inner.players.insert(id, record);
        let _ = self.players_tx.send(inner.players.clone());
    }

    /// Merge-write a subset of one player's fields, then push the full map.
    pub(crate) async fn merge_player(
        &self,
        id: &PlayerId,
        apply: impl FnOnce(&mut PlayerRecord),
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let record = inner
            .players
            .get_mut(id)
            .ok_or_else(|| StoreError::UnknownPlayer(id.clone()))?;
        apply(record);
        let _ = self.players_tx.send(inner.players.clone());
        Ok(())
    }

    pub(crate) async fn remove_player(&self, id: &PlayerId) {
        let mut inner = self.inner.write().await;
        if inner.players.remove(id).is_some() {
            let _ = self.players_tx.send(inner.players.clone());
        }
    }

    pub(crate) async fn clear_players(&self) {
        let mut inner = self.inner.write().await;
        inner.players.clear();
        let _ = self.players_tx.send(inner.players.clone());
    }

    pub(crate) async fn players(&self) -> PlayerMap {
        self.inner.read().await.players.clone()
    }

    pub(crate) async fn find_by_username(
        &self,
        username: &str,
    ) -> Option<(PlayerId, PlayerRecord)> {
        let inner = self.inner.read().await;
        inner
            .players
            .iter()
            .find(|(_, p)| p.username == username)
            .map(|(id, p)| (id.clone(), p.clone()))
    }

    pub fn subscribe_players(&self) -> broadcast::Receiver<PlayerMap> {
        self.players_tx.subscribe()
    }

    // =====================
    // Game status
    // =====================

    pub(crate) async fn set_status(&self, status: GameStatusRecord) {
        let mut inner = self.inner.write().await;
        inner.status = Some(status.clone());
        self.status_tx.send_replace(Some(status));
    }

    /// Merge into the current status record (creating a fresh waiting record
    /// if none exists), then push.
    pub(crate) async fn update_status(&self, apply: impl FnOnce(&mut GameStatusRecord)) {
        let mut inner = self.inner.write().await;
        let record = inner.status.get_or_insert_with(GameStatusRecord::waiting);
        apply(record);
        self.status_tx.send_replace(Some(record.clone()));
    }

    pub(crate) async fn status(&self) -> Option<GameStatusRecord> {
        self.inner.read().await.status.clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<Option<GameStatusRecord>> {
        self.status_tx.subscribe()
    }

    // =====================
    // Events
    // =====================

    /// Append to the shared log, keyed by creation timestamp, and push to
    /// live subscribers. Retention is bounded; the oldest entries fall off.
    pub(crate) async fn append_event(&self, event: FeedEvent) {
        let mut inner = self.inner.write().await;
        let mut key = event.timestamp;
        while inner.events.contains_key(&key) {
            key += 1;
        }
        inner.events.insert(key, event.clone());
        while inner.events.len() > self.max_stored_events {
            inner.events.pop_first();
        }
        let _ = self.events_tx.send(event);
    }

    pub(crate) async fn clear_events(&self) {
        self.inner.write().await.events.clear();
    }

    pub(crate) async fn events(&self) -> Vec<FeedEvent> {
        self.inner.read().await.events.values().cloned().collect()
    }

    /// Live event stream. Only events appended after subscription are
    /// delivered; late joiners do not replay history through this channel.
    pub fn subscribe_events(&self) -> broadcast::Receiver<FeedEvent> {
        self.events_tx.subscribe()
    }
}

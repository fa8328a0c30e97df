use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use onigo_core::player::{PlayerId, Role};
use onigo_core::status::{GameStatusRecord, Winner};
use onigo_core::time::now_ms;
use onigo_store::StoreClient;

use crate::config::ClientConfig;
use crate::error::GameError;

/// Aggregate player counts for the admin panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerStats {
    pub total: usize,
    pub oni: usize,
    pub runners: usize,
}

/// Admin operations against the shared state: start/end the game, remove
/// players, reset everything back to the lobby. Gated by the configured
/// password; every operation is a plain store write with the same
/// last-writer-wins semantics as the rest of the system.
pub struct AdminConsole {
    cfg: Arc<ClientConfig>,
    store: StoreClient,
    authenticated: bool,
}

impl AdminConsole {
    pub fn new(cfg: Arc<ClientConfig>, store: StoreClient) -> Self {
        Self {
            cfg,
            store,
            authenticated: false,
        }
    }

    pub fn login(&mut self, password: &str) -> Result<(), GameError> {
        if password != self.cfg.admin.password {
            return Err(GameError::AdminAuthFailed);
        }
        self.authenticated = true;
        info!("admin authenticated");
        Ok(())
    }

    pub fn logout(&mut self) {
        self.authenticated = false;
    }

    fn require_auth(&self) -> Result<(), GameError> {
        if !self.authenticated {
            return Err(GameError::AdminAuthRequired);
        }
        Ok(())
    }

    /// Write the shared countdown record, then flip to active once the
    /// countdown elapses. Clients anchor their displays to the shared
    /// `countdownStart`, so when this admin flips the status everyone's
    /// countdown reads zero at the same moment.
    pub async fn start_game(&self, duration_ms: u64) -> Result<(), GameError> {
        self.require_auth()?;
        let countdown_start = now_ms();
        self.store
            .set_game_status(GameStatusRecord::countdown(countdown_start, duration_ms))
            .await?;
        info!(duration_ms, "countdown started");

        let store = self.store.clone();
        let countdown_ms = self.cfg.rules.countdown_ms;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(countdown_ms)).await;
            let start = now_ms();
            match store
                .set_game_status(GameStatusRecord::active(start, duration_ms))
                .await
            {
                Ok(()) => info!(start, "game started"),
                Err(e) => error!(error = %e, "game start write failed"),
            }
        });
        Ok(())
    }

    /// Force the terminal transition, optionally crediting a winner.
    pub async fn force_end(&self, winner: Option<Winner>) -> Result<(), GameError> {
        self.require_auth()?;
        self.store.mark_ended(now_ms(), winner).await?;
        info!(?winner, "game force-ended");
        Ok(())
    }

    pub async fn remove_player(&self, id: &PlayerId) -> Result<(), GameError> {
        self.require_auth()?;
        self.store.remove_player(id).await?;
        info!(player = %id, "player removed");
        Ok(())
    }

    pub async fn clear_players(&self) -> Result<(), GameError> {
        self.require_auth()?;
        self.store.clear_players().await?;
        info!("all players cleared");
        Ok(())
    }

    /// Back to the lobby: clear every player's capture/disqualification
    /// flags (identities, roles and passwords survive), reset the status
    /// record, and drop the event log.
    pub async fn reset_game(&self) -> Result<(), GameError> {
        self.require_auth()?;
        let players = self.store.players_once().await?;
        for id in players.keys() {
            self.store.reset_flags(id).await?;
        }
        self.store.set_game_status(GameStatusRecord::waiting()).await?;
        self.store.clear_events().await?;
        info!(players = players.len(), "game reset to waiting");
        Ok(())
    }

    pub async fn stats(&self) -> Result<PlayerStats, GameError> {
        self.require_auth()?;
        let players = self.store.players_once().await?;
        let oni = players.values().filter(|p| p.role == Role::Oni).count();
        Ok(PlayerStats {
            total: players.len(),
            oni,
            runners: players.len() - oni,
        })
    }
}

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a player, used as the key under `players/` in the
/// shared store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Generate a fresh id for a newly registered player.
    pub fn generate() -> Self {
        Self(format!("user_{}", Uuid::new_v4().simple()))
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Player role. Captured and disqualified runners keep `Runner` until the
/// onification event rewrites their record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Oni,
    Runner,
}

/// Why a player was disqualified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisqualifyReason {
    OutOfArea,
}

/// A player's record under `players/{id}` in the shared store.
///
/// The serialized field names are the wire format shared by every client and
/// must not drift; `updated_at` is the one snake_case holdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub username: String,
    pub role: Role,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(rename = "updated_at", default)]
    pub updated_at: u64,
    #[serde(default)]
    pub captured: bool,
    #[serde(default)]
    pub captured_by: Option<String>,
    #[serde(default)]
    pub captured_at: Option<u64>,
    #[serde(default)]
    pub disqualified: bool,
    #[serde(default)]
    pub disqualified_reason: Option<DisqualifyReason>,
    #[serde(default)]
    pub disqualified_at: Option<u64>,
    #[serde(default)]
    pub onified: bool,
    #[serde(default)]
    pub onified_at: Option<u64>,
    /// Credential digest for session resumption; never part of any view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl PlayerRecord {
    pub fn new(username: impl Into<String>, role: Role, created_at_ms: u64) -> Self {
        Self {
            username: username.into(),
            role,
            lat: None,
            lng: None,
            updated_at: created_at_ms,
            captured: false,
            captured_by: None,
            captured_at: None,
            disqualified: false,
            disqualified_reason: None,
            disqualified_at: None,
            onified: false,
            onified_at: None,
            password: None,
        }
    }

    /// Captured or disqualified: out of the live game either way.
    pub fn is_neutralized(&self) -> bool {
        self.captured || self.disqualified
    }

    /// A runner still evading: the win-condition denominator.
    pub fn is_active_runner(&self) -> bool {
        self.role == Role::Runner && !self.is_neutralized()
    }

    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }
}

/// The full contents of `players/` — what every snapshot push delivers.
pub type PlayerMap = HashMap<PlayerId, PlayerRecord>;

use serde::{Deserialize, Serialize};

/// Game lifecycle phase. Progression is monotonic
/// waiting → countdown → active → ended, with an admin reset back to waiting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GamePhase {
    #[default]
    Waiting,
    Countdown,
    Active,
    Ended,
}

/// Winning side, present only when the oni neutralize every original runner
/// before time runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Oni,
}

/// The single shared record under `game_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatusRecord {
    pub status: GamePhase,
    #[serde(default)]
    pub countdown_start: Option<u64>,
    #[serde(default)]
    pub start_time: Option<u64>,
    #[serde(default)]
    pub end_time: Option<u64>,
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub winner: Option<Winner>,
}

impl GameStatusRecord {
    pub fn waiting() -> Self {
        Self {
            status: GamePhase::Waiting,
            countdown_start: None,
            start_time: None,
            end_time: None,
            duration: None,
            winner: None,
        }
    }

    /// The pre-game countdown record. All clients anchor their displayed
    /// countdown to `countdown_start`, not to when they observed it.
    pub fn countdown(countdown_start_ms: u64, duration_ms: u64) -> Self {
        Self {
            status: GamePhase::Countdown,
            countdown_start: Some(countdown_start_ms),
            start_time: None,
            end_time: None,
            duration: Some(duration_ms),
            winner: None,
        }
    }

    /// The active-game record; `endTime = startTime + duration` always.
    pub fn active(start_ms: u64, duration_ms: u64) -> Self {
        Self {
            status: GamePhase::Active,
            countdown_start: None,
            start_time: Some(start_ms),
            end_time: Some(start_ms + duration_ms),
            duration: Some(duration_ms),
            winner: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == GamePhase::Active
    }
}

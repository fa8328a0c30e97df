use serde::{Deserialize, Serialize};

/// Narrative weight of a feed event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    #[default]
    Normal,
    Important,
}

/// One entry in the game narrative feed, stored under `events/{id}` where the
/// id is the creation timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEvent {
    #[serde(rename = "type", default)]
    pub kind: EventKind,
    pub message: String,
    pub timestamp: u64,
}

impl FeedEvent {
    pub fn normal(message: impl Into<String>, timestamp_ms: u64) -> Self {
        Self {
            kind: EventKind::Normal,
            message: message.into(),
            timestamp: timestamp_ms,
        }
    }

    pub fn important(message: impl Into<String>, timestamp_ms: u64) -> Self {
        Self {
            kind: EventKind::Important,
            message: message.into(),
            timestamp: timestamp_ms,
        }
    }
}

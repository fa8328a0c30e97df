use onigo_core::player::PlayerId;

/// Failures of shared-store operations. The store never retries on its own;
/// retry policy belongs to callers.
#[derive(Debug)]
pub enum StoreError {
    /// The client is partitioned from the store (offline).
    Unavailable,
    /// The store backend has shut down.
    Closed,
    /// Registration rejected: the username is already taken.
    UsernameTaken(String),
    /// A merge write targeted a player that does not exist.
    UnknownPlayer(PlayerId),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "store unavailable"),
            Self::Closed => write!(f, "store closed"),
            Self::UsernameTaken(name) => write!(f, "username already taken: {name}"),
            Self::UnknownPlayer(id) => write!(f, "unknown player: {id}"),
        }
    }
}

impl std::error::Error for StoreError {}

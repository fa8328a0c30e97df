use onigo_core::player::PlayerId;
use onigo_store::StoreError;

/// Failures of game operations. Local validation fails fast with no store
/// write; store faults are wrapped and surfaced to the caller, which owns
/// user-facing messaging. Nothing here is fatal to the session.
#[derive(Debug)]
pub enum GameError {
    /// Capture attempted by a player who is not an oni.
    NotOni,
    /// Operation attempted while captured or disqualified.
    Neutralized,
    /// The targeted player is not in the current snapshot.
    UnknownPlayer(PlayerId),
    /// No position fix is available (own or target's).
    NoPosition,
    /// Target is beyond the capture radius.
    OutOfRange { distance_m: f64 },
    /// Registration rejected: username must be non-empty.
    EmptyUsername,
    /// Registration rejected: password below the minimum length.
    PasswordTooShort,
    /// Login rejected: unknown username or wrong password.
    InvalidCredentials,
    /// Admin operation attempted without a successful password check.
    AdminAuthRequired,
    /// Wrong admin password.
    AdminAuthFailed,
    /// The underlying store operation failed.
    Store(StoreError),
    /// The session actor has shut down.
    SessionClosed,
}

impl std::fmt::Display for GameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotOni => write!(f, "only an oni can capture"),
            Self::Neutralized => write!(f, "player is captured or disqualified"),
            Self::UnknownPlayer(id) => write!(f, "unknown player: {id}"),
            Self::NoPosition => write!(f, "no position fix available"),
            Self::OutOfRange { distance_m } => {
                write!(f, "target out of capture range ({distance_m:.1}m)")
            },
            Self::EmptyUsername => write!(f, "username must not be empty"),
            Self::PasswordTooShort => write!(f, "password must be at least 4 characters"),
            Self::InvalidCredentials => write!(f, "unknown username or wrong password"),
            Self::AdminAuthRequired => write!(f, "admin authentication required"),
            Self::AdminAuthFailed => write!(f, "wrong admin password"),
            Self::Store(e) => write!(f, "store error: {e}"),
            Self::SessionClosed => write!(f, "game session closed"),
        }
    }
}

impl std::error::Error for GameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for GameError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

use tokio::sync::mpsc;

use onigo_core::geo;

use crate::config::{AreaConfig, GeolocationConfig};

/// Options handed to the platform position source when acquisition starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeolocationOptions {
    pub high_accuracy: bool,
    pub max_cache_age_ms: u64,
    pub fix_timeout_ms: u64,
}

impl From<&GeolocationConfig> for GeolocationOptions {
    fn from(cfg: &GeolocationConfig) -> Self {
        Self {
            high_accuracy: cfg.high_accuracy,
            max_cache_age_ms: cfg.max_cache_age_ms,
            fix_timeout_ms: cfg.fix_timeout_ms,
        }
    }
}

/// One position fix from the device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub lat: f64,
    pub lng: f64,
}

/// Position acquisition failures. Tracking is not restarted automatically;
/// the session surfaces these and the player decides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionError {
    Unavailable,
    PermissionDenied,
    Timeout,
    Platform(String),
}

impl std::fmt::Display for AcquisitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "position source unavailable"),
            Self::PermissionDenied => write!(f, "position permission denied"),
            Self::Timeout => write!(f, "position fix timed out"),
            Self::Platform(msg) => write!(f, "position source error: {msg}"),
        }
    }
}

impl std::error::Error for AcquisitionError {}

/// The stream a platform adapter produces: continuous fixes, interleaved
/// with acquisition errors. Each delivery is a suspension point.
pub type FixStream = mpsc::UnboundedReceiver<Result<Fix, AcquisitionError>>;

/// Handle for feeding a session's fix stream (platform adapters and tests).
pub type FixSender = mpsc::UnboundedSender<Result<Fix, AcquisitionError>>;

/// Create a fix channel pair for wiring a position source to a session.
pub fn fix_channel() -> (FixSender, FixStream) {
    mpsc::unbounded_channel()
}

/// Tracks the device position against the playable circle, including the
/// mutable current radius the shrink event drives.
#[derive(Debug, Clone)]
pub struct PositionTracker {
    center_lat: f64,
    center_lng: f64,
    base_radius_m: f64,
    min_radius_m: f64,
    current_radius_m: f64,
    position: Option<Fix>,
    tracking: bool,
}

impl PositionTracker {
    pub fn new(area: &AreaConfig, min_radius_m: f64) -> Self {
        Self {
            center_lat: area.center_lat,
            center_lng: area.center_lng,
            base_radius_m: area.radius_m,
            min_radius_m,
            current_radius_m: area.radius_m,
            position: None,
            tracking: false,
        }
    }

    /// Begin accepting fixes. Idempotent.
    pub fn start_tracking(&mut self) {
        self.tracking = true;
    }

    /// Stop accepting fixes. Idempotent; late fixes from the platform are
    /// dropped while stopped.
    pub fn stop_tracking(&mut self) {
        self.tracking = false;
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    pub fn record_fix(&mut self, fix: Fix) {
        self.position = Some(fix);
    }

    pub fn position(&self) -> Option<Fix> {
        self.position
    }

    /// Whether the last fix lies within the current (possibly shrunk) radius.
    /// `None` until a first fix arrives.
    pub fn is_inside_game_area(&self) -> Option<bool> {
        self.position.map(|p| {
            geo::is_inside_area(
                p.lat,
                p.lng,
                self.center_lat,
                self.center_lng,
                self.current_radius_m,
            )
        })
    }

    pub fn distance_from_center(&self) -> Option<f64> {
        self.position
            .map(|p| geo::distance_m(p.lat, p.lng, self.center_lat, self.center_lng))
    }

    pub fn distance_to(&self, lat: f64, lng: f64) -> Option<f64> {
        self.position.map(|p| geo::distance_m(p.lat, p.lng, lat, lng))
    }

    pub fn current_radius_m(&self) -> f64 {
        self.current_radius_m
    }

    /// Set the shrunk radius, clamped to the configured minimum.
    pub fn set_current_radius(&mut self, radius_m: f64) {
        self.current_radius_m = radius_m.max(self.min_radius_m);
    }

    /// Restore the full playable circle (game reset).
    pub fn reset_radius(&mut self) {
        self.current_radius_m = self.base_radius_m;
    }
}

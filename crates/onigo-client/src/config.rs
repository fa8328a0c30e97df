use serde::Deserialize;

/// Top-level client configuration, loaded from `onigo.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub area: AreaConfig,
    pub intervals: IntervalsConfig,
    pub rules: RulesConfig,
    pub shrink: ShrinkConfig,
    pub onification: OnificationConfig,
    pub geolocation: GeolocationConfig,
    pub admin: AdminConfig,
}

/// The playable circle.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AreaConfig {
    pub center_lat: f64,
    pub center_lng: f64,
    pub radius_m: f64,
}

impl Default for AreaConfig {
    fn default() -> Self {
        Self {
            center_lat: 31.731222,
            center_lng: 130.728778,
            radius_m: 2_000.0,
        }
    }
}

/// Position send cadence per role, plus the local bookkeeping tick.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IntervalsConfig {
    pub oni_send_ms: u64,
    pub runner_send_ms: u64,
    /// Local countdown/monitor tick. One second in production; tests shorten
    /// it to keep wall-clock time down.
    pub clock_tick_ms: u64,
}

impl Default for IntervalsConfig {
    fn default() -> Self {
        Self {
            oni_send_ms: 10_000,
            runner_send_ms: 30_000,
            clock_tick_ms: 1_000,
        }
    }
}

/// Core game parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub default_duration_ms: u64,
    pub countdown_ms: u64,
    pub capture_radius_m: f64,
    pub outside_limit_ms: u64,
    pub max_events: usize,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            default_duration_ms: 30 * 60 * 1_000,
            countdown_ms: 10_000,
            capture_radius_m: 20.0,
            outside_limit_ms: 30_000,
            max_events: 50,
        }
    }
}

/// Safe-zone shrink event. The end of the shrink is derived: it stops when
/// the radius reaches `min_radius_m`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShrinkConfig {
    pub trigger_remaining_ms: u64,
    pub rate_m_per_s: f64,
    pub min_radius_m: f64,
}

impl Default for ShrinkConfig {
    fn default() -> Self {
        Self {
            trigger_remaining_ms: 60 * 60 * 1_000,
            rate_m_per_s: 1.0,
            min_radius_m: 500.0,
        }
    }
}

/// Onification event trigger.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OnificationConfig {
    pub trigger_remaining_ms: u64,
}

impl Default for OnificationConfig {
    fn default() -> Self {
        Self {
            trigger_remaining_ms: 30 * 60 * 1_000,
        }
    }
}

/// Options forwarded to the platform position source.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeolocationConfig {
    pub high_accuracy: bool,
    pub max_cache_age_ms: u64,
    pub fix_timeout_ms: u64,
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            max_cache_age_ms: 0,
            fix_timeout_ms: 5_000,
        }
    }
}

/// Admin console gate.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub password: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            password: "kotaro1123".to_string(),
        }
    }
}

impl ClientConfig {
    /// Validate configuration. Returns the first problem found; warnings are
    /// logged and do not fail validation.
    pub fn validate(&self) -> Result<(), String> {
        if self.area.radius_m <= 0.0 {
            return Err("area.radius_m must be > 0".to_string());
        }
        if self.shrink.min_radius_m <= 0.0 || self.shrink.min_radius_m > self.area.radius_m {
            return Err("shrink.min_radius_m must be in (0, area.radius_m]".to_string());
        }
        if self.shrink.rate_m_per_s <= 0.0 {
            return Err("shrink.rate_m_per_s must be > 0".to_string());
        }
        if self.intervals.oni_send_ms == 0
            || self.intervals.runner_send_ms == 0
            || self.intervals.clock_tick_ms == 0
        {
            return Err("intervals must be > 0".to_string());
        }
        if self.rules.countdown_ms == 0 {
            return Err("rules.countdown_ms must be > 0".to_string());
        }
        if self.rules.capture_radius_m <= 0.0 {
            return Err("rules.capture_radius_m must be > 0".to_string());
        }
        if self.rules.outside_limit_ms == 0 {
            return Err("rules.outside_limit_ms must be > 0".to_string());
        }
        if self.rules.max_events == 0 {
            return Err("rules.max_events must be > 0".to_string());
        }
        if self.admin.password == AdminConfig::default().password {
            tracing::warn!("default admin password in use — change it before a real game");
        }
        Ok(())
    }

    /// Load config from `onigo.toml` if it exists, then apply env overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("onigo.toml") {
            Ok(content) => match toml::from_str::<ClientConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from onigo.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse onigo.toml: {e}, using defaults");
                    ClientConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No onigo.toml found, using defaults");
                ClientConfig::default()
            },
        };

        // Environment variable overrides
        if let Ok(password) = std::env::var("ONIGO_ADMIN_PASSWORD")
            && !password.is_empty()
        {
            config.admin.password = password;
        }
        if let Ok(val) = std::env::var("ONIGO_AREA_RADIUS_M")
            && let Ok(n) = val.parse::<f64>()
        {
            config.area.radius_m = n;
        }
        if let Ok(val) = std::env::var("ONIGO_ONI_SEND_MS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.intervals.oni_send_ms = n;
        }
        if let Ok(val) = std::env::var("ONIGO_RUNNER_SEND_MS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.intervals.runner_send_ms = n;
        }
        if let Ok(val) = std::env::var("ONIGO_DEFAULT_DURATION_MS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.rules.default_duration_ms = n;
        }

        config
    }
}

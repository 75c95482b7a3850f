//! Live loop configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{LiveError, LiveResult};

/// How overlapping detection responses are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseOrdering {
    /// Whichever response arrives last is displayed.
    #[default]
    LastWriteWins,
    /// A response is dropped if a later-issued request already landed.
    LatestIssued,
}

impl ResponseOrdering {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseOrdering::LastWriteWins => "last_write_wins",
            ResponseOrdering::LatestIssued => "latest_issued",
        }
    }
}

impl fmt::Display for ResponseOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last_write_wins" | "lww" => Ok(ResponseOrdering::LastWriteWins),
            "latest_issued" | "sequenced" => Ok(ResponseOrdering::LatestIssued),
            other => Err(format!("unknown response ordering: {}", other)),
        }
    }
}

/// Playback parameters handed to the speech backend.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceConfig {
    /// Speaking rate (1.0 = normal)
    pub rate: f32,
    /// Pitch (1.0 = normal)
    pub pitch: f32,
    /// Volume in [0, 1]
    pub volume: f32,
    /// BCP 47 locale, e.g. `en-US`
    pub locale: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            rate: 0.9, // slightly slower for clarity
            pitch: 1.0,
            volume: 1.0,
            locale: "en-US".to_string(),
        }
    }
}

impl VoiceConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            rate: env_parse("FALCON_VOICE_RATE").unwrap_or(defaults.rate),
            pitch: env_parse("FALCON_VOICE_PITCH").unwrap_or(defaults.pitch),
            volume: env_parse::<f32>("FALCON_VOICE_VOLUME")
                .unwrap_or(defaults.volume)
                .clamp(0.0, 1.0),
            locale: std::env::var("FALCON_VOICE_LOCALE").unwrap_or(defaults.locale),
        }
    }
}

/// Live detection loop configuration.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// Capture tick period
    pub capture_interval: Duration,
    /// FPS measurement tick period
    pub measure_interval: Duration,
    /// Debounce window for voice announcements
    pub settle_window: Duration,
    /// Whether voice announcements start enabled
    pub voice_enabled: bool,
    /// Policy for overlapping responses
    pub ordering: ResponseOrdering,
    /// Refresh detector stats after each applied batch
    pub refresh_stats: bool,
    /// Entries kept in the in-memory detection history
    pub history_limit: usize,
    /// JPEG quality for encoded frames
    pub jpeg_quality: u8,
    pub voice: VoiceConfig,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            capture_interval: Duration::from_millis(200), // 5 FPS
            measure_interval: Duration::from_millis(1000),
            settle_window: Duration::from_millis(2000),
            voice_enabled: false,
            ordering: ResponseOrdering::LastWriteWins,
            refresh_stats: true,
            history_limit: 10,
            jpeg_quality: 92,
            voice: VoiceConfig::default(),
        }
    }
}

impl LiveConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            capture_interval: Duration::from_millis(
                env_parse("FALCON_CAPTURE_INTERVAL_MS").unwrap_or(200),
            ),
            measure_interval: Duration::from_millis(
                env_parse("FALCON_MEASURE_INTERVAL_MS").unwrap_or(1000),
            ),
            settle_window: Duration::from_millis(env_parse("FALCON_SETTLE_MS").unwrap_or(2000)),
            voice_enabled: std::env::var("FALCON_VOICE")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(false),
            ordering: env_parse("FALCON_RESPONSE_ORDERING").unwrap_or_default(),
            refresh_stats: env_parse("FALCON_REFRESH_STATS").unwrap_or(true),
            history_limit: env_parse("FALCON_HISTORY_LIMIT").unwrap_or(10),
            jpeg_quality: env_parse::<u8>("FALCON_JPEG_QUALITY")
                .unwrap_or(92)
                .clamp(1, 100),
            voice: VoiceConfig::from_env(),
        }
    }

    /// Reject settings the timers cannot run with.
    pub fn validate(&self) -> LiveResult<()> {
        if self.capture_interval.is_zero() {
            return Err(LiveError::config("capture interval must be greater than zero"));
        }
        if self.measure_interval.is_zero() {
            return Err(LiveError::config("measure interval must be greater than zero"));
        }
        Ok(())
    }

    pub fn with_capture_interval(mut self, interval: Duration) -> Self {
        self.capture_interval = interval;
        self
    }

    pub fn with_measure_interval(mut self, interval: Duration) -> Self {
        self.measure_interval = interval;
        self
    }

    pub fn with_voice(mut self, enabled: bool) -> Self {
        self.voice_enabled = enabled;
        self
    }

    pub fn with_ordering(mut self, ordering: ResponseOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn with_refresh_stats(mut self, refresh: bool) -> Self {
        self.refresh_stats = refresh;
        self
    }
}

pub(crate) fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

//! Player settings and validation.
//!
//! Pure domain types with no infrastructure dependencies. All fields are
//! optional so partial updates and environment overrides compose; the
//! `effective_*` accessors fall back to the defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default bound on a batch synthesis call (and on opening a stream).
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Default bound on the wait for each streamed chunk.
pub const DEFAULT_CHUNK_TIMEOUT_SECS: u64 = 30;

/// Default number of out-of-order chunks held while waiting for a gap.
pub const DEFAULT_MAX_PENDING_CHUNKS: usize = 64;

/// Default bound on joining a cancelled session task.
pub const DEFAULT_STOP_JOIN_TIMEOUT_MS: u64 = 2_000;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "STREAMVOICE_";

/// Player settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionSettings {
    /// Upper bound on batch synthesis / stream setup, in seconds.
    pub request_timeout_secs: Option<u64>,

    /// Upper bound on the gap between streamed chunks, in seconds.
    pub chunk_timeout_secs: Option<u64>,

    /// Out-of-order chunks buffered before the stream is declared broken (1-4096).
    pub max_pending_chunks: Option<usize>,

    /// How long `stop` waits for a cancelled session task, in milliseconds.
    pub stop_join_timeout_ms: Option<u64>,

    /// Output volume (0.0-1.0).
    pub volume: Option<f32>,
}

impl SessionSettings {
    /// Create settings with sensible defaults.
    #[must_use]
    pub const fn with_defaults() -> Self {
        Self {
            request_timeout_secs: Some(DEFAULT_REQUEST_TIMEOUT_SECS),
            chunk_timeout_secs: Some(DEFAULT_CHUNK_TIMEOUT_SECS),
            max_pending_chunks: Some(DEFAULT_MAX_PENDING_CHUNKS),
            stop_join_timeout_ms: Some(DEFAULT_STOP_JOIN_TIMEOUT_MS),
            volume: Some(1.0),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_secs(self.chunk_timeout_secs.unwrap_or(DEFAULT_CHUNK_TIMEOUT_SECS))
    }

    pub fn effective_max_pending_chunks(&self) -> usize {
        self.max_pending_chunks
            .unwrap_or(DEFAULT_MAX_PENDING_CHUNKS)
    }

    pub fn stop_join_timeout(&self) -> Duration {
        Duration::from_millis(
            self.stop_join_timeout_ms
                .unwrap_or(DEFAULT_STOP_JOIN_TIMEOUT_MS),
        )
    }

    pub fn effective_volume(&self) -> f32 {
        self.volume.unwrap_or(1.0).clamp(0.0, 1.0)
    }

    /// Merge another settings into this one, only updating fields that are Some.
    pub fn merge(&mut self, other: &SessionSettingsUpdate) {
        if let Some(value) = other.request_timeout_secs {
            self.request_timeout_secs = value;
        }
        if let Some(value) = other.chunk_timeout_secs {
            self.chunk_timeout_secs = value;
        }
        if let Some(value) = other.max_pending_chunks {
            self.max_pending_chunks = value;
        }
        if let Some(value) = other.stop_join_timeout_ms {
            self.stop_join_timeout_ms = value;
        }
        if let Some(value) = other.volume {
            self.volume = value;
        }
    }

    /// Apply `STREAMVOICE_*` overrides read through `lookup`.
    ///
    /// `lookup` is usually `|key| std::env::var(key).ok()`. Values that do
    /// not parse, or that would fail [`validate_settings`], are logged and
    /// skipped; the previous value is kept.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        fn parse<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            name: &str,
        ) -> Option<T> {
            let key = format!("{ENV_PREFIX}{name}");
            let raw = lookup(&key)?;
            match raw.trim().parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(key = %key, value = %raw, "Ignoring unparsable setting override");
                    None
                }
            }
        }

        if let Some(v) = parse(&lookup, "REQUEST_TIMEOUT_SECS") {
            self.try_override("REQUEST_TIMEOUT_SECS", |s| s.request_timeout_secs = Some(v));
        }
        if let Some(v) = parse(&lookup, "CHUNK_TIMEOUT_SECS") {
            self.try_override("CHUNK_TIMEOUT_SECS", |s| s.chunk_timeout_secs = Some(v));
        }
        if let Some(v) = parse(&lookup, "MAX_PENDING_CHUNKS") {
            self.try_override("MAX_PENDING_CHUNKS", |s| s.max_pending_chunks = Some(v));
        }
        if let Some(v) = parse(&lookup, "STOP_JOIN_TIMEOUT_MS") {
            self.try_override("STOP_JOIN_TIMEOUT_MS", |s| s.stop_join_timeout_ms = Some(v));
        }
        if let Some(v) = parse(&lookup, "VOLUME") {
            self.try_override("VOLUME", |s| s.volume = Some(v));
        }
    }

    /// Apply one override, rolling it back if the result does not validate.
    fn try_override(&mut self, name: &str, update: impl FnOnce(&mut Self)) {
        let previous = self.clone();
        update(self);
        if let Err(e) = validate_settings(self) {
            tracing::warn!(
                key = %format!("{ENV_PREFIX}{name}"),
                error = %e,
                "Ignoring invalid setting override"
            );
            *self = previous;
        }
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Self {
        let mut settings = Self::with_defaults();
        settings.apply_env_overrides(|key| std::env::var(key).ok());
        settings
    }
}

/// Partial settings update.
///
/// Each field is `Option<Option<T>>`:
/// - `None` = don't change this field
/// - `Some(None)` = reset field to its default
/// - `Some(Some(value))` = set field to value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSettingsUpdate {
    pub request_timeout_secs: Option<Option<u64>>,
    pub chunk_timeout_secs: Option<Option<u64>>,
    pub max_pending_chunks: Option<Option<usize>>,
    pub stop_join_timeout_ms: Option<Option<u64>>,
    pub volume: Option<Option<f32>>,
}

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("Timeout '{0}' must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("Max pending chunks must be between 1 and 4096, got {0}")]
    InvalidPendingChunks(usize),

    #[error("Volume must be between 0.0 and 1.0, got {0}")]
    InvalidVolume(f32),
}

/// Validate settings values.
pub fn validate_settings(settings: &SessionSettings) -> Result<(), SettingsError> {
    if settings.request_timeout_secs == Some(0) {
        return Err(SettingsError::ZeroTimeout("request_timeout_secs"));
    }
    if settings.chunk_timeout_secs == Some(0) {
        return Err(SettingsError::ZeroTimeout("chunk_timeout_secs"));
    }
    if settings.stop_join_timeout_ms == Some(0) {
        return Err(SettingsError::ZeroTimeout("stop_join_timeout_ms"));
    }

    if let Some(pending) = settings.max_pending_chunks {
        if !(1..=4096).contains(&pending) {
            return Err(SettingsError::InvalidPendingChunks(pending));
        }
    }

    if let Some(volume) = settings.volume {
        if !(0.0..=1.0).contains(&volume) {
            return Err(SettingsError::InvalidVolume(volume));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = SessionSettings::with_defaults();
        assert_eq!(settings.request_timeout(), Duration::from_secs(120));
        assert_eq!(settings.chunk_timeout(), Duration::from_secs(30));
        assert_eq!(settings.effective_max_pending_chunks(), 64);
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_empty_settings_fall_back_to_defaults() {
        let settings = SessionSettings::default();
        assert_eq!(settings.request_timeout(), Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS));
        assert_eq!(settings.stop_join_timeout(), Duration::from_millis(DEFAULT_STOP_JOIN_TIMEOUT_MS));
        assert!((settings.effective_volume() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_validate_zero_timeout() {
        let settings = SessionSettings {
            chunk_timeout_secs: Some(0),
            ..Default::default()
        };
        assert_eq!(
            validate_settings(&settings),
            Err(SettingsError::ZeroTimeout("chunk_timeout_secs"))
        );
    }

    #[test]
    fn test_validate_pending_chunks() {
        let settings = SessionSettings {
            max_pending_chunks: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            validate_settings(&settings),
            Err(SettingsError::InvalidPendingChunks(0))
        ));
    }

    #[test]
    fn test_validate_volume() {
        let settings = SessionSettings {
            volume: Some(1.5),
            ..Default::default()
        };
        assert!(matches!(
            validate_settings(&settings),
            Err(SettingsError::InvalidVolume(_))
        ));
    }

    #[test]
    fn test_merge_settings() {
        let mut settings = SessionSettings::with_defaults();
        let update = SessionSettingsUpdate {
            chunk_timeout_secs: Some(Some(5)),
            request_timeout_secs: Some(None),
            ..Default::default()
        };
        settings.merge(&update);

        assert_eq!(settings.chunk_timeout_secs, Some(5));
        assert_eq!(settings.request_timeout_secs, None);
        assert_eq!(settings.max_pending_chunks, Some(DEFAULT_MAX_PENDING_CHUNKS));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("STREAMVOICE_CHUNK_TIMEOUT_SECS", "7"),
            ("STREAMVOICE_MAX_PENDING_CHUNKS", "not-a-number"),
            ("STREAMVOICE_VOLUME", " 0.5 "),
        ]);

        let mut settings = SessionSettings::with_defaults();
        settings.apply_env_overrides(|key| env.get(key).map(ToString::to_string));

        assert_eq!(settings.chunk_timeout_secs, Some(7));
        assert_eq!(settings.max_pending_chunks, Some(DEFAULT_MAX_PENDING_CHUNKS));
        assert_eq!(settings.volume, Some(0.5));
    }

    #[test]
    fn test_env_overrides_reject_invalid_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("STREAMVOICE_CHUNK_TIMEOUT_SECS", "0"),
            ("STREAMVOICE_REQUEST_TIMEOUT_SECS", "0"),
            ("STREAMVOICE_MAX_PENDING_CHUNKS", "100000"),
            ("STREAMVOICE_VOLUME", "3.0"),
            ("STREAMVOICE_STOP_JOIN_TIMEOUT_MS", "500"),
        ]);

        let mut settings = SessionSettings::with_defaults();
        settings.apply_env_overrides(|key| env.get(key).map(ToString::to_string));

        assert_eq!(settings.chunk_timeout_secs, Some(DEFAULT_CHUNK_TIMEOUT_SECS));
        assert_eq!(settings.request_timeout_secs, Some(DEFAULT_REQUEST_TIMEOUT_SECS));
        assert_eq!(settings.max_pending_chunks, Some(DEFAULT_MAX_PENDING_CHUNKS));
        assert_eq!(settings.volume, Some(1.0));
        assert_eq!(settings.stop_join_timeout_ms, Some(500));
        assert!(validate_settings(&settings).is_ok());
    }
}

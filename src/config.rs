//! Configuration module
//!
//! Host applications load an `AppConfig` from a TOML file (default location
//! under the user config dir) and hand the relevant sections to the
//! scheduling and sync components.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::scheduling::CalendarConfig;
use crate::shared::backoff::BackoffConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config read error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub calendar: CalendarSettings,
    pub sync: SyncSettings,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter, e.g. "info" or "expertcal=debug"
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

/// Day-grid geometry
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CalendarSettings {
    pub window_start_minute: i32,
    pub window_end_minute: i32,
    pub slot_minutes: i32,
    pub row_height_px: f32,
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self {
            window_start_minute: 300,
            window_end_minute: 1440,
            slot_minutes: 10,
            row_height_px: 20.0,
        }
    }
}

impl From<&CalendarSettings> for CalendarConfig {
    fn from(s: &CalendarSettings) -> Self {
        let slot_minutes = if s.slot_minutes < 1 {
            warn!(
                configured = s.slot_minutes,
                "calendar.slot_minutes must be at least 1, clamping"
            );
            1
        } else {
            s.slot_minutes
        };
        Self {
            window_start_minute: s.window_start_minute,
            window_end_minute: s.window_end_minute,
            slot_minutes,
            row_height_px: s.row_height_px,
        }
    }
}

/// Change-feed reconnect tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 1_000,
            max_backoff_ms: 60_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl From<&SyncSettings> for BackoffConfig {
    fn from(s: &SyncSettings) -> Self {
        Self {
            initial_delay: Duration::from_millis(s.initial_backoff_ms),
            max_delay: Duration::from_millis(s.max_backoff_ms),
            multiplier: s.backoff_multiplier,
        }
    }
}

/// Default config file location, `<config dir>/expertcal/config.toml`
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("expertcal")
        .join("config.toml")
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_grid_contract() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.calendar.window_start_minute, 300);
        assert_eq!(cfg.calendar.window_end_minute, 1440);
        assert_eq!(cfg.calendar.slot_minutes, 10);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [calendar]
            window_start_minute = 480

            [sync]
            initial_backoff_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(cfg.calendar.window_start_minute, 480);
        assert_eq!(cfg.calendar.slot_minutes, 10);
        assert_eq!(cfg.sync.initial_backoff_ms, 250);
        assert_eq!(cfg.sync.backoff_multiplier, 2.0);
    }

    #[test]
    fn zero_slot_minutes_is_clamped() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [calendar]
            slot_minutes = 0
            "#,
        )
        .unwrap();
        let calendar = CalendarConfig::from(&cfg.calendar);
        assert_eq!(calendar.slot_minutes, 1);
        assert!(calendar.pixels_per_minute().is_finite());
    }

    #[test]
    fn converts_to_component_configs() {
        let cfg = AppConfig::default();
        let calendar = CalendarConfig::from(&cfg.calendar);
        assert_eq!(calendar.pixels_per_minute(), 2.0);

        let backoff = BackoffConfig::from(&cfg.sync);
        assert_eq!(backoff.initial_delay, Duration::from_secs(1));
        assert_eq!(backoff.max_delay, Duration::from_secs(60));
    }
}

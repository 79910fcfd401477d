use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunables for one page lifecycle. Every field has a default, so a partial
/// JSON document (or none at all) is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrubConfig {
    /// Upper bound on how long the overlay may block the page.
    #[serde(default = "default_failsafe_timeout_ms")]
    pub failsafe_timeout_ms: u64,
    /// Delay between metadata readiness and the resource swap fetch.
    #[serde(default = "default_swap_deferral_ms")]
    pub swap_deferral_ms: u64,
    /// Scroll distance units per second of media.
    #[serde(default = "default_scroll_ratio")]
    pub scroll_ratio: f64,
    /// Offset added to the captured position when seeking the swapped resource.
    #[serde(default = "default_seek_epsilon")]
    pub seek_epsilon: f64,
    #[serde(default = "default_fade_duration_ms")]
    pub fade_duration_ms: u64,
    /// Lag of the intro fade behind the scroll position (seconds).
    #[serde(default = "default_intro_scrub_lag_secs")]
    pub intro_scrub_lag_secs: f64,
    #[serde(default = "default_intro_min_scale")]
    pub intro_min_scale: f64,
    #[serde(default = "default_loader_text")]
    pub loader_text: String,
    #[serde(default = "default_true")]
    pub swap_enabled: bool,
}

fn default_failsafe_timeout_ms() -> u64 { 10_000 }
fn default_swap_deferral_ms() -> u64 { 1_000 }
fn default_scroll_ratio() -> f64 { 300.0 }
fn default_seek_epsilon() -> f64 { 0.01 }
fn default_fade_duration_ms() -> u64 { 350 }
fn default_intro_scrub_lag_secs() -> f64 { 0.5 }
fn default_intro_min_scale() -> f64 { 0.5 }
fn default_loader_text() -> String { "ksabar".to_string() }
fn default_true() -> bool { true }

impl Default for ScrubConfig {
    fn default() -> Self {
        Self {
            failsafe_timeout_ms: default_failsafe_timeout_ms(),
            swap_deferral_ms: default_swap_deferral_ms(),
            scroll_ratio: default_scroll_ratio(),
            seek_epsilon: default_seek_epsilon(),
            fade_duration_ms: default_fade_duration_ms(),
            intro_scrub_lag_secs: default_intro_scrub_lag_secs(),
            intro_min_scale: default_intro_min_scale(),
            loader_text: default_loader_text(),
            swap_enabled: true,
        }
    }
}

impl ScrubConfig {
    pub fn failsafe_timeout(&self) -> Duration {
        Duration::from_millis(self.failsafe_timeout_ms)
    }

    pub fn swap_deferral(&self) -> Duration {
        Duration::from_millis(self.swap_deferral_ms)
    }

    pub fn fade_duration(&self) -> Duration {
        Duration::from_millis(self.fade_duration_ms)
    }

    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a config file. A missing file yields defaults; an unreadable or
    /// invalid one is an error so the caller can decide whether to fall back.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let config = Self::from_json(&contents)?;
                log::info!("Loaded scrub config from {}", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No scrub config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Like [`ScrubConfig::load`], but any error falls back to defaults.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load scrub config: {e}");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.scroll_ratio.is_finite() && self.scroll_ratio > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "scroll_ratio must be positive, got {}",
                self.scroll_ratio
            )));
        }
        if !(self.seek_epsilon.is_finite() && self.seek_epsilon >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "seek_epsilon must be non-negative, got {}",
                self.seek_epsilon
            )));
        }
        if self.failsafe_timeout_ms == 0 {
            return Err(ConfigError::Invalid("failsafe_timeout_ms must be non-zero".into()));
        }
        if !(0.0..=1.0).contains(&self.intro_min_scale) {
            return Err(ConfigError::Invalid(format!(
                "intro_min_scale must be within 0..=1, got {}",
                self.intro_min_scale
            )));
        }
        if !(self.intro_scrub_lag_secs.is_finite() && self.intro_scrub_lag_secs >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "intro_scrub_lag_secs must be non-negative, got {}",
                self.intro_scrub_lag_secs
            )));
        }
        Ok(())
    }
}

//! Configuration management

use crate::{DriverError, Result};
use ini::Ini;
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Wait used when no valid timeout is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Convert a timeout in seconds, rejecting zero, negative, NaN and
/// values too large for a `Duration`
pub fn timeout_from_secs(secs: f32) -> Option<Duration> {
    Duration::try_from_secs_f32(secs)
        .ok()
        .filter(|d| !d.is_zero())
}

/// Persistent driver settings
///
/// Stored in `~/.saydriver.cfg`:
///
/// ```ini
/// [speech]
/// backend = espeak
/// rate = 200
/// volume = 1.0
/// voice = en-us
/// timeout = 30
/// ```
pub struct Config {
    /// INI configuration storage
    ini: Ini,

    /// Config file path
    path: PathBuf,
}

impl Config {
    /// Load configuration from the default path or create it
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path())
    }

    /// Load configuration from `path`, writing defaults if it doesn't exist
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        debug!("Loading config from {:?}", path);

        let ini = if path.exists() {
            Ini::load_from_file(&path)
                .map_err(|e| DriverError::IniParse(format!("Failed to load config: {}", e)))?
        } else {
            info!("Config file not found, creating default");
            let default = Self::default_config();
            default
                .write_to_file(&path)
                .map_err(|e| DriverError::IniParse(format!("Failed to write config: {}", e)))?;
            default
        };

        Ok(Self { ini, path })
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        debug!("Saving config to {:?}", self.path);
        self.ini
            .write_to_file(&self.path)
            .map_err(|e| DriverError::Config(format!("Failed to save config: {}", e)))
    }

    /// Default config file path (~/.saydriver.cfg)
    fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".saydriver.cfg")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn default_config() -> Ini {
        let mut ini = Ini::new();
        // backend stays unset so the platform default applies
        ini.with_section(Some("speech")).set("timeout", "30");
        ini
    }

    pub fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.ini
            .get_from(Some(section), key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    pub fn get_float(&self, section: &str, key: &str) -> Option<f32> {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
    }

    /// Set a value in config
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.ini.with_section(Some(section)).set(key, value);
    }

    /// Backend name; `None` lets the platform default decide
    pub fn backend(&self) -> Option<String> {
        self.get_string("speech", "backend")
    }

    /// Speech rate in words per minute
    pub fn rate(&self) -> Option<f32> {
        self.get_float("speech", "rate").filter(|r| *r > 0.0)
    }

    /// Speech volume (0.0-1.0)
    pub fn volume(&self) -> Option<f32> {
        self.get_float("speech", "volume")
            .filter(|v| (0.0..=1.0).contains(v))
    }

    /// Voice identifier
    pub fn voice(&self) -> Option<String> {
        self.get_string("speech", "voice")
    }

    /// How long to wait for an utterance to finish
    pub fn timeout(&self) -> Duration {
        self.get_float("speech", "timeout")
            .and_then(timeout_from_secs)
            .unwrap_or(DEFAULT_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let ini = Config::default_config();
        let config = Config {
            ini,
            path: PathBuf::from("unused"),
        };

        assert_eq!(config.backend(), None);
        assert_eq!(config.rate(), None);
        assert_eq!(config.voice(), None);
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_numbers_ignored() {
        let mut config = Config {
            ini: Ini::new(),
            path: PathBuf::from("unused"),
        };
        config.set("speech", "rate", "fast");
        config.set("speech", "volume", "4");
        config.set("speech", "timeout", "-1");

        assert_eq!(config.rate(), None);
        assert_eq!(config.volume(), None);
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_unrepresentable_timeout_falls_back() {
        let mut config = Config {
            ini: Ini::new(),
            path: PathBuf::from("unused"),
        };

        for value in ["inf", "NaN", "1e30", "0"] {
            config.set("speech", "timeout", value);
            assert_eq!(config.timeout(), DEFAULT_TIMEOUT, "timeout = {}", value);
        }

        config.set("speech", "timeout", "2.5");
        assert_eq!(config.timeout(), Duration::from_millis(2500));
    }

    #[test]
    fn test_timeout_from_secs() {
        assert_eq!(timeout_from_secs(5.0), Some(Duration::from_secs(5)));
        assert_eq!(timeout_from_secs(-1.0), None);
        assert_eq!(timeout_from_secs(f32::INFINITY), None);
    }
}

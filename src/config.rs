// Engine configuration
//
// Stored as RON. A missing file means defaults; a file that exists must parse
// and pass validation.

use crate::collaborator::RetryPolicy;
use crate::error::{EngineError, EngineResult};
use crate::sequencer::timeline::Tempo;
use crate::sequencer::transport::FrameDriver;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "lyrical";
const CONFIG_FILE: &str = "config.ron";

/// Session and engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Owner of saved sequences
    pub user_id: String,
    /// Initial tempo in BPM
    pub tempo_bpm: f64,
    /// Length of a note entered from the keyboard, in beats
    pub note_duration_beats: f64,
    /// Velocity written to MIDI files, as a fraction of 127
    pub velocity: f64,
    /// Cursor units per second of audio
    pub cursor_scale: f64,
    /// Frame interval of the ticker driver; 0 selects the manual driver
    pub frame_interval_ms: u64,
    /// Variations requested per generation
    pub variation_count: u32,
    /// Beats the service generates after the seed
    pub generation_length: u32,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub notification_capacity: usize,
    /// Where the local store keeps saved sequences; None uses the data dir
    pub storage_root: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            user_id: "local".to_string(),
            tempo_bpm: 120.0,
            note_duration_beats: 1.0,
            velocity: 0.8,
            cursor_scale: 50.0,
            frame_interval_ms: 16,
            variation_count: 2,
            generation_length: 30,
            retry_attempts: 3,
            retry_base_delay_ms: 250,
            retry_max_delay_ms: 2000,
            notification_capacity: 64,
            storage_root: None,
        }
    }
}

impl EngineConfig {
    /// Default location: `<config_dir>/lyrical/config.ron`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load and validate a config file
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_ron(&data)
    }

    /// Load a config file, falling back to defaults if it does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Parse RON text and validate it
    pub fn from_ron(data: &str) -> EngineResult<Self> {
        let config: Self = ron::from_str(data)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty RON
    pub fn to_ron(&self) -> EngineResult<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Write the config, creating parent directories
    pub fn save<P: AsRef<Path>>(&self, path: P) -> EngineResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        std::fs::write(path, self.to_ron()?).map_err(|e| {
            EngineError::Config(format!("Failed to write {}: {}", path.display(), e))
        })
    }

    /// Check every value is usable
    pub fn validate(&self) -> EngineResult<()> {
        if self.user_id.trim().is_empty() {
            return Err(EngineError::Config("user_id must not be empty".to_string()));
        }
        Tempo::new(self.tempo_bpm).map_err(|e| EngineError::Config(e.to_string()))?;
        if !(self.note_duration_beats.is_finite() && self.note_duration_beats > 0.0) {
            return Err(EngineError::Config(format!(
                "note_duration_beats must be positive, got {}",
                self.note_duration_beats
            )));
        }
        if !(0.0..=1.0).contains(&self.velocity) || self.velocity == 0.0 {
            return Err(EngineError::Config(format!(
                "velocity must be in (0, 1], got {}",
                self.velocity
            )));
        }
        if !(self.cursor_scale.is_finite() && self.cursor_scale > 0.0) {
            return Err(EngineError::Config(format!(
                "cursor_scale must be positive, got {}",
                self.cursor_scale
            )));
        }
        if self.variation_count == 0 {
            return Err(EngineError::Config(
                "variation_count must be at least 1".to_string(),
            ));
        }
        if self.retry_attempts == 0 {
            return Err(EngineError::Config(
                "retry_attempts must be at least 1".to_string(),
            ));
        }
        if self.notification_capacity == 0 {
            return Err(EngineError::Config(
                "notification_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn tempo(&self) -> EngineResult<Tempo> {
        Tempo::new(self.tempo_bpm)
    }

    pub fn frame_driver(&self) -> FrameDriver {
        if self.frame_interval_ms == 0 {
            FrameDriver::Manual
        } else {
            FrameDriver::Ticker(Duration::from_millis(self.frame_interval_ms))
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
            Duration::from_millis(self.retry_max_delay_ms),
        )
    }

    /// Configured storage root, or `<data_local_dir>/lyrical/sequences`
    pub fn storage_root(&self) -> EngineResult<PathBuf> {
        match &self.storage_root {
            Some(root) => Ok(root.clone()),
            None => dirs::data_local_dir()
                .map(|dir| dir.join(APP_DIR).join("sequences"))
                .ok_or_else(|| {
                    EngineError::Config("No local data directory on this system".to_string())
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tempo().unwrap(), Tempo::default());
        assert_eq!(
            config.frame_driver(),
            FrameDriver::Ticker(Duration::from_millis(16))
        );
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config = EngineConfig::from_ron("(user_id: \"alice\", tempo_bpm: 90.0)").unwrap();
        assert_eq!(config.user_id, "alice");
        assert_eq!(config.tempo_bpm, 90.0);
        assert_eq!(config.variation_count, 2);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            EngineConfig::from_ron("(tempo_bpm: 5.0)"),
            Err(EngineError::Config(_))
        ));
        assert!(EngineConfig::from_ron("(variation_count: 0)").is_err());
        assert!(EngineConfig::from_ron("(velocity: 1.5)").is_err());
        assert!(EngineConfig::from_ron("(this is not ron").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.ron");

        let config = EngineConfig {
            user_id: "bob".to_string(),
            frame_interval_ms: 0,
            ..EngineConfig::default()
        };
        config.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.frame_driver(), FrameDriver::Manual);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = EngineConfig::load_or_default(dir.path().join("absent.ron")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }
}

//! Editor configuration
//!
//! Configuration is stored as YAML in the user's config directory.
//! Default location: ~/.config/musicbox/config.yaml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::file::DEFAULT_BPM;
use crate::pagination::DEFAULT_TOLERANCE_DIVISOR;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub playback: PlaybackConfig,
    pub editor: EditingConfig,
    pub paths: PathsConfig,
}

/// Playback settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Tempo for new compositions
    pub default_bpm: u32,
    /// MIDI output port name substring (case-insensitive); audio only when unset
    pub midi_port: Option<String>,
    /// Play through the built-in synth
    pub audio_enabled: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_bpm: DEFAULT_BPM,
            midi_port: None,
            audio_enabled: true,
        }
    }
}

/// Strip editing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditingConfig {
    /// Click tolerance is the staff width divided by this
    pub hit_tolerance_divisor: f32,
    /// Length of the scroll transition
    pub scroll_animation_ms: u64,
    /// Highlight intensity kept per redraw (0..1)
    pub highlight_decay: f32,
}

impl Default for EditingConfig {
    fn default() -> Self {
        Self {
            hit_tolerance_divisor: DEFAULT_TOLERANCE_DIVISOR,
            scroll_animation_ms: 200,
            highlight_decay: 0.9,
        }
    }
}

impl EditingConfig {
    pub fn scroll_animation(&self) -> Duration {
        Duration::from_millis(self.scroll_animation_ms)
    }
}

/// File locations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory searched for export templates before the built-in ones
    pub asset_dir: Option<PathBuf>,
    /// Composition opened on startup
    pub last_composition: Option<PathBuf>,
}

/// Get the default config file path
///
/// Returns: ~/.config/musicbox/config.yaml
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("musicbox")
        .join("config.yaml")
}

/// Load configuration from a YAML file
///
/// Missing or unreadable files fall back to defaults with a warning.
pub fn load_config(path: &Path) -> EditorConfig {
    log::info!("load_config: Loading from {:?}", path);

    if !path.exists() {
        log::info!("load_config: Config file doesn't exist, using defaults");
        return EditorConfig::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<EditorConfig>(&contents) {
            Ok(config) => {
                log::info!(
                    "load_config: Loaded config - Default BPM: {}, MIDI port: {:?}",
                    config.playback.default_bpm,
                    config.playback.midi_port
                );
                config
            }
            Err(e) => {
                log::warn!("load_config: Failed to parse config: {}, using defaults", e);
                EditorConfig::default()
            }
        },
        Err(e) => {
            log::warn!(
                "load_config: Failed to read config file: {}, using defaults",
                e
            );
            EditorConfig::default()
        }
    }
}

/// Save configuration to a YAML file, creating parent directories
pub fn save_config(config: &EditorConfig, path: &Path) -> Result<()> {
    log::info!("save_config: Saving to {:?}", path);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    Ok(())
}

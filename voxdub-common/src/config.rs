//! Configuration loading and timing constants
//!
//! Configuration resolution priority order:
//! 1. Explicit path argument (highest priority)
//! 2. `VOXDUB_CONFIG` environment variable
//! 3. Platform config dir (`~/.config/voxdub/config.toml` or equivalent)
//! 4. Compiled defaults (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// How early a clip may start before its slot opens, in seconds.
///
/// Video clock observations arrive a few times per second, so a clip that is
/// due "now" may only be noticed slightly late. Starting up to this much
/// early masks that scheduling jitter without audibly desynchronizing the
/// dub from the picture.
pub const LEAD_TOLERANCE_SEC: f64 = 0.3;

/// Smallest slot window a clip will ever be handed, in seconds.
///
/// Remaining slot time shrinks as the playhead advances; flooring it here
/// keeps the rate computation away from zero/negative windows, and below
/// this window rate-fitting is pointless (the clip overruns regardless).
pub const MIN_SLOT_SEC: f64 = 0.25;

/// Hard cap on the playback-rate multiplier used to fit a clip into its
/// slot. Speech sped up beyond roughly double rate stops being
/// intelligible, which defeats the dub entirely.
pub const MAX_PLAYBACK_RATE: f64 = 2.0;

/// Default lookahead bounds for a synthesis batch.
pub const DEFAULT_LOOKAHEAD_SEGMENTS: usize = 8;
pub const DEFAULT_LOOKAHEAD_SEC: f64 = 30.0;

/// Default buffer-health low-water mark, in seconds of slot time.
pub const DEFAULT_LOW_WATER_SEC: f64 = 15.0;

/// Synthesis server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the subtitle/synthesis server
    pub base_url: String,
    /// HTTP request timeout in seconds
    pub request_timeout_sec: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            request_timeout_sec: 60,
        }
    }
}

/// Session defaults (overridable per start_dubbing request)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// TTS voice identifier
    pub voice: String,
    /// Target language for translation and synthesis
    pub target_language: String,
    /// Source language hint for translation (None = auto-detect)
    pub translate_source: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            voice: "vi-VN-HoaiMyNeural".to_string(),
            target_language: "vi".to_string(),
            translate_source: None,
        }
    }
}

/// Timing parameters for the synchronization engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// See [`LEAD_TOLERANCE_SEC`]
    pub lead_tolerance_sec: f64,
    /// See [`MIN_SLOT_SEC`]
    pub min_slot_sec: f64,
    /// See [`MAX_PLAYBACK_RATE`]
    pub max_playback_rate: f64,
    /// Batch lookahead bound by segment count
    pub lookahead_segments: usize,
    /// Batch lookahead bound by cumulative slot duration (seconds)
    pub lookahead_sec: f64,
    /// Replenish when buffered slot time ahead of the playhead drops below
    /// this (seconds)
    pub low_water_sec: f64,
    /// Background replenishment check interval (milliseconds)
    pub replenish_interval_ms: u64,
    /// Forward window inspected when rebuilding the queue after a seek
    /// (segment count)
    pub seek_window_segments: usize,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            lead_tolerance_sec: LEAD_TOLERANCE_SEC,
            min_slot_sec: MIN_SLOT_SEC,
            max_playback_rate: MAX_PLAYBACK_RATE,
            lookahead_segments: DEFAULT_LOOKAHEAD_SEGMENTS,
            lookahead_sec: DEFAULT_LOOKAHEAD_SEC,
            low_water_sec: DEFAULT_LOW_WATER_SEC,
            replenish_interval_ms: 2000,
            seek_window_segments: 8,
        }
    }
}

/// Volume defaults for a new session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    /// Dub speech channel gain (0.0-1.0)
    pub dub_volume: f32,
    /// Attenuated source-video gain while dubbing (0.0-1.0)
    pub original_volume: f32,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            dub_volume: 1.0,
            original_volume: 0.3,
        }
    }
}

/// Top-level VoxDub configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub timing: TimingConfig,
    pub volumes: VolumeConfig,
}

impl Config {
    /// Load configuration following the priority order documented at the
    /// top of this module.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        // Priority 1: explicit path (must exist when given)
        if let Some(path) = explicit_path {
            info!("Loading config from {}", path.display());
            return Self::from_file(path);
        }

        // Priority 2: environment variable
        if let Ok(path) = std::env::var("VOXDUB_CONFIG") {
            info!("Loading config from VOXDUB_CONFIG ({})", path);
            return Self::from_file(Path::new(&path));
        }

        // Priority 3: platform config dir
        if let Some(path) = default_config_path() {
            if path.exists() {
                info!("Loading config from {}", path.display());
                return Self::from_file(&path);
            }
        }

        // Priority 4: compiled defaults
        debug!("No config file found; using compiled defaults");
        Ok(Self::default())
    }

    /// Parse configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("cannot parse {}: {}", path.display(), e)))
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.timing.max_playback_rate < 1.0 {
            return Err(Error::InvalidInput(
                "timing.max_playback_rate must be >= 1.0".to_string(),
            ));
        }
        if self.timing.min_slot_sec <= 0.0 {
            return Err(Error::InvalidInput(
                "timing.min_slot_sec must be positive".to_string(),
            ));
        }
        if self.timing.lookahead_segments == 0 {
            return Err(Error::InvalidInput(
                "timing.lookahead_segments must be >= 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.volumes.dub_volume)
            || !(0.0..=1.0).contains(&self.volumes.original_volume)
        {
            return Err(Error::InvalidInput(
                "volumes must be within 0.0-1.0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default configuration file path for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("voxdub").join("config.toml"))
}

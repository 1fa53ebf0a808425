//! Application configuration
//!
//! Loaded from a TOML file when present, otherwise built from the reference
//! sizing in [`crate::constants`].

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::constants;
use crate::error::{Error, Result};

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

/// Audio path configuration
///
/// Every field carries its reference-sizing default so a TOML file only
/// needs to name the values it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate of the media channel (fixed by the peer contract)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Samples per frame
    #[serde(default = "default_frame_samples")]
    pub frame_samples: usize,

    /// Playback ring buffer capacity in bytes
    #[serde(default = "default_ring_capacity")]
    pub ring_capacity: usize,

    /// Minimum buffered bytes before a device write (defaults to one frame)
    #[serde(default = "default_playback_threshold")]
    pub playback_threshold: usize,

    /// Post-decode gain applied to linear samples before playback.
    ///
    /// Not part of the wire format. The reference hardware shipped with ad
    /// hoc trims of 0.3 and 1.5 in different revisions; pick the value that
    /// matches the target output level. 1.0 leaves the companding law's
    /// output untouched.
    #[serde(default = "default_decode_gain")]
    pub decode_gain: f32,

    /// Maximum wait on a single device read or write, in milliseconds
    #[serde(default = "default_device_max_wait_ms")]
    pub device_max_wait_ms: u64,

    /// Input device id ("default" for the system default)
    #[serde(default = "default_device_id")]
    pub input_device: String,

    /// Output device id ("default" for the system default)
    #[serde(default = "default_device_id")]
    pub output_device: String,
}

fn default_sample_rate() -> u32 {
    constants::SAMPLE_RATE
}

fn default_frame_samples() -> usize {
    constants::FRAME_SAMPLES
}

fn default_ring_capacity() -> usize {
    constants::RING_CAPACITY
}

fn default_playback_threshold() -> usize {
    constants::PLAYBACK_THRESHOLD
}

fn default_decode_gain() -> f32 {
    1.0
}

fn default_device_max_wait_ms() -> u64 {
    constants::DEVICE_MAX_WAIT.as_millis() as u64
}

fn default_device_id() -> String {
    "default".to_string()
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            frame_samples: default_frame_samples(),
            ring_capacity: default_ring_capacity(),
            playback_threshold: default_playback_threshold(),
            decode_gain: default_decode_gain(),
            device_max_wait_ms: default_device_max_wait_ms(),
            input_device: default_device_id(),
            output_device: default_device_id(),
        }
    }
}

impl AudioConfig {
    /// Bytes of linear PCM in one frame
    pub fn frame_bytes(&self) -> usize {
        self.frame_samples * constants::BYTES_PER_SAMPLE
    }

    /// Maximum wait on device I/O
    pub fn device_max_wait(&self) -> Duration {
        Duration::from_millis(self.device_max_wait_ms)
    }
}

/// Commanded capture session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Total capture duration in seconds
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u32,
}

fn default_duration_secs() -> u32 {
    constants::CAPTURE_SECONDS
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            duration_secs: default_duration_secs(),
        }
    }
}

impl CaptureConfig {
    /// Number of read/convert/send iterations for a full session
    ///
    /// Reference sizing: 5 s at 8 kHz with 320-sample frames = 125.
    pub fn iterations(&self, sample_rate: u32, frame_samples: usize) -> usize {
        (sample_rate as usize * self.duration_secs as usize) / frame_samples
    }
}

/// Network session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Local bind address for the media socket
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Session pump cadence in milliseconds
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

fn default_bind_address() -> String {
    "0.0.0.0:0".to_string()
}

fn default_tick_ms() -> u64 {
    constants::SESSION_TICK.as_millis() as u64
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            tick_ms: default_tick_ms(),
        }
    }
}

impl NetworkConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject sizings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(Error::Config("sample_rate must be non-zero".to_string()));
        }
        if self.audio.frame_samples == 0 {
            return Err(Error::Config("frame_samples must be non-zero".to_string()));
        }
        if self.audio.ring_capacity == 0 {
            return Err(Error::Config("ring_capacity must be non-zero".to_string()));
        }
        if self.audio.frame_bytes() > self.audio.ring_capacity {
            return Err(Error::Config(format!(
                "one frame ({} bytes) does not fit the {}-byte ring",
                self.audio.frame_bytes(),
                self.audio.ring_capacity
            )));
        }
        if self.network.tick_ms == 0 {
            return Err(Error::Config("tick_ms must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Load from a file if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

//! Forwarder configuration
//!
//! Loaded from a TOML file. Every field has a default, so an empty or
//! missing file yields [`ForwarderConfig::default`].

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::error::{Error, Result};

/// Forwarder configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ForwarderConfig {
    /// Wait between audio subsystem init and device open, in milliseconds.
    ///
    /// The device re-enumerates on the USB bus after switching to
    /// accessory audio mode; opening devices before that settles would
    /// pick up a stale device list.
    pub usb_settle_ms: u64,

    /// Timeout for reading the device serial over adb, in milliseconds
    pub serial_timeout_ms: u64,

    /// Sample buffer size of both audio devices, in frames
    pub buffer_frames: u32,

    /// Capacity of the output playback queue, in callback-sized chunks
    pub output_queue_chunks: usize,

    /// Path to the adb executable
    pub adb_path: PathBuf,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            usb_settle_ms: DEFAULT_USB_SETTLE_MS,
            serial_timeout_ms: DEFAULT_SERIAL_TIMEOUT_MS,
            buffer_frames: DEFAULT_BUFFER_FRAMES,
            output_queue_chunks: DEFAULT_OUTPUT_QUEUE_CHUNKS,
            adb_path: PathBuf::from("adb"),
        }
    }
}

impl ForwarderConfig {
    pub fn usb_settle_delay(&self) -> Duration {
        Duration::from_millis(self.usb_settle_ms)
    }

    pub fn serial_timeout(&self) -> Duration {
        Duration::from_millis(self.serial_timeout_ms)
    }

    /// Parse a configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&text)
    }

    /// Load `config.toml` from the platform config directory, or the
    /// defaults if there is none
    pub fn load_or_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => {
                tracing::debug!("Loading configuration from {}", path.display());
                Self::load(path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Location of the default configuration file
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "usbaudio")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    fn validate(&self) -> Result<()> {
        if self.buffer_frames == 0 {
            return Err(Error::Config("buffer_frames must be non-zero".to_string()));
        }
        if self.output_queue_chunks == 0 {
            return Err(Error::Config(
                "output_queue_chunks must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

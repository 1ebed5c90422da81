//! # USB Audio Forward
//!
//! Plays the audio of a USB-connected Android device on the local machine.
//!
//! The device is switched into Android Open Accessory (AOA v2) audio mode,
//! after which it shows up as a USB audio input on the host. Captured
//! samples are forwarded to the default output device in real time.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────┐  enable/disable audio   ┌──────────────────────────┐
//! │   Android device     │ ◄────────────────────── │ accessory::AoaProtocol   │
//! │ (accessory audio)    │                          └──────────────────────────┘
//! └──────────┬───────────┘           ▲
//!            │ USB audio             │ driven by
//!            ▼                       │
//! ┌──────────────────────┐  ┌────────┴─────────────────┐  ┌──────────────────────┐
//! │  Input device        │  │ forward::AudioForwarder  │─►│ transport (adb)      │
//! │  (audio thread)      │  │  stage-by-stage start,   │  │ serial lookup        │
//! └──────────┬───────────┘  │  reverse rollback, stop  │  └──────────────────────┘
//!            │ callback     └──────────────────────────┘
//!            ▼
//! ┌──────────────────────┐   enqueue    ┌──────────────────────┐
//! │ forward::StreamBridge│ ───────────► │  Output device       │
//! │ first data → unpause │              │  (paused until then) │
//! └──────────────────────┘              └──────────────────────┘
//! ```

pub mod accessory;
pub mod audio;
pub mod config;
pub mod error;
pub mod forward;
pub mod mock;
pub mod transport;

pub use audio::{AudioSpec, AudioSubsystem, CpalSubsystem, DeviceDescriptor, DeviceId};
pub use config::ForwarderConfig;
pub use error::{AudioError, Error, ForwardError, ProtocolError, Result, TransportError};
pub use forward::{AudioForwarder, AudioPlayer, PlayGate, Stage, StreamBridge};

/// Application-wide constants
pub mod constants {
    /// Sample rate of AOA audio
    pub const ACCESSORY_SAMPLE_RATE: u32 = 44100;

    /// AOA audio is always stereo
    pub const ACCESSORY_CHANNELS: u16 = 2;

    /// Default device buffer size in frames
    pub const DEFAULT_BUFFER_FRAMES: u32 = 2048;

    /// Default wait for the device to re-enumerate after the mode switch
    pub const DEFAULT_USB_SETTLE_MS: u64 = 2000;

    /// Default timeout of the serial lookup
    pub const DEFAULT_SERIAL_TIMEOUT_MS: u64 = 5000;

    /// Default playback queue capacity, in input buffers
    pub const DEFAULT_OUTPUT_QUEUE_CHUNKS: usize = 64;
}

//! Error types for the audio forwarder

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio forwarding error: {0}")]
    Forward(#[from] ForwardError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of the forwarding lifecycle.
///
/// A failed [`AudioForwarder::start`](crate::forward::AudioForwarder::start)
/// has already rolled back every stage it completed when one of these is
/// returned.
#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("Resource initialization failed: {0}")]
    ResourceInitFailed(String),

    #[error("No input audio source found")]
    DeviceNotFound,

    #[error("Cannot open audio device: {0}")]
    DeviceOpenFailed(#[source] AudioError),

    #[error("Accessory protocol failed: {0}")]
    RemoteProtocolFailed(#[source] ProtocolError),

    #[error("Cannot read serial from the device: {0}")]
    SerialResolutionFailed(String),

    #[error("Audio forwarding is already running")]
    AlreadyRunning,
}

/// Audio subsystem errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Audio subsystem not initialized")]
    NotInitialized,

    #[error("Audio host unavailable: {0}")]
    HostUnavailable(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to open stream: {0}")]
    StreamError(String),

    #[error("Playback queue full")]
    QueueFull,

    #[error("Invalid sample data: {0}")]
    InvalidData(String),

    #[error("Unknown device handle: {0}")]
    UnknownDevice(u32),
}

/// Accessory protocol errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("USB error: {0}")]
    Usb(String),

    #[error("No USB device with serial {serial}")]
    DeviceNotFound { serial: String },

    #[error("Device does not support AOA v2 (protocol version {version})")]
    UnsupportedProtocol { version: u16 },

    #[error("Accessory protocol not initialized")]
    NotInitialized,
}

/// Remote transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Cannot execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Command failed: {0}")]
    Failed(String),

    #[error("No device connected")]
    NoDevice,
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;

//! Audio subsystem module
//!
//! [`AudioSubsystem`] is the capability set the forwarder needs from the
//! local audio stack: enumerate input devices, open input/output devices,
//! pause/resume them and queue samples for playback. [`CpalSubsystem`]
//! implements it on top of cpal.

pub mod buffer;
pub mod device;
pub mod host;

pub use buffer::SampleQueue;
pub use device::{list_input_devices, DeviceDescriptor};
pub use host::CpalSubsystem;

use std::fmt;

use crate::constants::{ACCESSORY_CHANNELS, ACCESSORY_SAMPLE_RATE, DEFAULT_BUFFER_FRAMES};
use crate::error::AudioError;

/// Callback invoked with raw S16LE bytes each time the input device has
/// captured a buffer. Runs on the audio subsystem's own thread.
pub type InputCallback = Box<dyn FnMut(&[u8]) + Send + 'static>;

/// Opaque handle to an open audio device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub u32);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Format of an audio device. Samples are always signed 16-bit
/// little-endian, interleaved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSpec {
    pub sample_rate: u32,
    pub channels: u16,
    /// Device buffer size in frames
    pub buffer_frames: u32,
}

impl AudioSpec {
    /// The format streamed by a device in accessory audio mode:
    /// 44.1kHz, 16-bit, stereo
    pub fn accessory(buffer_frames: u32) -> Self {
        Self {
            sample_rate: ACCESSORY_SAMPLE_RATE,
            channels: ACCESSORY_CHANNELS,
            buffer_frames,
        }
    }

    /// Bytes per interleaved frame
    pub fn frame_bytes(&self) -> usize {
        self.channels as usize * std::mem::size_of::<i16>()
    }
}

impl Default for AudioSpec {
    fn default() -> Self {
        Self::accessory(DEFAULT_BUFFER_FRAMES)
    }
}

/// Local audio stack used by the forwarder.
///
/// Devices are opened paused. `close`, `pause` and `enqueue` on a handle
/// that is not open are no-ops (or [`AudioError::UnknownDevice`] for
/// `enqueue`).
pub trait AudioSubsystem: Send + Sync {
    /// Initialize the subsystem. Must succeed before anything else is called.
    fn init(&self) -> Result<(), AudioError>;

    /// Currently available input devices, in enumeration order
    fn input_devices(&self) -> Result<Vec<DeviceDescriptor>, AudioError>;

    /// Open an input device; `callback` receives every captured buffer
    fn open_input(
        &self,
        device: &DeviceDescriptor,
        spec: &AudioSpec,
        callback: InputCallback,
    ) -> Result<DeviceId, AudioError>;

    /// Open the default output device
    fn open_output(&self, spec: &AudioSpec) -> Result<DeviceId, AudioError>;

    fn close(&self, device: DeviceId);

    fn pause(&self, device: DeviceId, paused: bool);

    /// Queue S16LE bytes for playback on an output device.
    ///
    /// Called from the input device's callback thread. Implementations
    /// may take a short lock to look up the device but must not wait on
    /// the output side.
    fn enqueue(&self, device: DeviceId, data: &[u8]) -> Result<(), AudioError>;
}

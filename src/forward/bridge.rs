//! Input-to-output sample bridge
//!
//! Runs inside the input device's callback. Every captured buffer is
//! queued on the output device; the first buffer that is queued
//! successfully also starts output playback. Starting the output any
//! earlier would play silence before real data exists.

use std::sync::Arc;

use crate::audio::{AudioSubsystem, DeviceId, InputCallback};
use crate::forward::player::PlayGate;

pub struct StreamBridge {
    audio: Arc<dyn AudioSubsystem>,
    output: DeviceId,
    gate: Arc<PlayGate>,
}

impl StreamBridge {
    pub fn new(audio: Arc<dyn AudioSubsystem>, output: DeviceId, gate: Arc<PlayGate>) -> Self {
        Self {
            audio,
            output,
            gate,
        }
    }

    /// Forward one captured buffer. Errors are logged, never propagated:
    /// a failed buffer must not end the stream.
    pub fn on_samples(&self, data: &[u8]) {
        match self.audio.enqueue(self.output, data) {
            Ok(()) => {
                if self.gate.try_open() {
                    // first input data, unpause the output
                    self.audio.pause(self.output, false);
                }
            }
            Err(e) => tracing::error!("Cannot queue audio: {}", e),
        }
    }

    pub fn into_callback(self) -> InputCallback {
        Box::new(move |data: &[u8]| self.on_samples(data))
    }
}

//! Forwarding session state

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::audio::{AudioSpec, AudioSubsystem, DeviceId};
use crate::error::ForwardError;
use crate::forward::bridge::StreamBridge;
use crate::forward::selector::select_accessory_input;

/// One-shot latch that lets the output device start playing.
///
/// Starts closed and opens at most once; it never closes again.
#[derive(Debug, Default)]
pub struct PlayGate(AtomicBool);

impl PlayGate {
    pub fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Open the gate. Returns `true` only for the caller that actually
    /// opened it.
    pub fn try_open(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_open(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A forwarding session: the device serial plus the two audio devices
/// it owns.
pub struct AudioPlayer {
    serial: String,
    input: Option<DeviceId>,
    output: Option<DeviceId>,
    gate: Arc<PlayGate>,
}

impl AudioPlayer {
    pub fn new(serial: impl Into<String>) -> Result<Self, ForwardError> {
        let serial = serial.into();
        if serial.is_empty() {
            return Err(ForwardError::SerialResolutionFailed(
                "empty serial".to_string(),
            ));
        }

        Ok(Self {
            serial,
            input: None,
            output: None,
            gate: Arc::new(PlayGate::new()),
        })
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn input_device(&self) -> Option<DeviceId> {
        self.input
    }

    pub fn output_device(&self) -> Option<DeviceId> {
        self.output
    }

    pub fn gate(&self) -> &Arc<PlayGate> {
        &self.gate
    }

    /// Whether the output has been started by the first input samples
    pub fn is_playing(&self) -> bool {
        self.gate.is_open()
    }

    /// Open the default output, then the accessory input wired to it.
    ///
    /// Both devices are left paused. On failure nothing stays open.
    pub fn open(
        &mut self,
        audio: &Arc<dyn AudioSubsystem>,
        spec: &AudioSpec,
    ) -> Result<(), ForwardError> {
        let output = audio.open_output(spec).map_err(|e| {
            tracing::error!("Cannot open audio output: {}", e);
            ForwardError::DeviceOpenFailed(e)
        })?;

        let bridge = StreamBridge::new(audio.clone(), output, self.gate.clone());
        let input = match select_accessory_input(audio.as_ref(), spec, bridge) {
            Ok(input) => input,
            Err(e) => {
                tracing::error!("Cannot open audio input: {}", e);
                audio.close(output);
                return Err(e);
            }
        };

        self.output = Some(output);
        self.input = Some(input);
        Ok(())
    }

    /// Close whichever devices are open, input first
    pub fn close(&mut self, audio: &dyn AudioSubsystem) {
        if let Some(input) = self.input.take() {
            audio.close(input);
        }
        if let Some(output) = self.output.take() {
            audio.close(output);
        }
    }
}

impl std::fmt::Debug for AudioPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioPlayer")
            .field("serial", &self.serial)
            .field("input", &self.input)
            .field("output", &self.output)
            .field("playing", &self.is_playing())
            .finish()
    }
}

//! Audio forwarding lifecycle
//!
//! [`AudioForwarder::start`] walks the setup stages in order:
//!
//! ```text
//! Init ─► Serial ─► PlayerInit ─► ForwardEnabled ─► SubsysInit ─► DevicesOpen ─► Running
//! ```
//!
//! Each completed stage pushes the action that undoes it. When a later
//! stage fails the actions are popped and run in reverse, so only the
//! stages that actually completed are rolled back. A failed `start`
//! leaves nothing behind.
//!
//! [`AudioForwarder::stop`] is the unconditional teardown of a running
//! session: every step runs even if an earlier one fails.

pub mod bridge;
pub mod player;
pub mod selector;

pub use bridge::StreamBridge;
pub use player::{AudioPlayer, PlayGate};
pub use selector::{pick_accessory_input, select_accessory_input};

use std::sync::Arc;
use std::thread;

use crate::accessory::AccessoryProtocol;
use crate::audio::{AudioSpec, AudioSubsystem};
use crate::config::ForwarderConfig;
use crate::error::ForwardError;
use crate::transport::RemoteTransport;

/// Setup stages of the forwarding lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Not running
    Idle,
    /// Accessory protocol initialization
    Init,
    /// Serial resolution
    Serial,
    PlayerInit,
    /// Accessory audio mode switch on the device
    ForwardEnabled,
    /// Local audio subsystem initialization
    SubsysInit,
    DevicesOpen,
    Running,
}

/// Undo action for a completed stage
#[derive(Debug)]
enum Rollback {
    ProtocolExit,
    DestroyPlayer,
    DisableForwarding(String),
}

/// Drives the forwarding lifecycle over its three collaborators
pub struct AudioForwarder {
    audio: Arc<dyn AudioSubsystem>,
    accessory: Box<dyn AccessoryProtocol>,
    transport: Box<dyn RemoteTransport>,
    config: ForwarderConfig,
    player: Option<AudioPlayer>,
    stage: Stage,
}

impl AudioForwarder {
    pub fn new(
        audio: Arc<dyn AudioSubsystem>,
        accessory: Box<dyn AccessoryProtocol>,
        transport: Box<dyn RemoteTransport>,
        config: ForwarderConfig,
    ) -> Self {
        Self {
            audio,
            accessory,
            transport,
            config,
            player: None,
            stage: Stage::Idle,
        }
    }

    /// Start forwarding audio from the device with `serial`, or from the
    /// device reported by the transport when `serial` is `None`.
    ///
    /// Blocks until the devices are open, including the USB settle delay.
    /// The output starts playing when the first input samples arrive.
    pub fn start(&mut self, serial: Option<&str>) -> Result<(), ForwardError> {
        if self.player.is_some() {
            return Err(ForwardError::AlreadyRunning);
        }

        let mut undo = Vec::new();
        let mut player = None;

        match self.advance(serial, &mut undo, &mut player) {
            Ok(()) => {
                self.player = player;
                self.stage = Stage::Running;
                Ok(())
            }
            Err(e) => {
                tracing::debug!("Stage {:?} failed, rolling back", self.stage);
                self.rollback(undo, player);
                Err(e)
            }
        }
    }

    fn advance(
        &mut self,
        serial: Option<&str>,
        undo: &mut Vec<Rollback>,
        player: &mut Option<AudioPlayer>,
    ) -> Result<(), ForwardError> {
        self.stage = Stage::Init;
        self.accessory.init().map_err(|e| {
            tracing::error!("Cannot initialize AOA: {}", e);
            ForwardError::ResourceInitFailed(format!("accessory protocol: {}", e))
        })?;
        undo.push(Rollback::ProtocolExit);

        self.stage = Stage::Serial;
        let serial = self.resolve_serial(serial)?;

        self.stage = Stage::PlayerInit;
        let player = player.insert(AudioPlayer::new(serial).map_err(|e| {
            tracing::error!("Cannot initialize audio player: {}", e);
            e
        })?);
        undo.push(Rollback::DestroyPlayer);

        // adb connection will be reset!
        self.stage = Stage::ForwardEnabled;
        self.accessory.enable_audio(player.serial()).map_err(|e| {
            tracing::error!("AOA audio forwarding failed: {}", e);
            ForwardError::RemoteProtocolFailed(e)
        })?;
        undo.push(Rollback::DisableForwarding(player.serial().to_string()));
        tracing::info!("Audio forwarding enabled");

        self.stage = Stage::SubsysInit;
        self.audio.init().map_err(|e| {
            tracing::error!("Could not initialize audio: {}", e);
            ForwardError::ResourceInitFailed(format!("audio subsystem: {}", e))
        })?;

        let delay = self.config.usb_settle_delay();
        tracing::info!("Waiting {:?} for USB reconfiguration...", delay);
        thread::sleep(delay);

        self.stage = Stage::DevicesOpen;
        let spec = AudioSpec::accessory(self.config.buffer_frames);
        player.open(&self.audio, &spec)?;

        // The output stays paused until the first input samples
        if let Some(input) = player.input_device() {
            self.audio.pause(input, false);
        }
        Ok(())
    }

    fn resolve_serial(&mut self, serial: Option<&str>) -> Result<String, ForwardError> {
        if let Some(serial) = serial {
            return Ok(serial.to_string());
        }

        tracing::debug!("No serial provided, request it to the device");
        let serial = self
            .transport
            .read_serial_number(self.config.serial_timeout())
            .map_err(|e| {
                tracing::error!("Cannot read serial from the device: {}", e);
                ForwardError::SerialResolutionFailed(e.to_string())
            })?;
        tracing::debug!("Device serial is {}", serial);
        Ok(serial)
    }

    fn rollback(&mut self, mut undo: Vec<Rollback>, mut player: Option<AudioPlayer>) {
        while let Some(action) = undo.pop() {
            match action {
                Rollback::DisableForwarding(serial) => {
                    if let Err(e) = self.accessory.disable_audio(&serial) {
                        tracing::warn!("Cannot disable audio forwarding: {}", e);
                    }
                }
                Rollback::DestroyPlayer => {
                    if let Some(mut player) = player.take() {
                        player.close(self.audio.as_ref());
                    }
                }
                Rollback::ProtocolExit => self.accessory.exit(),
            }
        }
    }

    /// Stop a running session: close both devices, switch the device back
    /// out of accessory audio mode and release the protocol. A failure to
    /// switch the device back is only logged.
    pub fn stop(&mut self) {
        let Some(mut player) = self.player.take() else {
            tracing::warn!("Audio forwarding is not running");
            return;
        };

        player.close(self.audio.as_ref());

        match self.accessory.disable_audio(player.serial()) {
            Ok(()) => tracing::info!("Audio forwarding disabled"),
            Err(e) => tracing::warn!("Cannot disable audio forwarding: {}", e),
        }
        self.accessory.exit();

        drop(player);
        self.stage = Stage::Idle;
    }

    pub fn is_running(&self) -> bool {
        self.player.is_some()
    }

    /// Serial of the running session
    pub fn serial(&self) -> Option<&str> {
        self.player.as_ref().map(AudioPlayer::serial)
    }

    pub fn player(&self) -> Option<&AudioPlayer> {
        self.player.as_ref()
    }

    /// The stage most recently entered. After a failed `start` this is
    /// the stage that failed.
    pub fn stage(&self) -> Stage {
        self.stage
    }
}

impl Drop for AudioForwarder {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        }
    }
}

//! Mock collaborators for testing without hardware.
//!
//! All mocks write to a shared [`CallLog`], so a test can check the order
//! of calls across the audio subsystem, the accessory protocol and the
//! transport.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use usbaudio_forward::mock::{CallLog, MockAccessory, MockAudio, MockTransport};
//! use usbaudio_forward::{AudioForwarder, ForwarderConfig};
//!
//! let log = CallLog::new();
//! let audio = Arc::new(MockAudio::new(log.clone()).with_input_devices(&["Accessory"]));
//! let config = ForwarderConfig { usb_settle_ms: 0, ..Default::default() };
//!
//! let mut forwarder = AudioForwarder::new(
//!     audio.clone(),
//!     Box::new(MockAccessory::new(log.clone())),
//!     Box::new(MockTransport::with_serial(log.clone(), "ABC123")),
//!     config,
//! );
//! forwarder.start(None).unwrap();
//! assert_eq!(forwarder.serial(), Some("ABC123"));
//! forwarder.stop();
//! assert_eq!(audio.open_count(), 0);
//! ```

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use crate::accessory::AccessoryProtocol;
use crate::audio::{AudioSpec, AudioSubsystem, DeviceDescriptor, DeviceId, InputCallback};
use crate::error::{AudioError, ProtocolError, TransportError};
use crate::transport::RemoteTransport;

/// A call made on a mock collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ProtocolInit,
    ProtocolExit,
    /// Recorded only when enabling succeeded
    EnableAudio(String),
    /// Recorded only when disabling succeeded
    DisableAudio(String),
    ReadSerial,
    AudioInit,
    ListInputs,
    OpenInput(String),
    OpenOutput,
    Close(DeviceId),
    Pause(DeviceId, bool),
    Enqueue(DeviceId, usize),
}

/// Shared, ordered record of mock calls
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: Call) {
        self.0.lock().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().clone()
    }

    pub fn contains(&self, call: &Call) -> bool {
        self.0.lock().contains(call)
    }

    pub fn position(&self, pred: impl Fn(&Call) -> bool) -> Option<usize> {
        self.0.lock().iter().position(pred)
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.0.lock().iter().filter(|c| pred(c)).count()
    }

    /// Whether accessory audio mode was left enabled by the last
    /// enable/disable call
    pub fn accessory_audio_enabled(&self) -> bool {
        self.0
            .lock()
            .iter()
            .rev()
            .find_map(|c| match c {
                Call::EnableAudio(_) => Some(true),
                Call::DisableAudio(_) => Some(false),
                _ => None,
            })
            .unwrap_or(false)
    }
}

#[derive(Default)]
struct MockAudioState {
    initialized: bool,
    next_id: u32,
    /// Open devices and whether each is paused
    open: HashMap<DeviceId, bool>,
    outputs: HashMap<DeviceId, usize>,
    callbacks: HashMap<DeviceId, InputCallback>,
    enqueue_script: VecDeque<bool>,
}

/// In-memory audio subsystem
pub struct MockAudio {
    log: CallLog,
    input_devices: Vec<String>,
    fail_init: bool,
    fail_open_input: bool,
    fail_open_output: bool,
    state: Mutex<MockAudioState>,
}

impl MockAudio {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            input_devices: vec!["Android Accessory".to_string()],
            fail_init: false,
            fail_open_input: false,
            fail_open_output: false,
            state: Mutex::new(MockAudioState {
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Input devices reported by enumeration, in order
    pub fn with_input_devices(mut self, names: &[&str]) -> Self {
        self.input_devices = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Outcomes of the next `enqueue` calls; once exhausted every call
    /// succeeds
    pub fn with_enqueue_script(self, outcomes: Vec<bool>) -> Self {
        self.state.lock().enqueue_script = outcomes.into();
        self
    }

    pub fn fail_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn fail_open_input(mut self) -> Self {
        self.fail_open_input = true;
        self
    }

    pub fn fail_open_output(mut self) -> Self {
        self.fail_open_output = true;
        self
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().open.len()
    }

    pub fn is_open(&self, device: DeviceId) -> bool {
        self.state.lock().open.contains_key(&device)
    }

    /// `None` if the device is not open
    pub fn is_paused(&self, device: DeviceId) -> Option<bool> {
        self.state.lock().open.get(&device).copied()
    }

    /// Number of unpause commands sent to a device
    pub fn resume_count(&self, device: DeviceId) -> usize {
        self.log.count(|c| *c == Call::Pause(device, false))
    }

    /// Bytes successfully queued on an output device
    pub fn queued_bytes(&self, device: DeviceId) -> usize {
        self.state.lock().outputs.get(&device).copied().unwrap_or(0)
    }

    /// Deliver captured bytes through an input device's callback, as the
    /// audio thread would. Returns `false` if the device is not open and
    /// running.
    pub fn capture(&self, device: DeviceId, data: &[u8]) -> bool {
        let mut callback = {
            let mut state = self.state.lock();
            if state.open.get(&device) != Some(&false) {
                return false;
            }
            match state.callbacks.remove(&device) {
                Some(callback) => callback,
                None => return false,
            }
        };

        // The callback calls back into `enqueue`, so the lock is released
        callback(data);

        let mut state = self.state.lock();
        if state.open.contains_key(&device) {
            state.callbacks.insert(device, callback);
        }
        true
    }

    fn allocate(state: &mut MockAudioState) -> DeviceId {
        let id = DeviceId(state.next_id);
        state.next_id += 1;
        state.open.insert(id, true);
        id
    }

    fn check_initialized(&self) -> Result<(), AudioError> {
        if self.state.lock().initialized {
            Ok(())
        } else {
            Err(AudioError::NotInitialized)
        }
    }
}

impl AudioSubsystem for MockAudio {
    fn init(&self) -> Result<(), AudioError> {
        self.log.record(Call::AudioInit);
        if self.fail_init {
            return Err(AudioError::HostUnavailable("injected failure".to_string()));
        }
        self.state.lock().initialized = true;
        Ok(())
    }

    fn input_devices(&self) -> Result<Vec<DeviceDescriptor>, AudioError> {
        self.log.record(Call::ListInputs);
        self.check_initialized()?;
        Ok(self
            .input_devices
            .iter()
            .enumerate()
            .map(|(index, name)| DeviceDescriptor {
                index,
                name: name.clone(),
            })
            .collect())
    }

    fn open_input(
        &self,
        device: &DeviceDescriptor,
        _spec: &AudioSpec,
        callback: InputCallback,
    ) -> Result<DeviceId, AudioError> {
        self.log.record(Call::OpenInput(device.name.clone()));
        self.check_initialized()?;
        if self.fail_open_input {
            return Err(AudioError::StreamError("injected failure".to_string()));
        }

        let mut state = self.state.lock();
        let id = Self::allocate(&mut state);
        state.callbacks.insert(id, callback);
        Ok(id)
    }

    fn open_output(&self, _spec: &AudioSpec) -> Result<DeviceId, AudioError> {
        self.log.record(Call::OpenOutput);
        self.check_initialized()?;
        if self.fail_open_output {
            return Err(AudioError::StreamError("injected failure".to_string()));
        }

        let mut state = self.state.lock();
        let id = Self::allocate(&mut state);
        state.outputs.insert(id, 0);
        Ok(id)
    }

    fn close(&self, device: DeviceId) {
        self.log.record(Call::Close(device));
        let callback = {
            let mut state = self.state.lock();
            state.open.remove(&device);
            state.outputs.remove(&device);
            state.callbacks.remove(&device)
        };
        // Dropped outside the lock
        drop(callback);
    }

    fn pause(&self, device: DeviceId, paused: bool) {
        self.log.record(Call::Pause(device, paused));
        if let Some(state) = self.state.lock().open.get_mut(&device) {
            *state = paused;
        }
    }

    fn enqueue(&self, device: DeviceId, data: &[u8]) -> Result<(), AudioError> {
        self.log.record(Call::Enqueue(device, data.len()));
        let mut state = self.state.lock();
        if !state.outputs.contains_key(&device) {
            return Err(AudioError::UnknownDevice(device.0));
        }
        if state.enqueue_script.pop_front() == Some(false) {
            return Err(AudioError::QueueFull);
        }
        if let Some(queued) = state.outputs.get_mut(&device) {
            *queued += data.len();
        }
        Ok(())
    }
}

/// Accessory protocol that only records calls
#[derive(Debug, Clone)]
pub struct MockAccessory {
    log: CallLog,
    fail_init: bool,
    fail_enable: bool,
    fail_disable: bool,
}

impl MockAccessory {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            fail_init: false,
            fail_enable: false,
            fail_disable: false,
        }
    }

    pub fn fail_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn fail_enable(mut self) -> Self {
        self.fail_enable = true;
        self
    }

    pub fn fail_disable(mut self) -> Self {
        self.fail_disable = true;
        self
    }
}

impl AccessoryProtocol for MockAccessory {
    fn init(&mut self) -> Result<(), ProtocolError> {
        self.log.record(Call::ProtocolInit);
        if self.fail_init {
            return Err(ProtocolError::Usb("injected failure".to_string()));
        }
        Ok(())
    }

    fn exit(&mut self) {
        self.log.record(Call::ProtocolExit);
    }

    fn enable_audio(&mut self, serial: &str) -> Result<(), ProtocolError> {
        if self.fail_enable {
            return Err(ProtocolError::DeviceNotFound {
                serial: serial.to_string(),
            });
        }
        self.log.record(Call::EnableAudio(serial.to_string()));
        Ok(())
    }

    fn disable_audio(&mut self, serial: &str) -> Result<(), ProtocolError> {
        if self.fail_disable {
            return Err(ProtocolError::Usb("injected failure".to_string()));
        }
        self.log.record(Call::DisableAudio(serial.to_string()));
        Ok(())
    }
}

/// Transport answering serial requests from a fixed result
#[derive(Debug, Clone)]
pub struct MockTransport {
    log: CallLog,
    serial: Option<String>,
}

impl MockTransport {
    pub fn with_serial(log: CallLog, serial: &str) -> Self {
        Self {
            log,
            serial: Some(serial.to_string()),
        }
    }

    /// A transport with no device connected
    pub fn failing(log: CallLog) -> Self {
        Self { log, serial: None }
    }
}

impl RemoteTransport for MockTransport {
    fn read_serial_number(&mut self, _timeout: Duration) -> Result<String, TransportError> {
        self.log.record(Call::ReadSerial);
        self.serial.clone().ok_or(TransportError::NoDevice)
    }
}

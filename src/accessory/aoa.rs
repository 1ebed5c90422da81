//! Android Open Accessory (AOA v2) over libusb

use rusb::{Context, DeviceHandle, Direction, Recipient, RequestType, UsbContext};
use std::time::Duration;

use crate::accessory::AccessoryProtocol;
use crate::error::ProtocolError;

const AOA_GET_PROTOCOL: u8 = 51;
const AOA_START_ACCESSORY: u8 = 53;
const AOA_SET_AUDIO_MODE: u8 = 58;

/// Audio mode values of SET_AUDIO_MODE
const AUDIO_MODE_NO_AUDIO: u16 = 0;
const AUDIO_MODE_S16LSB_STEREO_44100HZ: u16 = 1;

/// Audio support was added in AOA v2
const MIN_AUDIO_PROTOCOL: u16 = 2;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

fn usb_error(e: rusb::Error) -> ProtocolError {
    ProtocolError::Usb(e.to_string())
}

/// AOA accessory protocol backed by a libusb context
pub struct AoaProtocol {
    context: Option<Context>,
    timeout: Duration,
}

impl AoaProtocol {
    pub fn new() -> Self {
        Self {
            context: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Timeout for each USB control transfer
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn open_device(&self, serial: &str) -> Result<DeviceHandle<Context>, ProtocolError> {
        let context = self.context.as_ref().ok_or(ProtocolError::NotInitialized)?;

        for device in context.devices().map_err(usb_error)?.iter() {
            let descriptor = match device.device_descriptor() {
                Ok(descriptor) => descriptor,
                Err(_) => continue,
            };
            if descriptor.serial_number_string_index().is_none() {
                continue;
            }

            let handle = match device.open() {
                Ok(handle) => handle,
                Err(e) => {
                    tracing::debug!(
                        "Cannot open USB device {:04x}:{:04x}: {}",
                        descriptor.vendor_id(),
                        descriptor.product_id(),
                        e
                    );
                    continue;
                }
            };

            match handle.read_serial_number_string_ascii(&descriptor) {
                Ok(s) if s == serial => return Ok(handle),
                _ => {}
            }
        }

        Err(ProtocolError::DeviceNotFound {
            serial: serial.to_string(),
        })
    }

    fn protocol_version(&self, handle: &DeviceHandle<Context>) -> Result<u16, ProtocolError> {
        let request_type = rusb::request_type(Direction::In, RequestType::Vendor, Recipient::Device);
        let mut buf = [0u8; 2];
        let len = handle
            .read_control(request_type, AOA_GET_PROTOCOL, 0, 0, &mut buf, self.timeout)
            .map_err(usb_error)?;
        if len != buf.len() {
            return Err(ProtocolError::Usb(format!(
                "short AOA protocol reply ({} bytes)",
                len
            )));
        }
        Ok(u16::from_le_bytes(buf))
    }

    fn set_audio_mode(&self, serial: &str, mode: u16) -> Result<(), ProtocolError> {
        let handle = self.open_device(serial)?;

        let version = self.protocol_version(&handle)?;
        if version < MIN_AUDIO_PROTOCOL {
            return Err(ProtocolError::UnsupportedProtocol { version });
        }
        tracing::debug!("Device {} supports AOA v{}", serial, version);

        let request_type =
            rusb::request_type(Direction::Out, RequestType::Vendor, Recipient::Device);
        handle
            .write_control(request_type, AOA_SET_AUDIO_MODE, mode, 0, &[], self.timeout)
            .map_err(usb_error)?;

        // The device disconnects and comes back with the new mode
        handle
            .write_control(request_type, AOA_START_ACCESSORY, 0, 0, &[], self.timeout)
            .map_err(usb_error)?;

        Ok(())
    }
}

impl Default for AoaProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessoryProtocol for AoaProtocol {
    fn init(&mut self) -> Result<(), ProtocolError> {
        self.context = Some(Context::new().map_err(usb_error)?);
        Ok(())
    }

    fn exit(&mut self) {
        self.context = None;
    }

    fn enable_audio(&mut self, serial: &str) -> Result<(), ProtocolError> {
        self.set_audio_mode(serial, AUDIO_MODE_S16LSB_STEREO_44100HZ)
    }

    fn disable_audio(&mut self, serial: &str) -> Result<(), ProtocolError> {
        self.set_audio_mode(serial, AUDIO_MODE_NO_AUDIO)
    }
}

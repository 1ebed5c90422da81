//! Accessory protocol
//!
//! Switches the remote device in and out of USB accessory audio mode.

#[cfg(feature = "usb")]
pub mod aoa;

#[cfg(feature = "usb")]
pub use aoa::AoaProtocol;

use crate::error::ProtocolError;

/// Control of the device's accessory audio mode
pub trait AccessoryProtocol: Send {
    /// Initialize the protocol module. Called before any other method.
    fn init(&mut self) -> Result<(), ProtocolError>;

    /// Release everything acquired by `init`
    fn exit(&mut self);

    /// Ask the device to stream its audio over USB.
    ///
    /// The device re-enumerates afterwards, which resets any adb
    /// connection to it.
    fn enable_audio(&mut self, serial: &str) -> Result<(), ProtocolError>;

    /// Ask the device to go back to playing audio locally
    fn disable_audio(&mut self, serial: &str) -> Result<(), ProtocolError>;
}

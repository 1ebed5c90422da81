//! Remote device transport
//!
//! Only used to learn the device serial when the caller did not supply one.

pub mod adb;

pub use adb::AdbTransport;

use std::time::Duration;

use crate::error::TransportError;

/// Connection to the remote device used before accessory mode is enabled
pub trait RemoteTransport: Send {
    /// Serial number of the connected device
    fn read_serial_number(&mut self, timeout: Duration) -> Result<String, TransportError>;
}

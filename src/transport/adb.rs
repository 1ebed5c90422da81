//! adb-based serial lookup

use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::TransportError;
use crate::transport::RemoteTransport;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Reads the device serial by running `adb get-serialno`
pub struct AdbTransport {
    program: PathBuf,
}

impl AdbTransport {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn wait_with_timeout(
        child: &mut Child,
        timeout: Duration,
    ) -> Result<ExitStatus, TransportError> {
        let deadline = Instant::now() + timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(TransportError::Timeout(timeout));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => return Err(TransportError::Failed(e.to_string())),
            }
        }
    }
}

impl Default for AdbTransport {
    fn default() -> Self {
        Self::new("adb")
    }
}

impl RemoteTransport for AdbTransport {
    fn read_serial_number(&mut self, timeout: Duration) -> Result<String, TransportError> {
        let mut child = Command::new(&self.program)
            .arg("get-serialno")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| TransportError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let status = Self::wait_with_timeout(&mut child, timeout)?;

        let mut stdout = String::new();
        if let Some(mut out) = child.stdout.take() {
            out.read_to_string(&mut stdout)
                .map_err(|e| TransportError::Failed(e.to_string()))?;
        }

        if !status.success() {
            let mut stderr = String::new();
            if let Some(mut err) = child.stderr.take() {
                let _ = err.read_to_string(&mut stderr);
            }
            return Err(TransportError::Failed(format!(
                "adb get-serialno exited with {}: {}",
                status,
                stderr.trim()
            )));
        }

        parse_serial(&stdout)
    }
}

/// Extract the serial from `adb get-serialno` output
pub fn parse_serial(output: &str) -> Result<String, TransportError> {
    let serial = output.trim();
    if serial.is_empty() || serial == "unknown" {
        return Err(TransportError::NoDevice);
    }
    Ok(serial.to_string())
}

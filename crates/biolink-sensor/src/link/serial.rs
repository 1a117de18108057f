//! `serialport`-backed implementation of the link halves.

use std::io::{self, Read, Write};
use std::thread;
use std::time::Duration;

use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};
use tracing::{debug, info};

use super::{LINK_TARGET, LineReader, LineSource, LineWriter, LinkError};

/// Lines longer than this without a terminator are emitted as-is.
const MAX_LINE_BYTES: usize = 1024;

const READ_CHUNK: usize = 256;

/// Parameters used to open the sensor's serial device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    /// Device path, e.g. `/dev/ttyACM0`.
    pub port: String,
    /// Line speed.
    pub baud_rate: u32,
    /// Delay after opening while the board resets.
    pub settle: Duration,
    /// Initial read timeout applied to the port.
    pub read_timeout: Duration,
}

/// Opens the serial device and prepares it for line traffic.
///
/// The port is configured for 8N1, DTR and RTS are asserted, the call sleeps
/// for the settle delay so the board can finish its reset, and any boot text
/// already buffered is discarded.
///
/// # Errors
///
/// Returns [`LinkError::Open`] when the device cannot be opened and
/// [`LinkError::Control`] when it cannot be configured or cloned.
pub fn open_serial(settings: &SerialSettings) -> Result<LineSource, LinkError> {
    info!(
        target: LINK_TARGET,
        port = %settings.port,
        baud_rate = settings.baud_rate,
        "opening serial port"
    );

    let mut port = serialport::new(settings.port.as_str(), settings.baud_rate)
        .timeout(settings.read_timeout)
        .data_bits(DataBits::Eight)
        .stop_bits(StopBits::One)
        .parity(Parity::None)
        .open()
        .map_err(|source| LinkError::Open {
            port: settings.port.clone(),
            source,
        })?;

    if let Err(error) = port.write_data_terminal_ready(true) {
        debug!(target: LINK_TARGET, error = %error, "could not assert DTR");
    }
    if let Err(error) = port.write_request_to_send(true) {
        debug!(target: LINK_TARGET, error = %error, "could not assert RTS");
    }

    thread::sleep(settings.settle);
    let purged = purge_input(port.as_mut())?;
    debug!(
        target: LINK_TARGET,
        purged_bytes = purged,
        "discarded buffered boot output"
    );

    let writer = port.try_clone()?;
    Ok(LineSource::new(
        Box::new(SerialReader::new(port)),
        Box::new(SerialWriter { port: writer }),
    ))
}

fn purge_input(port: &mut dyn SerialPort) -> Result<usize, LinkError> {
    let mut purged = 0_usize;
    let mut buffer = [0_u8; 512];
    while port.bytes_to_read()? > 0 {
        match port.read(&mut buffer) {
            Ok(0) => break,
            Ok(count) => purged = purged.saturating_add(count),
            Err(error) if error.kind() == io::ErrorKind::TimedOut => break,
            Err(error) => return Err(LinkError::from_io(error)),
        }
    }
    port.clear(ClearBuffer::Input)?;
    Ok(purged)
}

struct SerialReader {
    port: Box<dyn SerialPort>,
    buffer: Vec<u8>,
    timeout: Option<Duration>,
}

impl SerialReader {
    fn new(port: Box<dyn SerialPort>) -> Self {
        Self {
            port,
            buffer: Vec::with_capacity(READ_CHUNK),
            timeout: None,
        }
    }

    fn take_buffered(&mut self) -> Option<Vec<u8>> {
        take_line(&mut self.buffer)
    }

    fn apply_timeout(&mut self, timeout: Duration) -> Result<(), LinkError> {
        if self.timeout != Some(timeout) {
            self.port.set_timeout(timeout)?;
            self.timeout = Some(timeout);
        }
        Ok(())
    }
}

impl LineReader for SerialReader {
    fn has_input(&mut self) -> Result<bool, LinkError> {
        if self.buffer.contains(&b'\n') {
            return Ok(true);
        }
        match self.port.bytes_to_read() {
            Ok(count) => Ok(count > 0),
            Err(error) if error.kind() == serialport::ErrorKind::NoDevice => {
                Err(LinkError::closed(error.to_string()))
            }
            // The read itself reports what went wrong with the port.
            Err(_) => Ok(true),
        }
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, LinkError> {
        if let Some(line) = self.take_buffered() {
            return Ok(Some(line));
        }
        self.apply_timeout(timeout)?;

        let mut chunk = [0_u8; READ_CHUNK];
        match self.port.read(&mut chunk) {
            Ok(0) => Err(LinkError::closed("serial device reported end of stream")),
            Ok(count) => {
                self.buffer
                    .extend_from_slice(chunk.get(..count).unwrap_or_default());
                Ok(self.take_buffered())
            }
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(None)
            }
            Err(error) => Err(LinkError::from_io(error)),
        }
    }
}

struct SerialWriter {
    port: Box<dyn SerialPort>,
}

impl LineWriter for SerialWriter {
    fn write_line(&mut self, line: &[u8]) -> Result<(), LinkError> {
        self.port.write_all(line).map_err(LinkError::from_io)?;
        self.port.flush().map_err(LinkError::from_io)
    }
}

/// Removes the first terminated line from `buffer`.
///
/// An unterminated run longer than [`MAX_LINE_BYTES`] is returned whole so a
/// device that never sends a newline cannot grow the buffer without bound.
fn take_line(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    if let Some(position) = buffer.iter().position(|byte| *byte == b'\n') {
        let rest = buffer.split_off(position.saturating_add(1));
        return Some(std::mem::replace(buffer, rest));
    }
    if buffer.len() > MAX_LINE_BYTES {
        return Some(std::mem::take(buffer));
    }
    None
}

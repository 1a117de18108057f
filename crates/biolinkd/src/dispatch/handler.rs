//! Connection handler that serves control requests.

use std::io::{self, Read};
use std::sync::Arc;

use tracing::{debug, warn};

use biolink_sensor::SensorService;

use crate::transport::{ConnectionHandler, ConnectionStream};

use super::DISPATCH_TARGET;
use super::errors::DispatchError;
use super::request::ControlRequest;
use super::response::ResponseWriter;
use super::router::route;

/// Maximum size of a single request line in bytes.
pub(crate) const MAX_REQUEST_BYTES: usize = 64 * 1024;

/// Reads one JSONL request per connection and answers with one reply line.
#[derive(Debug)]
pub(crate) struct DispatchConnectionHandler {
    service: Arc<SensorService>,
}

impl DispatchConnectionHandler {
    pub(crate) const fn new(service: Arc<SensorService>) -> Self {
        Self { service }
    }

    fn dispatch(&self, mut stream: ConnectionStream) {
        let outcome = match read_request_line(&mut stream) {
            Ok(Some(bytes)) => {
                ControlRequest::parse(&bytes).and_then(|request| route(&self.service, request))
            }
            Ok(None) => {
                debug!(target: DISPATCH_TARGET, "client disconnected without request");
                return;
            }
            Err(error) => Err(error),
        };

        let mut writer = ResponseWriter::new(&mut stream);
        let written = match outcome {
            Ok(reply) => writer.write_reply(&reply),
            Err(error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    error = %error,
                    status = error.exit_status(),
                    "request failed"
                );
                writer.write_error(&error)
            }
        };
        if let Err(error) = written {
            warn!(target: DISPATCH_TARGET, error = %error, "failed to write reply");
        }
    }
}

impl ConnectionHandler for DispatchConnectionHandler {
    fn handle(&self, stream: ConnectionStream) {
        self.dispatch(stream);
    }
}

/// Reads a newline-terminated request, or everything up to EOF.
///
/// Returns `Ok(None)` when the client disconnects without sending anything.
fn read_request_line<R: Read>(stream: &mut R) -> Result<Option<Vec<u8>>, DispatchError> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 1024];
    loop {
        let read = read_with_retry(stream, &mut chunk)?;
        let Some(received) = chunk.get(..read).filter(|bytes| !bytes.is_empty()) else {
            return Ok((!buffer.is_empty()).then_some(buffer));
        };
        match received.iter().position(|byte| *byte == b'\n') {
            Some(newline) => {
                buffer.extend_from_slice(received.get(..=newline).unwrap_or(received));
                enforce_limit(buffer.len())?;
                return Ok(Some(buffer));
            }
            None => {
                buffer.extend_from_slice(received);
                enforce_limit(buffer.len())?;
            }
        }
    }
}

fn read_with_retry<R: Read>(stream: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match stream.read(buf) {
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            other => return other,
        }
    }
}

fn enforce_limit(size: usize) -> Result<(), DispatchError> {
    if size > MAX_REQUEST_BYTES {
        return Err(DispatchError::RequestTooLarge {
            size,
            max_size: MAX_REQUEST_BYTES,
        });
    }
    Ok(())
}

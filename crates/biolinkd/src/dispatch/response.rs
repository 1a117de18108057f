//! Reply serialisation for the control protocol.

use std::io::Write;

use serde::Serialize;

use biolink_sensor::{Identity, LogEntry, OperationReply};

use super::errors::DispatchError;

/// The single reply line sent for each request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum ControlReply {
    /// Outcome of a sensor command.
    Reply { accepted: bool, message: String },
    /// Log entries, oldest first.
    Log { entries: Vec<LogEntry> },
    /// Enrolled identities.
    Records { records: Vec<Identity> },
    /// Outcome of a host-only mutation.
    Done { ok: bool },
    /// Queue depths.
    Status {
        log: usize,
        log_capacity: usize,
        pending: usize,
        evicted: u64,
        records: usize,
    },
    /// The request failed.
    Error { message: String, status: i32 },
}

impl From<OperationReply> for ControlReply {
    fn from(reply: OperationReply) -> Self {
        Self::Reply {
            accepted: reply.accepted,
            message: reply.message,
        }
    }
}

impl From<&DispatchError> for ControlReply {
    fn from(error: &DispatchError) -> Self {
        Self::Error {
            message: error.to_string(),
            status: error.exit_status(),
        }
    }
}

/// Writes JSONL replies to a stream.
pub(crate) struct ResponseWriter<W> {
    writer: W,
}

impl<W: Write> ResponseWriter<W> {
    pub(crate) const fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes `reply` as one line and flushes.
    pub(crate) fn write_reply(&mut self, reply: &ControlReply) -> Result<(), DispatchError> {
        serde_json::to_writer(&mut self.writer, reply).map_err(DispatchError::SerializeReply)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Reports `error` to the client.
    pub(crate) fn write_error(&mut self, error: &DispatchError) -> Result<(), DispatchError> {
        self.write_reply(&ControlReply::from(error))
    }
}

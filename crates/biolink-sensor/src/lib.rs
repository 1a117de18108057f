//! Host-side driver for a serial fingerprint sensor.
//!
//! A single serial line carries both unsolicited status text and the replies
//! to commands. The ingest loop copies every line into a bounded log and a
//! queue of unclaimed lines; the dispatcher writes one command at a time and
//! claims the first queued line that matches the reply it expects, waiting
//! no longer than the command's deadline. Callers reading the log are never
//! blocked by a command in flight.

mod dispatcher;
mod ingest;
mod journal;
mod line;
pub mod link;
mod log_store;
mod outcome;
mod pending;
pub mod protocol;
mod records;
mod service;
mod waiter;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use dispatcher::{CommandDispatcher, SensorError, Timeouts};
pub use ingest::{ExitNotifier, IngestError, IngestExit, IngestHandle, IngestLoop};
pub use journal::Journal;
pub use line::{Line, LogEntry};
pub use link::{LineReader, LineSource, LineWriter, LinkError, SerialSettings, open_serial};
pub use outcome::{CommandOutcome, Confirmation, OperationReply, Rejection, UNKNOWN_NAME};
pub use protocol::{FingerprintId, ProtocolError, Verb};
pub use records::{Identity, JsonFilePersistence, RecordError, RecordPersistence, RecordStore};
pub use service::{SensorService, SensorSettings};
pub use waiter::ResponseWaiter;

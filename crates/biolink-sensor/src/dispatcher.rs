//! Per-verb command protocol over the shared link.
//!
//! The dispatcher owns the writer half of the link behind a mutex that also
//! serves as the in-flight lock: it is held from the stale-line flush through
//! the write and the response wait, so only one command is ever outstanding.
//!
//! Stale lines are flushed twice per command. The first flush runs before
//! any record is touched and applies late enroll confirmations; the second
//! runs just before the write and only discards.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::journal::Journal;
use crate::link::{LineWriter, LinkError};
use crate::outcome::{CommandOutcome, Confirmation, Rejection, UNKNOWN_NAME};
use crate::protocol::{
    FingerprintId, SearchVerdict, Verb, encode_command, is_enroll_confirmation,
    parse_enroll_confirmation, parse_search_verdict,
};
use crate::records::{Identity, RecordError, RecordStore};
use crate::waiter::ResponseWaiter;

const DISPATCH_TARGET: &str = "biolink_sensor::dispatcher";

/// Response windows for the verbs that wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Window for the enroll confirmation.
    pub enroll: Duration,
    /// Window for the search verdict.
    pub search: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            enroll: Duration::from_secs(5),
            search: Duration::from_secs(3),
        }
    }
}

/// Infrastructure failures that prevent a command from completing.
#[derive(Debug, Error)]
pub enum SensorError {
    /// The command could not be written to the link.
    #[error("failed to send {verb} command: {source}")]
    Write {
        /// Command being sent.
        verb: Verb,
        /// Underlying link error.
        #[source]
        source: LinkError,
    },
    /// The record store could not be updated.
    #[error(transparent)]
    Records(#[from] RecordError),
}

/// Issues commands and correlates their responses.
pub struct CommandDispatcher {
    writer: Mutex<Box<dyn LineWriter>>,
    journal: Arc<Journal>,
    records: Arc<RecordStore>,
    timeouts: Timeouts,
}

impl CommandDispatcher {
    /// Creates a dispatcher writing through `writer`.
    #[must_use]
    pub fn new(
        writer: Box<dyn LineWriter>,
        journal: Arc<Journal>,
        records: Arc<RecordStore>,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            writer: Mutex::new(writer),
            journal,
            records,
            timeouts,
        }
    }

    /// Runs one command to completion.
    ///
    /// `id` and `name` are raw caller input; they are validated here. Every
    /// call appends exactly one status line to the log.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError`] when the link write or a record update fails.
    /// Validation failures and timeouts are reported as outcomes instead.
    pub fn invoke(
        &self,
        verb: Verb,
        id: Option<&str>,
        name: Option<&str>,
    ) -> Result<CommandOutcome, SensorError> {
        let mut guard = self
            .writer
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        let writer = guard.as_mut();
        debug!(target: DISPATCH_TARGET, %verb, id, "dispatching command");
        self.apply_stale();
        match verb {
            Verb::Enroll => self.enroll(writer, id, name),
            Verb::Search => self.search(writer),
            Verb::Delete => self.delete(writer, id),
        }
    }

    fn enroll(
        &self,
        writer: &mut dyn LineWriter,
        raw_id: Option<&str>,
        name: Option<&str>,
    ) -> Result<CommandOutcome, SensorError> {
        let (Some(raw_id), Some(name)) = (non_blank(raw_id), non_blank(name)) else {
            return Ok(self.conclude(CommandOutcome::Rejected(Rejection::MissingFields)));
        };
        let id = match parse_id(raw_id) {
            Ok(id) => id,
            Err(rejection) => return Ok(self.conclude(CommandOutcome::Rejected(rejection))),
        };
        if self.records.exists(id) {
            return Ok(self.conclude(CommandOutcome::Rejected(Rejection::DuplicateId(id))));
        }

        if let Err(error) = self.records.add(Identity::unconfirmed(id, name)) {
            return Err(self.fail(format!("Failed to save ID {id}"), error.into()));
        }

        if let Err(source) = self.send(writer, Verb::Enroll, Some(id)) {
            if let Err(error) = self.records.remove(id) {
                warn!(
                    target: DISPATCH_TARGET,
                    %id,
                    error = %error,
                    "failed to roll back unsent enrollment"
                );
            }
            return Err(self.fail(
                "Failed to send enroll command".to_owned(),
                SensorError::Write {
                    verb: Verb::Enroll,
                    source,
                },
            ));
        }

        let waiter = ResponseWaiter::new(&self.journal);
        match waiter.wait_for(|line| is_enroll_confirmation(line, id), self.timeouts.enroll) {
            Some(line) => match self.records.confirm(id) {
                Ok(true) => Ok(self.conclude(CommandOutcome::Confirmed(Confirmation::Enrolled {
                    id,
                    line,
                }))),
                Ok(false) => {
                    warn!(
                        target: DISPATCH_TARGET,
                        %id,
                        "sensor stored a template whose record was deleted mid-enrollment"
                    );
                    Ok(self.conclude(CommandOutcome::Rejected(Rejection::Withdrawn(id))))
                }
                Err(error) => Err(self.fail(format!("Failed to confirm ID {id}"), error.into())),
            },
            None => Ok(self.conclude(CommandOutcome::TimedOut {
                verb: Verb::Enroll,
                waited: self.timeouts.enroll,
            })),
        }
    }

    fn search(&self, writer: &mut dyn LineWriter) -> Result<CommandOutcome, SensorError> {
        if let Err(source) = self.send(writer, Verb::Search, None) {
            return Err(self.fail(
                "Failed to send search command".to_owned(),
                SensorError::Write {
                    verb: Verb::Search,
                    source,
                },
            ));
        }

        let waiter = ResponseWaiter::new(&self.journal);
        let Some(line) = waiter.wait_for(
            |line| parse_search_verdict(line).is_some(),
            self.timeouts.search,
        ) else {
            return Ok(self.conclude(CommandOutcome::TimedOut {
                verb: Verb::Search,
                waited: self.timeouts.search,
            }));
        };

        let confirmation = match parse_search_verdict(&line) {
            Some(SearchVerdict::Match(slot)) => {
                let name = slot
                    .parse::<FingerprintId>()
                    .ok()
                    .and_then(|id| self.records.get(id))
                    .map_or_else(|| UNKNOWN_NAME.to_owned(), |record| record.name);
                Confirmation::Matched { slot, name, line }
            }
            Some(SearchVerdict::NoMatch) | None => Confirmation::NoMatch { line },
        };
        Ok(self.conclude(CommandOutcome::Confirmed(confirmation)))
    }

    fn delete(
        &self,
        writer: &mut dyn LineWriter,
        raw_id: Option<&str>,
    ) -> Result<CommandOutcome, SensorError> {
        let Some(raw_id) = non_blank(raw_id) else {
            return Ok(self.conclude(CommandOutcome::Rejected(Rejection::MissingFields)));
        };
        let id = match parse_id(raw_id) {
            Ok(id) => id,
            Err(rejection) => return Ok(self.conclude(CommandOutcome::Rejected(rejection))),
        };
        match self.records.remove(id) {
            Ok(true) => {}
            Ok(false) => {
                return Ok(self.conclude(CommandOutcome::Rejected(Rejection::UnknownId(id))));
            }
            Err(error) => return Err(self.fail(format!("Failed to delete ID {id}"), error.into())),
        }

        if let Err(source) = self.send(writer, Verb::Delete, Some(id)) {
            return Err(self.fail(
                format!("Failed to send delete command for ID {id}"),
                SensorError::Write {
                    verb: Verb::Delete,
                    source,
                },
            ));
        }
        Ok(self.conclude(CommandOutcome::Confirmed(Confirmation::Dispatched { id })))
    }

    /// Discards lines that arrived since the last flush, then writes the
    /// command. Nothing drained here may confirm a record.
    fn send(
        &self,
        writer: &mut dyn LineWriter,
        verb: Verb,
        id: Option<FingerprintId>,
    ) -> Result<(), LinkError> {
        let discarded = self.journal.drain_pending();
        if !discarded.is_empty() {
            debug!(
                target: DISPATCH_TARGET,
                count = discarded.len(),
                "discarding lines that arrived during validation"
            );
        }
        writer.write_line(&encode_command(verb, id))
    }

    /// Drops unclaimed lines so a late reply to an earlier command cannot
    /// satisfy this one. Late enroll confirmations still mark their record
    /// confirmed; this runs before the command adds or removes any record.
    fn apply_stale(&self) {
        let stale = self.journal.drain_pending();
        if stale.is_empty() {
            return;
        }
        debug!(
            target: DISPATCH_TARGET,
            count = stale.len(),
            "discarding unclaimed lines before dispatch"
        );
        for id in stale.iter().filter_map(parse_enroll_confirmation) {
            match self.records.confirm(id) {
                Ok(true) => info!(
                    target: DISPATCH_TARGET,
                    %id,
                    "late enrollment confirmation applied"
                ),
                Ok(false) => {}
                Err(error) => warn!(
                    target: DISPATCH_TARGET,
                    %id,
                    error = %error,
                    "failed to apply late enrollment confirmation"
                ),
            }
        }
    }

    fn conclude(&self, outcome: CommandOutcome) -> CommandOutcome {
        let message = outcome.message();
        info!(
            target: DISPATCH_TARGET,
            accepted = outcome.accepted(),
            message = %message,
            "command finished"
        );
        self.journal.record_status(message);
        outcome
    }

    fn fail(&self, message: String, error: SensorError) -> SensorError {
        warn!(
            target: DISPATCH_TARGET,
            error = %error,
            message = %message,
            "command failed"
        );
        self.journal.record_status(message);
        error
    }
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("CommandDispatcher")
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn parse_id(raw: &str) -> Result<FingerprintId, Rejection> {
    raw.parse()
        .map_err(|_| Rejection::InvalidId(raw.to_owned()))
}

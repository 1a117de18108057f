//! Results of a single command invocation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::line::Line;
use crate::protocol::{FingerprintId, Verb};

/// Name reported for a matched slot with no enrolled record.
pub const UNKNOWN_NAME: &str = "Unknown";

/// What happened to one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The sensor produced the expected response (or none was required).
    Confirmed(Confirmation),
    /// The request was refused before the sensor was contacted.
    Rejected(Rejection),
    /// No matching response arrived in time.
    TimedOut {
        /// Command that went unanswered.
        verb: Verb,
        /// How long the dispatcher waited.
        waited: Duration,
    },
}

/// Payload of a confirmed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// The sensor stored the template for `id`.
    Enrolled {
        /// Enrolled slot.
        id: FingerprintId,
        /// Response that confirmed it.
        line: Line,
    },
    /// The sensor matched a slot.
    Matched {
        /// Slot number as reported by the sensor.
        slot: String,
        /// Name from the record store, or [`UNKNOWN_NAME`].
        name: String,
        /// Response carrying the match.
        line: Line,
    },
    /// The sensor found no matching template.
    NoMatch {
        /// Response carrying the verdict.
        line: Line,
    },
    /// A delete was sent; the firmware does not acknowledge deletes.
    Dispatched {
        /// Slot the delete targeted.
        id: FingerprintId,
    },
}

/// Reason a command was refused, or could not be recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// A required id or name was absent.
    MissingFields,
    /// The id was not a valid slot number.
    InvalidId(String),
    /// Enrollment targeted a slot that is already recorded.
    DuplicateId(FingerprintId),
    /// Delete targeted a slot with no record.
    UnknownId(FingerprintId),
    /// The sensor confirmed an enrollment whose record was deleted while
    /// the confirmation was awaited.
    Withdrawn(FingerprintId),
}

impl Rejection {
    /// Human-readable description.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::MissingFields => "Missing ID or name".to_owned(),
            Self::InvalidId(raw) => format!("Invalid ID '{raw}'"),
            Self::DuplicateId(id) => format!("ID {id} already exists"),
            Self::UnknownId(id) => format!("ID {id} not found"),
            Self::Withdrawn(id) => format!("ID {id} was deleted before enrollment completed"),
        }
    }
}

impl CommandOutcome {
    /// Whether the caller's request was carried out.
    #[must_use]
    pub const fn accepted(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }

    /// Human-readable summary, also written to the log as the status line.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Confirmed(Confirmation::Enrolled { id, .. }) => {
                format!("Enrolled ID {id} successfully")
            }
            Self::Confirmed(Confirmation::Matched { slot, name, .. }) => {
                format!("Match found: ID {slot} ({name})")
            }
            Self::Confirmed(Confirmation::NoMatch { .. }) => "No match found".to_owned(),
            Self::Confirmed(Confirmation::Dispatched { id }) => {
                format!("Deleted ID {id}")
            }
            Self::Rejected(rejection) => rejection.message(),
            Self::TimedOut {
                verb: Verb::Enroll, ..
            } => "Enrollment timed out".to_owned(),
            Self::TimedOut {
                verb: Verb::Search, ..
            } => "Search timed out".to_owned(),
            Self::TimedOut { verb, .. } => format!("{verb} timed out"),
        }
    }

    /// Reply returned to API callers.
    #[must_use]
    pub fn reply(&self) -> OperationReply {
        OperationReply {
            accepted: self.accepted(),
            message: self.message(),
        }
    }
}

/// Caller-facing summary of an invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationReply {
    /// Whether the command was carried out.
    pub accepted: bool,
    /// Summary suitable for display.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn id(raw: u16) -> FingerprintId {
        FingerprintId::new(raw).expect("non-zero id")
    }

    #[rstest]
    #[case(CommandOutcome::Rejected(Rejection::DuplicateId(id(3))), false, "ID 3 already exists")]
    #[case(CommandOutcome::TimedOut { verb: Verb::Search, waited: Duration::from_secs(3) }, false, "Search timed out")]
    #[case(CommandOutcome::Confirmed(Confirmation::Dispatched { id: id(9) }), true, "Deleted ID 9")]
    #[case(CommandOutcome::Rejected(Rejection::Withdrawn(id(4))), false, "ID 4 was deleted before enrollment completed")]
    fn summarises_outcomes(
        #[case] outcome: CommandOutcome,
        #[case] accepted: bool,
        #[case] message: &str,
    ) {
        let reply = outcome.reply();
        assert_eq!(reply.accepted, accepted);
        assert_eq!(reply.message, message);
    }

    #[rstest]
    fn enrollment_timeout_is_distinct_from_search_timeout() {
        let enroll = CommandOutcome::TimedOut {
            verb: Verb::Enroll,
            waited: Duration::from_secs(5),
        };
        let search = CommandOutcome::TimedOut {
            verb: Verb::Search,
            waited: Duration::from_secs(3),
        };
        assert_ne!(enroll.message(), search.message());
    }
}

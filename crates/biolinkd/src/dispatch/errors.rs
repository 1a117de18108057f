//! Error types for request dispatch failures.

use std::io;

use thiserror::Error;

use biolink_sensor::{RecordError, SensorError};

/// Errors surfaced while reading, parsing or serving a control request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request line was not valid JSON.
    #[error("malformed JSONL: {message}")]
    MalformedJsonl {
        /// Parser diagnostic.
        message: String,
        /// Underlying parser error, when there is one.
        #[source]
        source: Option<serde_json::Error>,
    },
    /// The request lacked a usable `operation` field.
    #[error("invalid request structure: {message}")]
    InvalidStructure {
        /// What was wrong with the envelope.
        message: String,
    },
    /// The `operation` field named nothing the daemon serves.
    #[error("unknown operation '{operation}'")]
    UnknownOperation {
        /// Operation as sent.
        operation: String,
    },
    /// The operation was known but its arguments were not.
    #[error("invalid arguments: {message}")]
    InvalidArguments {
        /// What was wrong with the arguments.
        message: String,
    },
    /// The request line exceeded the size limit.
    #[error("request too large: {size} bytes exceeds {max_size} byte limit")]
    RequestTooLarge {
        /// Bytes read before giving up.
        size: usize,
        /// Configured limit.
        max_size: usize,
    },
    /// The sensor link failed while serving the request.
    #[error("sensor error: {0}")]
    Sensor(#[from] SensorError),
    /// The identity records could not be updated.
    #[error("record store error: {0}")]
    Records(#[from] RecordError),
    /// Reading the request or writing the reply failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// The reply could not be serialised.
    #[error("failed to serialize reply: {0}")]
    SerializeReply(#[source] serde_json::Error),
}

impl DispatchError {
    /// Status reported to the client: `1` for caller mistakes, `2` for daemon
    /// failures.
    #[must_use]
    pub const fn exit_status(&self) -> i32 {
        match self {
            Self::MalformedJsonl { .. }
            | Self::InvalidStructure { .. }
            | Self::UnknownOperation { .. }
            | Self::InvalidArguments { .. }
            | Self::RequestTooLarge { .. } => 1,
            Self::Sensor(_) | Self::Records(_) | Self::Io(_) | Self::SerializeReply(_) => 2,
        }
    }

    /// Wraps a JSON syntax error.
    #[must_use]
    pub fn from_json_error(source: serde_json::Error) -> Self {
        Self::MalformedJsonl {
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// A malformed-request error with a custom message.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedJsonl {
            message: message.into(),
            source: None,
        }
    }

    /// An envelope error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// An unknown operation error.
    pub fn unknown_operation(operation: impl Into<String>) -> Self {
        Self::UnknownOperation {
            operation: operation.into(),
        }
    }

    /// An argument error.
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            message: message.into(),
        }
    }
}

//! Request parsing for the control protocol.

use serde::Deserialize;
use serde_json::Value;

use super::errors::DispatchError;

/// Operations served by the daemon, as spelled on the wire.
pub(crate) const OPERATIONS: [&str; 10] = [
    "invoke",
    "enroll",
    "search",
    "delete",
    "log",
    "clear-log",
    "list-records",
    "rename-record",
    "delete-record",
    "status",
];

/// One parsed control request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "operation", rename_all = "kebab-case")]
pub(crate) enum ControlRequest {
    /// Runs a sensor command chosen by verb name or wire code.
    Invoke {
        verb: Scalar,
        #[serde(default)]
        id: Option<Scalar>,
        #[serde(default)]
        name: Option<String>,
    },
    /// Shorthand for `invoke` with the enroll verb.
    Enroll {
        #[serde(default)]
        id: Option<Scalar>,
        #[serde(default)]
        name: Option<String>,
    },
    /// Shorthand for `invoke` with the search verb.
    Search,
    /// Shorthand for `invoke` with the delete verb.
    Delete {
        #[serde(default)]
        id: Option<Scalar>,
    },
    /// Reads the newest log entries; all of them when `limit` is absent.
    Log {
        #[serde(default)]
        limit: Option<usize>,
    },
    /// Empties the log.
    ClearLog,
    /// Lists enrolled identities.
    ListRecords,
    /// Renames a host record.
    RenameRecord { id: Scalar, name: String },
    /// Forgets a host record without contacting the sensor.
    DeleteRecord { id: Scalar },
    /// Reports the depth of the log and the pending queue.
    Status,
}

/// A string or number argument; ids and verbs are accepted in either form.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub(crate) enum Scalar {
    Number(i64),
    Text(String),
}

impl Scalar {
    pub(crate) fn into_text(self) -> String {
        match self {
            Self::Number(number) => number.to_string(),
            Self::Text(text) => text,
        }
    }
}

impl ControlRequest {
    /// Parses one JSONL request line.
    ///
    /// Trailing whitespace, including the newline delimiter, is ignored.
    pub(crate) fn parse(line: &[u8]) -> Result<Self, DispatchError> {
        let trimmed = line.trim_ascii_end();
        if trimmed.is_empty() {
            return Err(DispatchError::malformed("empty request line"));
        }
        let value: Value = serde_json::from_slice(trimmed).map_err(DispatchError::from_json_error)?;
        let operation = match value.get("operation") {
            Some(Value::String(operation)) if !operation.trim().is_empty() => {
                operation.trim().to_owned()
            }
            Some(Value::String(_)) => {
                return Err(DispatchError::invalid_structure("operation field is empty"));
            }
            Some(_) => {
                return Err(DispatchError::invalid_structure(
                    "operation field must be a string",
                ));
            }
            None => return Err(DispatchError::invalid_structure("missing operation field")),
        };
        if !OPERATIONS.contains(&operation.as_str()) {
            return Err(DispatchError::unknown_operation(operation));
        }
        let normalised = with_operation(value, &operation);
        serde_json::from_value(normalised)
            .map_err(|error| DispatchError::invalid_arguments(format!("{operation}: {error}")))
    }
}

fn with_operation(mut value: Value, operation: &str) -> Value {
    if let Some(object) = value.as_object_mut() {
        object.insert("operation".to_owned(), Value::String(operation.to_owned()));
    }
    value
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn text(value: &str) -> Scalar {
        Scalar::Text(value.to_owned())
    }

    #[rstest]
    #[case(br#"{"operation":"search"}"#.as_slice(), ControlRequest::Search)]
    #[case(br#"{"operation":"clear-log"}"#.as_slice(), ControlRequest::ClearLog)]
    #[case(br#"{"operation":"list-records"}"#.as_slice(), ControlRequest::ListRecords)]
    #[case(br#"{"operation":"log"}"#.as_slice(), ControlRequest::Log { limit: None })]
    #[case(br#"{"operation":"log","limit":5}"#.as_slice(), ControlRequest::Log { limit: Some(5) })]
    #[case(
        br#"{"operation":"enroll","id":7,"name":"Ada"}"#.as_slice(),
        ControlRequest::Enroll { id: Some(Scalar::Number(7)), name: Some("Ada".to_owned()) }
    )]
    #[case(
        br#"{"operation":"invoke","verb":"1","id":"7"}"#.as_slice(),
        ControlRequest::Invoke { verb: text("1"), id: Some(text("7")), name: None }
    )]
    #[case(
        br#"{"operation":"rename-record","id":3,"name":"Grace"}"#.as_slice(),
        ControlRequest::RenameRecord { id: Scalar::Number(3), name: "Grace".to_owned() }
    )]
    #[case(
        b"{\"operation\":\" delete \",\"id\":\"4\"}  \n".as_slice(),
        ControlRequest::Delete { id: Some(text("4")) }
    )]
    fn parses_known_operations(#[case] line: &[u8], #[case] expected: ControlRequest) {
        assert_eq!(ControlRequest::parse(line).expect("request parses"), expected);
    }

    #[rstest]
    fn enroll_without_fields_still_parses() {
        let request = ControlRequest::parse(br#"{"operation":"enroll"}"#).expect("parses");
        assert_eq!(request, ControlRequest::Enroll { id: None, name: None });
    }

    #[rstest]
    #[case(b"".as_slice())]
    #[case(b"   \n".as_slice())]
    #[case(b"not json".as_slice())]
    fn rejects_malformed_lines(#[case] line: &[u8]) {
        assert!(matches!(
            ControlRequest::parse(line),
            Err(DispatchError::MalformedJsonl { .. })
        ));
    }

    #[rstest]
    #[case(br#"{"id":7}"#.as_slice())]
    #[case(br#"{"operation":""}"#.as_slice())]
    #[case(br#"{"operation":3}"#.as_slice())]
    fn rejects_missing_or_blank_operation(#[case] line: &[u8]) {
        assert!(matches!(
            ControlRequest::parse(line),
            Err(DispatchError::InvalidStructure { .. })
        ));
    }

    #[rstest]
    fn rejects_unknown_operation() {
        let error = ControlRequest::parse(br#"{"operation":"reboot"}"#).expect_err("unknown");
        assert!(matches!(
            error,
            DispatchError::UnknownOperation { ref operation } if operation == "reboot"
        ));
    }

    #[rstest]
    fn rejects_mistyped_arguments() {
        let error =
            ControlRequest::parse(br#"{"operation":"rename-record","id":3}"#).expect_err("no name");
        assert!(matches!(error, DispatchError::InvalidArguments { .. }));
    }
}

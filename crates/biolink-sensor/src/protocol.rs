//! Wire vocabulary of the sensor firmware.
//!
//! Commands are a single ASCII verb code, optionally followed by a comma and
//! a slot id, terminated by a newline. Responses are free text; only the
//! three phrases below carry meaning for correlation.

use std::fmt;
use std::num::NonZeroU16;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::line::Line;

const ENROLL_SUCCESS_PREFIX: &str = "Fingerprint ID #";
const ENROLL_SUCCESS_SUFFIX: &str = " stored successfully";
const MATCH_FOUND: &str = "Match found! ID: ";
const NO_MATCH: &str = "No match found";

/// Operation the sensor can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    /// Capture a new fingerprint into a slot.
    Enroll,
    /// Identify the finger on the sensor.
    Search,
    /// Erase a slot.
    Delete,
}

impl Verb {
    /// Numeric code sent on the wire.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Enroll => 1,
            Self::Search => 2,
            Self::Delete => 3,
        }
    }

    /// Lower-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enroll => "enroll",
            Self::Search => "search",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = ProtocolError;

    /// Accepts either the wire code (`"1"`) or the name (`"enroll"`).
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "1" | "enroll" => Ok(Self::Enroll),
            "2" | "search" => Ok(Self::Search),
            "3" | "delete" => Ok(Self::Delete),
            _ => Err(ProtocolError::UnknownVerb(input.to_owned())),
        }
    }
}

/// Sensor slot number; zero is not a valid slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct FingerprintId(NonZeroU16);

impl FingerprintId {
    /// Wraps a raw slot number, rejecting zero.
    #[must_use]
    pub fn new(raw: u16) -> Option<Self> {
        NonZeroU16::new(raw).map(Self)
    }

    /// Raw slot number.
    #[must_use]
    pub const fn get(self) -> u16 {
        self.0.get()
    }
}

impl fmt::Display for FingerprintId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl FromStr for FingerprintId {
    type Err = ProtocolError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        input
            .trim()
            .parse::<u16>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| ProtocolError::InvalidId(input.to_owned()))
    }
}

impl TryFrom<u16> for FingerprintId {
    type Error = ProtocolError;

    fn try_from(raw: u16) -> Result<Self, Self::Error> {
        Self::new(raw).ok_or_else(|| ProtocolError::InvalidId(raw.to_string()))
    }
}

impl From<FingerprintId> for u16 {
    fn from(id: FingerprintId) -> Self {
        id.get()
    }
}

/// Errors raised while interpreting verbs and ids.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The verb was neither a known code nor a known name.
    #[error("unknown command '{0}'")]
    UnknownVerb(String),
    /// The id was not a slot number in `1..=65535`.
    #[error("invalid id '{0}'")]
    InvalidId(String),
}

/// Encodes a command for the wire.
#[must_use]
pub fn encode_command(verb: Verb, id: Option<FingerprintId>) -> Vec<u8> {
    match id {
        Some(id) => format!("{},{}\n", verb.code(), id).into_bytes(),
        None => format!("{}\n", verb.code()).into_bytes(),
    }
}

/// Whether `line` confirms that `id` was enrolled.
#[must_use]
pub fn is_enroll_confirmation(line: &Line, id: FingerprintId) -> bool {
    let needle = format!("{ENROLL_SUCCESS_PREFIX}{id}{ENROLL_SUCCESS_SUFFIX}");
    line.text().contains(&needle)
}

/// Slot named by an enroll confirmation, if `line` is one.
#[must_use]
pub fn parse_enroll_confirmation(line: &Line) -> Option<FingerprintId> {
    let text = line.text();
    let start = text.find(ENROLL_SUCCESS_PREFIX)?;
    let tail = text.get(start.saturating_add(ENROLL_SUCCESS_PREFIX.len())..)?;
    let digits: String = tail.chars().take_while(char::is_ascii_digit).collect();
    let rest = tail.get(digits.len()..)?;
    if !rest.starts_with(ENROLL_SUCCESS_SUFFIX) {
        return None;
    }
    digits.parse().ok().and_then(FingerprintId::new)
}

/// Verdict carried by a search response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchVerdict {
    /// The sensor matched a slot; the number is kept as reported, without
    /// leading zeros, since it need not fit a valid slot id.
    Match(String),
    /// The sensor found no matching template.
    NoMatch,
}

/// Parses a search response, returning `None` for unrelated lines.
#[must_use]
pub fn parse_search_verdict(line: &Line) -> Option<SearchVerdict> {
    let text = line.text();
    if let Some(start) = text.find(MATCH_FOUND) {
        let tail = text.get(start.saturating_add(MATCH_FOUND.len())..)?;
        let digits: String = tail.chars().take_while(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return None;
        }
        let trimmed = digits.trim_start_matches('0');
        let slot = if trimmed.is_empty() { "0" } else { trimmed };
        return Some(SearchVerdict::Match(slot.to_owned()));
    }
    text.contains(NO_MATCH).then_some(SearchVerdict::NoMatch)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn id(raw: u16) -> FingerprintId {
        FingerprintId::new(raw).expect("non-zero id")
    }

    #[rstest]
    #[case(Verb::Enroll, Some(7), "1,7\n")]
    #[case(Verb::Search, None, "2\n")]
    #[case(Verb::Delete, Some(12), "3,12\n")]
    fn encodes_commands(#[case] verb: Verb, #[case] raw: Option<u16>, #[case] expected: &str) {
        let encoded = encode_command(verb, raw.map(id));
        assert_eq!(encoded, expected.as_bytes());
    }

    #[rstest]
    #[case("1", Verb::Enroll)]
    #[case("search", Verb::Search)]
    #[case(" DELETE ", Verb::Delete)]
    fn parses_verbs(#[case] input: &str, #[case] expected: Verb) {
        assert_eq!(input.parse::<Verb>(), Ok(expected));
    }

    #[rstest]
    #[case("0")]
    #[case("-1")]
    #[case("70000")]
    #[case("seven")]
    #[case("")]
    fn rejects_invalid_ids(#[case] input: &str) {
        assert!(input.parse::<FingerprintId>().is_err());
    }

    #[rstest]
    fn enroll_confirmation_requires_exact_id() {
        let line = Line::now("Fingerprint ID #12 stored successfully!");
        assert!(is_enroll_confirmation(&line, id(12)));
        assert!(!is_enroll_confirmation(&line, id(1)));
    }

    #[rstest]
    #[case("Fingerprint ID #12 stored successfully!", Some(12))]
    #[case("Fingerprint ID #0 stored successfully", None)]
    #[case("Fingerprint ID #12 removed", None)]
    #[case("Place finger", None)]
    fn extracts_enrolled_slot(#[case] text: &str, #[case] expected: Option<u16>) {
        let parsed = parse_enroll_confirmation(&Line::now(text)).map(FingerprintId::get);
        assert_eq!(parsed, expected);
    }

    #[rstest]
    #[case("Match found! ID: 4", Some("4"))]
    #[case(">> Match found! ID: 15 (confidence 88)", Some("15"))]
    #[case("Match found! ID: 70000", Some("70000"))]
    #[case("Match found! ID: 007", Some("7"))]
    #[case("Match found! ID: 0", Some("0"))]
    #[case("Match found! ID: ", None)]
    #[case("Place finger", None)]
    fn parses_search_matches(#[case] text: &str, #[case] expected: Option<&str>) {
        let expected = expected.map(|slot| SearchVerdict::Match(slot.to_owned()));
        assert_eq!(parse_search_verdict(&Line::now(text)), expected);
    }

    #[rstest]
    fn parses_search_misses() {
        assert_eq!(
            parse_search_verdict(&Line::now("No match found")),
            Some(SearchVerdict::NoMatch)
        );
    }
}

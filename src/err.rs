//! This is the module that contains the error types used in `auditrec`
//!
//! There is one main type:
//! * [`ParseError`] - error raised while parsing a record preamble,
//!   body, hex run, or socket address.
//!
//! # Design decisions
//! Pool exhaustion is deliberately not an error: allocation returns
//! [`None`] and the collector drops the record, so the only error type
//! in the crate covers malformed input. [`ParseError`] implements
//! [`std::error::Error`] so that it composes with [`Result`] and `?`
//! in consumer code.

use std::{
    error::Error,
    fmt::{self, Display},
};

/// Error raised when a record or one of its fields cannot be parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// The `audit(<sec>.<ms>:<serial>): ` prefix is missing or
    /// malformed; the record is dropped.
    BadPreamble,
    /// The record body ended in the middle of a `key=value` pair.
    /// Fields scanned before the error are retained.
    BadField,
    /// A hex-encoded value was shorter than one encoded byte or had
    /// an odd number of digits.
    BadHexLength,
    /// A `saddr` value was too short for its address family.
    BadSockAddr,
    /// A `saddr` value carried an address family this library does
    /// not decode.
    UnknownFamily(u8),
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::BadPreamble => write!(f, "Malformed audit record preamble"),
            ParseError::BadField => write!(f, "Record body ended inside a key=value pair"),
            ParseError::BadHexLength => {
                write!(f, "Hex-encoded value has odd or insufficient length")
            }
            ParseError::BadSockAddr => write!(f, "saddr value too short for its address family"),
            ParseError::UnknownFamily(family) => {
                write!(f, "Unhandled socket address family {family}")
            }
        }
    }
}

impl Error for ParseError {}

//! Parsing of the fixed `audit(<sec>.<ms>:<serial>): ` record prefix.
//!
//! Every audit record starts with the same preamble; seconds and
//! milliseconds are fixed width, the serial is a variable-length
//! decimal run closed by `)`. The serial is what groups consecutive
//! records into one event, so this parse runs once per record on the
//! collector's hot path and borrows rather than copies.

use std::str::{self, FromStr};

use crate::err::ParseError;

/// Byte offset of the seconds digits.
const SECS: usize = 6;
/// Byte offset of the millisecond digits.
const MILLIS: usize = 17;
/// Byte offset at which the serial digits begin.
const SERIAL: usize = 21;

/// A parsed record preamble. The serial stays borrowed as a range of
/// the source message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Preamble {
    /// Event timestamp, whole seconds.
    pub tsec: u64,
    /// Event timestamp, millisecond part.
    pub tms: u32,
    /// Byte range of the serial digits within the message.
    pub serial: std::ops::Range<usize>,
    /// Total preamble length; the record body starts here.
    pub len: usize,
}

impl Preamble {
    /// Resolve the serial digits against the message the preamble was
    /// parsed from.
    pub fn serial_bytes<'a>(&self, msg: &'a [u8]) -> &'a [u8] {
        &msg[self.serial.clone()]
    }
}

fn decimal<T: FromStr>(bytes: &[u8]) -> Result<T, ParseError> {
    str::from_utf8(bytes)
        .map_err(|_| ParseError::BadPreamble)?
        .parse()
        .map_err(|_| ParseError::BadPreamble)
}

/// Parse and validate the preamble of `msg`.
///
/// Anchors checked: minimum length 24, `a` at offset 0, `(` at offset
/// 5, `:` at offset 20, a closing `)` after the serial followed by
/// `:`. Returns [`ParseError::BadPreamble`] when any anchor is
/// missing or a timestamp fails to parse as decimal. When the
/// trailing space after `): ` is absent the preamble length clamps to
/// the message length.
pub fn parse(msg: &[u8]) -> Result<Preamble, ParseError> {
    if msg.len() < 24 || msg[0] != b'a' || msg[5] != b'(' || msg[20] != b':' {
        return Err(ParseError::BadPreamble);
    }

    let rparen = SERIAL
        + msg[SERIAL..]
            .iter()
            .position(|&c| c == b')')
            .ok_or(ParseError::BadPreamble)?;
    if rparen + 1 < msg.len() && msg[rparen + 1] != b':' {
        return Err(ParseError::BadPreamble);
    }

    let tsec = decimal(&msg[SECS..SECS + 10])?;
    let tms = decimal(&msg[MILLIS..MILLIS + 3])?;

    Ok(Preamble {
        tsec,
        tms,
        serial: SERIAL..rparen,
        // "): " may be cut short when the body is empty
        len: (rparen + 3).min(msg.len()),
    })
}

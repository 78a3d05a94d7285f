/*!
 Errors that can happen when decoding tag-length-value receipt data.
*/

use std::{
    error::Error,
    fmt::{Display, Formatter, Result},
};

/// Errors that can happen when decoding a receipt payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A declared length runs past the end of the enclosing data: `(end, available)`
    Truncated(usize, usize),
    /// The length octets of a node cannot be used
    InvalidLength(String),
    /// A known field was encoded with the wrong form or tag: `(field, expected)`
    UnexpectedType(String, String),
    /// A known date field contains text that is not a valid date: `(field, text)`
    DateFormat(String, String),
    /// A required field is absent
    MissingRequiredField(String),
    /// Any other structural inconsistency
    Malformed(String),
}

impl Display for ParseError {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result {
        match self {
            ParseError::Truncated(end, len) => {
                write!(fmt, "Index {end:x} is outside of range {len:x}!")
            }
            ParseError::InvalidLength(why) => write!(fmt, "Invalid length encoding: {why}"),
            ParseError::UnexpectedType(field, expected) => {
                write!(fmt, "Field {field} is not encoded as {expected}")
            }
            ParseError::DateFormat(field, text) => {
                write!(fmt, "Field {field} contains an invalid date: {text:?}")
            }
            ParseError::MissingRequiredField(field) => {
                write!(fmt, "Required field {field} is missing")
            }
            ParseError::Malformed(why) => write!(fmt, "Malformed receipt data: {why}"),
        }
    }
}

impl Error for ParseError {}

/*!
 Errors that can happen when extracting the receipt payload from its `PKCS#7` container.
*/

use std::{
    error::Error,
    fmt::{Display, Formatter, Result},
};

use crate::error::asn1::ParseError;

/// Errors that can happen when extracting the receipt payload from its `PKCS#7` container
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// No `data` object identifier precedes a payload in the container
    DataObjectIdentifierMissing,
    /// The node after the `data` object identifier does not hold an octet string
    PayloadMissing,
    /// The container or the payload inside it failed to decode
    Container(ParseError),
}

impl Display for EnvelopeError {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result {
        match self {
            EnvelopeError::DataObjectIdentifierMissing => {
                write!(fmt, "No data object identifier found in container!")
            }
            EnvelopeError::PayloadMissing => {
                write!(fmt, "Data object identifier is not followed by a payload!")
            }
            EnvelopeError::Container(why) => write!(fmt, "{why}"),
        }
    }
}

impl Error for EnvelopeError {}

impl From<ParseError> for EnvelopeError {
    fn from(why: ParseError) -> Self {
        EnvelopeError::Container(why)
    }
}

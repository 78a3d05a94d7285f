/*!
Errors that can happen during the application's runtime
*/

use std::{
    fmt::{Display, Formatter, Result},
    io::Error as IoError,
    path::PathBuf,
};

use app_receipt::error::envelope::EnvelopeError;

use crate::app::options::OPTION_PAYLOAD_ONLY;

/// Errors that can happen during the application's runtime
#[derive(Debug)]
pub enum RuntimeError {
    InvalidOptions(String),
    CreateError(IoError, PathBuf),
    DiskError(IoError),
    InvalidEncoding(String),
    ReceiptError(EnvelopeError),
}

impl Display for RuntimeError {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result {
        match self {
            RuntimeError::InvalidOptions(why) => write!(fmt, "Invalid options!\n{why}"),
            RuntimeError::CreateError(why, path) => write!(fmt, "{why}: {path:?}"),
            RuntimeError::DiskError(why) => write!(fmt, "{why}"),
            RuntimeError::InvalidEncoding(why) => write!(fmt, "Unable to decode input: {why}"),
            RuntimeError::ReceiptError(why) => match why {
                EnvelopeError::DataObjectIdentifierMissing => write!(
                    fmt,
                    "{why}\nIf the file only contains the receipt payload, pass `--{OPTION_PAYLOAD_ONLY}`"
                ),
                _ => write!(fmt, "Unable to decode receipt: {why}"),
            },
        }
    }
}

impl From<EnvelopeError> for RuntimeError {
    fn from(why: EnvelopeError) -> Self {
        RuntimeError::ReceiptError(why)
    }
}

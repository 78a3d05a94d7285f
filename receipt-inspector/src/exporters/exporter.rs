use std::io::{BufWriter, Write};

use app_receipt::{receipt::in_app_purchase::InAppPurchaseReceipt, AppReceipt};

use crate::app::{error::RuntimeError, runtime::Config};

/// Defines behavior for writing a decoded receipt to a report
pub trait Exporter<'a> {
    /// Create a new exporter with references to the decoded receipt
    fn new(config: &'a Config) -> Result<Self, RuntimeError>
    where
        Self: Sized;
    /// Write the full report
    fn export(&mut self) -> Result<(), RuntimeError>;
}

/// Defines behavior for formatting receipt data to the desired output format
pub(super) trait Writer<'a, T> {
    /// Format the top level receipt fields
    fn format_receipt(&self, receipt: &'a AppReceipt) -> T;
    /// Format a single purchase
    fn format_purchase(&self, purchase: &'a InAppPurchaseReceipt) -> T;
    /// Format the results of the checks requested on the command line
    fn format_checks(&self) -> T;
    fn write_to_file(file: &mut BufWriter<Box<dyn Write>>, text: T) -> Result<(), RuntimeError>;
}

use std::{
    borrow::Cow,
    fs::{read, File},
    io::{stdout, BufWriter, Write},
};

use app_receipt::{
    error::envelope::EnvelopeError, receipt::in_app_purchase::InAppPurchaseReceipt, AppReceipt,
    ReceiptDecoder,
};
use base64::{prelude::BASE64_STANDARD, Engine};
use chrono::{DateTime, Utc};

use crate::{
    app::{
        error::RuntimeError,
        options::{ExportType, InputEncoding, Options},
    },
    Exporter, JSON, TXT,
};

/// Stores the application state and handles application lifecycle
pub struct Config {
    /// App configuration options
    pub options: Options,
    /// The decoded receipt
    pub receipt: AppReceipt,
    /// Instant active purchases are evaluated at
    pub now: DateTime<Utc>,
}

impl Config {
    /// Create a new instance of the application
    ///
    /// # Example:
    ///
    /// ```no_run
    /// use crate::app::{
    ///    options::{from_command_line, Options},
    ///    runtime::Config,
    /// };
    ///
    /// let args = from_command_line();
    /// let options = Options::from_args(&args).unwrap();
    /// let app = Config::new(options).unwrap();
    /// ```
    pub fn new(options: Options) -> Result<Config, RuntimeError> {
        eprintln!("Reading {}...", options.receipt_path.display());
        let contents = read(&options.receipt_path).map_err(RuntimeError::DiskError)?;
        tracing::debug!(bytes = contents.len(), "read receipt file");

        let data = decode_input(&contents, options.encoding)?;
        let receipt = parse_receipt(&ReceiptDecoder::new(), &data, options.payload_only)?;
        tracing::info!(
            bundle_id = %receipt.bundle_id,
            purchases = receipt.in_app_purchases.len(),
            "decoded receipt"
        );

        let now = options.now.unwrap_or_else(Utc::now);
        Ok(Config {
            options,
            receipt,
            now,
        })
    }

    /// Whether the receipt hash matches the device identifier, if one was provided
    pub fn hash_is_valid(&self) -> Option<bool> {
        let device_id = self.options.device_id?;
        let valid = self.receipt.validate_hash(device_id.as_bytes());
        if valid {
            tracing::info!(%device_id, "receipt hash is valid");
        } else {
            tracing::warn!(%device_id, "receipt hash does not match device identifier");
        }
        Some(valid)
    }

    /// Whether the receipt grants an active purchase of the requested product, if one was provided
    pub fn product_is_active(&self) -> Option<(&str, bool)> {
        let product = self.options.product.as_deref()?;
        Some((
            product,
            self.receipt.contains_active_purchase(product, &self.now),
        ))
    }

    pub fn most_recent_active_subscription(&self) -> Option<&InAppPurchaseReceipt> {
        self.receipt.most_recent_active_subscription(&self.now)
    }

    /// Get the destination the report is written to
    pub fn output(&self) -> Result<BufWriter<Box<dyn Write>>, RuntimeError> {
        match &self.options.export_path {
            Some(path) => {
                let file = File::create(path)
                    .map_err(|err| RuntimeError::CreateError(err, path.clone()))?;
                tracing::info!(path = %path.display(), "writing report");
                Ok(BufWriter::new(Box::new(file)))
            }
            None => Ok(BufWriter::new(Box::new(stdout()))),
        }
    }

    /// Write the report in the requested format
    pub fn start(&self) -> Result<(), RuntimeError> {
        match self.options.export_type {
            ExportType::Txt => TXT::new(self)?.export()?,
            ExportType::Json => JSON::new(self)?.export()?,
        }
        if let Some(path) = &self.options.export_path {
            eprintln!("Done! Report written to {}", path.display());
        }
        Ok(())
    }
}

/// Turn the file contents into receipt bytes
fn decode_input(contents: &[u8], encoding: InputEncoding) -> Result<Cow<'_, [u8]>, RuntimeError> {
    match encoding {
        InputEncoding::Der => Ok(Cow::Borrowed(contents)),
        InputEncoding::Base64 => decode_base64(contents)
            .map(Cow::Owned)
            .map_err(RuntimeError::InvalidEncoding),
        InputEncoding::Auto => match decode_base64(contents) {
            Ok(decoded) => {
                tracing::debug!("detected base64 input");
                Ok(Cow::Owned(decoded))
            }
            Err(why) => {
                tracing::debug!(%why, "input is not base64, reading as binary");
                Ok(Cow::Borrowed(contents))
            }
        },
    }
}

fn decode_base64(contents: &[u8]) -> Result<Vec<u8>, String> {
    let text: Vec<u8> = contents
        .iter()
        .copied()
        .filter(|byte| !byte.is_ascii_whitespace())
        .collect();
    if text.is_empty() {
        return Err("file is empty".to_string());
    }
    BASE64_STANDARD
        .decode(text)
        .map_err(|why| why.to_string())
}

/// Decode the receipt, falling back to a bare payload when the container has no `data` content
fn parse_receipt(
    decoder: &ReceiptDecoder,
    data: &[u8],
    payload_only: bool,
) -> Result<AppReceipt, RuntimeError> {
    if payload_only {
        return decoder
            .parse(data)
            .map_err(|why| RuntimeError::ReceiptError(EnvelopeError::from(why)));
    }

    match decoder.parse_envelope(data) {
        Ok(receipt) => Ok(receipt),
        Err(EnvelopeError::DataObjectIdentifierMissing) => {
            tracing::warn!("no PKCS#7 data content found, trying to read a bare payload");
            decoder.parse(data).map_err(|why| {
                tracing::error!(%why, "unable to read bare payload");
                RuntimeError::ReceiptError(EnvelopeError::Container(why))
            })
        }
        Err(why) => {
            tracing::error!(%why, "unable to decode receipt");
            Err(RuntimeError::ReceiptError(why))
        }
    }
}

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};

use app_receipt::util::dates::parse_receipt_date;
use chrono::{DateTime, Utc};
use clap::{crate_version, Arg, ArgAction, ArgMatches, Command};
use uuid::Uuid;

use crate::app::error::RuntimeError;

/// Default export type
pub const DEFAULT_EXPORT_TYPE: ExportType = ExportType::Txt;

// CLI Arg Names
pub const OPTION_RECEIPT_PATH: &str = "receipt-path";
pub const OPTION_ENCODING: &str = "encoding";
pub const OPTION_FORMAT: &str = "format";
pub const OPTION_EXPORT_PATH: &str = "export-path";
pub const OPTION_PAYLOAD_ONLY: &str = "payload-only";
pub const OPTION_DEVICE_ID: &str = "device-id";
pub const OPTION_PRODUCT: &str = "product";
pub const OPTION_NOW: &str = "now";

// Other CLI Text
pub const SUPPORTED_FILE_TYPES: &str = "txt, json";
pub const SUPPORTED_ENCODINGS: &str = "der, base64, auto";
pub const ABOUT: &str = concat!(
    "The `receipt-inspector` binary decodes App Store receipts and\n",
    "reports the purchases they contain, optionally checking the\n",
    "receipt hash and whether a product is still active.\n\n",
    "The receipt signature is not verified."
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Represents the format of the generated report
pub enum ExportType {
    /// Plain text
    Txt,
    /// JSON document
    Json,
}

impl ExportType {
    /// Given user's input, return a variant if the input matches one
    pub fn from_cli(export_type: &str) -> Option<Self> {
        match export_type.to_lowercase().as_str() {
            "txt" => Some(Self::Txt),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl Display for ExportType {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            ExportType::Txt => write!(fmt, "txt"),
            ExportType::Json => write!(fmt, "json"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Represents how the receipt file is stored on disk
pub enum InputEncoding {
    /// Binary, as found in the app bundle
    Der,
    /// Base64 text, as sent to a validation server
    Base64,
    /// Detect from the file contents
    Auto,
}

impl InputEncoding {
    /// Given user's input, return a variant if the input matches one
    pub fn from_cli(encoding: &str) -> Option<Self> {
        match encoding.to_lowercase().as_str() {
            "der" => Some(Self::Der),
            "base64" => Some(Self::Base64),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Options {
    /// Path to the receipt file
    pub receipt_path: PathBuf,
    /// How the receipt file is encoded
    pub encoding: InputEncoding,
    /// The format of the generated report
    pub export_type: ExportType,
    /// Where the report is written; standard output if `None`
    pub export_path: Option<PathBuf>,
    /// If true, the file holds the receipt payload without its `PKCS#7` container
    pub payload_only: bool,
    /// Device identifier used to validate the receipt hash
    pub device_id: Option<Uuid>,
    /// Product to check for an active purchase
    pub product: Option<String>,
    /// Instant active purchases are evaluated at; the current time if `None`
    pub now: Option<DateTime<Utc>>,
}

impl Options {
    pub fn from_args(args: &ArgMatches) -> Result<Self, RuntimeError> {
        let receipt_path: Option<&String> = args.get_one(OPTION_RECEIPT_PATH);
        let encoding: Option<&String> = args.get_one(OPTION_ENCODING);
        let export_type: Option<&String> = args.get_one(OPTION_FORMAT);
        let export_path: Option<&String> = args.get_one(OPTION_EXPORT_PATH);
        let payload_only = args.get_flag(OPTION_PAYLOAD_ONLY);
        let device_id: Option<&String> = args.get_one(OPTION_DEVICE_ID);
        let product: Option<&String> = args.get_one(OPTION_PRODUCT);
        let now: Option<&String> = args.get_one(OPTION_NOW);

        // Ensure a receipt was provided
        let receipt_path = match receipt_path {
            Some(path) => PathBuf::from(path),
            None => {
                return Err(RuntimeError::InvalidOptions(format!(
                    "Option --{OPTION_RECEIPT_PATH} is required"
                )))
            }
        };

        // Ensure the encoding is valid
        let encoding = match encoding {
            Some(encoding) => InputEncoding::from_cli(encoding).ok_or_else(|| {
                RuntimeError::InvalidOptions(format!(
                    "{encoding} is not a valid encoding! Must be one of <{SUPPORTED_ENCODINGS}>"
                ))
            })?,
            None => InputEncoding::Auto,
        };

        // Ensure the export type is valid
        let export_type = match export_type {
            Some(export_type) => ExportType::from_cli(export_type).ok_or_else(|| {
                RuntimeError::InvalidOptions(format!(
                    "{export_type} is not a valid export type! Must be one of <{SUPPORTED_FILE_TYPES}>"
                ))
            })?,
            None => DEFAULT_EXPORT_TYPE,
        };

        // Ensure the device identifier is a UUID
        let device_id = match device_id {
            Some(device_id) => Some(Uuid::parse_str(device_id).map_err(|why| {
                RuntimeError::InvalidOptions(format!(
                    "--{OPTION_DEVICE_ID} {device_id} is not a valid UUID: {why}"
                ))
            })?),
            None => None,
        };

        // Ensure the evaluation instant is a valid date
        let now = match now {
            Some(now) => match parse_receipt_date(now) {
                Ok(Some(date)) => Some(date),
                _ => {
                    return Err(RuntimeError::InvalidOptions(format!(
                        "--{OPTION_NOW} {now} is not a valid RFC 3339 date, for example 2020-07-22T17:39:08Z"
                    )))
                }
            },
            None => None,
        };

        Ok(Options {
            receipt_path,
            encoding,
            export_type,
            export_path: export_path.map(PathBuf::from),
            payload_only,
            device_id,
            product: product.cloned(),
            now,
        })
    }
}

/// Build the command line interface
pub fn get_command() -> Command {
    Command::new("Receipt Inspector")
        .version(crate_version!())
        .about(ABOUT)
        .arg_required_else_help(true)
        .arg(
            Arg::new(OPTION_RECEIPT_PATH)
                .short('f')
                .long(OPTION_RECEIPT_PATH)
                .help("Specify the receipt file to decode\n")
                .display_order(0)
                .value_name("path/to/receipt"),
        )
        .arg(
            Arg::new(OPTION_ENCODING)
                .short('e')
                .long(OPTION_ENCODING)
                .help("Specify how the receipt file is encoded\nIf omitted, the encoding is detected from the file contents\n")
                .display_order(1)
                .value_name(SUPPORTED_ENCODINGS),
        )
        .arg(
            Arg::new(OPTION_FORMAT)
                .short('o')
                .long(OPTION_FORMAT)
                .help(format!("Specify the report format\nIf omitted, the report is written as {DEFAULT_EXPORT_TYPE}\n"))
                .display_order(2)
                .value_name(SUPPORTED_FILE_TYPES),
        )
        .arg(
            Arg::new(OPTION_EXPORT_PATH)
                .short('x')
                .long(OPTION_EXPORT_PATH)
                .help("Specify a file to write the report to\nIf omitted, the report is written to standard output\n")
                .display_order(3)
                .value_name("path/to/report"),
        )
        .arg(
            Arg::new(OPTION_PAYLOAD_ONLY)
                .short('r')
                .long(OPTION_PAYLOAD_ONLY)
                .help("The file contains the receipt payload without its PKCS#7 container\n")
                .action(ArgAction::SetTrue)
                .display_order(4),
        )
        .arg(
            Arg::new(OPTION_DEVICE_ID)
                .short('d')
                .long(OPTION_DEVICE_ID)
                .help("Validate the receipt hash against this device identifier\n")
                .display_order(5)
                .value_name("uuid"),
        )
        .arg(
            Arg::new(OPTION_PRODUCT)
                .short('p')
                .long(OPTION_PRODUCT)
                .help("Report whether the receipt grants an active purchase of this product\n")
                .display_order(6)
                .value_name("product id"),
        )
        .arg(
            Arg::new(OPTION_NOW)
                .short('n')
                .long(OPTION_NOW)
                .help("Evaluate active purchases at this instant instead of the current time\n")
                .display_order(7)
                .value_name("YYYY-MM-DDTHH:MM:SSZ"),
        )
}

/// Parse arguments from the command line
pub fn from_command_line() -> ArgMatches {
    get_command().get_matches()
}

#[cfg(test)]
mod arg_tests {
    use std::path::PathBuf;

    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use crate::app::{
        error::RuntimeError,
        options::{get_command, ExportType, InputEncoding, Options},
    };

    fn parse(args: &[&str]) -> Result<Options, RuntimeError> {
        let command = get_command();
        let args = command.get_matches_from(
            std::iter::once("receipt-inspector").chain(args.iter().copied()),
        );
        Options::from_args(&args)
    }

    #[test]
    fn can_build_option_minimal() {
        let actual = parse(&["-f", "receipt"]).unwrap();

        let expected = Options {
            receipt_path: PathBuf::from("receipt"),
            encoding: InputEncoding::Auto,
            export_type: ExportType::Txt,
            export_path: None,
            payload_only: false,
            device_id: None,
            product: None,
            now: None,
        };

        assert_eq!(actual, expected);
    }

    #[test]
    fn can_build_option_full() {
        let actual = parse(&[
            "--receipt-path",
            "receipt.b64",
            "--encoding",
            "BASE64",
            "--format",
            "json",
            "--export-path",
            "report.json",
            "--payload-only",
            "--device-id",
            "6C3A7E2B-1F4D-4E8A-9B5C-0D2E3F4A5B6C",
            "--product",
            "com.example.monthly",
            "--now",
            "2020-03-20T00:00:00Z",
        ])
        .unwrap();

        let expected = Options {
            receipt_path: PathBuf::from("receipt.b64"),
            encoding: InputEncoding::Base64,
            export_type: ExportType::Json,
            export_path: Some(PathBuf::from("report.json")),
            payload_only: true,
            device_id: Some(Uuid::parse_str("6c3a7e2b-1f4d-4e8a-9b5c-0d2e3f4a5b6c").unwrap()),
            product: Some("com.example.monthly".to_string()),
            now: Some(Utc.with_ymd_and_hms(2020, 3, 20, 0, 0, 0).unwrap()),
        };

        assert_eq!(actual, expected);
    }

    #[test]
    fn cant_build_option_no_receipt() {
        let actual = parse(&["-o", "json"]);
        assert!(matches!(actual, Err(RuntimeError::InvalidOptions(_))));
    }

    #[test]
    fn cant_build_option_invalid_format() {
        let actual = parse(&["-f", "receipt", "-o", "html"]);
        assert!(matches!(actual, Err(RuntimeError::InvalidOptions(_))));
    }

    #[test]
    fn cant_build_option_invalid_encoding() {
        let actual = parse(&["-f", "receipt", "-e", "hex"]);
        assert!(matches!(actual, Err(RuntimeError::InvalidOptions(_))));
    }

    #[test]
    fn cant_build_option_invalid_device_id() {
        let actual = parse(&["-f", "receipt", "-d", "not-a-uuid"]);
        assert!(matches!(actual, Err(RuntimeError::InvalidOptions(_))));
    }

    #[test]
    fn cant_build_option_invalid_now() {
        let actual = parse(&["-f", "receipt", "-n", "tomorrow"]);
        assert!(matches!(actual, Err(RuntimeError::InvalidOptions(_))));
    }

    #[test]
    fn can_get_export_type() {
        assert_eq!(ExportType::from_cli("TXT"), Some(ExportType::Txt));
        assert_eq!(ExportType::from_cli("json"), Some(ExportType::Json));
        assert_eq!(ExportType::from_cli("ndjson"), None);
        assert_eq!(ExportType::Json.to_string(), "json");
    }
}

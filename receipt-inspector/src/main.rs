#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]
mod app;
mod exporters;

pub use exporters::{exporter::Exporter, json::JSON, txt::TXT};

use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use app::{
    options::{from_command_line, Options},
    runtime::Config,
};

/// Log filter used when `RUST_LOG` is not set
const DEFAULT_LOG_FILTER: &str = "receipt_inspector=info,app_receipt=info";

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    // Get args from command line
    let args = from_command_line();
    // Create application options
    let options = match Options::from_args(&args) {
        Ok(options) => options,
        Err(why) => {
            eprintln!("{why}");
            return ExitCode::FAILURE;
        }
    };

    // Create app state and start
    match Config::new(options) {
        Ok(app) => {
            if let Err(why) = app.start() {
                eprintln!("Unable to export: {why}");
                return ExitCode::FAILURE;
            }
        }
        Err(why) => {
            eprintln!("Unable to launch: {why}");
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}

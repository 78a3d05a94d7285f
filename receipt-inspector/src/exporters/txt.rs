use std::io::{BufWriter, Write};

use app_receipt::{
    receipt::in_app_purchase::InAppPurchaseReceipt,
    util::dates::{format, readable_diff},
    AppReceipt,
};
use chrono::{DateTime, Utc};

use crate::{
    app::{error::RuntimeError, runtime::Config},
    exporters::exporter::{Exporter, Writer},
};

const INDENT: &str = "    ";

pub struct TXT<'a> {
    /// Data that is setup from the application's runtime
    pub config: &'a Config,
    /// Destination of the report
    pub file: BufWriter<Box<dyn Write>>,
}

impl<'a> Exporter<'a> for TXT<'a> {
    fn new(config: &'a Config) -> Result<Self, RuntimeError> {
        Ok(TXT {
            config,
            file: config.output()?,
        })
    }

    fn export(&mut self) -> Result<(), RuntimeError> {
        let config = self.config;
        let receipt = &config.receipt;

        let mut report = self.format_receipt(receipt);
        for purchase in &receipt.in_app_purchases {
            report.push('\n');
            report.push_str(&self.format_purchase(purchase));
        }
        report.push('\n');
        report.push_str(&self.format_checks());

        TXT::write_to_file(&mut self.file, report)?;
        self.file.flush().map_err(RuntimeError::DiskError)
    }
}

impl<'a> Writer<'a, String> for TXT<'a> {
    fn format_receipt(&self, receipt: &'a AppReceipt) -> String {
        let mut formatted_receipt = String::new();

        self.add_line(
            &mut formatted_receipt,
            &format!("Bundle identifier: {}", receipt.bundle_id),
            "",
        );
        self.add_line(
            &mut formatted_receipt,
            &format!("Application version: {}", receipt.application_version),
            "",
        );
        if let Some(version) = &receipt.original_application_version {
            self.add_line(
                &mut formatted_receipt,
                &format!("Original application version: {version}"),
                "",
            );
        }
        self.add_line(
            &mut formatted_receipt,
            &format!("Created: {}", format(&receipt.creation_date)),
            "",
        );
        if let Some(expiration_date) = &receipt.expiration_date {
            self.add_line(
                &mut formatted_receipt,
                &format!("Expires: {}", self.relative_date(expiration_date)),
                "",
            );
        }
        self.add_line(
            &mut formatted_receipt,
            &format!("Opaque value: {}", encode_hex(&receipt.opaque_value)),
            "",
        );
        self.add_line(
            &mut formatted_receipt,
            &format!("SHA-1 hash: {}", encode_hex(&receipt.sha1_hash)),
            "",
        );
        self.add_line(
            &mut formatted_receipt,
            &format!("Purchases: {}", receipt.in_app_purchases.len()),
            "",
        );

        formatted_receipt
    }

    fn format_purchase(&self, purchase: &'a InAppPurchaseReceipt) -> String {
        let mut formatted_purchase = String::new();

        self.add_line(
            &mut formatted_purchase,
            &format!("{} ({})", purchase.product_id, purchase.product_type),
            "",
        );
        self.add_line(
            &mut formatted_purchase,
            &format!("Transaction: {}", purchase.transaction_id),
            INDENT,
        );
        if let Some(original) = &purchase.original_transaction_id {
            self.add_line(
                &mut formatted_purchase,
                &format!("Original transaction: {original}"),
                INDENT,
            );
        }
        self.add_line(
            &mut formatted_purchase,
            &format!("Quantity: {}", purchase.quantity),
            INDENT,
        );
        self.add_line(
            &mut formatted_purchase,
            &format!("Purchased: {}", format(&purchase.purchase_date)),
            INDENT,
        );
        if let Some(original) = &purchase.original_purchase_date {
            self.add_line(
                &mut formatted_purchase,
                &format!("Originally purchased: {}", format(original)),
                INDENT,
            );
        }
        if let Some(expires) = &purchase.expires_date {
            self.add_line(
                &mut formatted_purchase,
                &format!("Expires: {}", self.relative_date(expires)),
                INDENT,
            );
            if purchase.purchase_date_equals_expiration() {
                self.add_line(
                    &mut formatted_purchase,
                    "Expiration is within seconds of the purchase date!",
                    INDENT,
                );
            }
        }
        if let Some(cancelled) = &purchase.cancellation_date {
            self.add_line(
                &mut formatted_purchase,
                &format!("Cancelled: {}", format(cancelled)),
                INDENT,
            );
        }
        if let Some(trial) = purchase.is_in_trial_period {
            self.add_line(
                &mut formatted_purchase,
                &format!("Free trial: {}", yes_no(trial)),
                INDENT,
            );
        }
        if let Some(intro) = purchase.is_in_intro_offer_period {
            self.add_line(
                &mut formatted_purchase,
                &format!("Introductory offer: {}", yes_no(intro)),
                INDENT,
            );
        }
        if let Some(offer) = &purchase.promotional_offer_identifier {
            self.add_line(
                &mut formatted_purchase,
                &format!("Promotional offer: {offer}"),
                INDENT,
            );
        }
        if let Some(line_item) = purchase.web_order_line_item_id {
            self.add_line(
                &mut formatted_purchase,
                &format!("Web order line item: {line_item}"),
                INDENT,
            );
        }
        let status = if purchase.is_active(&self.config.now) {
            "active"
        } else {
            "expired"
        };
        self.add_line(
            &mut formatted_purchase,
            &format!("Status: {status}"),
            INDENT,
        );

        formatted_purchase
    }

    fn format_checks(&self) -> String {
        let mut formatted_checks = String::new();

        self.add_line(
            &mut formatted_checks,
            &format!("Evaluated at: {}", format(&self.config.now)),
            "",
        );

        if let Some(valid) = self.config.hash_is_valid() {
            let result = if valid { "valid" } else { "does not match" };
            let device_id = self
                .config
                .options
                .device_id
                .map(|id| id.to_string())
                .unwrap_or_default();
            self.add_line(
                &mut formatted_checks,
                &format!("Receipt hash: {result} for device {device_id}"),
                "",
            );
        }

        if let Some((product, active)) = self.config.product_is_active() {
            self.add_line(
                &mut formatted_checks,
                &format!("Active purchase of {product}: {}", yes_no(active)),
                "",
            );
        }

        match self.config.most_recent_active_subscription() {
            Some(subscription) => self.add_line(
                &mut formatted_checks,
                &format!(
                    "Most recent active subscription: {}",
                    subscription.product_id
                ),
                "",
            ),
            None => self.add_line(
                &mut formatted_checks,
                "No active subscriptions",
                "",
            ),
        }

        let offers = self
            .config
            .receipt
            .purchased_intro_offer_or_free_trial_product_ids();
        if !offers.is_empty() {
            self.add_line(
                &mut formatted_checks,
                &format!(
                    "Free trial or introductory offer used for: {}",
                    offers.into_iter().collect::<Vec<&str>>().join(", ")
                ),
                "",
            );
        }

        formatted_checks
    }

    fn write_to_file(file: &mut BufWriter<Box<dyn Write>>, text: String) -> Result<(), RuntimeError> {
        file.write_all(text.as_bytes())
            .map_err(RuntimeError::DiskError)
    }
}

impl<'a> TXT<'a> {
    fn add_line(&self, string: &mut String, part: &str, indent: &str) {
        if !part.is_empty() {
            string.push_str(indent);
            string.push_str(part);
            string.push('\n');
        }
    }

    /// Format a date along with how far it is from the evaluation instant
    fn relative_date(&self, date: &DateTime<Utc>) -> String {
        let now = &self.config.now;
        match readable_diff(now, date) {
            Some(diff) if date > now => format!("{} (in {diff})", format(date)),
            _ => match readable_diff(date, now) {
                Some(diff) => format!("{} ({diff} ago)", format(date)),
                None => format(date),
            },
        }
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

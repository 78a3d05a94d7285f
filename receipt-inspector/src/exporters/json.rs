use std::io::{BufWriter, Write};

use app_receipt::{receipt::in_app_purchase::InAppPurchaseReceipt, AppReceipt};
use base64::{prelude::BASE64_STANDARD, Engine};
use chrono::{DateTime, SecondsFormat, Utc};
use json::{object, JsonValue};

use crate::{
    app::{error::RuntimeError, runtime::Config},
    exporters::exporter::{Exporter, Writer},
};

pub struct JSON<'a> {
    /// Data that is setup from the application's runtime
    pub config: &'a Config,
    /// Destination of the report
    pub file: BufWriter<Box<dyn Write>>,
}

impl<'a> Exporter<'a> for JSON<'a> {
    fn new(config: &'a Config) -> Result<Self, RuntimeError> {
        Ok(JSON {
            config,
            file: config.output()?,
        })
    }

    fn export(&mut self) -> Result<(), RuntimeError> {
        let config = self.config;
        let receipt = &config.receipt;

        let mut report = self.format_receipt(receipt);
        let purchases: Vec<JsonValue> = receipt
            .in_app_purchases
            .iter()
            .map(|purchase| self.format_purchase(purchase))
            .collect();
        report["in_app_purchases"] = purchases.into();
        report["checks"] = self.format_checks();

        JSON::write_to_file(&mut self.file, report)?;
        self.file.flush().map_err(RuntimeError::DiskError)
    }
}

impl<'a> Writer<'a, JsonValue> for JSON<'a> {
    fn format_receipt(&self, receipt: &'a AppReceipt) -> JsonValue {
        object! {
            bundle_id: receipt.bundle_id.as_str(),
            application_version: receipt.application_version.as_str(),
            original_application_version: receipt.original_application_version.as_deref(),
            creation_date: timestamp(&receipt.creation_date),
            expiration_date: receipt.expiration_date.as_ref().map(timestamp),
            opaque_value: BASE64_STANDARD.encode(&receipt.opaque_value),
            sha1_hash: BASE64_STANDARD.encode(&receipt.sha1_hash),
        }
    }

    fn format_purchase(&self, purchase: &'a InAppPurchaseReceipt) -> JsonValue {
        object! {
            product_id: purchase.product_id.as_str(),
            product_type: purchase.product_type.to_string(),
            quantity: purchase.quantity,
            transaction_id: purchase.transaction_id.as_str(),
            original_transaction_id: purchase.original_transaction_id.as_deref(),
            purchase_date: timestamp(&purchase.purchase_date),
            original_purchase_date: purchase.original_purchase_date.as_ref().map(timestamp),
            expires_date: purchase.expires_date.as_ref().map(timestamp),
            cancellation_date: purchase.cancellation_date.as_ref().map(timestamp),
            is_in_trial_period: purchase.is_in_trial_period,
            is_in_intro_offer_period: purchase.is_in_intro_offer_period,
            promotional_offer_identifier: purchase.promotional_offer_identifier.as_deref(),
            web_order_line_item_id: purchase.web_order_line_item_id,
            is_subscription: purchase.is_subscription(),
            is_active: purchase.is_active(&self.config.now),
        }
    }

    fn format_checks(&self) -> JsonValue {
        let (product, product_is_active) = match self.config.product_is_active() {
            Some((product, active)) => (Some(product), Some(active)),
            None => (None, None),
        };
        let subscription = self
            .config
            .most_recent_active_subscription()
            .map(|purchase| purchase.product_id.as_str());
        let offers: Vec<&str> = self
            .config
            .receipt
            .purchased_intro_offer_or_free_trial_product_ids()
            .into_iter()
            .collect();

        object! {
            now: timestamp(&self.config.now),
            hash_is_valid: self.config.hash_is_valid(),
            product: product,
            product_is_active: product_is_active,
            most_recent_active_subscription: subscription,
            intro_offer_or_free_trial_product_ids: offers,
        }
    }

    fn write_to_file(file: &mut BufWriter<Box<dyn Write>>, text: JsonValue) -> Result<(), RuntimeError> {
        file.write_all((text.pretty(2) + "\n").as_bytes())
            .map_err(RuntimeError::DiskError)
    }
}

fn timestamp(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[cfg(test)]
mod tests {
    use std::{env::temp_dir, fs::read_to_string};

    use chrono::{TimeZone, Utc};

    use crate::{
        app::{options::ExportType, runtime::tests::fake_options},
        exporters::{exporter::Writer, json::timestamp},
        Config, Exporter, JSON,
    };

    #[test]
    fn can_format_receipt() {
        let config = Config::new(fake_options()).unwrap();
        let exporter = JSON::new(&config).unwrap();

        let actual = exporter.format_receipt(&config.receipt);

        assert_eq!(actual["bundle_id"], "com.example.receipts");
        assert_eq!(actual["application_version"], "42");
        assert_eq!(actual["original_application_version"], "1.0");
        assert_eq!(actual["creation_date"], "2020-03-15T10:00:00Z");
        assert!(actual["expiration_date"].is_null());
        assert_eq!(actual["opaque_value"], "mlEiBzxE/hC30uT1psjZAQ==");
    }

    #[test]
    fn can_format_purchase() {
        let config = Config::new(fake_options()).unwrap();
        let exporter = JSON::new(&config).unwrap();

        let actual = exporter.format_purchase(&config.receipt.in_app_purchases[1]);

        assert_eq!(actual["product_id"], "com.example.monthly");
        assert_eq!(actual["product_type"], "auto-renewable subscription");
        assert_eq!(actual["quantity"].as_u32(), Some(1));
        assert_eq!(actual["expires_date"], "2020-04-01T08:30:00Z");
        assert!(actual["cancellation_date"].is_null());
        assert_eq!(actual["is_in_trial_period"].as_bool(), Some(false));
        assert_eq!(actual["is_in_intro_offer_period"].as_bool(), Some(true));
        assert_eq!(actual["web_order_line_item_id"].as_i64(), Some(1000000051234567));
        assert_eq!(actual["is_subscription"].as_bool(), Some(true));
        assert_eq!(actual["is_active"].as_bool(), Some(true));
    }

    #[test]
    fn can_format_checks() {
        let config = Config::new(fake_options()).unwrap();
        let exporter = JSON::new(&config).unwrap();

        let actual = exporter.format_checks();

        assert_eq!(actual["now"], "2020-03-20T00:00:00Z");
        assert_eq!(actual["hash_is_valid"].as_bool(), Some(true));
        assert_eq!(actual["product"], "com.example.anything");
        assert_eq!(actual["product_is_active"].as_bool(), Some(true));
        assert_eq!(actual["most_recent_active_subscription"], "com.example.monthly");
        assert_eq!(actual["intro_offer_or_free_trial_product_ids"].len(), 1);
    }

    #[test]
    fn can_format_checks_without_options() {
        let mut options = fake_options();
        options.device_id = None;
        options.product = None;
        options.now = Some(Utc.with_ymd_and_hms(2020, 5, 1, 0, 0, 0).unwrap());
        let config = Config::new(options).unwrap();
        let exporter = JSON::new(&config).unwrap();

        let actual = exporter.format_checks();

        assert!(actual["hash_is_valid"].is_null());
        assert!(actual["product"].is_null());
        assert!(actual["most_recent_active_subscription"].is_null());
    }

    #[test]
    fn can_format_timestamp() {
        let date = Utc.with_ymd_and_hms(2020, 3, 15, 10, 0, 0).unwrap();
        assert_eq!(timestamp(&date), "2020-03-15T10:00:00Z");
    }

    #[test]
    fn can_format_timestamp_with_fraction() {
        let date = Utc.with_ymd_and_hms(2019, 5, 3, 1, 55, 1).unwrap()
            + chrono::Duration::milliseconds(250);
        assert_eq!(timestamp(&date), "2019-05-03T01:55:01.250Z");
    }

    #[test]
    fn can_export_to_file() {
        let export_path = temp_dir().join("receipt-inspector-report.json");
        let mut options = fake_options();
        options.export_type = ExportType::Json;
        options.export_path = Some(export_path.clone());
        let config = Config::new(options).unwrap();

        config.start().unwrap();

        let report = json::parse(&read_to_string(&export_path).unwrap()).unwrap();
        assert_eq!(report["bundle_id"], "com.example.receipts");
        assert_eq!(report["in_app_purchases"].len(), 2);
        assert_eq!(
            report["in_app_purchases"][0]["product_id"],
            "com.example.lifetime"
        );
        assert_eq!(report["checks"]["hash_is_valid"].as_bool(), Some(true));
    }
}

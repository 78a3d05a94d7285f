/*!
 Entry point for turning receipt bytes into an [`AppReceipt`].
*/

use crate::{
    error::{asn1::ParseError, envelope::EnvelopeError},
    receipt::{app_receipt::AppReceipt, envelope::extract_payload},
    util::asn1::parser::{Asn1Reader, DEFAULT_MAX_DEPTH},
};

/// Decodes App Store receipts
///
/// The decoder holds only configuration, so one instance can be shared freely
/// and every call is independent of the others.
///
/// # Example:
///
/// ```
/// use app_receipt::receipt::decoder::ReceiptDecoder;
///
/// let decoder = ReceiptDecoder::new();
/// assert!(decoder.parse(&[]).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptDecoder {
    /// Nodes nested deeper than this are rejected
    max_depth: usize,
}

impl Default for ReceiptDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiptDecoder {
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Override the nesting limit
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Decode a bare receipt payload, the `SET` of attributes found inside the `PKCS#7` container
    pub fn parse(&self, bytes: &[u8]) -> Result<AppReceipt, ParseError> {
        let root = Asn1Reader::new(bytes)
            .with_max_depth(self.max_depth)
            .read_root()?;
        AppReceipt::from_node(&root, self.max_depth)
    }

    /// Decode a receipt still wrapped in its `PKCS#7` container, as stored in the app bundle
    pub fn parse_envelope(&self, bytes: &[u8]) -> Result<AppReceipt, EnvelopeError> {
        let root = Asn1Reader::new(bytes)
            .with_max_depth(self.max_depth)
            .read_root()?;
        let payload = extract_payload(&root)?;
        Ok(self.parse(&payload)?)
    }

    /// Whether a wrapped receipt records any purchases
    ///
    /// Receipts that cannot be decoded are reported as having transactions, so callers
    /// that use this to skip work do not skip it for a receipt they could not read.
    pub fn receipt_has_transactions(&self, bytes: &[u8]) -> bool {
        match self.parse_envelope(bytes) {
            Ok(receipt) => receipt.has_transactions(),
            Err(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{env::current_dir, fs::File, io::Read};

    use chrono::{TimeZone, Utc};

    use crate::{
        error::{asn1::ParseError, envelope::EnvelopeError},
        receipt::{decoder::ReceiptDecoder, envelope::DATA_OID, in_app_purchase::ProductType},
        util::asn1::{
            encoder::{attribute, raw_attribute, Element},
            parser::DEFAULT_MAX_DEPTH,
        },
    };

    const DEVICE_ID: [u8; 16] = [
        0x6C, 0x3A, 0x7E, 0x2B, 0x1F, 0x4D, 0x4E, 0x8A, 0x9B, 0x5C, 0x0D, 0x2E, 0x3F, 0x4A, 0x5B,
        0x6C,
    ];

    fn fixture() -> Vec<u8> {
        let receipt_path = current_dir()
            .unwrap()
            .as_path()
            .join("test_data/receipt/receipt.der");
        let mut file = File::open(receipt_path).unwrap();
        let mut bytes = vec![];
        file.read_to_end(&mut bytes).unwrap();
        bytes
    }

    fn payload(purchases: Vec<Element>) -> Vec<u8> {
        let mut attributes = vec![
            attribute(2, &Element::utf8("com.example.app")),
            attribute(3, &Element::utf8("1")),
            raw_attribute(4, &[0x01, 0x02, 0x03]),
            raw_attribute(5, &[0; 20]),
            attribute(12, &Element::ia5("2021-01-01T00:00:00Z")),
        ];
        attributes.extend(purchases);
        Element::set(attributes).encode()
    }

    fn purchase(product_id: &str, transaction_id: &str) -> Element {
        attribute(
            17,
            &Element::set(vec![
                attribute(1701, &Element::integer(1)),
                attribute(1702, &Element::utf8(product_id)),
                attribute(1703, &Element::utf8(transaction_id)),
                attribute(1704, &Element::ia5("2021-01-01T00:00:00Z")),
            ]),
        )
    }

    fn envelope(payload: &[u8]) -> Vec<u8> {
        Element::sequence(vec![
            Element::oid(&DATA_OID),
            Element::context(0, vec![Element::octets(payload)]),
        ])
        .encode()
    }

    #[test]
    fn can_create_decoder() {
        let decoder = ReceiptDecoder::new();
        assert_eq!(decoder.max_depth(), DEFAULT_MAX_DEPTH);
        assert_eq!(decoder, ReceiptDecoder::default());
        assert_eq!(decoder.with_max_depth(8).max_depth(), 8);
    }

    #[test]
    fn cant_parse_empty() {
        let result = ReceiptDecoder::new().parse(&[]);
        assert!(matches!(
            result,
            Err(ParseError::Truncated(_, _) | ParseError::Malformed(_))
        ));
    }

    #[test]
    fn cant_parse_truncated() {
        let bytes = payload(vec![purchase("com.example.a", "1")]);
        for end in 1..bytes.len() {
            let result = ReceiptDecoder::new().parse(&bytes[..end]);
            assert!(
                matches!(result, Err(ParseError::Truncated(_, _))),
                "{end}: {result:?}"
            );
        }
    }

    #[test]
    fn can_parse_with_unknown_attribute() {
        let known = payload(vec![]);
        let with_unknown = payload(vec![attribute(42, &Element::utf8("new field"))]);

        let decoder = ReceiptDecoder::new();
        assert_eq!(decoder.parse(&with_unknown), decoder.parse(&known));
    }

    #[test]
    fn can_parse_purchases_in_order() {
        let bytes = payload(vec![
            purchase("com.example.b", "20"),
            purchase("com.example.a", "10"),
        ]);
        let receipt = ReceiptDecoder::new().parse(&bytes).unwrap();

        let transactions: Vec<&str> = receipt
            .in_app_purchases
            .iter()
            .map(|purchase| purchase.transaction_id.as_str())
            .collect();
        assert_eq!(transactions, vec!["20", "10"]);
    }

    #[test]
    fn cant_parse_purchase_without_transaction_id() {
        let bytes = payload(vec![attribute(
            17,
            &Element::set(vec![
                attribute(1701, &Element::integer(1)),
                attribute(1702, &Element::utf8("com.example.a")),
                attribute(1704, &Element::ia5("2021-01-01T00:00:00Z")),
            ]),
        )]);

        assert_eq!(
            ReceiptDecoder::new().parse(&bytes),
            Err(ParseError::MissingRequiredField("transaction_id".to_string()))
        );
    }

    #[test]
    fn cant_parse_beyond_depth_limit() {
        let bytes = payload(vec![purchase("com.example.a", "1")]);
        let result = ReceiptDecoder::new().with_max_depth(1).parse(&bytes);
        assert!(matches!(result, Err(ParseError::Malformed(_))));
    }

    #[test]
    fn can_parse_envelope() {
        let inner = payload(vec![purchase("com.example.a", "1")]);
        let decoder = ReceiptDecoder::new();

        assert_eq!(decoder.parse_envelope(&envelope(&inner)), Ok(decoder.parse(&inner).unwrap()));
    }

    #[test]
    fn cant_parse_envelope_with_bad_payload() {
        let result = ReceiptDecoder::new().parse_envelope(&envelope(&[0x31, 0x05]));
        assert!(matches!(
            result,
            Err(EnvelopeError::Container(ParseError::Truncated(_, _)))
        ));
    }

    #[test]
    fn can_check_transactions() {
        let decoder = ReceiptDecoder::new();

        assert!(decoder.receipt_has_transactions(&envelope(&payload(vec![purchase("a", "1")]))));
        assert!(!decoder.receipt_has_transactions(&envelope(&payload(vec![]))));
    }

    #[test]
    fn can_check_transactions_on_unreadable_receipt() {
        let decoder = ReceiptDecoder::new();

        assert!(decoder.receipt_has_transactions(&[]));
        assert!(decoder.receipt_has_transactions(&[0x30, 0x03, 0x02, 0x01]));
    }

    #[test]
    fn can_parse_fixture() {
        let receipt = ReceiptDecoder::new().parse_envelope(&fixture()).unwrap();

        assert_eq!(receipt.bundle_id, "com.example.receipts");
        assert_eq!(receipt.application_version, "42");
        assert_eq!(receipt.original_application_version, Some("1.0".to_string()));
        assert_eq!(
            receipt.creation_date,
            Utc.with_ymd_and_hms(2020, 3, 15, 10, 0, 0).unwrap()
        );
        assert_eq!(receipt.in_app_purchases.len(), 2);

        let lifetime = &receipt.in_app_purchases[0];
        assert_eq!(lifetime.product_id, "com.example.lifetime");
        assert_eq!(lifetime.product_type, ProductType::NonConsumable);
        assert_eq!(lifetime.expires_date, None);
        assert_eq!(lifetime.cancellation_date, None);

        let monthly = &receipt.in_app_purchases[1];
        assert_eq!(monthly.product_id, "com.example.monthly");
        assert_eq!(monthly.transaction_id, "1000000598765432");
        assert_eq!(
            monthly.original_transaction_id,
            Some("1000000598765430".to_string())
        );
        assert_eq!(monthly.product_type, ProductType::AutoRenewableSubscription);
        assert_eq!(
            monthly.expires_date,
            Some(Utc.with_ymd_and_hms(2020, 4, 1, 8, 30, 0).unwrap())
        );
        assert_eq!(monthly.web_order_line_item_id, Some(1000000051234567));
        assert_eq!(monthly.is_in_trial_period, Some(false));
        assert_eq!(monthly.is_in_intro_offer_period, Some(true));
        assert_eq!(
            monthly.promotional_offer_identifier,
            Some("com.example.monthly.winback".to_string())
        );
    }

    #[test]
    fn can_query_fixture() {
        let receipt = ReceiptDecoder::new().parse_envelope(&fixture()).unwrap();
        let during = Utc.with_ymd_and_hms(2020, 3, 20, 0, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2020, 5, 1, 0, 0, 0).unwrap();

        assert!(receipt.validate_hash(&DEVICE_ID));
        assert!(!receipt.validate_hash(&[0; 16]));

        assert!(receipt.contains_active_purchase("com.example.anything", &during));
        assert!(!receipt.contains_active_purchase("com.example.anything", &after));
        assert!(receipt.contains_active_purchase("com.example.lifetime", &after));

        assert_eq!(
            receipt
                .most_recent_active_subscription(&during)
                .map(|purchase| purchase.product_id.as_str()),
            Some("com.example.monthly")
        );
        assert!(receipt.most_recent_active_subscription(&after).is_none());
        assert!(receipt
            .purchased_intro_offer_or_free_trial_product_ids()
            .contains("com.example.monthly"));
    }

    #[test]
    fn can_check_fixture_transactions() {
        assert!(ReceiptDecoder::new().receipt_has_transactions(&fixture()));
    }
}

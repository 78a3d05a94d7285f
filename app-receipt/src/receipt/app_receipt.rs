/*!
 The decoded representation of an App Store receipt and the queries callers use to gate features.
*/

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sha1::{Digest, Sha1};

use crate::{
    error::asn1::ParseError,
    receipt::{
        attribute::{
            decode_attributes, set_once, AttributeKind, FieldHandler, ReceiptAttribute,
            ReceiptAttributeType,
        },
        in_app_purchase::InAppPurchaseReceipt,
    },
    util::asn1::models::RawNode,
};

/// A decoded App Store receipt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppReceipt {
    pub bundle_id: String,
    /// The `CFBundleVersion` of the app the receipt was issued for
    pub application_version: String,
    /// The version of the app that was originally purchased
    pub original_application_version: Option<String>,
    /// Opaque bytes used when computing the receipt hash
    pub opaque_value: Vec<u8>,
    /// SHA-1 hash used to validate the receipt
    pub sha1_hash: Vec<u8>,
    pub creation_date: DateTime<Utc>,
    /// Only set for volume purchase program receipts
    pub expiration_date: Option<DateTime<Utc>>,
    /// Purchases in the order they appear in the receipt
    pub in_app_purchases: Vec<InAppPurchaseReceipt>,
    /// The encoded bundle identifier value, as hashed by [`AppReceipt::validate_hash`]
    pub bundle_id_data: Vec<u8>,
}

impl AppReceipt {
    /// Build a receipt from the top level `SET` of a receipt payload
    pub fn from_node(set: &RawNode<'_>, max_depth: usize) -> Result<Self, ParseError> {
        let mut fields = ReceiptFields::default();
        decode_attributes(set, "receipt", max_depth, RECEIPT_FIELDS, &mut fields)?;
        fields.build()
    }

    /// Whether the receipt records at least one purchase
    pub fn has_transactions(&self) -> bool {
        !self.in_app_purchases.is_empty()
    }

    /// Whether the receipt grants access to `product_id` at `now`
    ///
    /// Any unexpired subscription counts, whatever its product, as do non-subscription
    /// purchases of the product itself.
    pub fn contains_active_purchase(&self, product_id: &str, now: &DateTime<Utc>) -> bool {
        self.in_app_purchases.iter().any(|purchase| {
            if purchase.is_subscription() {
                purchase.is_active(now)
            } else {
                purchase.product_id == product_id
            }
        })
    }

    /// The unexpired subscription purchased most recently
    ///
    /// When two purchases share a purchase date, the one appearing later in the receipt wins.
    pub fn most_recent_active_subscription(
        &self,
        now: &DateTime<Utc>,
    ) -> Option<&InAppPurchaseReceipt> {
        self.in_app_purchases
            .iter()
            .filter(|purchase| purchase.is_subscription() && purchase.is_active(now))
            .max_by_key(|purchase| purchase.purchase_date)
    }

    /// Identifiers of products that were purchased during a free trial or introductory offer
    pub fn purchased_intro_offer_or_free_trial_product_ids(&self) -> BTreeSet<&str> {
        self.in_app_purchases
            .iter()
            .filter(|purchase| {
                purchase.is_in_trial_period == Some(true)
                    || purchase.is_in_intro_offer_period == Some(true)
            })
            .map(|purchase| purchase.product_id.as_str())
            .collect()
    }

    /// Check the receipt hash against the identifier of the device it was issued to
    ///
    /// On iOS the identifier is the 16 bytes of `identifierForVendor`; on macOS it is
    /// the MAC address of the primary network interface.
    pub fn validate_hash(&self, device_identifier: &[u8]) -> bool {
        let mut hasher = Sha1::new();
        hasher.update(device_identifier);
        hasher.update(&self.opaque_value);
        hasher.update(&self.bundle_id_data);
        hasher.finalize().as_slice() == self.sha1_hash.as_slice()
    }
}

#[derive(Debug, Default)]
struct ReceiptFields {
    bundle_id: Option<String>,
    bundle_id_data: Option<Vec<u8>>,
    application_version: Option<String>,
    original_application_version: Option<String>,
    opaque_value: Option<Vec<u8>>,
    sha1_hash: Option<Vec<u8>>,
    creation_date: Option<DateTime<Utc>>,
    expiration_date: Option<DateTime<Utc>>,
    in_app_purchases: Vec<InAppPurchaseReceipt>,
}

impl ReceiptFields {
    fn build(self) -> Result<AppReceipt, ParseError> {
        Ok(AppReceipt {
            bundle_id: self
                .bundle_id
                .ok_or_else(|| missing(ReceiptAttributeType::BundleId))?,
            application_version: self
                .application_version
                .ok_or_else(|| missing(ReceiptAttributeType::ApplicationVersion))?,
            original_application_version: self.original_application_version,
            opaque_value: self
                .opaque_value
                .ok_or_else(|| missing(ReceiptAttributeType::OpaqueValue))?,
            sha1_hash: self
                .sha1_hash
                .ok_or_else(|| missing(ReceiptAttributeType::Sha1Hash))?,
            creation_date: self
                .creation_date
                .ok_or_else(|| missing(ReceiptAttributeType::CreationDate))?,
            expiration_date: self.expiration_date,
            in_app_purchases: self.in_app_purchases,
            bundle_id_data: self.bundle_id_data.unwrap_or_default(),
        })
    }
}

fn missing(kind: ReceiptAttributeType) -> ParseError {
    ParseError::MissingRequiredField(kind.name().to_string())
}

const RECEIPT_FIELDS: &[(ReceiptAttributeType, FieldHandler<ReceiptFields>)] = &[
    (ReceiptAttributeType::BundleId, bundle_id),
    (ReceiptAttributeType::ApplicationVersion, application_version),
    (ReceiptAttributeType::OpaqueValue, opaque_value),
    (ReceiptAttributeType::Sha1Hash, sha1_hash),
    (ReceiptAttributeType::CreationDate, creation_date),
    (ReceiptAttributeType::InAppPurchase, in_app_purchase),
    (
        ReceiptAttributeType::OriginalApplicationVersion,
        original_application_version,
    ),
    (ReceiptAttributeType::ExpirationDate, expiration_date),
];

fn bundle_id(
    fields: &mut ReceiptFields,
    attribute: &ReceiptAttribute<'_>,
    field: &'static str,
) -> Result<(), ParseError> {
    set_once(&mut fields.bundle_id, attribute.string(field)?, field)?;
    fields.bundle_id_data = Some(attribute.value.to_vec());
    Ok(())
}

fn application_version(
    fields: &mut ReceiptFields,
    attribute: &ReceiptAttribute<'_>,
    field: &'static str,
) -> Result<(), ParseError> {
    set_once(
        &mut fields.application_version,
        attribute.string(field)?,
        field,
    )
}

fn original_application_version(
    fields: &mut ReceiptFields,
    attribute: &ReceiptAttribute<'_>,
    field: &'static str,
) -> Result<(), ParseError> {
    set_once(
        &mut fields.original_application_version,
        attribute.string(field)?,
        field,
    )
}

// The opaque value and hash are raw octets, not a nested encoding
fn opaque_value(
    fields: &mut ReceiptFields,
    attribute: &ReceiptAttribute<'_>,
    field: &'static str,
) -> Result<(), ParseError> {
    set_once(&mut fields.opaque_value, attribute.value.to_vec(), field)
}

fn sha1_hash(
    fields: &mut ReceiptFields,
    attribute: &ReceiptAttribute<'_>,
    field: &'static str,
) -> Result<(), ParseError> {
    set_once(&mut fields.sha1_hash, attribute.value.to_vec(), field)
}

fn creation_date(
    fields: &mut ReceiptFields,
    attribute: &ReceiptAttribute<'_>,
    field: &'static str,
) -> Result<(), ParseError> {
    match attribute.date(field)? {
        Some(date) => set_once(&mut fields.creation_date, date, field),
        None => Ok(()),
    }
}

fn expiration_date(
    fields: &mut ReceiptFields,
    attribute: &ReceiptAttribute<'_>,
    field: &'static str,
) -> Result<(), ParseError> {
    match attribute.date(field)? {
        Some(date) => set_once(&mut fields.expiration_date, date, field),
        None => Ok(()),
    }
}

fn in_app_purchase(
    fields: &mut ReceiptFields,
    attribute: &ReceiptAttribute<'_>,
    field: &'static str,
) -> Result<(), ParseError> {
    let set = attribute.set(field)?;
    let purchase = InAppPurchaseReceipt::from_node(&set, attribute.max_depth())?;
    fields.in_app_purchases.push(purchase);
    Ok(())
}

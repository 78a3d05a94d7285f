/*!
 Receipt attributes and the closed tables of attribute types this crate understands.

 Apple documents the field layout [here](https://developer.apple.com/library/archive/releasenotes/General/ValidateAppStoreReceipt/Chapters/ReceiptFields.html).
 Each attribute is encoded as:

 ```txt
 ReceiptAttribute ::= SEQUENCE {
     type    INTEGER,
     version INTEGER,
     value   OCTET STRING
 }
 ```

 The `value` octets hold a further encoding whose shape depends on `type`.
*/

use chrono::{DateTime, Utc};

use crate::{
    error::asn1::ParseError,
    util::{
        asn1::{
            models::{
                RawNode, IA5_STRING, INTEGER, OCTET_STRING, PRINTABLE_STRING, SEQUENCE, SET,
                UTF8_STRING,
            },
            parser::Asn1Reader,
        },
        dates::parse_receipt_date,
    },
};

/// Stores a decoded attribute into the fields collected so far
///
/// The `&str` is the name of the field, used when reporting errors.
pub(crate) type FieldHandler<T> =
    fn(&mut T, &ReceiptAttribute<'_>, &'static str) -> Result<(), ParseError>;

/// Behavior shared by the attribute type tables
pub trait AttributeKind: Copy {
    /// The integer that identifies this attribute in the receipt
    fn value(&self) -> i64;
    /// Human readable name of the field
    fn name(&self) -> &'static str;
}

/// Attribute types found in the top level of a receipt payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptAttributeType {
    BundleId = 2,
    ApplicationVersion = 3,
    OpaqueValue = 4,
    Sha1Hash = 5,
    CreationDate = 12,
    InAppPurchase = 17,
    OriginalApplicationVersion = 19,
    ExpirationDate = 21,
}

impl AttributeKind for ReceiptAttributeType {
    fn value(&self) -> i64 {
        *self as i64
    }

    fn name(&self) -> &'static str {
        match self {
            ReceiptAttributeType::BundleId => "bundle_id",
            ReceiptAttributeType::ApplicationVersion => "application_version",
            ReceiptAttributeType::OpaqueValue => "opaque_value",
            ReceiptAttributeType::Sha1Hash => "sha1_hash",
            ReceiptAttributeType::CreationDate => "creation_date",
            ReceiptAttributeType::InAppPurchase => "in_app_purchase",
            ReceiptAttributeType::OriginalApplicationVersion => "original_application_version",
            ReceiptAttributeType::ExpirationDate => "expiration_date",
        }
    }
}

/// Attribute types found inside an in-app purchase receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InAppPurchaseAttributeType {
    Quantity = 1701,
    ProductId = 1702,
    TransactionId = 1703,
    PurchaseDate = 1704,
    OriginalTransactionId = 1705,
    OriginalPurchaseDate = 1706,
    ProductType = 1707,
    ExpiresDate = 1708,
    WebOrderLineItemId = 1711,
    CancellationDate = 1712,
    IsInTrialPeriod = 1713,
    IsInIntroOfferPeriod = 1719,
    PromotionalOfferIdentifier = 1721,
}

impl AttributeKind for InAppPurchaseAttributeType {
    fn value(&self) -> i64 {
        *self as i64
    }

    fn name(&self) -> &'static str {
        match self {
            InAppPurchaseAttributeType::Quantity => "quantity",
            InAppPurchaseAttributeType::ProductId => "product_id",
            InAppPurchaseAttributeType::TransactionId => "transaction_id",
            InAppPurchaseAttributeType::PurchaseDate => "purchase_date",
            InAppPurchaseAttributeType::OriginalTransactionId => "original_transaction_id",
            InAppPurchaseAttributeType::OriginalPurchaseDate => "original_purchase_date",
            InAppPurchaseAttributeType::ProductType => "product_type",
            InAppPurchaseAttributeType::ExpiresDate => "expires_date",
            InAppPurchaseAttributeType::WebOrderLineItemId => "web_order_line_item_id",
            InAppPurchaseAttributeType::CancellationDate => "cancellation_date",
            InAppPurchaseAttributeType::IsInTrialPeriod => "is_in_trial_period",
            InAppPurchaseAttributeType::IsInIntroOfferPeriod => "is_in_intro_offer_period",
            InAppPurchaseAttributeType::PromotionalOfferIdentifier => {
                "promotional_offer_identifier"
            }
        }
    }
}

/// A single field of a receipt, before its value is interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptAttribute<'a> {
    /// Identifies the meaning of the field, see [`ReceiptAttributeType`] and [`InAppPurchaseAttributeType`]
    pub attribute_type: i64,
    pub version: i64,
    /// Content of the value `OCTET STRING`
    pub value: &'a [u8],
    /// Nesting limit used when decoding `value`
    max_depth: usize,
}

impl<'a> ReceiptAttribute<'a> {
    /// Build an attribute from its `SEQUENCE` node
    pub fn from_node(node: &RawNode<'a>, max_depth: usize) -> Result<Self, ParseError> {
        if !node.is_constructed() || !node.is_universal(SEQUENCE) {
            return Err(ParseError::UnexpectedType(
                "receipt attribute".to_string(),
                "a constructed SEQUENCE".to_string(),
            ));
        }

        let [attribute_type, version, value] = node.children.as_slice() else {
            return Err(ParseError::Malformed(format!(
                "receipt attribute has {} fields, expected 3",
                node.children.len()
            )));
        };

        let attribute_type = expect_primitive(attribute_type, "attribute type", INTEGER, "INTEGER")?;
        let version = expect_primitive(version, "attribute version", INTEGER, "INTEGER")?;
        let value = expect_primitive(value, "attribute value", OCTET_STRING, "OCTET STRING")?;

        Ok(Self {
            attribute_type: attribute_type.integer_value()?,
            version: version.integer_value()?,
            value: value.payload,
            max_depth,
        })
    }

    pub(crate) fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Decode the value octets as a single node
    pub fn value_node(&self) -> Result<RawNode<'a>, ParseError> {
        Asn1Reader::new(self.value)
            .with_max_depth(self.max_depth)
            .read_root()
    }

    /// Interpret the value as a string
    pub fn string(&self, field: &str) -> Result<String, ParseError> {
        let node = self.value_node()?;
        if node.is_constructed() {
            return Err(unexpected(field, "a primitive string"));
        }
        if ![UTF8_STRING, IA5_STRING, PRINTABLE_STRING]
            .iter()
            .any(|number| node.is_universal(*number))
        {
            return Err(unexpected(field, "a string"));
        }
        Ok(node.string_value()?.to_string())
    }

    /// Interpret the value as an `INTEGER`
    pub fn integer(&self, field: &str) -> Result<i64, ParseError> {
        let node = self.value_node()?;
        expect_primitive(&node, field, INTEGER, "INTEGER")?.integer_value()
    }

    /// Interpret the value as an `INTEGER` flag
    pub fn boolean(&self, field: &str) -> Result<bool, ParseError> {
        Ok(self.integer(field)? != 0)
    }

    /// Interpret the value as a date string, where empty text means the date is unset
    pub fn date(&self, field: &str) -> Result<Option<DateTime<Utc>>, ParseError> {
        let text = self.string(field)?;
        parse_receipt_date(&text).map_err(|_| ParseError::DateFormat(field.to_string(), text))
    }

    /// Interpret the value as a nested `SET` of attributes
    pub fn set(&self, field: &str) -> Result<RawNode<'a>, ParseError> {
        let node = self.value_node()?;
        if !node.is_constructed() || !node.is_universal(SET) {
            return Err(unexpected(field, "a constructed SET"));
        }
        Ok(node)
    }
}

/// Walk a `SET` of attributes, handing each known attribute to its entry in `table`
///
/// Attribute types missing from `table` are skipped so that fields added to
/// receipts in the future do not break decoding.
pub(crate) fn decode_attributes<K: AttributeKind, T>(
    set: &RawNode<'_>,
    container: &str,
    max_depth: usize,
    table: &[(K, FieldHandler<T>)],
    fields: &mut T,
) -> Result<(), ParseError> {
    if !set.is_constructed() || !set.is_universal(SET) {
        return Err(unexpected(container, "a constructed SET"));
    }

    for node in &set.children {
        let attribute = ReceiptAttribute::from_node(node, max_depth)?;
        if let Some((kind, handler)) = table
            .iter()
            .find(|(kind, _)| kind.value() == attribute.attribute_type)
        {
            handler(fields, &attribute, kind.name())?;
        }
    }
    Ok(())
}

/// Store a value in a slot that may only be filled once
pub(crate) fn set_once<T>(slot: &mut Option<T>, value: T, field: &str) -> Result<(), ParseError> {
    if slot.is_some() {
        return Err(ParseError::Malformed(format!("duplicate {field} attribute")));
    }
    *slot = Some(value);
    Ok(())
}

fn expect_primitive<'n, 'a>(
    node: &'n RawNode<'a>,
    field: &str,
    number: u32,
    expected: &str,
) -> Result<&'n RawNode<'a>, ParseError> {
    if node.is_constructed() || !node.is_universal(number) {
        return Err(unexpected(field, &format!("a primitive {expected}")));
    }
    Ok(node)
}

fn unexpected(field: &str, expected: &str) -> ParseError {
    ParseError::UnexpectedType(field.to_string(), expected.to_string())
}

/*!
 Logic and containers for a single in-app purchase recorded in a receipt.
*/

use std::fmt::{Display, Formatter, Result as FmtResult};

use chrono::{DateTime, Duration, Utc};

use crate::{
    error::asn1::ParseError,
    receipt::attribute::{
        decode_attributes, set_once, AttributeKind, FieldHandler, InAppPurchaseAttributeType,
        ReceiptAttribute,
    },
    util::asn1::models::RawNode,
};

/// Purchases whose expiration is this close to the purchase date are treated as expiring on purchase
const SAME_DATE_TOLERANCE_SECONDS: i64 = 5;

/// The kind of product a purchase was made for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductType {
    /// The receipt did not state a type, or stated one this crate does not know
    Unknown,
    NonConsumable,
    Consumable,
    NonRenewingSubscription,
    AutoRenewableSubscription,
}

impl ProductType {
    /// Map the `INTEGER` stored in the receipt to a product type
    pub fn from_int(value: i64) -> Self {
        match value {
            0 => Self::NonConsumable,
            1 => Self::Consumable,
            2 => Self::NonRenewingSubscription,
            3 => Self::AutoRenewableSubscription,
            _ => Self::Unknown,
        }
    }
}

impl Default for ProductType {
    /// The default ProductType is [`ProductType::Unknown`].
    fn default() -> Self {
        Self::Unknown
    }
}

impl Display for ProductType {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            ProductType::Unknown => write!(fmt, "unknown"),
            ProductType::NonConsumable => write!(fmt, "non-consumable"),
            ProductType::Consumable => write!(fmt, "consumable"),
            ProductType::NonRenewingSubscription => write!(fmt, "non-renewing subscription"),
            ProductType::AutoRenewableSubscription => write!(fmt, "auto-renewable subscription"),
        }
    }
}

/// One purchased product's transaction record within a receipt
///
/// # Documentation
///
/// Apple describes these fields [here](https://developer.apple.com/documentation/appstorereceipts/responsebody/receipt/in_app).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InAppPurchaseReceipt {
    /// The number of items purchased
    pub quantity: u32,
    pub product_id: String,
    /// Always present and never empty
    pub transaction_id: String,
    /// For renewals and restores, the transaction that started the chain
    pub original_transaction_id: Option<String>,
    pub product_type: ProductType,
    pub purchase_date: DateTime<Utc>,
    pub original_purchase_date: Option<DateTime<Utc>>,
    /// Only set for subscriptions
    pub expires_date: Option<DateTime<Utc>>,
    /// Set when Apple customer support refunded the transaction
    pub cancellation_date: Option<DateTime<Utc>>,
    pub is_in_trial_period: Option<bool>,
    pub is_in_intro_offer_period: Option<bool>,
    pub web_order_line_item_id: Option<i64>,
    pub promotional_offer_identifier: Option<String>,
}

impl InAppPurchaseReceipt {
    /// Build a purchase from the `SET` of attributes stored in an in-app purchase attribute
    pub fn from_node(set: &RawNode<'_>, max_depth: usize) -> Result<Self, ParseError> {
        let mut fields = PurchaseFields::default();
        decode_attributes(
            set,
            "in_app_purchase",
            max_depth,
            PURCHASE_FIELDS,
            &mut fields,
        )?;
        fields.build()
    }

    /// Whether the purchase is for a subscription product
    pub fn is_subscription(&self) -> bool {
        match self.product_type {
            ProductType::Unknown => self.expires_date.is_some(),
            ProductType::NonConsumable | ProductType::Consumable => false,
            ProductType::NonRenewingSubscription | ProductType::AutoRenewableSubscription => true,
        }
    }

    /// Whether the purchase still grants access at `now`
    ///
    /// Non-subscriptions never lapse; subscriptions are active until their expiration date.
    pub fn is_active(&self, now: &DateTime<Utc>) -> bool {
        if !self.is_subscription() {
            return true;
        }
        match self.expires_date {
            Some(expires) => expires > *now,
            None => false,
        }
    }

    /// Whether the expiration date is within a few seconds of the purchase date
    ///
    /// Sandbox and `StoreKit` test receipts sometimes contain such purchases.
    pub fn purchase_date_equals_expiration(&self) -> bool {
        match self.expires_date {
            Some(expires) => {
                (expires - self.purchase_date).abs()
                    <= Duration::seconds(SAME_DATE_TOLERANCE_SECONDS)
            }
            None => false,
        }
    }
}

/// Purchase fields collected while walking the attribute `SET`
#[derive(Debug, Default)]
struct PurchaseFields {
    quantity: Option<u32>,
    product_id: Option<String>,
    transaction_id: Option<String>,
    original_transaction_id: Option<String>,
    product_type: Option<ProductType>,
    purchase_date: Option<DateTime<Utc>>,
    original_purchase_date: Option<DateTime<Utc>>,
    expires_date: Option<DateTime<Utc>>,
    cancellation_date: Option<DateTime<Utc>>,
    is_in_trial_period: Option<bool>,
    is_in_intro_offer_period: Option<bool>,
    web_order_line_item_id: Option<i64>,
    promotional_offer_identifier: Option<String>,
}

impl PurchaseFields {
    fn build(self) -> Result<InAppPurchaseReceipt, ParseError> {
        Ok(InAppPurchaseReceipt {
            quantity: self.quantity.ok_or_else(|| missing(InAppPurchaseAttributeType::Quantity))?,
            product_id: self
                .product_id
                .ok_or_else(|| missing(InAppPurchaseAttributeType::ProductId))?,
            transaction_id: self
                .transaction_id
                .filter(|id| !id.is_empty())
                .ok_or_else(|| missing(InAppPurchaseAttributeType::TransactionId))?,
            original_transaction_id: self.original_transaction_id,
            product_type: self.product_type.unwrap_or_default(),
            purchase_date: self
                .purchase_date
                .ok_or_else(|| missing(InAppPurchaseAttributeType::PurchaseDate))?,
            original_purchase_date: self.original_purchase_date,
            expires_date: self.expires_date,
            cancellation_date: self.cancellation_date,
            is_in_trial_period: self.is_in_trial_period,
            is_in_intro_offer_period: self.is_in_intro_offer_period,
            web_order_line_item_id: self.web_order_line_item_id,
            promotional_offer_identifier: self.promotional_offer_identifier,
        })
    }
}

fn missing(kind: InAppPurchaseAttributeType) -> ParseError {
    ParseError::MissingRequiredField(kind.name().to_string())
}

/// Maps each known purchase attribute type to the field it fills
const PURCHASE_FIELDS: &[(InAppPurchaseAttributeType, FieldHandler<PurchaseFields>)] = &[
    (InAppPurchaseAttributeType::Quantity, quantity),
    (InAppPurchaseAttributeType::ProductId, product_id),
    (InAppPurchaseAttributeType::TransactionId, transaction_id),
    (InAppPurchaseAttributeType::PurchaseDate, purchase_date),
    (InAppPurchaseAttributeType::OriginalTransactionId, original_transaction_id),
    (InAppPurchaseAttributeType::OriginalPurchaseDate, original_purchase_date),
    (InAppPurchaseAttributeType::ProductType, product_type),
    (InAppPurchaseAttributeType::ExpiresDate, expires_date),
    (InAppPurchaseAttributeType::WebOrderLineItemId, web_order_line_item_id),
    (InAppPurchaseAttributeType::CancellationDate, cancellation_date),
    (InAppPurchaseAttributeType::IsInTrialPeriod, is_in_trial_period),
    (InAppPurchaseAttributeType::IsInIntroOfferPeriod, is_in_intro_offer_period),
    (InAppPurchaseAttributeType::PromotionalOfferIdentifier, promotional_offer_identifier),
];

fn quantity(
    fields: &mut PurchaseFields,
    attribute: &ReceiptAttribute<'_>,
    field: &'static str,
) -> Result<(), ParseError> {
    let value = attribute.integer(field)?;
    let value = u32::try_from(value)
        .map_err(|_| ParseError::Malformed(format!("{field} {value} is out of range")))?;
    set_once(&mut fields.quantity, value, field)
}

fn product_id(
    fields: &mut PurchaseFields,
    attribute: &ReceiptAttribute<'_>,
    field: &'static str,
) -> Result<(), ParseError> {
    set_once(&mut fields.product_id, attribute.string(field)?, field)
}

fn transaction_id(
    fields: &mut PurchaseFields,
    attribute: &ReceiptAttribute<'_>,
    field: &'static str,
) -> Result<(), ParseError> {
    set_once(&mut fields.transaction_id, attribute.string(field)?, field)
}

fn original_transaction_id(
    fields: &mut PurchaseFields,
    attribute: &ReceiptAttribute<'_>,
    field: &'static str,
) -> Result<(), ParseError> {
    set_once(
        &mut fields.original_transaction_id,
        attribute.string(field)?,
        field,
    )
}

fn purchase_date(
    fields: &mut PurchaseFields,
    attribute: &ReceiptAttribute<'_>,
    field: &'static str,
) -> Result<(), ParseError> {
    match attribute.date(field)? {
        Some(date) => set_once(&mut fields.purchase_date, date, field),
        None => Ok(()),
    }
}

fn original_purchase_date(
    fields: &mut PurchaseFields,
    attribute: &ReceiptAttribute<'_>,
    field: &'static str,
) -> Result<(), ParseError> {
    match attribute.date(field)? {
        Some(date) => set_once(&mut fields.original_purchase_date, date, field),
        None => Ok(()),
    }
}

fn product_type(
    fields: &mut PurchaseFields,
    attribute: &ReceiptAttribute<'_>,
    field: &'static str,
) -> Result<(), ParseError> {
    let value = ProductType::from_int(attribute.integer(field)?);
    set_once(&mut fields.product_type, value, field)
}

fn expires_date(
    fields: &mut PurchaseFields,
    attribute: &ReceiptAttribute<'_>,
    field: &'static str,
) -> Result<(), ParseError> {
    match attribute.date(field)? {
        Some(date) => set_once(&mut fields.expires_date, date, field),
        None => Ok(()),
    }
}

fn web_order_line_item_id(
    fields: &mut PurchaseFields,
    attribute: &ReceiptAttribute<'_>,
    field: &'static str,
) -> Result<(), ParseError> {
    set_once(
        &mut fields.web_order_line_item_id,
        attribute.integer(field)?,
        field,
    )
}

fn cancellation_date(
    fields: &mut PurchaseFields,
    attribute: &ReceiptAttribute<'_>,
    field: &'static str,
) -> Result<(), ParseError> {
    match attribute.date(field)? {
        Some(date) => set_once(&mut fields.cancellation_date, date, field),
        None => Ok(()),
    }
}

fn is_in_trial_period(
    fields: &mut PurchaseFields,
    attribute: &ReceiptAttribute<'_>,
    field: &'static str,
) -> Result<(), ParseError> {
    set_once(&mut fields.is_in_trial_period, attribute.boolean(field)?, field)
}

fn is_in_intro_offer_period(
    fields: &mut PurchaseFields,
    attribute: &ReceiptAttribute<'_>,
    field: &'static str,
) -> Result<(), ParseError> {
    set_once(
        &mut fields.is_in_intro_offer_period,
        attribute.boolean(field)?,
        field,
    )
}

fn promotional_offer_identifier(
    fields: &mut PurchaseFields,
    attribute: &ReceiptAttribute<'_>,
    field: &'static str,
) -> Result<(), ParseError> {
    set_once(
        &mut fields.promotional_offer_identifier,
        attribute.string(field)?,
        field,
    )
}

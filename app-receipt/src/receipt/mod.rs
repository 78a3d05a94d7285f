pub mod app_receipt;
pub mod attribute;
pub mod decoder;
pub mod envelope;
pub mod in_app_purchase;

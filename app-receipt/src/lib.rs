#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

pub mod error;
pub mod receipt;
pub mod util;

pub use receipt::{
    app_receipt::AppReceipt,
    decoder::ReceiptDecoder,
    in_app_purchase::{InAppPurchaseReceipt, ProductType},
};

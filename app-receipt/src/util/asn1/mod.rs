/*!
 Contains logic and data structures used to decode tag-length-value data into native Rust data structures.

 ## Overview

 App Store receipts are `PKCS#7` containers whose payload is itself a tree of
 [ASN.1](https://www.itu.int/rec/T-REC-X.690) nodes. Each node starts with identifier octets
 (class, primitive or constructed form, tag number), followed by length octets and content.

 ## Features

 - Pure Rust implementation with no dependencies on Apple frameworks
 - Short, long, and indefinite length forms
 - High tag numbers
 - Explicit errors for truncated or malformed data, never partial output
*/

#[cfg(test)]
pub(crate) mod encoder;
pub mod models;
pub mod parser;

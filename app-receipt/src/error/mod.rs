/*!
 Errors that can happen when decoding receipt data.
*/

pub mod asn1;
pub mod envelope;

/*!
 This module defines common utilities used across receipt decoding.
*/

pub mod asn1;
pub mod dates;

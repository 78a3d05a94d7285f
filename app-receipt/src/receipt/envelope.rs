/*!
 Locates the receipt payload inside the `PKCS#7` container the App Store delivers.

 The container is a `SignedData` content info:

 ```txt
 ContentInfo ::= SEQUENCE {
     contentType OBJECT IDENTIFIER,      -- signedData
     content [0] EXPLICIT SEQUENCE {
         version, digestAlgorithms,
         encapContentInfo SEQUENCE {
             eContentType OBJECT IDENTIFIER, -- data
             eContent [0] EXPLICIT OCTET STRING
         },
         certificates, signerInfos, ...
     }
 }
 ```

 Only the structure is walked here. Signatures are not checked.
*/

use std::borrow::Cow;

use crate::{
    error::envelope::EnvelopeError,
    util::asn1::models::{RawNode, TagClass, OBJECT_IDENTIFIER, OCTET_STRING},
};

/// Content octets of the `data` object identifier, `1.2.840.113549.1.7.1`
pub const DATA_OID: [u8; 9] = [0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x07, 0x01];

/// Find the receipt payload octets in a decoded container
///
/// Chunked `OCTET STRING`s are joined into a single owned buffer; otherwise the
/// payload is borrowed from the container.
pub fn extract_payload<'a>(root: &RawNode<'a>) -> Result<Cow<'a, [u8]>, EnvelopeError> {
    match find_content(root) {
        Some(Some(content)) => unwrap_content(content),
        Some(None) => Err(EnvelopeError::PayloadMissing),
        None => Err(EnvelopeError::DataObjectIdentifierMissing),
    }
}

/// Depth-first search for the `data` identifier, yielding the sibling that follows it
///
/// The outer `Option` is `None` when no identifier was found, the inner one when it has no sibling.
fn find_content<'n, 'a>(node: &'n RawNode<'a>) -> Option<Option<&'n RawNode<'a>>> {
    for (idx, child) in node.children.iter().enumerate() {
        if is_data_identifier(child) {
            return Some(node.children.get(idx + 1));
        }
        if let Some(found) = find_content(child) {
            return Some(found);
        }
    }
    None
}

fn is_data_identifier(node: &RawNode<'_>) -> bool {
    !node.is_constructed() && node.is_universal(OBJECT_IDENTIFIER) && node.payload == DATA_OID
}

fn unwrap_content<'a>(node: &RawNode<'a>) -> Result<Cow<'a, [u8]>, EnvelopeError> {
    if node.tag.class == TagClass::ContextSpecific && node.tag.number == 0 {
        return match node.children.as_slice() {
            [inner] => octets(inner),
            _ => Err(EnvelopeError::PayloadMissing),
        };
    }
    octets(node)
}

fn octets<'a>(node: &RawNode<'a>) -> Result<Cow<'a, [u8]>, EnvelopeError> {
    if !node.is_universal(OCTET_STRING) {
        return Err(EnvelopeError::PayloadMissing);
    }
    if !node.is_constructed() {
        return Ok(Cow::Borrowed(node.payload));
    }

    let mut joined = Vec::with_capacity(node.payload.len());
    for chunk in &node.children {
        joined.extend_from_slice(&octets(chunk)?);
    }
    Ok(Cow::Owned(joined))
}

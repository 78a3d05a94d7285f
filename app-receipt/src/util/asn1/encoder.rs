/*!
 Minimal distinguished-encoding-rules writer used to build fixtures in tests.
*/

use crate::util::asn1::models::{
    RawNode, Tag, TagClass, IA5_STRING, INTEGER, OBJECT_IDENTIFIER, OCTET_STRING, SEQUENCE, SET,
    UTF8_STRING,
};

/// An owned node that can be written as definite-length bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Element {
    Primitive(Tag, Vec<u8>),
    Constructed(Tag, Vec<Element>),
}

impl Element {
    pub(crate) fn primitive(number: u32, content: &[u8]) -> Self {
        Self::Primitive(
            Tag::new(TagClass::Universal, false, number),
            content.to_vec(),
        )
    }

    pub(crate) fn constructed(number: u32, children: Vec<Element>) -> Self {
        Self::Constructed(Tag::new(TagClass::Universal, true, number), children)
    }

    pub(crate) fn integer(value: i64) -> Self {
        let bytes = value.to_be_bytes();
        // Drop leading octets that only repeat the sign
        let start = (0..bytes.len() - 1)
            .find(|&idx| {
                let redundant = (bytes[idx] == 0x00 && bytes[idx + 1] & 0x80 == 0)
                    || (bytes[idx] == 0xFF && bytes[idx + 1] & 0x80 != 0);
                !redundant
            })
            .unwrap_or(bytes.len() - 1);
        Self::primitive(INTEGER, &bytes[start..])
    }

    pub(crate) fn utf8(text: &str) -> Self {
        Self::primitive(UTF8_STRING, text.as_bytes())
    }

    pub(crate) fn ia5(text: &str) -> Self {
        Self::primitive(IA5_STRING, text.as_bytes())
    }

    pub(crate) fn octets(content: &[u8]) -> Self {
        Self::primitive(OCTET_STRING, content)
    }

    /// An `OCTET STRING` holding the encoding of another element
    pub(crate) fn wrapped(inner: &Element) -> Self {
        Self::octets(&inner.encode())
    }

    pub(crate) fn oid(content: &[u8]) -> Self {
        Self::primitive(OBJECT_IDENTIFIER, content)
    }

    pub(crate) fn sequence(children: Vec<Element>) -> Self {
        Self::constructed(SEQUENCE, children)
    }

    pub(crate) fn set(children: Vec<Element>) -> Self {
        Self::constructed(SET, children)
    }

    /// A constructed context-specific node, as used for `[0] EXPLICIT` wrappers
    pub(crate) fn context(number: u32, children: Vec<Element>) -> Self {
        Self::Constructed(Tag::new(TagClass::ContextSpecific, true, number), children)
    }

    pub(crate) fn encode(&self) -> Vec<u8> {
        let (tag, content) = match self {
            Element::Primitive(tag, content) => (tag, content.clone()),
            Element::Constructed(tag, children) => {
                (tag, children.iter().flat_map(Element::encode).collect())
            }
        };
        let mut out = encode_tag(tag);
        out.extend(encode_length(content.len()));
        out.extend(content);
        out
    }
}

impl From<&RawNode<'_>> for Element {
    fn from(node: &RawNode<'_>) -> Self {
        if node.tag.constructed {
            Element::Constructed(node.tag, node.children.iter().map(Element::from).collect())
        } else {
            Element::Primitive(node.tag, node.payload.to_vec())
        }
    }
}

/// A receipt attribute: `SEQUENCE { type INTEGER, version INTEGER, value OCTET STRING }`
pub(crate) fn attribute(attribute_type: i64, value: &Element) -> Element {
    raw_attribute(attribute_type, &value.encode())
}

/// A receipt attribute whose value octets are not themselves an encoding
pub(crate) fn raw_attribute(attribute_type: i64, value: &[u8]) -> Element {
    Element::sequence(vec![
        Element::integer(attribute_type),
        Element::integer(1),
        Element::octets(value),
    ])
}

fn encode_tag(tag: &Tag) -> Vec<u8> {
    let constructed = if tag.constructed { 0b0010_0000 } else { 0 };
    let leading = tag.class.bits() | constructed;
    if tag.number < 31 {
        return vec![leading | tag.number as u8];
    }
    let mut digits = vec![];
    let mut number = tag.number;
    while number > 0 {
        digits.push((number & 0x7F) as u8);
        number >>= 7;
    }
    digits.reverse();
    let last = digits.len() - 1;
    digits
        .iter_mut()
        .take(last)
        .for_each(|digit| *digit |= 0x80);
    let mut out = vec![leading | 0x1F];
    out.extend(digits);
    out
}

fn encode_length(len: usize) -> Vec<u8> {
    if len < 128 {
        return vec![len as u8];
    }
    let bytes: Vec<u8> = len
        .to_be_bytes()
        .into_iter()
        .skip_while(|byte| *byte == 0)
        .collect();
    let mut out = vec![0x80 | bytes.len() as u8];
    out.extend(bytes);
    out
}

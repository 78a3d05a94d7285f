/*!
 Data structures used to represent decoded tag-length-value data.
*/

use crate::error::asn1::ParseError;

/// Universal tag number for the end-of-contents marker of an indefinite-length node
pub const END_OF_CONTENTS: u32 = 0;
/// Universal tag number for an `INTEGER`
pub const INTEGER: u32 = 2;
/// Universal tag number for an `OCTET STRING`
pub const OCTET_STRING: u32 = 4;
/// Universal tag number for an `OBJECT IDENTIFIER`
pub const OBJECT_IDENTIFIER: u32 = 6;
/// Universal tag number for a `UTF8String`
pub const UTF8_STRING: u32 = 12;
/// Universal tag number for a `SEQUENCE`
pub const SEQUENCE: u32 = 16;
/// Universal tag number for a `SET`
pub const SET: u32 = 17;
/// Universal tag number for a `PrintableString`
pub const PRINTABLE_STRING: u32 = 19;
/// Universal tag number for an `IA5String`
pub const IA5_STRING: u32 = 22;

/// The class bits of an identifier octet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagClass {
    Universal,
    Application,
    ContextSpecific,
    Private,
}

impl TagClass {
    pub(crate) fn from_byte(byte: u8) -> Self {
        match byte >> 6 {
            0 => Self::Universal,
            1 => Self::Application,
            2 => Self::ContextSpecific,
            _ => Self::Private,
        }
    }

    /// The class encoded in the two high bits of an identifier octet
    pub fn bits(&self) -> u8 {
        match self {
            TagClass::Universal => 0b0000_0000,
            TagClass::Application => 0b0100_0000,
            TagClass::ContextSpecific => 0b1000_0000,
            TagClass::Private => 0b1100_0000,
        }
    }
}

/// The decoded identifier octets of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub class: TagClass,
    /// `true` if the node contains child nodes instead of raw content
    pub constructed: bool,
    pub number: u32,
}

impl Tag {
    pub fn new(class: TagClass, constructed: bool, number: u32) -> Self {
        Self {
            class,
            constructed,
            number,
        }
    }

    /// Whether this is the universal tag with the given number
    pub fn is_universal(&self, number: u32) -> bool {
        self.class == TagClass::Universal && self.number == number
    }
}

/// How the length of a node was declared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    /// The length octets state the content size
    Definite(usize),
    /// The content runs until an end-of-contents marker
    Indefinite,
}

/// A single decoded tag-length-value unit
///
/// Nodes borrow their content from the buffer they were read from, so a tree
/// cannot outlive the bytes it describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNode<'a> {
    pub tag: Tag,
    pub length: Length,
    /// Number of bytes used by the identifier and length octets
    pub header_len: usize,
    /// Content octets; for constructed nodes this is the encoding of all children
    pub payload: &'a [u8],
    /// Child nodes in encounter order, empty for primitive nodes
    pub children: Vec<RawNode<'a>>,
}

impl<'a> RawNode<'a> {
    /// Total number of bytes this node occupies in its source buffer
    pub fn total_len(&self) -> usize {
        let end_of_contents = match self.length {
            Length::Definite(_) => 0,
            Length::Indefinite => 2,
        };
        self.header_len + self.payload.len() + end_of_contents
    }

    pub fn is_constructed(&self) -> bool {
        self.tag.constructed
    }

    /// Whether this node is a universal node with the given tag number
    pub fn is_universal(&self, number: u32) -> bool {
        self.tag.is_universal(number)
    }

    /// Interpret the content as a big-endian two's complement `INTEGER`
    pub fn integer_value(&self) -> Result<i64, ParseError> {
        let bytes = self.payload;
        match bytes.first() {
            None => Err(ParseError::Malformed("integer has no content".to_string())),
            Some(_) if bytes.len() > 8 => Err(ParseError::Malformed(format!(
                "integer of {} bytes does not fit in 64 bits",
                bytes.len()
            ))),
            Some(first) => {
                let sign: i64 = if first & 0x80 != 0 { -1 } else { 0 };
                Ok(bytes
                    .iter()
                    .fold(sign, |acc, byte| (acc << 8) | i64::from(*byte)))
            }
        }
    }

    /// Interpret the content as UTF-8 text
    pub fn string_value(&self) -> Result<&'a str, ParseError> {
        std::str::from_utf8(self.payload)
            .map_err(|why| ParseError::Malformed(format!("failed to parse string: {why}")))
    }
}

/*!
 Contains logic to decode tag-length-value data encoded with the [ASN.1](https://www.itu.int/rec/T-REC-X.690) basic and distinguished encoding rules.

 Only the structure is decoded here; interpreting the content of a node is left to the caller.
*/
use crate::{
    error::asn1::ParseError,
    util::asn1::models::{Length, RawNode, Tag, TagClass, END_OF_CONTENTS},
};

/// Set in the identifier octet when the node contains child nodes
const CONSTRUCTED: u8 = 0b0010_0000;
/// When all of these bits are set in the identifier octet, the tag number continues in the following octets
const TAG_NUMBER_MASK: u8 = 0b0001_1111;
/// Set in a tag number continuation octet when another octet follows
const CONTINUATION: u8 = 0b1000_0000;
/// Set in the first length octet for the long form
const LONG_FORM: u8 = 0b1000_0000;
/// First length octet of an indefinite-length node
const INDEFINITE: u8 = 0b1000_0000;
/// First length octet reserved for future extension
const RESERVED: u8 = 0xFF;
/// Default limit on how deeply nodes may be nested
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Contains logic and data used to decode nodes from a byte stream
///
/// The reader holds no position of its own: each read takes the offset to start
/// from and hands back the offset just past what it consumed.
#[derive(Debug, Clone, Copy)]
pub struct Asn1Reader<'a> {
    /// The data we want to decode
    stream: &'a [u8],
    /// Nodes nested deeper than this are rejected
    max_depth: usize,
}

impl<'a> Asn1Reader<'a> {
    pub fn new(stream: &'a [u8]) -> Self {
        Self {
            stream,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Decode a single node that spans the entire stream
    pub fn read_root(&self) -> Result<RawNode<'a>, ParseError> {
        if self.stream.is_empty() {
            return Err(ParseError::Truncated(1, 0));
        }
        let (node, end) = self.read_node(0, self.stream.len(), 0)?;
        if end != self.stream.len() {
            return Err(ParseError::Malformed(format!(
                "{} trailing bytes after root node",
                self.stream.len() - end
            )));
        }
        Ok(node)
    }

    /// Decode the node starting at `pos`, which must end at or before `limit`
    ///
    /// Returns the node and the offset of the first byte after it.
    pub fn read_node(
        &self,
        pos: usize,
        limit: usize,
        depth: usize,
    ) -> Result<(RawNode<'a>, usize), ParseError> {
        if depth > self.max_depth {
            return Err(ParseError::Malformed(format!(
                "nodes nested deeper than {} levels",
                self.max_depth
            )));
        }

        let (tag, after_tag) = self.read_tag(pos, limit)?;
        let (length, content_start) = self.read_length(after_tag, limit)?;
        let header_len = content_start - pos;

        match length {
            Length::Definite(len) => {
                let end = content_start
                    .checked_add(len)
                    .ok_or_else(|| ParseError::InvalidLength(format!("length {len} overflows")))?;
                if end > limit {
                    return Err(ParseError::Truncated(end, limit));
                }
                let children = if tag.constructed {
                    self.read_children(content_start, end, depth + 1)?
                } else {
                    vec![]
                };
                let node = RawNode {
                    tag,
                    length,
                    header_len,
                    payload: &self.stream[content_start..end],
                    children,
                };
                Ok((node, end))
            }
            Length::Indefinite => {
                if !tag.constructed {
                    return Err(ParseError::InvalidLength(
                        "indefinite length on a primitive node".to_string(),
                    ));
                }
                let (children, content_end) =
                    self.read_until_end_of_contents(content_start, limit, depth + 1)?;
                let node = RawNode {
                    tag,
                    length,
                    header_len,
                    payload: &self.stream[content_start..content_end],
                    children,
                };
                // Skip the two end-of-contents octets
                Ok((node, content_end + 2))
            }
        }
    }

    /// Decode sibling nodes until exactly `end` bytes have been consumed
    fn read_children(
        &self,
        start: usize,
        end: usize,
        depth: usize,
    ) -> Result<Vec<RawNode<'a>>, ParseError> {
        let mut children = vec![];
        let mut pos = start;
        while pos < end {
            let (child, next) = self.read_node(pos, end, depth)?;
            children.push(child);
            pos = next;
        }
        Ok(children)
    }

    /// Decode sibling nodes until an end-of-contents marker
    ///
    /// Returns the children and the offset of the marker.
    fn read_until_end_of_contents(
        &self,
        start: usize,
        limit: usize,
        depth: usize,
    ) -> Result<(Vec<RawNode<'a>>, usize), ParseError> {
        let mut children = vec![];
        let mut pos = start;
        loop {
            if self.is_end_of_contents(pos, limit)? {
                return Ok((children, pos));
            }
            let (child, next) = self.read_node(pos, limit, depth)?;
            children.push(child);
            pos = next;
        }
    }

    fn is_end_of_contents(&self, pos: usize, limit: usize) -> Result<bool, ParseError> {
        let identifier = self.get_byte(pos, limit)?;
        if identifier != END_OF_CONTENTS as u8 {
            return Ok(false);
        }
        Ok(self.get_byte(pos + 1, limit)? == 0)
    }

    /// Read the identifier octets, returning the tag and the offset of the length octets
    fn read_tag(&self, pos: usize, limit: usize) -> Result<(Tag, usize), ParseError> {
        let identifier = self.get_byte(pos, limit)?;
        let class = TagClass::from_byte(identifier);
        let constructed = identifier & CONSTRUCTED != 0;

        let low_bits = identifier & TAG_NUMBER_MASK;
        if low_bits != TAG_NUMBER_MASK {
            return Ok((Tag::new(class, constructed, u32::from(low_bits)), pos + 1));
        }

        // High tag number form: base-128 digits, most significant first
        let mut number: u32 = 0;
        let mut idx = pos + 1;
        loop {
            let byte = self.get_byte(idx, limit)?;
            number = number
                .checked_mul(128)
                .and_then(|n| n.checked_add(u32::from(byte & !CONTINUATION)))
                .ok_or_else(|| ParseError::Malformed("tag number overflows".to_string()))?;
            idx += 1;
            if byte & CONTINUATION == 0 {
                return Ok((Tag::new(class, constructed, number), idx));
            }
        }
    }

    /// Read the length octets, returning the length and the offset of the content
    fn read_length(&self, pos: usize, limit: usize) -> Result<(Length, usize), ParseError> {
        let first = self.get_byte(pos, limit)?;
        match first {
            INDEFINITE => Ok((Length::Indefinite, pos + 1)),
            RESERVED => Err(ParseError::InvalidLength(
                "reserved length octet 0xff".to_string(),
            )),
            short if short & LONG_FORM == 0 => Ok((Length::Definite(usize::from(short)), pos + 1)),
            long => {
                let count = usize::from(long & !LONG_FORM);
                if count > std::mem::size_of::<usize>() {
                    return Err(ParseError::InvalidLength(format!(
                        "{count} length octets do not fit in a machine word"
                    )));
                }
                let octets = self.read_exact_bytes(pos + 1, count, limit)?;
                let len = octets
                    .iter()
                    .fold(0usize, |acc, byte| (acc << 8) | usize::from(*byte));
                Ok((Length::Definite(len), pos + 1 + count))
            }
        }
    }

    /// Read exactly `n` bytes starting at `pos`
    fn read_exact_bytes(&self, pos: usize, n: usize, limit: usize) -> Result<&'a [u8], ParseError> {
        let end = pos + n;
        if end > limit {
            return Err(ParseError::Truncated(end, limit));
        }
        self.stream
            .get(pos..end)
            .ok_or(ParseError::Truncated(end, self.stream.len()))
    }

    /// Get the byte at a given index, if the index is before `limit`
    fn get_byte(&self, byte_idx: usize, limit: usize) -> Result<u8, ParseError> {
        if byte_idx < limit {
            if let Some(byte) = self.stream.get(byte_idx) {
                return Ok(*byte);
            }
        }
        Err(ParseError::Truncated(byte_idx + 1, limit))
    }
}

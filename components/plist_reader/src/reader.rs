//! Binary plist decoder
//!
//! Layout: 8-byte `bplist00` magic, a sequence of objects, an offset table
//! and a 32-byte trailer describing the other two.

use byteorder::{BigEndian, ByteOrder};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{PlistError, Result};
use crate::value::PlistValue;

/// Magic header of every binary plist
pub const MAGIC: &[u8; 8] = b"bplist00";

const TRAILER_LEN: usize = 32;

/// Decode a complete binary plist into its root value
pub fn parse_binary_plist(bytes: &[u8]) -> Result<PlistValue> {
    BinaryPlistReader::new(bytes)?.read_root()
}

/// Returns true if the buffer starts with the binary plist magic
pub fn is_binary_plist(bytes: &[u8]) -> bool {
    bytes.starts_with(MAGIC)
}

/// Parsed trailer fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    pub offset_size: usize,
    pub object_ref_size: usize,
    pub object_count: u64,
    pub root_object: u64,
    pub offset_table_offset: u64,
}

impl Trailer {
    fn parse(bytes: &[u8]) -> Result<Self> {
        let start = bytes.len() - TRAILER_LEN;
        let trailer = &bytes[start..];

        let parsed = Self {
            offset_size: trailer[6] as usize,
            object_ref_size: trailer[7] as usize,
            object_count: BigEndian::read_u64(&trailer[8..16]),
            root_object: BigEndian::read_u64(&trailer[16..24]),
            offset_table_offset: BigEndian::read_u64(&trailer[24..32]),
        };

        if !(1..=8).contains(&parsed.offset_size) {
            return Err(PlistError::InvalidTrailer(format!(
                "offset size {} is not between 1 and 8",
                parsed.offset_size
            )));
        }
        if !(1..=8).contains(&parsed.object_ref_size) {
            return Err(PlistError::InvalidTrailer(format!(
                "object reference size {} is not between 1 and 8",
                parsed.object_ref_size
            )));
        }
        if parsed.object_count == 0 {
            return Err(PlistError::InvalidTrailer("object count is zero".to_string()));
        }
        if parsed.root_object >= parsed.object_count {
            return Err(PlistError::InvalidTrailer(format!(
                "root object {} is out of range ({} objects)",
                parsed.root_object, parsed.object_count
            )));
        }

        let table_end = parsed
            .object_count
            .checked_mul(parsed.offset_size as u64)
            .and_then(|len| len.checked_add(parsed.offset_table_offset));
        match table_end {
            Some(end) if parsed.offset_table_offset >= MAGIC.len() as u64 && end <= start as u64 => {
                Ok(parsed)
            }
            _ => Err(PlistError::InvalidTrailer(format!(
                "offset table at {} with {} entries does not fit in the buffer",
                parsed.offset_table_offset, parsed.object_count
            ))),
        }
    }
}

/// Deepest container nesting accepted below the root
pub const MAX_NESTING_DEPTH: usize = 512;

/// Values materialized per input byte before decoding is abandoned
pub const NODES_PER_BYTE: usize = 16;

const MIN_NODE_BUDGET: usize = 4096;

/// Stateful reader over one binary plist buffer
///
/// Decoded objects are memoized by object index, so shared sub-objects are
/// parsed once. Every copy handed out still counts against a node budget
/// proportional to the buffer size, which bounds containers that share
/// children many times over.
pub struct BinaryPlistReader<'a> {
    bytes: &'a [u8],
    trailer: Trailer,
    offsets: Vec<usize>,
    decoded: Vec<Option<(PlistValue, usize)>>,
    in_progress: Vec<bool>,
    depth: usize,
    nodes: usize,
    node_budget: usize,
}

impl<'a> BinaryPlistReader<'a> {
    /// Validate the header and trailer and load the offset table
    pub fn new(bytes: &'a [u8]) -> Result<Self> {
        if !is_binary_plist(bytes) {
            return Err(PlistError::BadMagic);
        }
        if bytes.len() < MAGIC.len() + TRAILER_LEN {
            return Err(PlistError::MissingTrailer(bytes.len()));
        }

        let trailer = Trailer::parse(bytes)?;
        let objects_end = bytes.len() - TRAILER_LEN;
        let count = trailer.object_count as usize;
        let table = trailer.offset_table_offset as usize;

        let mut offsets = Vec::with_capacity(count);
        for i in 0..count {
            let at = table + i * trailer.offset_size;
            let offset = read_uint(bytes, at, trailer.offset_size)? as usize;
            if offset < MAGIC.len() || offset >= objects_end {
                return Err(PlistError::InvalidTrailer(format!(
                    "object {} has offset {} outside the object area",
                    i, offset
                )));
            }
            offsets.push(offset);
        }

        debug!(
            "Binary plist has {} objects, root object {}",
            trailer.object_count, trailer.root_object
        );

        Ok(Self {
            bytes,
            trailer,
            offsets,
            decoded: vec![None; count],
            in_progress: vec![false; count],
            depth: 0,
            nodes: 0,
            node_budget: bytes.len().saturating_mul(NODES_PER_BYTE).max(MIN_NODE_BUDGET),
        })
    }

    pub fn trailer(&self) -> &Trailer {
        &self.trailer
    }

    /// Decode the root object
    pub fn read_root(mut self) -> Result<PlistValue> {
        let root = self.trailer.root_object;
        self.object(root, self.bytes.len() - TRAILER_LEN + 16)
    }

    fn object(&mut self, index: u64, referenced_at: usize) -> Result<PlistValue> {
        if index >= self.trailer.object_count {
            return Err(PlistError::InvalidObjectRef {
                index,
                count: self.trailer.object_count,
                offset: referenced_at,
            });
        }
        let idx = index as usize;
        if let Some((value, size)) = &self.decoded[idx] {
            self.nodes = charge(self.nodes, *size, self.node_budget, referenced_at)?;
            return Ok(value.clone());
        }
        if self.in_progress[idx] {
            return Err(PlistError::RecursiveObject {
                offset: self.offsets[idx],
            });
        }
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(PlistError::NestingTooDeep {
                limit: MAX_NESTING_DEPTH,
                offset: self.offsets[idx],
            });
        }

        let nodes_before = self.nodes;
        self.in_progress[idx] = true;
        self.depth += 1;
        let value = self.decode(self.offsets[idx]);
        self.depth -= 1;
        self.in_progress[idx] = false;
        let value = value?;
        self.nodes = charge(self.nodes, 1, self.node_budget, self.offsets[idx])?;

        let size = self.nodes - nodes_before;
        self.decoded[idx] = Some((value.clone(), size));
        Ok(value)
    }

    fn decode(&mut self, offset: usize) -> Result<PlistValue> {
        let marker = self.byte(offset)?;
        let info = marker & 0x0f;
        let unknown = PlistError::UnknownMarker { marker, offset };

        match marker >> 4 {
            0x0 => match info {
                0x0 | 0xf => Ok(PlistValue::Null),
                0x8 => Ok(PlistValue::Bool(false)),
                0x9 => Ok(PlistValue::Bool(true)),
                _ => Err(unknown),
            },
            0x1 => {
                if info > 4 {
                    return Err(unknown);
                }
                self.integer(offset + 1, 1 << info).map(PlistValue::Integer)
            }
            0x2 => match info {
                2 => {
                    let raw = self.slice(offset + 1, 4)?;
                    Ok(PlistValue::Real(BigEndian::read_f32(raw) as f64))
                }
                3 => {
                    let raw = self.slice(offset + 1, 8)?;
                    Ok(PlistValue::Real(BigEndian::read_f64(raw)))
                }
                _ => Err(unknown),
            },
            0x3 => {
                if info != 3 {
                    return Err(unknown);
                }
                let raw = self.slice(offset + 1, 8)?;
                Ok(PlistValue::Date(BigEndian::read_f64(raw)))
            }
            0x4 => {
                let (len, start) = self.length(offset, info)?;
                Ok(PlistValue::Data(self.slice(start, len)?.to_vec()))
            }
            0x5 => {
                // One byte per character; non-ASCII bytes are read as Latin-1
                let (len, start) = self.length(offset, info)?;
                let raw = self.slice(start, len)?;
                Ok(PlistValue::String(raw.iter().map(|&b| b as char).collect()))
            }
            0x6 => {
                let (units, start) = self.length(offset, info)?;
                let byte_len = units
                    .checked_mul(2)
                    .ok_or(PlistError::Truncated { offset: start, len: usize::MAX })?;
                let raw = self.slice(start, byte_len)?;
                let code_units: Vec<u16> = raw.chunks_exact(2).map(BigEndian::read_u16).collect();
                String::from_utf16(&code_units)
                    .map(PlistValue::String)
                    .map_err(|_| PlistError::InvalidString { offset })
            }
            0x7 => {
                let (len, start) = self.length(offset, info)?;
                let raw = self.slice(start, len)?;
                std::str::from_utf8(raw)
                    .map(|s| PlistValue::String(s.to_string()))
                    .map_err(|_| PlistError::InvalidString { offset })
            }
            0x8 => {
                let width = info as usize + 1;
                if width > 8 {
                    return Err(unknown);
                }
                read_uint(self.bytes, offset + 1, width).map(PlistValue::Uid)
            }
            0xa | 0xc => {
                let (count, start) = self.length(offset, info)?;
                let refs = self.refs(start, count)?;
                let mut items = Vec::with_capacity(refs.len());
                for (i, index) in refs.into_iter().enumerate() {
                    let at = start + i * self.trailer.object_ref_size;
                    items.push(self.object(index, at)?);
                }
                Ok(PlistValue::Array(items))
            }
            0xd => {
                let (count, start) = self.length(offset, info)?;
                let key_refs = self.refs(start, count)?;
                let values_start = start + count * self.trailer.object_ref_size;
                let value_refs = self.refs(values_start, count)?;

                let mut map = BTreeMap::new();
                for (i, (key_ref, value_ref)) in key_refs.into_iter().zip(value_refs).enumerate() {
                    let key_at = start + i * self.trailer.object_ref_size;
                    let key = match self.object(key_ref, key_at)? {
                        PlistValue::String(key) => key,
                        _ => return Err(PlistError::NonStringKey { offset: key_at }),
                    };
                    let value_at = values_start + i * self.trailer.object_ref_size;
                    let value = self.object(value_ref, value_at)?;
                    map.insert(key, value);
                }
                Ok(PlistValue::Dictionary(map))
            }
            _ => Err(unknown),
        }
    }

    /// Read an object's length: the low nibble, or a trailing integer object when it is 0xF
    fn length(&self, offset: usize, info: u8) -> Result<(usize, usize)> {
        if info != 0x0f {
            return Ok((info as usize, offset + 1));
        }
        let marker = self.byte(offset + 1)?;
        if marker >> 4 != 0x1 || marker & 0x0f > 3 {
            return Err(PlistError::UnknownMarker {
                marker,
                offset: offset + 1,
            });
        }
        let width = 1usize << (marker & 0x0f);
        let len = read_uint(self.bytes, offset + 2, width)?;
        let len = usize::try_from(len).map_err(|_| PlistError::Truncated {
            offset: offset + 2,
            len: usize::MAX,
        })?;
        Ok((len, offset + 2 + width))
    }

    fn refs(&self, start: usize, count: usize) -> Result<Vec<u64>> {
        let size = self.trailer.object_ref_size;
        let total = count
            .checked_mul(size)
            .ok_or(PlistError::Truncated { offset: start, len: usize::MAX })?;
        self.slice(start, total)?;
        (0..count)
            .map(|i| read_uint(self.bytes, start + i * size, size))
            .collect()
    }

    /// Integers of 1, 2 and 4 bytes are unsigned; 8 and 16 byte integers are signed
    fn integer(&self, offset: usize, width: usize) -> Result<i64> {
        let raw = self.slice(offset, width)?;
        Ok(match width {
            1 | 2 | 4 => BigEndian::read_uint(raw, width) as i64,
            8 => BigEndian::read_i64(raw),
            _ => BigEndian::read_i64(&raw[8..16]),
        })
    }

    fn byte(&self, offset: usize) -> Result<u8> {
        self.bytes
            .get(offset)
            .copied()
            .ok_or(PlistError::Truncated { offset, len: 1 })
    }

    fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        let bytes: &'a [u8] = self.bytes;
        offset
            .checked_add(len)
            .and_then(|end| bytes.get(offset..end))
            .ok_or(PlistError::Truncated { offset, len })
    }
}

/// New materialized-value total after adding `size`, if within `budget`
fn charge(nodes: usize, size: usize, budget: usize, offset: usize) -> Result<usize> {
    nodes
        .checked_add(size)
        .filter(|&total| total <= budget)
        .ok_or(PlistError::TooManyNodes { budget, offset })
}

fn read_uint(bytes: &[u8], offset: usize, width: usize) -> Result<u64> {
    offset
        .checked_add(width)
        .and_then(|end| bytes.get(offset..end))
        .map(|raw| BigEndian::read_uint(raw, width))
        .ok_or(PlistError::Truncated { offset, len: width })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::PlistBuilder;
    use pretty_assertions::assert_eq;

    fn single(build: impl FnOnce(&mut PlistBuilder) -> u64) -> PlistValue {
        let mut builder = PlistBuilder::new();
        let root = build(&mut builder);
        parse_binary_plist(&builder.build(root)).unwrap()
    }

    #[test]
    fn test_rejects_missing_magic() {
        assert_eq!(parse_binary_plist(b"bplist01"), Err(PlistError::BadMagic));
        assert_eq!(parse_binary_plist(b""), Err(PlistError::BadMagic));
        assert_eq!(
            parse_binary_plist(b"<?xml version=\"1.0\"?><plist/>"),
            Err(PlistError::BadMagic)
        );
    }

    #[test]
    fn test_rejects_missing_trailer() {
        assert_eq!(
            parse_binary_plist(b"bplist00\x08"),
            Err(PlistError::MissingTrailer(9))
        );
    }

    #[test]
    fn test_singletons() {
        assert_eq!(single(|b| b.null()), PlistValue::Null);
        assert_eq!(single(|b| b.boolean(true)), PlistValue::Bool(true));
        assert_eq!(single(|b| b.boolean(false)), PlistValue::Bool(false));
        assert_eq!(single(|b| b.raw(&[0x0f])), PlistValue::Null);
    }

    #[test]
    fn test_integers() {
        assert_eq!(single(|b| b.raw(&[0x10, 0x05])), PlistValue::Integer(5));
        assert_eq!(single(|b| b.raw(&[0x10, 0xff])), PlistValue::Integer(255));
        assert_eq!(single(|b| b.raw(&[0x11, 0x01, 0x00])), PlistValue::Integer(256));
        assert_eq!(
            single(|b| b.raw(&[0x12, 0xff, 0xff, 0xff, 0xff])),
            PlistValue::Integer(4_294_967_295)
        );
        assert_eq!(single(|b| b.integer(-2)), PlistValue::Integer(-2));

        let mut sixteen = vec![0x14];
        sixteen.extend_from_slice(&[0xff; 8]);
        sixteen.extend_from_slice(&(-7i64).to_be_bytes());
        assert_eq!(single(|b| b.raw(&sixteen)), PlistValue::Integer(-7));
    }

    #[test]
    fn test_reals_and_dates() {
        assert_eq!(single(|b| b.real(1.5)), PlistValue::Real(1.5));

        let mut float = vec![0x22];
        float.extend_from_slice(&2.5f32.to_be_bytes());
        assert_eq!(single(|b| b.raw(&float)), PlistValue::Real(2.5));

        assert_eq!(single(|b| b.date(86_400.0)), PlistValue::Date(86_400.0));
    }

    #[test]
    fn test_strings_and_data() {
        assert_eq!(single(|b| b.data(&[1, 2, 3])), PlistValue::Data(vec![1, 2, 3]));
        assert_eq!(
            single(|b| b.string("hello")),
            PlistValue::String("hello".to_string())
        );
        assert_eq!(
            single(|b| b.string("héllo wörld ✓")),
            PlistValue::String("héllo wörld ✓".to_string())
        );
        assert_eq!(
            single(|b| b.raw(&[0x53, b'a', 0xe9, b'b'])),
            PlistValue::String("aéb".to_string())
        );
        assert_eq!(
            single(|b| b.raw(&[0x72, 0xc3, 0xa9])),
            PlistValue::String("é".to_string())
        );
    }

    #[test]
    fn test_long_length_prefix() {
        let long = "x".repeat(40);
        assert_eq!(single(|b| b.string(&long)), PlistValue::String(long.clone()));
    }

    #[test]
    fn test_uid_is_not_an_integer() {
        assert_eq!(single(|b| b.uid(7)), PlistValue::Uid(7));
        assert_eq!(single(|b| b.uid(0x1234)), PlistValue::Uid(0x1234));
    }

    #[test]
    fn test_containers_share_objects() {
        let value = single(|b| {
            let shared = b.string("shared");
            let list = b.array(&[shared, shared]);
            let key = b.string("list");
            let other = b.string("again");
            b.dictionary(&[(key, list), (other, shared)])
        });

        let list = value.get("list").and_then(PlistValue::as_array).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0], PlistValue::String("shared".to_string()));
        assert_eq!(list[0], list[1]);
        assert_eq!(value.get("again"), Some(&PlistValue::String("shared".to_string())));
    }

    #[test]
    fn test_non_string_key_rejected() {
        let mut builder = PlistBuilder::new();
        let key = builder.integer(1);
        let value = builder.integer(2);
        let root = builder.dictionary(&[(key, value)]);
        let err = parse_binary_plist(&builder.build(root)).unwrap_err();
        assert!(matches!(err, PlistError::NonStringKey { .. }));
    }

    #[test]
    fn test_unknown_marker_reports_offset() {
        let mut builder = PlistBuilder::new();
        let root = builder.raw(&[0x90]);
        let err = parse_binary_plist(&builder.build(root)).unwrap_err();
        assert_eq!(err, PlistError::UnknownMarker { marker: 0x90, offset: 8 });
    }

    #[test]
    fn test_self_containing_array_rejected() {
        let mut builder = PlistBuilder::new();
        // Array object 0 referencing itself
        let root = builder.raw(&[0xa1, 0x00, 0x00]);
        let err = parse_binary_plist(&builder.build(root)).unwrap_err();
        assert_eq!(err, PlistError::RecursiveObject { offset: 8 });
    }

    #[test]
    fn test_truncated_object() {
        let mut builder = PlistBuilder::new();
        // Data object claiming 200 bytes of payload
        let root = builder.raw(&[0x4f, 0x10, 0xc8, 0x01]);
        let err = parse_binary_plist(&builder.build(root)).unwrap_err();
        assert_eq!(err, PlistError::Truncated { offset: 11, len: 200 });
    }

    #[test]
    fn test_invalid_trailer_sizes() {
        let mut builder = PlistBuilder::new();
        let root = builder.null();
        let mut bytes = builder.build(root);
        let len = bytes.len();
        bytes[len - 32 + 6] = 0;
        assert!(matches!(
            parse_binary_plist(&bytes),
            Err(PlistError::InvalidTrailer(_))
        ));
    }
}

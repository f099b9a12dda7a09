//! Alignment-checked dereference into a byte blob, little-endian integer
//! helpers, and the djb2 key hash.
//!
//! Grounded in the teacher's `read/pointer.rs` and `read/file.rs::dereference`,
//! generalized from "dereference against the whole mapped file" to a
//! reusable `ByteView` so the parser can dereference into sub-slices
//! (hash-table blocks) without re-deriving the bounds-check logic each time.
//! The bounds/alignment checks mirror `original_source/libdbdconf/src/
//! private_gvdb_parse.h::dbd_table_dereference` line for line.

use crate::error::{Error, Result};

/// A `(start, end)` byte-offset pair as stored on disk: little-endian `u32`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GvdbPointer {
    start: u32,
    end: u32,
}

impl GvdbPointer {
    pub const NULL: Self = Self { start: 0, end: 0 };

    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start: start as u32,
            end: end as u32,
        }
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn size(&self) -> usize {
        self.end.saturating_sub(self.start) as usize
    }

    pub(crate) fn to_le_bytes(self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[0..4].copy_from_slice(&self.start.to_le_bytes());
        out[4..8].copy_from_slice(&self.end.to_le_bytes());
        out
    }

    pub(crate) fn from_le_bytes(bytes: &[u8]) -> Option<Self> {
        let start = u32::from_le_bytes(bytes.get(0..4)?.try_into().ok()?);
        let end = u32::from_le_bytes(bytes.get(4..8)?.try_into().ok()?);
        Some(Self { start, end })
    }
}

/// A read-only view over a GVDB file's bytes, with bounds- and
/// alignment-checked dereferencing.
///
/// `trusted` lets callers skip redundant structural validation of variant
/// *payloads* further up the stack; it never relaxes the bounds/alignment
/// checks performed here (spec invariant: "a trust flag ... never disables
/// the alignment / bounds checks of this component").
#[derive(Debug, Clone, Copy)]
pub struct ByteView<'a> {
    data: &'a [u8],
}

impl<'a> ByteView<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &'a [u8] {
        self.data
    }

    /// Return the byte range `[start, end)` iff `start <= end`, `end <=
    /// size`, `start` is aligned to `alignment`, and `alignment` is a power
    /// of two. Otherwise: `Error::Truncated`.
    pub fn deref(&self, pointer: GvdbPointer, alignment: u32) -> Result<&'a [u8]> {
        if alignment == 0 || alignment & (alignment - 1) != 0 {
            return Err(Error::Truncated(format!(
                "alignment {alignment} is not a power of two"
            )));
        }

        let start = pointer.start() as usize;
        let end = pointer.end() as usize;

        if start > end {
            return Err(Error::Truncated(format!(
                "pointer start {start} is after end {end}"
            )));
        }
        if end > self.data.len() {
            return Err(Error::Truncated(format!(
                "pointer end {end} exceeds data length {}",
                self.data.len()
            )));
        }
        if start & (alignment as usize - 1) != 0 {
            return Err(Error::Truncated(format!(
                "pointer start {start} is not aligned to {alignment}"
            )));
        }

        Ok(&self.data[start..end])
    }
}

/// Read a little-endian `u32` out of a 4-byte slice. The file's structural
/// fields are always little-endian regardless of the `byteswap` flag, which
/// only governs variant *payload* byteswapping further up the stack.
pub fn read_u32_le(bytes: &[u8]) -> Result<u32> {
    let arr: [u8; 4] = bytes
        .get(0..4)
        .ok_or_else(|| Error::Truncated("expected 4 bytes for u32".into()))?
        .try_into()
        .unwrap();
    Ok(u32::from_le_bytes(arr))
}

/// Read a little-endian `u16` out of a 2-byte slice.
pub fn read_u16_le(bytes: &[u8]) -> Result<u16> {
    let arr: [u8; 2] = bytes
        .get(0..2)
        .ok_or_else(|| Error::Truncated("expected 2 bytes for u16".into()))?
        .try_into()
        .unwrap();
    Ok(u16::from_le_bytes(arr))
}

/// "GVar" in little-endian byte order.
pub const SIGNATURE0: u32 = 1918981703;
/// "iant" in little-endian byte order.
pub const SIGNATURE1: u32 = 1953390953;

/// The 32-byte file header: two signature words, version, options, root pointer.
#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub signature: [u32; 2],
    pub version: u32,
    pub options: u32,
    pub root: GvdbPointer,
}

pub const HEADER_LEN: usize = 32;

impl Header {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::Truncated("file shorter than 32-byte header".into()));
        }
        let signature = [read_u32_le(&bytes[0..4])?, read_u32_le(&bytes[4..8])?];
        let version = read_u32_le(&bytes[8..12])?;
        let options = read_u32_le(&bytes[12..16])?;
        let root = GvdbPointer::from_le_bytes(&bytes[16..24])
            .ok_or_else(|| Error::Truncated("header root pointer truncated".into()))?;
        Ok(Self {
            signature,
            version,
            options,
            root,
        })
    }

    pub fn is_byteswap(&self) -> Result<bool> {
        if self.signature == [SIGNATURE0, SIGNATURE1] {
            Ok(false)
        } else if self.signature == [SIGNATURE0.swap_bytes(), SIGNATURE1.swap_bytes()] {
            Ok(true)
        } else {
            Err(Error::InvalidHeader(format!(
                "unrecognized signature words {:#x} {:#x}",
                self.signature[0], self.signature[1]
            )))
        }
    }

    pub fn to_bytes(self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&self.signature[0].to_le_bytes());
        out[4..8].copy_from_slice(&self.signature[1].to_le_bytes());
        out[8..12].copy_from_slice(&self.version.to_le_bytes());
        out[12..16].copy_from_slice(&self.options.to_le_bytes());
        out[16..24].copy_from_slice(&self.root.to_le_bytes());
        out
    }
}

/// The 8-byte header of a hash-table block: packed bloom shift/word-count,
/// plus a bucket count.
#[derive(Debug, Clone, Copy)]
pub struct HashHeader {
    packed_bloom: u32,
    n_buckets: u32,
}

pub const HASH_HEADER_LEN: usize = 8;

impl HashHeader {
    pub fn new(bloom_shift: u32, n_bloom_words: u32, n_buckets: u32) -> Self {
        Self {
            packed_bloom: (bloom_shift << 27) | n_bloom_words,
            n_buckets,
        }
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            packed_bloom: read_u32_le(bytes.get(0..4).ok_or_else(too_short)?)?,
            n_buckets: read_u32_le(bytes.get(4..8).ok_or_else(too_short)?)?,
        })
    }

    pub fn n_bloom_words(&self) -> u32 {
        self.packed_bloom & ((1 << 27) - 1)
    }

    pub fn bloom_shift(&self) -> u32 {
        self.packed_bloom >> 27
    }

    pub fn n_buckets(&self) -> u32 {
        self.n_buckets
    }

    pub fn to_bytes(self) -> [u8; HASH_HEADER_LEN] {
        let mut out = [0u8; HASH_HEADER_LEN];
        out[0..4].copy_from_slice(&self.packed_bloom.to_le_bytes());
        out[4..8].copy_from_slice(&self.n_buckets.to_le_bytes());
        out
    }
}

fn too_short() -> Error {
    Error::Truncated("hash table header truncated".into())
}

/// The type tag stored in a hash item's `type_char` byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashItemType {
    Variant,
    Table,
    List,
}

impl TryFrom<u8> for HashItemType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            b'v' => Ok(Self::Variant),
            b'H' => Ok(Self::Table),
            b'L' => Ok(Self::List),
            other => Err(Error::BadType(format!(
                "unrecognized hash item type char {other:#04x}"
            ))),
        }
    }
}

impl From<HashItemType> for u8 {
    fn from(value: HashItemType) -> Self {
        match value {
            HashItemType::Variant => b'v',
            HashItemType::Table => b'H',
            HashItemType::List => b'L',
        }
    }
}

/// A 24-byte hash-item record: `{hash, parent, key_start, key_size, type,
/// unused, value_pointer}`.
#[derive(Debug, Clone, Copy)]
pub struct HashItem {
    pub hash_value: u32,
    pub parent: u32,
    pub key_start: u32,
    pub key_size: u16,
    pub type_char: u8,
    pub value: GvdbPointer,
}

pub const HASH_ITEM_LEN: usize = 24;

/// Marks a hash item as a direct, top-level child of its enclosing table
/// rather than a member of a nested list.
pub const NO_PARENT: u32 = 0xFFFFFFFF;

impl HashItem {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HASH_ITEM_LEN {
            return Err(Error::Truncated("hash item record truncated".into()));
        }
        Ok(Self {
            hash_value: read_u32_le(&bytes[0..4])?,
            parent: read_u32_le(&bytes[4..8])?,
            key_start: read_u32_le(&bytes[8..12])?,
            key_size: read_u16_le(&bytes[12..14])?,
            type_char: bytes[14],
            value: GvdbPointer::from_le_bytes(&bytes[16..24])
                .ok_or_else(|| Error::Truncated("hash item value pointer truncated".into()))?,
        })
    }

    pub fn key_pointer(&self) -> GvdbPointer {
        GvdbPointer::new(self.key_start as usize, self.key_start as usize + self.key_size as usize)
    }

    pub fn to_bytes(self) -> [u8; HASH_ITEM_LEN] {
        let mut out = [0u8; HASH_ITEM_LEN];
        out[0..4].copy_from_slice(&self.hash_value.to_le_bytes());
        out[4..8].copy_from_slice(&self.parent.to_le_bytes());
        out[8..12].copy_from_slice(&self.key_start.to_le_bytes());
        out[12..14].copy_from_slice(&self.key_size.to_le_bytes());
        out[14] = self.type_char;
        out[15] = 0;
        out[16..24].copy_from_slice(&self.value.to_le_bytes());
        out
    }
}

/// djb2 over signed-byte-extended characters: `h = 5381; h = h*33 + (i8)c`.
/// Empty key hashes to 5381.
pub fn djb2_hash(key: &str) -> u32 {
    let mut h: u32 = 5381;
    for &byte in key.as_bytes() {
        let signed = byte as i8 as i32;
        h = h.wrapping_mul(33).wrapping_add(signed as u32);
    }
    h
}

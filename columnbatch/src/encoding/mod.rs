//! The per-column encoding framework (C3/C4, §3-§4): a shared
//! `[type-id][null-bitmap][body]` header, seven body schemes, and the
//! builder/decoder pair that sit on top of them.
//!
//! A column is built by pushing [`Value`]s (including [`Value::Null`]) into
//! a [`builder::ColumnBuilder`], then calling `finish` to choose (or
//! `finish_with_scheme` to force) a scheme and serialize the header + body.
//! A serialized column is read back with [`decoder::ColumnDecoder`], which
//! picks a `NotNull`/`Nullable` variant once at parse time so that the hot
//! per-row path never branches on whether the column can contain nulls
//! (§9).

pub mod boolean;
pub mod builder;
pub mod decoder;
pub mod delta;
pub mod dictionary;
pub mod nested;
pub mod run_length;
pub mod uncompressed;

pub use builder::{ColumnBuilder, EncodedColumn};
pub use decoder::{ColumnBuffer, ColumnDecoder};

use byteorder::{ByteOrder, LittleEndian};
use columnbatch_compression_utils::bitset;

pub(crate) const HEADER_PREFIX_LEN: usize = 8;

/// Splits an encoded column into `(type_id, null_bitmap, body)`.
pub(crate) fn split_header(bytes: &[u8]) -> (u32, &[u8], &[u8]) {
    let type_id = LittleEndian::read_u32(&bytes[0..4]);
    let bitmap_len = LittleEndian::read_u32(&bytes[4..8]) as usize;
    let bitmap = &bytes[HEADER_PREFIX_LEN..HEADER_PREFIX_LEN + bitmap_len];
    let body = &bytes[HEADER_PREFIX_LEN + bitmap_len..];
    (type_id, bitmap, body)
}

pub(crate) fn is_null_at(bitmap: &[u8], ordinal: usize) -> bool {
    !bitmap.is_empty() && bitset::is_set(bitmap, ordinal)
}

pub(crate) fn null_count(bitmap: &[u8], rows: usize) -> usize {
    if bitmap.is_empty() {
        0
    } else {
        bitset::count_until(bitmap, rows)
    }
}

/// Maps a logical row ordinal to its position among the non-null values in
/// the body, by subtracting the number of nulls seen before it.
pub(crate) fn body_index(bitmap: &[u8], ordinal: usize) -> usize {
    if bitmap.is_empty() {
        ordinal
    } else {
        ordinal - bitset::count_until(bitmap, ordinal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_header_recovers_type_id_and_regions() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.push(0b0000_0101);
        bytes.extend_from_slice(b"body");
        let (type_id, bitmap, body) = split_header(&bytes);
        assert_eq!(type_id, 3);
        assert_eq!(bitmap, &[0b0000_0101]);
        assert_eq!(body, b"body");
        assert!(is_null_at(bitmap, 0));
        assert!(!is_null_at(bitmap, 1));
        assert!(is_null_at(bitmap, 2));
    }
}

//! Column decoding (C3): [`ColumnBuffer`] wraps a parsed header and
//! dispatches to the scheme named by its type-id. [`ColumnDecoder`] wraps
//! that in the `NotNull`/`Nullable` split called for in §9, so a
//! not-null column's hot path never touches a bitmap at all.

use columnbatch_serialization::SchemeId;

use crate::error::Result;
use crate::types::{DataType, Value};

use super::{body_index, boolean, delta, dictionary, is_null_at, null_count, run_length, split_header, uncompressed};

pub struct ColumnBuffer<'a> {
    scheme: SchemeId,
    data_type: DataType,
    rows: usize,
    bitmap: &'a [u8],
    body: &'a [u8],
}

impl<'a> ColumnBuffer<'a> {
    pub fn parse(bytes: &'a [u8], data_type: DataType, rows: usize) -> Result<ColumnBuffer<'a>> {
        let (type_id, bitmap, body) = split_header(bytes);
        let scheme = SchemeId::from_type_id(type_id)?;
        Ok(ColumnBuffer {
            scheme,
            data_type,
            rows,
            bitmap,
            body,
        })
    }

    pub fn scheme(&self) -> SchemeId {
        self.scheme
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn is_null(&self, ordinal: usize) -> bool {
        is_null_at(self.bitmap, ordinal)
    }

    pub fn null_count(&self) -> usize {
        null_count(self.bitmap, self.rows)
    }

    pub fn value_at(&self, ordinal: usize) -> Result<Value> {
        if self.is_null(ordinal) {
            return Ok(Value::Null);
        }
        let idx = body_index(self.bitmap, ordinal);
        match self.scheme {
            SchemeId::Uncompressed => uncompressed::value_at(self.body, idx, &self.data_type),
            SchemeId::RunLength => run_length::value_at(self.body, idx, &self.data_type),
            SchemeId::Dictionary => dictionary::value_at(self.body, idx, &self.data_type, false),
            SchemeId::BigDictionary => dictionary::value_at(self.body, idx, &self.data_type, true),
            SchemeId::BooleanBitSet => Ok(boolean::value_at(self.body, idx)),
            SchemeId::IntDelta => Ok(delta::value_at_int(self.body, idx)),
            SchemeId::LongDelta => Ok(delta::value_at_long(self.body, idx)),
        }
    }

    /// Materializes every logical row, interleaving nulls back into the
    /// decoded non-null stream.
    pub fn to_vec(&self) -> Result<Vec<Value>> {
        let non_null_count = self.rows - self.null_count();
        let decoded: Vec<Value> = match self.scheme {
            SchemeId::Uncompressed => uncompressed::decode(self.body, non_null_count, &self.data_type)?,
            SchemeId::RunLength => run_length::decode(self.body, non_null_count, &self.data_type)?,
            SchemeId::Dictionary => dictionary::decode(self.body, non_null_count, &self.data_type, false)?,
            SchemeId::BigDictionary => dictionary::decode(self.body, non_null_count, &self.data_type, true)?,
            SchemeId::BooleanBitSet => boolean::decode(self.body, non_null_count),
            SchemeId::IntDelta => delta::decode_int(self.body, non_null_count),
            SchemeId::LongDelta => delta::decode_long(self.body, non_null_count),
        };
        if self.bitmap.is_empty() {
            return Ok(decoded);
        }
        let mut out = Vec::with_capacity(self.rows);
        let mut bi = 0;
        for ordinal in 0..self.rows {
            if self.is_null(ordinal) {
                out.push(Value::Null);
            } else {
                out.push(decoded[bi].clone());
                bi += 1;
            }
        }
        Ok(out)
    }
}

/// The `NotNull`/`Nullable` decoder-variant split named in §9: chosen once
/// at parse time from whether the header carries a non-empty bitmap, so a
/// not-null column's `is_null` calls never inspect a bitmap at all.
pub enum ColumnDecoder<'a> {
    NotNull(ColumnBuffer<'a>),
    Nullable(ColumnBuffer<'a>),
}

impl<'a> ColumnDecoder<'a> {
    pub fn parse(bytes: &'a [u8], data_type: DataType, rows: usize) -> Result<ColumnDecoder<'a>> {
        let buffer = ColumnBuffer::parse(bytes, data_type, rows)?;
        Ok(if buffer.bitmap.is_empty() {
            ColumnDecoder::NotNull(buffer)
        } else {
            ColumnDecoder::Nullable(buffer)
        })
    }

    fn buffer(&self) -> &ColumnBuffer<'a> {
        match self {
            ColumnDecoder::NotNull(b) | ColumnDecoder::Nullable(b) => b,
        }
    }

    pub fn is_null(&self, ordinal: usize) -> bool {
        match self {
            ColumnDecoder::NotNull(_) => false,
            ColumnDecoder::Nullable(b) => b.is_null(ordinal),
        }
    }

    pub fn rows(&self) -> usize {
        self.buffer().rows()
    }

    pub fn scheme(&self) -> SchemeId {
        self.buffer().scheme()
    }

    pub fn value_at(&self, ordinal: usize) -> Result<Value> {
        self.buffer().value_at(ordinal)
    }

    pub fn to_vec(&self) -> Result<Vec<Value>> {
        self.buffer().to_vec()
    }
}

//! Push-based column construction (C3): collect every row (nulls included)
//! via [`ColumnBuilder::push`], then call `finish` to pick a scheme and
//! serialize the header + body, or `finish_with_scheme` to force one.
//!
//! Deciding the scheme once at the end, after every row has been seen,
//! mirrors how a batch is actually assembled in this engine (a whole batch
//! arrives before it is persisted) rather than modeling a streaming
//! encoder that has to commit to a scheme before it has seen the data.

use std::sync::Arc;

use columnbatch_compression_utils::{bitset, BufferAllocator, HeapAllocator};
use columnbatch_serialization::SchemeId;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::stats::ColumnStats;
use crate::types::{DataType, Value};

use super::{boolean, delta, dictionary, run_length, uncompressed};
use super::decoder::ColumnDecoder;

pub struct ColumnBuilder {
    data_type: DataType,
    nullable: bool,
    values: Vec<Value>,
    stats: ColumnStats,
    allocator: Arc<dyn BufferAllocator>,
}

/// A fully encoded column: the wire bytes plus the metadata a caller needs
/// without re-parsing the header.
#[derive(Debug, Clone)]
pub struct EncodedColumn {
    pub bytes: Vec<u8>,
    pub scheme: SchemeId,
    pub data_type: DataType,
    pub rows: usize,
    pub stats: ColumnStats,
}

impl EncodedColumn {
    pub fn decoder(&self) -> Result<ColumnDecoder<'_>> {
        ColumnDecoder::parse(&self.bytes, self.data_type.clone(), self.rows)
    }
}

impl ColumnBuilder {
    pub fn new(data_type: DataType, nullable: bool) -> ColumnBuilder {
        ColumnBuilder::with_allocator(data_type, nullable, Arc::new(HeapAllocator))
    }

    /// As [`Self::new`], but assembles the final column buffer through a
    /// caller-supplied allocator (C1) rather than the default heap one --
    /// e.g. a `DirectAllocator` for columns meant to live off-heap.
    pub fn with_allocator(data_type: DataType, nullable: bool, allocator: Arc<dyn BufferAllocator>) -> ColumnBuilder {
        ColumnBuilder {
            data_type,
            nullable,
            values: Vec::new(),
            stats: ColumnStats::new(),
            allocator,
        }
    }

    pub fn push(&mut self, value: Value) {
        self.stats.observe(&value);
        self.values.push(value);
    }

    pub fn rows(&self) -> usize {
        self.values.len()
    }

    /// The stats accumulated from every `push` so far, without consuming
    /// the builder.
    pub fn stats(&self) -> &ColumnStats {
        &self.stats
    }

    /// Picks a scheme appropriate for the column's declared data type.
    /// Strings dictionary-encode, booleans bit-pack, everything else is
    /// uncompressed by default; int/long-delta and run-length are opt-in
    /// via `finish_with_scheme` since they require the caller to know the
    /// data is likely to benefit (monotonic-ish integers, long runs).
    fn default_scheme(&self) -> SchemeId {
        match &self.data_type {
            DataType::Utf8 => SchemeId::Dictionary,
            DataType::Bool => SchemeId::BooleanBitSet,
            _ => SchemeId::Uncompressed,
        }
    }

    pub fn finish(self, config: &EngineConfig) -> Result<EncodedColumn> {
        let scheme = self.default_scheme();
        self.finish_with_scheme(scheme, config)
    }

    pub fn finish_with_scheme(self, scheme: SchemeId, config: &EngineConfig) -> Result<EncodedColumn> {
        let rows = self.values.len();
        let mut bitmap = vec![0u8; bitset::bitmap_bytes_for(rows)];
        let mut any_null = false;
        for (i, v) in self.values.iter().enumerate() {
            if v.is_null() {
                bitset::set(&mut bitmap, i);
                any_null = true;
            }
        }
        if !self.nullable && any_null {
            return Err(EngineError::NullsInNotNullColumn(bitmap.len()));
        }

        let non_null: Vec<Value> = self.values.iter().filter(|v| !v.is_null()).cloned().collect();

        let (final_type_id, body) = match scheme {
            SchemeId::Uncompressed => (
                SchemeId::Uncompressed.type_id(),
                uncompressed::encode(&non_null, &self.data_type)?,
            ),
            SchemeId::RunLength => (
                SchemeId::RunLength.type_id(),
                run_length::encode(&non_null, &self.data_type)?,
            ),
            SchemeId::Dictionary => {
                let body = dictionary::encode(&non_null, &self.data_type, false)?;
                if dictionary::entry_count(&body) > config.dictionary_promotion_threshold {
                    (
                        SchemeId::BigDictionary.type_id(),
                        dictionary::encode(&non_null, &self.data_type, true)?,
                    )
                } else {
                    (SchemeId::Dictionary.type_id(), body)
                }
            }
            SchemeId::BigDictionary => (
                SchemeId::BigDictionary.type_id(),
                dictionary::encode(&non_null, &self.data_type, true)?,
            ),
            SchemeId::BooleanBitSet => (SchemeId::BooleanBitSet.type_id(), boolean::encode(&non_null)?),
            SchemeId::IntDelta => match delta::try_encode_int(&non_null) {
                Some(body) => (SchemeId::IntDelta.type_id(), body),
                None => (
                    SchemeId::Uncompressed.type_id(),
                    uncompressed::encode(&non_null, &self.data_type)?,
                ),
            },
            SchemeId::LongDelta => match delta::try_encode_long(&non_null) {
                Some(body) => (SchemeId::LongDelta.type_id(), body),
                None => (
                    SchemeId::Uncompressed.type_id(),
                    uncompressed::encode(&non_null, &self.data_type)?,
                ),
            },
        };

        let bitmap_to_write: &[u8] = if any_null { &bitmap } else { &[] };
        let total_len = 8 + bitmap_to_write.len() + body.len();

        // Assemble the header + bitmap + body through the buffer allocator
        // (C1) rather than a bare `Vec<u8>`, so the column-batch value object
        // this buffer is handed off to (§4.6: "owns a buffer") and a caller
        // that wants off-heap columns both go through the same allocation
        // path. `allocate_for_storage` is used since the result is the
        // column's long-lived wire form, not scratch space.
        let mut buf = self.allocator.allocate_for_storage(8)?;
        buf.as_mut_slice()[0..4].copy_from_slice(&final_type_id.to_le_bytes());
        buf = self.allocator.expand(buf, bitmap_to_write.len() + body.len())?;
        {
            let slice = buf.as_mut_slice();
            slice[4..8].copy_from_slice(&(bitmap_to_write.len() as u32).to_le_bytes());
            slice[8..8 + bitmap_to_write.len()].copy_from_slice(bitmap_to_write);
            slice[8 + bitmap_to_write.len()..total_len].copy_from_slice(&body);
        }

        if total_len > config.max_buffer_size {
            self.allocator.release(buf);
            return Err(EngineError::BufferOverflow(total_len));
        }
        let out = buf.as_slice()[..total_len].to_vec();
        self.allocator.release(buf);

        Ok(EncodedColumn {
            bytes: out,
            scheme: SchemeId::from_type_id(final_type_id)?,
            data_type: self.data_type,
            rows,
            stats: self.stats,
        })
    }
}

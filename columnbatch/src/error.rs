//! The error taxonomy (§7). Every kind named in the spec gets one variant;
//! nothing here is a catch-all `Other(String)` because each variant carries
//! exactly the context a caller needs to decide whether to retry, split a
//! batch, or propagate.

use columnbatch_serialization::scheme::UnknownSchemeId;
use thiserror::Error;

use crate::types::DataType;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Encoded size would exceed `MAX_BUFFER_SIZE`. Fatal for the current
    /// batch; the caller must split it.
    #[error("encoded column would exceed the maximum buffer size ({0} bytes requested)")]
    BufferOverflow(usize),

    /// Header type-id not present in the scheme registry. Fatal for the
    /// current batch.
    #[error("unknown encoding type-id {type_id} for column of type {data_type:?}")]
    UnknownEncoding { type_id: u32, data_type: DataType },

    /// A scheme does not implement the requested type. Fatal; the caller
    /// must pick another scheme.
    #[error("scheme {scheme} does not support type {data_type:?}")]
    UnsupportedType { scheme: &'static str, data_type: DataType },

    /// A non-null decoder observed a non-zero null-bitmap size.
    #[error("non-nullable column encoded a null bitmap of {0} bytes")]
    NullsInNotNullColumn(usize),

    /// Dictionary index out of range.
    #[error("dictionary index {index} out of range for a dictionary of {size} entries")]
    CorruptDictionary { index: u64, size: usize },

    /// The partition a batch lived in moved mid-iteration.
    #[error("partition for batch {batch_uuid:#x} moved during iteration")]
    BucketMoved { batch_uuid: u64 },

    /// The bucket the caller asked for is not (or no longer) local.
    #[error("bucket {partition_id} is not hosted locally")]
    BucketNotFound { partition_id: u32 },

    /// An expected disk-resident entry disappeared (destroyed, disk access
    /// failure, region destroyed). Non-fatal to the iterator: the batch is
    /// skipped and the retained value comes back empty.
    #[error("entry for batch {batch_uuid:#x} column {column_index} disappeared: {reason}")]
    EntryDisappeared {
        batch_uuid: u64,
        column_index: i32,
        reason: String,
    },

    /// A remote `getAll` exceeded its deadline.
    #[error("remote getAll timed out after {0:?}")]
    RemoteTimeout(std::time::Duration),

    /// A region operation should be retried by the caller at a higher
    /// level (e.g. a query coordinator routing around a moved bucket).
    #[error("force reattempt: {0}")]
    ForceReattempt(String),

    #[error(transparent)]
    Alloc(#[from] columnbatch_compression_utils::AllocError),

    #[error(transparent)]
    Framing(#[from] columnbatch_serialization::FramingError),
}

impl From<UnknownSchemeId> for EngineError {
    fn from(e: UnknownSchemeId) -> Self {
        EngineError::UnknownEncoding {
            type_id: e.0,
            data_type: DataType::Unknown,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

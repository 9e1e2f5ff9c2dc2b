pub mod framing;
pub mod key;
pub mod scheme;

pub use framing::{FramingError, ValueFraming};
pub use key::{BatchId, ColumnIndex, CompositeKey, PartitionId, DELETE_MASK, DELTA_STATS, STATS};
pub use scheme::SchemeId;

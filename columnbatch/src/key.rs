//! Re-exports the composite key (C7) from `columnbatch-serialization`, and
//! adds the batch-level view over it: given a batch's data column count,
//! enumerate every key its fan-out occupies (§3: "a logical batch fans out
//! into one stats entry, N column buffers and a delete bitmap").

pub use columnbatch_serialization::key::{
    BatchId, ColumnIndex, CompositeKey, PartitionId, DELETE_MASK, DELTA_STATS, STATS,
};

/// Every key a batch with `num_columns` data columns occupies: the stats
/// row, the delete mask, and columns `1..=num_columns`.
pub fn fan_out_keys(uuid: BatchId, partition_id: PartitionId, num_columns: usize) -> Vec<CompositeKey> {
    let base = CompositeKey::new(uuid, partition_id, 0);
    let mut keys = vec![base.with_column_index(STATS), base.with_column_index(DELETE_MASK)];
    keys.extend((1..=num_columns as i32).map(|i| base.with_column_index(i)));
    keys
}

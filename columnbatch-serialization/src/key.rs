//! Composite key and partitioner (component C7).
//!
//! A logical batch fans out into one stats entry, N column buffers and a
//! delete bitmap, all addressed by the triple `(uuid, partitionId,
//! columnIndex)`. Column indices 1..N name the N data columns; negative
//! indices are reserved (§3/§4.7).

use std::hash::Hasher;

use fnv::FnvHasher;

pub type PartitionId = u32;
pub type ColumnIndex = i32;

/// Designated column-index of the stats row (§3, §4.5).
pub const STATS: ColumnIndex = -1;
/// Designated column-index of the delta-stats row of the shallowest delta
/// layer (§3, GLOSSARY "Delta").
pub const DELTA_STATS: ColumnIndex = -2;
/// Designated column-index of the delete bitmap (§3, GLOSSARY "Delete bitmap").
pub const DELETE_MASK: ColumnIndex = -3;

/// Identifies one logical column batch.
///
/// §3 calls this "128-bit or opaque" but §4.7 and §6 both specify an 8-byte
/// wire representation; this crate follows the two wire-format sections
/// (`u64`) since they agree with each other and are the operationally
/// binding description -- see DESIGN.md's Open Question log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchId(pub u64);

/// The (uuid, partitionId, columnIndex) triple locating one cell of a
/// batch's fan-out (§3, §4.7, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompositeKey {
    pub uuid: BatchId,
    pub partition_id: PartitionId,
    pub column_index: ColumnIndex,
}

const WIRE_LEN: usize = 16;

impl CompositeKey {
    pub fn new(uuid: BatchId, partition_id: PartitionId, column_index: ColumnIndex) -> CompositeKey {
        CompositeKey {
            uuid,
            partition_id,
            column_index,
        }
    }

    /// Constructs a sibling key addressing another column of the same batch.
    pub fn with_column_index(&self, column_index: ColumnIndex) -> CompositeKey {
        CompositeKey {
            column_index,
            ..*self
        }
    }

    /// Routing is by partitionId alone so all entries of one logical batch
    /// reside in one partition (§3).
    pub fn routing_object(&self) -> PartitionId {
        self.partition_id
    }

    /// `mix(addLong(uuid, columnIndex), partitionId)` (§4.7), computed
    /// explicitly (rather than relying on `#[derive(Hash)]`'s unspecified
    /// algorithm) for callers that need a stable, reproducible hash across
    /// process restarts, e.g. a routing table persisted to disk.
    pub fn stable_hash(&self) -> u64 {
        let mut inner = FnvHasher::default();
        inner.write_u64(self.uuid.0);
        inner.write_i32(self.column_index);
        let add_long = inner.finish();

        let mut outer = FnvHasher::default();
        outer.write_u64(add_long);
        outer.write_u32(self.partition_id);
        outer.finish()
    }

    /// `[8-byte uuid][4-byte partitionId][4-byte columnIndex]`, little-endian
    /// (§4.7, §6).
    pub fn serialize(&self) -> [u8; WIRE_LEN] {
        let mut buf = [0u8; WIRE_LEN];
        buf[0..8].copy_from_slice(&self.uuid.0.to_le_bytes());
        buf[8..12].copy_from_slice(&self.partition_id.to_le_bytes());
        buf[12..16].copy_from_slice(&self.column_index.to_le_bytes());
        buf
    }

    pub fn deserialize(bytes: &[u8]) -> Option<CompositeKey> {
        if bytes.len() != WIRE_LEN {
            return None;
        }
        let uuid = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
        let partition_id = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
        let column_index = i32::from_le_bytes(bytes[12..16].try_into().unwrap());
        Some(CompositeKey {
            uuid: BatchId(uuid),
            partition_id,
            column_index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_roundtrips() {
        let key = CompositeKey::new(BatchId(0x1122_3344_5566_7788), 7, -3);
        let bytes = key.serialize();
        assert_eq!(CompositeKey::deserialize(&bytes), Some(key));
    }

    #[test]
    fn with_column_index_keeps_uuid_and_partition() {
        let key = CompositeKey::new(BatchId(1), 7, 3);
        let sibling = key.with_column_index(STATS);
        assert_eq!(sibling.uuid, key.uuid);
        assert_eq!(sibling.partition_id, key.partition_id);
        assert_eq!(sibling.column_index, STATS);
    }

    #[test]
    fn routing_is_by_partition_only() {
        let a = CompositeKey::new(BatchId(1), 7, 1);
        let b = CompositeKey::new(BatchId(2), 7, 2);
        assert_eq!(a.routing_object(), b.routing_object());
    }

    #[test]
    fn stable_hash_is_a_pure_function_of_the_key() {
        let a = CompositeKey::new(BatchId(42), 3, 5);
        let b = CompositeKey::new(BatchId(42), 3, 5);
        let c = CompositeKey::new(BatchId(42), 3, 6);
        assert_eq!(a.stable_hash(), b.stable_hash());
        assert_ne!(a.stable_hash(), c.stable_hash());
    }

    #[test]
    fn deserialize_rejects_wrong_length() {
        assert_eq!(CompositeKey::deserialize(&[0u8; 15]), None);
    }
}

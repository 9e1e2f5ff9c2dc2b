//! The column-batch value object (C6, §4.6): wraps one column's bytes with
//! manual reference counting, a compression state machine, disk fault-in,
//! and size accounting.
//!
//! Reference counting is manual (`retain`/`release`) rather than relying on
//! `Arc`'s automatic drop, because the state machine's behavior under
//! sharing is itself part of the spec: a transition must not mutate shared
//! state while more than one reader holds the value (§8, "refCount=2
//! decompress throwaway"). The mutable fields (`state`, the canonical
//! bytes, the decompressed cache) live behind one mutex per value, per
//! §5's shared-resource policy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use columnbatch_serialization::ValueFraming;

use crate::collaborators::{Codec, DiskRegionView};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompressionState {
    /// Incompressible: `compress` never reduced size, so `compress` is a
    /// no-op and `Inner::compressed` holds the raw bytes verbatim.
    Unknown,
    Compressed,
    /// Decompressed, and survived `k` deferred recompression attempts
    /// (calls to `compress()` that ran the codec but couldn't commit the
    /// result in place because the value was shared) since the value was
    /// last decompressed.
    Decompressed(u32),
}

struct Inner {
    state: CompressionState,
    /// The canonical on-wire form: the codec's compressed output when
    /// `state` is `Compressed`, or the raw bytes verbatim when `state` is
    /// `Unknown`. Stale (the pre-decompress compressed form) while `state`
    /// is `Decompressed`.
    compressed: Vec<u8>,
    /// Present exactly when `state` is `Decompressed` or `Unknown`.
    decompressed: Option<Vec<u8>>,
}

pub struct ColumnBatchValue {
    ref_count: AtomicUsize,
    codec: Arc<dyn Codec>,
    inner: Mutex<Inner>,
    max_consecutive_compressions: u32,
}

impl ColumnBatchValue {
    pub fn new(raw: Vec<u8>, codec: Arc<dyn Codec>, max_consecutive_compressions: u32) -> ColumnBatchValue {
        let candidate = codec.compress(&raw);
        let inner = if candidate.len() < raw.len() {
            Inner {
                state: CompressionState::Compressed,
                compressed: candidate,
                decompressed: None,
            }
        } else {
            Inner {
                state: CompressionState::Unknown,
                compressed: raw.clone(),
                decompressed: Some(raw),
            }
        };
        ColumnBatchValue {
            ref_count: AtomicUsize::new(1),
            codec,
            inner: Mutex::new(inner),
            max_consecutive_compressions,
        }
    }

    /// Reconstructs a value from its disk framing (§6): strips
    /// `ValueFraming` and treats the payload as the column's compressed
    /// bytes, without re-running compression classification (the framed
    /// form already reflects a prior classification decision).
    pub fn fault_in(framed: &[u8], codec: Arc<dyn Codec>, max_consecutive_compressions: u32) -> Result<ColumnBatchValue> {
        let (_class_id, payload) = ValueFraming::read(framed)?;
        Ok(ColumnBatchValue {
            ref_count: AtomicUsize::new(1),
            codec,
            inner: Mutex::new(Inner {
                state: CompressionState::Compressed,
                compressed: payload.to_vec(),
                decompressed: None,
            }),
            max_consecutive_compressions,
        })
    }

    /// Disk fault-in (§4.6): acquires the disk collaborator's read lock,
    /// re-reads the value by its disk id, releases the lock, then classifies
    /// the result the same way [`Self::fault_in`] does for bytes already in
    /// hand. The lock is held only across the re-read, not the subsequent
    /// classification.
    pub fn fault_in_from_disk(
        disk_view: &dyn DiskRegionView,
        disk_id: u64,
        codec: Arc<dyn Codec>,
        max_consecutive_compressions: u32,
    ) -> Result<ColumnBatchValue> {
        disk_view.acquire_read_lock();
        let bytes = disk_view.get_value_on_disk_no_lock(disk_id);
        disk_view.release_read_lock();
        Self::fault_in(&bytes?, codec, max_consecutive_compressions)
    }

    pub fn to_framed_bytes(&self, class_id: u8) -> Vec<u8> {
        ValueFraming::write(class_id, &self.inner.lock().unwrap().compressed)
    }

    pub fn ref_count(&self) -> usize {
        self.ref_count.load(Ordering::SeqCst)
    }

    pub fn retain(&self) {
        self.ref_count.fetch_add(1, Ordering::SeqCst);
    }

    /// Returns `true` if this was the last reference.
    pub fn release(&self) -> bool {
        self.ref_count.fetch_sub(1, Ordering::SeqCst) == 1
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self.inner.lock().unwrap().state, CompressionState::Compressed)
    }

    /// Decompresses and returns the column's raw bytes. Committing the
    /// transition (caching the result, moving to `Decompressed(1)`)
    /// requires the value to be unshared; under sharing the codec still
    /// runs but the result is returned as a throwaway without touching
    /// `self`, so a concurrent reader still observing `Compressed` doesn't
    /// have the rug pulled out from under it.
    pub fn decompress(&self) -> Result<Vec<u8>> {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CompressionState::Unknown | CompressionState::Decompressed(_) => {
                Ok(inner.decompressed.clone().expect("cached decompressed bytes"))
            }
            CompressionState::Compressed => {
                let bytes = self.codec.decompress(&inner.compressed)?;
                if self.ref_count() <= 1 {
                    inner.decompressed = Some(bytes.clone());
                    inner.state = CompressionState::Decompressed(1);
                }
                Ok(bytes)
            }
        }
    }

    /// Attempts to recompress a decompressed value, per §4.6's
    /// `transition(_, compress=true)`. A no-op (returning the canonical
    /// bytes unchanged) unless `state` is `Decompressed`.
    ///
    /// If the codec's output doesn't shrink the payload, the value moves to
    /// `Unknown` (incompressible) and keeps the raw bytes. Otherwise, once
    /// `k` would exceed `max_consecutive_compressions` and the value is
    /// unshared, the compressed form is committed in place and `state`
    /// moves to `Compressed`; otherwise the attempt is deferred -- the
    /// compressed bytes are returned as a throwaway and only `k` advances,
    /// so a later unshared attempt knows how many compress attempts it has
    /// already absorbed.
    pub fn compress(&self) -> Result<Vec<u8>> {
        let mut inner = self.inner.lock().unwrap();
        let k = match inner.state {
            CompressionState::Decompressed(k) => k,
            CompressionState::Unknown | CompressionState::Compressed => return Ok(inner.compressed.clone()),
        };
        let decompressed = inner.decompressed.clone().expect("Decompressed state always has a cached copy");
        let candidate = self.codec.compress(&decompressed);
        if candidate.len() >= decompressed.len() {
            inner.state = CompressionState::Unknown;
            inner.compressed = decompressed.clone();
            return Ok(decompressed);
        }
        if k + 1 > self.max_consecutive_compressions && self.ref_count() <= 1 {
            inner.compressed = candidate.clone();
            inner.decompressed = None;
            inner.state = CompressionState::Compressed;
        } else {
            inner.state = CompressionState::Decompressed(k + 1);
        }
        Ok(candidate)
    }

    pub fn size_in_bytes(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        datasize::data_size(&inner.compressed) + inner.decompressed.as_ref().map_or(0, datasize::data_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{disk_id_for, InMemoryRegion, Lz4Codec, Region};
    use crate::key::CompositeKey;

    fn compressible_payload() -> Vec<u8> {
        b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_vec()
    }

    #[test]
    fn incompressible_payload_is_classified_unknown() {
        let value = ColumnBatchValue::new(vec![1, 2, 3], Arc::new(Lz4Codec), 2);
        assert!(!value.is_compressed());
        assert_eq!(value.decompress().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn decompress_caches_and_marks_decompressed() {
        let raw = compressible_payload();
        let value = ColumnBatchValue::new(raw.clone(), Arc::new(Lz4Codec), 2);
        assert!(value.is_compressed());
        assert_eq!(value.decompress().unwrap(), raw);
        assert!(!value.is_compressed());
    }

    #[test]
    fn shared_value_decompresses_without_mutating_state() {
        let raw = compressible_payload();
        let value = ColumnBatchValue::new(raw.clone(), Arc::new(Lz4Codec), 2);
        value.retain(); // refCount = 2
        assert_eq!(value.decompress().unwrap(), raw);
        assert!(value.is_compressed(), "shared value must not transition to Decompressed");
        assert!(!value.release()); // back to refCount = 1
        assert_eq!(value.decompress().unwrap(), raw);
        assert!(!value.is_compressed());
    }

    #[test]
    fn compress_commits_in_place_after_max_consecutive_deferred_attempts() {
        // max_consecutive_compressions = 2: the first two `compress()` calls
        // from `Decompressed(0)`/`Decompressed(1)` only advance k (still
        // shared), the third commits since k+1 (3) exceeds the threshold
        // and the value is unshared.
        let raw = compressible_payload();
        let value = ColumnBatchValue::new(raw.clone(), Arc::new(Lz4Codec), 2);
        value.decompress().unwrap();
        assert!(!value.is_compressed());

        value.retain(); // refCount = 2, forces every compress() to defer
        value.compress().unwrap();
        assert!(!value.is_compressed());
        value.compress().unwrap();
        assert!(!value.is_compressed());
        assert!(!value.release()); // back to refCount = 1

        value.compress().unwrap();
        assert!(value.is_compressed());
    }

    #[test]
    fn compress_shared_value_defers_without_mutating_state() {
        let raw = compressible_payload();
        let value = ColumnBatchValue::new(raw.clone(), Arc::new(Lz4Codec), 2);
        value.decompress().unwrap();
        value.retain(); // refCount = 2
        let out = value.compress().unwrap();
        assert_eq!(out, Lz4Codec.compress(&raw));
        assert!(!value.is_compressed(), "shared value must defer, not commit");
    }

    #[test]
    fn compress_falling_back_to_incompressible_moves_to_unknown() {
        // Shrinks on its first call (construction) but grows on every call
        // after that, so recompressing the decompressed cache fails the
        // size check and the value must move to `Unknown`.
        struct ShrinksOnceCodec {
            calls: std::sync::atomic::AtomicUsize,
        }
        impl Codec for ShrinksOnceCodec {
            fn name(&self) -> &'static str {
                "shrinks-once"
            }
            fn compress(&self, input: &[u8]) -> Vec<u8> {
                if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    vec![0u8]
                } else {
                    let mut out = input.to_vec();
                    out.push(0);
                    out
                }
            }
            fn decompress(&self, _input: &[u8]) -> Result<Vec<u8>> {
                Ok(b"some raw payload bytes long enough to shrink".to_vec())
            }
        }

        let raw = b"some raw payload bytes long enough to shrink".to_vec();
        let codec = Arc::new(ShrinksOnceCodec {
            calls: std::sync::atomic::AtomicUsize::new(0),
        });
        let value = ColumnBatchValue::new(raw.clone(), codec, 2);
        assert!(value.is_compressed());
        assert_eq!(value.decompress().unwrap(), raw);
        assert!(!value.is_compressed());

        value.compress().unwrap();
        assert!(!value.is_compressed(), "a compress that fails to shrink must move to Unknown, not Compressed");
        assert_eq!(value.decompress().unwrap(), raw);
    }

    #[test]
    fn fault_in_from_disk_brackets_the_reread_with_lock_acquire_and_release() {
        let raw = compressible_payload();
        let framed = ColumnBatchValue::new(raw.clone(), Arc::new(Lz4Codec), 2).to_framed_bytes(1);

        let region = InMemoryRegion::<Vec<u8>>::new();
        let key = CompositeKey::new(crate::key::BatchId(1), 0, 1);
        region.put(key, framed).unwrap();
        region.place_on_disk(key, 7, 42);

        let value = ColumnBatchValue::fault_in_from_disk(
            region.as_ref(),
            disk_id_for((7, 42)),
            Arc::new(Lz4Codec),
            2,
        )
        .unwrap();
        assert_eq!(value.decompress().unwrap(), raw);

        // The lock must have been released: a second fault-in must not hang.
        let value2 = ColumnBatchValue::fault_in_from_disk(region.as_ref(), disk_id_for((7, 42)), Arc::new(Lz4Codec), 2).unwrap();
        assert_eq!(value2.decompress().unwrap(), raw);
    }
}

//! Engine tunables (ambient "configuration" concern; see SPEC_FULL.md).
//!
//! The spec has no persisted configuration surface (§6: "No CLI, no
//! environment variables... are part of this core"), so this is a plain
//! struct collecting the named constants the spec scatters through §4 and
//! §5, not a file/env-var loader.

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EngineConfig {
    /// A short-dictionary index stream widens to a big dictionary once the
    /// entry count would overflow a 16-bit index (§3, §4.4).
    pub dictionary_promotion_threshold: u32,
    /// `MAX_CONSECUTIVE_COMPRESSIONS` in the compression state machine
    /// (§4.6).
    pub max_consecutive_compressions: u32,
    /// Hard cap on any single buffer, shared with
    /// `columnbatch_compression_utils::MAX_BUFFER_SIZE`.
    pub max_buffer_size: usize,
    /// `getAll` chunk size for the remote batch iterator (§4.8).
    pub remote_get_all_chunk_size: usize,
    /// Bounded wait for a remote `getAll` round trip before failing with
    /// `RemoteTimeout` (§5).
    pub remote_timeout: std::time::Duration,
    /// Maximum delta depth the remote iterator fetches alongside a base
    /// batch's columns (§4.8, GLOSSARY "Delta").
    pub used_max_depth: u32,
}

impl Default for EngineConfig {
    fn default() -> EngineConfig {
        EngineConfig {
            dictionary_promotion_threshold: 32_767,
            max_consecutive_compressions: 2,
            max_buffer_size: columnbatch_compression_utils::MAX_BUFFER_SIZE,
            remote_get_all_chunk_size: 1_000,
            remote_timeout: std::time::Duration::from_secs(5),
            used_max_depth: 4,
        }
    }
}

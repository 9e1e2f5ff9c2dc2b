//! Value serialization framing (§6).
//!
//! `[DS_FIXED_ID_BYTE][GFXD_TYPE][classId][padding=0][4-byte big-endian
//! length][payload]`. The length field is the one place in the wire format
//! that is big-endian on purpose: it is framing metadata consumed by the
//! transport/allocator layer before the column buffer itself (which is
//! little-endian throughout, §3) is ever touched.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    #[error("value framing header is truncated")]
    Truncated,
    #[error("unrecognized framing tag ({fixed_id:#x}, {ty:#x})")]
    BadTag { fixed_id: u8, ty: u8 },
    #[error("framed length {declared} exceeds available payload of {available} bytes")]
    LengthMismatch { declared: usize, available: usize },
}

pub const HEADER_LEN: usize = 8;

pub struct ValueFraming;

impl ValueFraming {
    pub const TAG_FIXED_ID: u8 = 0x2d;
    pub const TAG_TYPE: u8 = 0x99;

    /// Emits `writeSerializationHeader(src, dst)` followed by `payload`.
    pub fn write(class_id: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
        out.push(Self::TAG_FIXED_ID);
        out.push(Self::TAG_TYPE);
        out.push(class_id);
        out.push(0); // padding
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    /// Consumes the framing and returns `(classId, payload)`; `payload` is
    /// positioned at the start of the column buffer so decoders can start at
    /// position zero, as §6 requires.
    pub fn read(bytes: &[u8]) -> Result<(u8, &[u8]), FramingError> {
        if bytes.len() < HEADER_LEN {
            return Err(FramingError::Truncated);
        }
        if bytes[0] != Self::TAG_FIXED_ID || bytes[1] != Self::TAG_TYPE {
            return Err(FramingError::BadTag {
                fixed_id: bytes[0],
                ty: bytes[1],
            });
        }
        let class_id = bytes[2];
        let len = u32::from_be_bytes(bytes[4..8].try_into().unwrap()) as usize;
        let payload = &bytes[HEADER_LEN..];
        if payload.len() < len {
            return Err(FramingError::LengthMismatch {
                declared: len,
                available: payload.len(),
            });
        }
        Ok((class_id, &payload[..len]))
    }
}

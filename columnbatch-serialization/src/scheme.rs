//! The per-column encoding-scheme registry (§4.4): a static table mapping
//! type-id to scheme.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SchemeId {
    Uncompressed = 0,
    RunLength = 1,
    Dictionary = 2,
    BigDictionary = 3,
    BooleanBitSet = 4,
    IntDelta = 5,
    LongDelta = 6,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown encoding type-id {0}")]
pub struct UnknownSchemeId(pub u32);

impl SchemeId {
    pub fn from_type_id(id: u32) -> Result<SchemeId, UnknownSchemeId> {
        match id {
            0 => Ok(SchemeId::Uncompressed),
            1 => Ok(SchemeId::RunLength),
            2 => Ok(SchemeId::Dictionary),
            3 => Ok(SchemeId::BigDictionary),
            4 => Ok(SchemeId::BooleanBitSet),
            5 => Ok(SchemeId::IntDelta),
            6 => Ok(SchemeId::LongDelta),
            other => Err(UnknownSchemeId(other)),
        }
    }

    pub fn type_id(self) -> u32 {
        self as u32
    }
}

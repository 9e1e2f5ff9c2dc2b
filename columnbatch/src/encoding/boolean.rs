//! Boolean bit-set scheme (§4.4, type-id 4): one bit per non-null value
//! packed into 64-bit little-endian words, reusing the same bitset layout
//! as the column-level null bitmap.

use columnbatch_compression_utils::bitset;

use crate::error::{EngineError, Result};
use crate::types::{DataType, Value};

pub fn encode(values: &[Value]) -> Result<Vec<u8>> {
    let mut out = vec![0u8; bitset::bitmap_bytes_for(values.len())];
    for (i, v) in values.iter().enumerate() {
        match v {
            Value::Bool(true) => bitset::set(&mut out, i),
            Value::Bool(false) => {}
            _ => {
                return Err(EngineError::UnsupportedType {
                    scheme: "boolean_bit_set",
                    data_type: DataType::Bool,
                })
            }
        }
    }
    Ok(out)
}

pub fn decode(body: &[u8], count: usize) -> Vec<Value> {
    (0..count).map(|i| Value::Bool(bitset::is_set(body, i))).collect()
}

pub fn value_at(body: &[u8], body_index: usize) -> Value {
    Value::Bool(bitset::is_set(body, body_index))
}

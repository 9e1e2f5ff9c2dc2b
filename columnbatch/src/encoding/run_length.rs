//! Run-length scheme (§4.4, type-id 1): `(value, 4-byte run-length)` pairs,
//! coalescing adjacent equal values at encode time. Not a fixed-stride
//! layout, so random access traverses from the start of the body (§4.3).

use crate::error::Result;
use crate::types::{DataType, Value};

use super::uncompressed;

pub fn encode(values: &[Value], data_type: &DataType) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < values.len() {
        let run_value = &values[i];
        let mut run_len: u32 = 1;
        while i + run_len as usize < values.len() && &values[i + run_len as usize] == run_value {
            run_len += 1;
        }
        uncompressed::write_value(&mut out, data_type, run_value)?;
        out.extend_from_slice(&run_len.to_le_bytes());
        i += run_len as usize;
    }
    Ok(out)
}

pub fn decode(body: &[u8], count: usize, data_type: &DataType) -> Result<Vec<Value>> {
    let mut values = Vec::with_capacity(count);
    let mut cursor = 0;
    while values.len() < count {
        let (value, next) = uncompressed::read_value_at(body, cursor, data_type)?;
        let run_len = u32::from_le_bytes(body[next..next + 4].try_into().unwrap());
        for _ in 0..run_len {
            values.push(value.clone());
        }
        cursor = next + 4;
    }
    Ok(values)
}

/// No fixed stride: re-decode the prefix up to and including `body_index`.
pub fn value_at(body: &[u8], body_index: usize, data_type: &DataType) -> Result<Value> {
    let mut decoded = decode(body, body_index + 1, data_type)?;
    Ok(decoded.swap_remove(body_index))
}

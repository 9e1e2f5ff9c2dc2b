//! Delta schemes (§4.4, type-ids 5/6): a base value followed by a per-row
//! signed delta from the previous value. Int-delta tracks an `i32` base
//! with `i16` deltas; long-delta tracks an `i64` base with `i32` deltas.
//!
//! This builder collects every row before choosing an encoding (mirroring
//! the push-then-finalize shape the rest of the encoding framework uses),
//! so delta overflow is decided once, for the whole column, rather than as
//! a mid-stream subtype switch: if any delta doesn't fit, the column falls
//! back to the Uncompressed scheme entirely (see DESIGN.md).

use crate::types::Value;

pub fn try_encode_int(values: &[Value]) -> Option<Vec<u8>> {
    let mut ints = Vec::with_capacity(values.len());
    for v in values {
        match v {
            Value::I32(i) => ints.push(*i),
            _ => return None,
        }
    }
    if ints.is_empty() {
        return Some(0i32.to_le_bytes().to_vec());
    }
    let base = ints[0];
    let mut deltas = Vec::with_capacity(ints.len() - 1);
    let mut prev = base;
    for &v in &ints[1..] {
        let delta = v as i64 - prev as i64;
        deltas.push(i16::try_from(delta).ok()?);
        prev = v;
    }
    let mut out = Vec::with_capacity(4 + deltas.len() * 2);
    out.extend_from_slice(&base.to_le_bytes());
    for d in deltas {
        out.extend_from_slice(&d.to_le_bytes());
    }
    Some(out)
}

pub fn decode_int(body: &[u8], count: usize) -> Vec<Value> {
    if count == 0 {
        return Vec::new();
    }
    let base = i32::from_le_bytes(body[0..4].try_into().unwrap());
    let mut values = Vec::with_capacity(count);
    values.push(Value::I32(base));
    let mut prev = base;
    for i in 0..count - 1 {
        let off = 4 + i * 2;
        let delta = i16::from_le_bytes(body[off..off + 2].try_into().unwrap());
        let v = prev + delta as i32;
        values.push(Value::I32(v));
        prev = v;
    }
    values
}

/// Not a fixed stride once a base is rolling forward: reconstruct the
/// prefix up to `body_index` (§4.3).
pub fn value_at_int(body: &[u8], body_index: usize) -> Value {
    decode_int(body, body_index + 1).pop().unwrap()
}

pub fn try_encode_long(values: &[Value]) -> Option<Vec<u8>> {
    let mut longs = Vec::with_capacity(values.len());
    for v in values {
        match v {
            Value::I64(i) => longs.push(*i),
            _ => return None,
        }
    }
    if longs.is_empty() {
        return Some(0i64.to_le_bytes().to_vec());
    }
    let base = longs[0];
    let mut deltas = Vec::with_capacity(longs.len() - 1);
    let mut prev = base;
    for &v in &longs[1..] {
        let delta = (v as i128) - (prev as i128);
        deltas.push(i32::try_from(delta).ok()?);
        prev = v;
    }
    let mut out = Vec::with_capacity(8 + deltas.len() * 4);
    out.extend_from_slice(&base.to_le_bytes());
    for d in deltas {
        out.extend_from_slice(&d.to_le_bytes());
    }
    Some(out)
}

pub fn decode_long(body: &[u8], count: usize) -> Vec<Value> {
    if count == 0 {
        return Vec::new();
    }
    let base = i64::from_le_bytes(body[0..8].try_into().unwrap());
    let mut values = Vec::with_capacity(count);
    values.push(Value::I64(base));
    let mut prev = base;
    for i in 0..count - 1 {
        let off = 8 + i * 4;
        let delta = i32::from_le_bytes(body[off..off + 4].try_into().unwrap());
        let v = prev + delta as i64;
        values.push(Value::I64(v));
        prev = v;
    }
    values
}

pub fn value_at_long(body: &[u8], body_index: usize) -> Value {
    decode_long(body, body_index + 1).pop().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_delta_round_trips() {
        let values: Vec<Value> = vec![100, 101, 99, 5_000, 5_001].into_iter().map(Value::I32).collect();
        let body = try_encode_int(&values).unwrap();
        assert_eq!(decode_int(&body, values.len()), values);
        assert_eq!(value_at_int(&body, 3), Value::I32(5_000));
    }

    #[test]
    fn int_delta_falls_back_when_delta_overflows_i16() {
        let values = vec![Value::I32(0), Value::I32(100_000)];
        assert!(try_encode_int(&values).is_none());
    }

    #[test]
    fn long_delta_round_trips() {
        let values: Vec<Value> = vec![1i64, 2, 1_000_000, 999_999].into_iter().map(Value::I64).collect();
        let body = try_encode_long(&values).unwrap();
        assert_eq!(decode_long(&body, values.len()), values);
    }
}

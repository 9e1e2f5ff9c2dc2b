//! The Uncompressed scheme (§3, §4.4, type-id 0): fixed-width primitives
//! back-to-back in little-endian; variable-width values as
//! `[4-byte length][payload]`; nested (array/struct/map) values delegate to
//! [`super::nested`]. This module also hosts the single-value read/write
//! primitives [`write_value`]/[`read_value_at`] that the run-length scheme
//! reuses, since a run-length pair is just "one uncompressed value" plus a
//! run count.

use byteorder::{ByteOrder, LittleEndian};
use ordered_float::OrderedFloat;

use crate::error::{EngineError, Result};
use crate::types::{DataType, Decimal, Value};

use super::nested;

/// Byte width of `data_type` when it is inlined rather than length-prefixed,
/// or `None` for a variable-width type. Used both by the top-level
/// Uncompressed body and by the nested-type slot layout (§3).
pub(crate) fn fixed_width(data_type: &DataType) -> Option<usize> {
    match data_type {
        DataType::Bool => Some(1),
        DataType::I32 => Some(4),
        DataType::I64 => Some(8),
        DataType::F64 => Some(8),
        DataType::Decimal { precision, .. } if *precision <= 18 => Some(8),
        DataType::CalendarInterval => Some(12),
        _ => None,
    }
}

pub(crate) fn write_fixed(slot: &mut [u8], data_type: &DataType, value: &Value) -> Result<()> {
    match (data_type, value) {
        (DataType::Bool, Value::Bool(b)) => slot[0] = *b as u8,
        (DataType::I32, Value::I32(i)) => LittleEndian::write_i32(slot, *i),
        (DataType::I64, Value::I64(i)) => LittleEndian::write_i64(slot, *i),
        (DataType::F64, Value::F64(f)) => LittleEndian::write_f64(slot, f.0),
        (DataType::Decimal { .. }, Value::Decimal(d)) => {
            LittleEndian::write_i64(slot, d.unscaled as i64)
        }
        (
            DataType::CalendarInterval,
            Value::CalendarInterval {
                months,
                microseconds,
            },
        ) => {
            LittleEndian::write_i32(&mut slot[0..4], *months);
            LittleEndian::write_i64(&mut slot[4..12], *microseconds);
        }
        _ => {
            return Err(EngineError::UnsupportedType {
                scheme: "uncompressed",
                data_type: data_type.clone(),
            })
        }
    }
    Ok(())
}

pub(crate) fn read_fixed(slot: &[u8], data_type: &DataType) -> Value {
    match data_type {
        DataType::Bool => Value::Bool(slot[0] != 0),
        DataType::I32 => Value::I32(LittleEndian::read_i32(slot)),
        DataType::I64 => Value::I64(LittleEndian::read_i64(slot)),
        DataType::F64 => Value::F64(OrderedFloat(LittleEndian::read_f64(slot))),
        DataType::Decimal { precision, scale } => Value::Decimal(Decimal::new(
            LittleEndian::read_i64(slot) as i128,
            *precision,
            *scale,
        )),
        DataType::CalendarInterval => Value::CalendarInterval {
            months: LittleEndian::read_i32(&slot[0..4]),
            microseconds: LittleEndian::read_i64(&slot[4..12]),
        },
        other => unreachable!("{other:?} has no fixed-width representation"),
    }
}

fn write_len_prefixed(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
}

fn read_len_prefixed(body: &[u8], cursor: usize) -> (&[u8], usize) {
    let len = LittleEndian::read_u32(&body[cursor..cursor + 4]) as usize;
    let start = cursor + 4;
    (&body[start..start + len], start + len)
}

/// Appends one value to `out`, either inline (fixed-width) or
/// length-prefixed (variable-width).
pub(crate) fn write_value(out: &mut Vec<u8>, data_type: &DataType, value: &Value) -> Result<()> {
    if let Some(width) = fixed_width(data_type) {
        let start = out.len();
        out.resize(start + width, 0);
        write_fixed(&mut out[start..], data_type, value)
    } else {
        match (data_type, value) {
            (DataType::Utf8, Value::Utf8(s)) => write_len_prefixed(out, s.as_bytes()),
            (DataType::Binary, Value::Binary(b)) => write_len_prefixed(out, b),
            (DataType::Decimal { .. }, Value::Decimal(d)) => write_len_prefixed(out, &d.to_be_bytes()),
            (DataType::Array(_), Value::Array(_))
            | (DataType::Struct(_), Value::Struct(_))
            | (DataType::Map(_, _), Value::Map(_)) => {
                let bytes = nested::encode(data_type, value)?;
                write_len_prefixed(out, &bytes);
            }
            _ => {
                return Err(EngineError::UnsupportedType {
                    scheme: "uncompressed",
                    data_type: data_type.clone(),
                })
            }
        }
        Ok(())
    }
}

/// Reads one value starting at `cursor`, returning it and the cursor
/// position immediately after it.
pub(crate) fn read_value_at(
    body: &[u8],
    cursor: usize,
    data_type: &DataType,
) -> Result<(Value, usize)> {
    if let Some(width) = fixed_width(data_type) {
        Ok((read_fixed(&body[cursor..cursor + width], data_type), cursor + width))
    } else {
        match data_type {
            DataType::Utf8 => {
                let (bytes, next) = read_len_prefixed(body, cursor);
                Ok((Value::Utf8(String::from_utf8_lossy(bytes).into_owned()), next))
            }
            DataType::Binary => {
                let (bytes, next) = read_len_prefixed(body, cursor);
                Ok((Value::Binary(bytes.to_vec()), next))
            }
            DataType::Decimal { precision, scale } => {
                let (bytes, next) = read_len_prefixed(body, cursor);
                Ok((Value::Decimal(Decimal::from_be_bytes(*precision, *scale, bytes)), next))
            }
            DataType::Array(_) | DataType::Struct(_) | DataType::Map(_, _) => {
                let (bytes, next) = read_len_prefixed(body, cursor);
                Ok((nested::decode(data_type, bytes)?, next))
            }
            _ => Err(EngineError::UnsupportedType {
                scheme: "uncompressed",
                data_type: data_type.clone(),
            }),
        }
    }
}

pub fn encode(values: &[Value], data_type: &DataType) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for v in values {
        write_value(&mut out, data_type, v)?;
    }
    Ok(out)
}

pub fn decode(body: &[u8], count: usize, data_type: &DataType) -> Result<Vec<Value>> {
    let mut values = Vec::with_capacity(count);
    let mut cursor = 0;
    for _ in 0..count {
        let (value, next) = read_value_at(body, cursor, data_type)?;
        values.push(value);
        cursor = next;
    }
    Ok(values)
}

/// Random access is O(1) by stride for fixed-width types; variable-width
/// types fall back to a linear scan from the start of the body (§4.3).
pub fn value_at(body: &[u8], body_index: usize, data_type: &DataType) -> Result<Value> {
    if let Some(width) = fixed_width(data_type) {
        Ok(read_fixed(
            &body[body_index * width..(body_index + 1) * width],
            data_type,
        ))
    } else {
        let mut cursor = 0;
        for _ in 0..body_index {
            let (_, next) = read_value_at(body, cursor, data_type)?;
            cursor = next;
        }
        Ok(read_value_at(body, cursor, data_type)?.0)
    }
}

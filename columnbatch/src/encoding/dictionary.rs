//! Dictionary schemes (§3, §4.4, type-ids 2/3): `[4-byte entry
//! count][entries][index stream]`. The short form uses 16-bit indices; the
//! big form (auto-promoted once entry count would overflow a `u16`) uses
//! 32-bit indices. Supports the two entry kinds the spec names: UTF-8
//! strings and integer/long values.

use std::collections::HashMap;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{EngineError, Result};
use crate::types::{DataType, Value};

#[derive(Clone, PartialEq, Eq, Hash)]
enum DictKey {
    Str(String),
    Int(i64),
}

impl DictKey {
    fn from_value(v: &Value) -> Result<DictKey> {
        match v {
            Value::Utf8(s) => Ok(DictKey::Str(s.clone())),
            Value::I64(i) => Ok(DictKey::Int(*i)),
            Value::I32(i) => Ok(DictKey::Int(*i as i64)),
            other => Err(EngineError::UnsupportedType {
                scheme: "dictionary",
                data_type: data_type_of(other),
            }),
        }
    }
}

fn data_type_of(v: &Value) -> DataType {
    match v {
        Value::Utf8(_) => DataType::Utf8,
        Value::I64(_) => DataType::I64,
        Value::I32(_) => DataType::I32,
        _ => DataType::Unknown,
    }
}

fn serialize_entry(data_type: &DataType, v: &Value) -> Vec<u8> {
    match (data_type, v) {
        (DataType::Utf8, Value::Utf8(s)) => {
            let mut out = Vec::with_capacity(4 + s.len());
            out.extend_from_slice(&(s.len() as u32).to_le_bytes());
            out.extend_from_slice(s.as_bytes());
            out
        }
        (DataType::I64, Value::I64(i)) => i.to_le_bytes().to_vec(),
        (DataType::I32, Value::I32(i)) => i.to_le_bytes().to_vec(),
        _ => unreachable!("dictionary entries are only ever Utf8, I64, or I32"),
    }
}

pub fn encode(values: &[Value], data_type: &DataType, big: bool) -> Result<Vec<u8>> {
    let mut dict: Vec<Vec<u8>> = Vec::new();
    let mut index_of: HashMap<DictKey, u32> = HashMap::new();
    let mut indices: Vec<u32> = Vec::with_capacity(values.len());
    for v in values {
        let key = DictKey::from_value(v)?;
        let idx = match index_of.get(&key) {
            Some(&idx) => idx,
            None => {
                let idx = dict.len() as u32;
                dict.push(serialize_entry(data_type, v));
                index_of.insert(key, idx);
                idx
            }
        };
        indices.push(idx);
    }

    let mut out = Vec::new();
    out.extend_from_slice(&(dict.len() as u32).to_le_bytes());
    for entry in &dict {
        out.extend_from_slice(entry);
    }
    for idx in indices {
        if big {
            out.extend_from_slice(&idx.to_le_bytes());
        } else {
            out.extend_from_slice(&(idx as u16).to_le_bytes());
        }
    }
    Ok(out)
}

/// Number of dictionary entries in an already-encoded body, used by the
/// builder to decide whether to promote short -> big (§4.4).
pub fn entry_count(body: &[u8]) -> u32 {
    LittleEndian::read_u32(&body[0..4])
}

// TODO: cache the parsed entry table instead of re-parsing it on every
// `value_at` call; dictionaries are usually small relative to row count so
// this has not mattered in practice yet.
fn parse_dictionary(body: &[u8], data_type: &DataType) -> Result<(Vec<Value>, usize)> {
    let n = LittleEndian::read_u32(&body[0..4]) as usize;
    let mut cursor = 4;
    let mut entries = Vec::with_capacity(n);
    for _ in 0..n {
        match data_type {
            DataType::Utf8 => {
                let len = LittleEndian::read_u32(&body[cursor..cursor + 4]) as usize;
                let s = String::from_utf8_lossy(&body[cursor + 4..cursor + 4 + len]).into_owned();
                entries.push(Value::Utf8(s));
                cursor += 4 + len;
            }
            DataType::I64 => {
                entries.push(Value::I64(LittleEndian::read_i64(&body[cursor..cursor + 8])));
                cursor += 8;
            }
            DataType::I32 => {
                entries.push(Value::I32(LittleEndian::read_i32(&body[cursor..cursor + 4])));
                cursor += 4;
            }
            _ => {
                return Err(EngineError::UnsupportedType {
                    scheme: "dictionary",
                    data_type: data_type.clone(),
                })
            }
        }
    }
    Ok((entries, cursor))
}

fn read_index(body: &[u8], indices_start: usize, body_index: usize, big: bool) -> usize {
    if big {
        let off = indices_start + body_index * 4;
        LittleEndian::read_u32(&body[off..off + 4]) as usize
    } else {
        let off = indices_start + body_index * 2;
        LittleEndian::read_u16(&body[off..off + 2]) as usize
    }
}

pub fn decode(body: &[u8], count: usize, data_type: &DataType, big: bool) -> Result<Vec<Value>> {
    let (entries, indices_start) = parse_dictionary(body, data_type)?;
    let mut values = Vec::with_capacity(count);
    for i in 0..count {
        let idx = read_index(body, indices_start, i, big);
        let value = entries.get(idx).cloned().ok_or(EngineError::CorruptDictionary {
            index: idx as u64,
            size: entries.len(),
        })?;
        values.push(value);
    }
    Ok(values)
}

pub fn value_at(body: &[u8], body_index: usize, data_type: &DataType, big: bool) -> Result<Value> {
    let (entries, indices_start) = parse_dictionary(body, data_type)?;
    let idx = read_index(body, indices_start, body_index, big);
    entries.get(idx).cloned().ok_or(EngineError::CorruptDictionary {
        index: idx as u64,
        size: entries.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedups_strings_into_entries() {
        let values = vec![
            Value::Utf8("a".into()),
            Value::Utf8("b".into()),
            Value::Utf8("a".into()),
        ];
        let body = encode(&values, &DataType::Utf8, false).unwrap();
        assert_eq!(entry_count(&body), 2);
        assert_eq!(decode(&body, 3, &DataType::Utf8, false).unwrap(), values);
    }

    #[test]
    fn big_dictionary_round_trips_many_entries() {
        let values: Vec<Value> = (0..40_000).map(|i| Value::Utf8(format!("v{i}"))).collect();
        let body = encode(&values, &DataType::Utf8, true).unwrap();
        assert_eq!(entry_count(&body), 40_000);
        assert_eq!(value_at(&body, 39_999, &DataType::Utf8, true).unwrap(), values[39_999]);
    }

    #[test]
    fn corrupt_index_is_reported() {
        let values = vec![Value::I64(1)];
        let body = encode(&values, &DataType::I64, false).unwrap();
        let mut corrupted = body.clone();
        LittleEndian::write_u16(&mut corrupted[body.len() - 2..], 99);
        assert!(matches!(
            decode(&corrupted, 1, &DataType::I64, false),
            Err(EngineError::CorruptDictionary { .. })
        ));
    }
}

//! Per-column statistics (C5, §4.5): a running `[lower, upper, null count]`
//! accumulated as a column builds, and the encoding of a whole batch's
//! stats into one row stored under the batch's `STATS` key.
//!
//! Complex types (arrays, structs, maps, binary, calendar intervals) pin
//! their bound to wide-open (`NegInf`/`PosInf`) rather than tracking a real
//! min/max, so a downstream predicate can never use them to prune a batch
//! it should have scanned.

use ordered_float::OrderedFloat;

use columnbatch_serialization::SchemeId;

use crate::config::EngineConfig;
use crate::encoding::ColumnBuilder;
use crate::error::{EngineError, Result};
use crate::types::{DataType, Field, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Bound {
    /// No observation could even pin a wide-open range (e.g. an empty
    /// column); treated the same as wide-open by callers.
    NegInf,
    PosInf,
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(String),
}

impl Bound {
    fn min(self, other: Bound) -> Bound {
        use Bound::*;
        match (self, other) {
            (PosInf, b) => b,
            (a, PosInf) => a,
            (NegInf, _) | (_, NegInf) => NegInf,
            (Int(a), Int(b)) => Int(a.min(b)),
            (Float(a), Float(b)) => Float(a.min(b)),
            (Str(a), Str(b)) => Str(a.min(b)),
            (a, _) => a,
        }
    }

    fn max(self, other: Bound) -> Bound {
        use Bound::*;
        match (self, other) {
            (NegInf, b) => b,
            (a, NegInf) => a,
            (PosInf, _) | (_, PosInf) => PosInf,
            (Int(a), Int(b)) => Int(a.max(b)),
            (Float(a), Float(b)) => Float(a.max(b)),
            (Str(a), Str(b)) => Str(a.max(b)),
            (a, _) => a,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnStats {
    pub lower: Bound,
    pub upper: Bound,
    pub null_count: u64,
    pub row_count: u64,
}

impl ColumnStats {
    pub fn new() -> ColumnStats {
        ColumnStats {
            lower: Bound::PosInf,
            upper: Bound::NegInf,
            null_count: 0,
            row_count: 0,
        }
    }

    pub fn observe(&mut self, value: &Value) {
        self.row_count += 1;
        match value {
            Value::Null => self.null_count += 1,
            Value::Bool(b) => self.observe_bound(Bound::Int(*b as i64)),
            Value::I32(i) => self.observe_bound(Bound::Int(*i as i64)),
            Value::I64(i) => self.observe_bound(Bound::Int(*i)),
            Value::F64(f) => self.observe_bound(Bound::Float(*f)),
            Value::Utf8(s) => self.observe_bound(Bound::Str(s.clone())),
            Value::Decimal(d) => self.observe_bound(Bound::Int(d.unscaled as i64)),
            Value::Binary(_) | Value::CalendarInterval { .. } | Value::Array(_) | Value::Struct(_) | Value::Map(_) => {
                self.lower = Bound::NegInf;
                self.upper = Bound::PosInf;
            }
        }
    }

    fn observe_bound(&mut self, b: Bound) {
        let lower = std::mem::replace(&mut self.lower, Bound::PosInf);
        self.lower = lower.min(b.clone());
        let upper = std::mem::replace(&mut self.upper, Bound::NegInf);
        self.upper = upper.max(b);
    }
}

impl Default for ColumnStats {
    fn default() -> ColumnStats {
        ColumnStats::new()
    }
}

fn bound_field_type() -> DataType {
    DataType::Struct(vec![
        Field::new("tag", DataType::I32),
        Field::new("int_val", DataType::I64),
        Field::new("float_val", DataType::F64),
        Field::new("str_val", DataType::Utf8),
    ])
}

fn bound_to_value(b: &Bound) -> Value {
    let (tag, int_val, float_val, str_val) = match b {
        Bound::NegInf => (0, 0, 0.0, String::new()),
        Bound::PosInf => (1, 0, 0.0, String::new()),
        Bound::Int(i) => (2, *i, 0.0, String::new()),
        Bound::Float(f) => (3, 0, f.0, String::new()),
        Bound::Str(s) => (4, 0, 0.0, s.clone()),
    };
    Value::Struct(vec![
        Value::I32(tag),
        Value::I64(int_val),
        Value::F64(OrderedFloat(float_val)),
        Value::Utf8(str_val),
    ])
}

fn value_to_bound(v: &Value) -> Bound {
    let Value::Struct(fields) = v else {
        return Bound::NegInf;
    };
    match fields.as_slice() {
        [Value::I32(0), ..] => Bound::NegInf,
        [Value::I32(1), ..] => Bound::PosInf,
        [Value::I32(2), Value::I64(i), ..] => Bound::Int(*i),
        [Value::I32(3), _, Value::F64(f), ..] => Bound::Float(*f),
        [Value::I32(4), _, _, Value::Utf8(s)] => Bound::Str(s.clone()),
        _ => Bound::NegInf,
    }
}

/// Schema of the one-row stats tuple: row count, then `[lower, upper, null
/// count]` per column.
pub fn stats_row_schema(num_columns: usize) -> DataType {
    let mut fields = vec![Field::new("row_count", DataType::I64)];
    for i in 0..num_columns {
        fields.push(Field::new(format!("col_{i}_lower"), bound_field_type()));
        fields.push(Field::new(format!("col_{i}_upper"), bound_field_type()));
        fields.push(Field::new(format!("col_{i}_null_count"), DataType::I64));
    }
    DataType::Struct(fields)
}

/// Serializes a batch's per-column stats as an uncompressed struct-typed
/// column (§4.5: "Emitted as an uncompressed tuple with its own column
/// buffer, stored under the STATS key of the batch").
pub fn encode_stats_row(
    row_count: u64,
    per_column: &[ColumnStats],
    config: &EngineConfig,
) -> Result<crate::encoding::EncodedColumn> {
    let schema = stats_row_schema(per_column.len());
    let mut fields = vec![Value::I64(row_count as i64)];
    for cs in per_column {
        fields.push(bound_to_value(&cs.lower));
        fields.push(bound_to_value(&cs.upper));
        fields.push(Value::I64(cs.null_count as i64));
    }
    let mut builder = ColumnBuilder::new(schema, false);
    builder.push(Value::Struct(fields));
    builder.finish_with_scheme(SchemeId::Uncompressed, config)
}

pub fn decode_stats_row(encoded: &crate::encoding::EncodedColumn) -> Result<(u64, Vec<ColumnStats>)> {
    let decoder = encoded.decoder()?;
    let row = decoder.value_at(0)?;
    let Value::Struct(fields) = row else {
        return Err(EngineError::UnsupportedType {
            scheme: "stats",
            data_type: DataType::Unknown,
        });
    };
    let row_count = match fields.first() {
        Some(Value::I64(rc)) => *rc as u64,
        _ => 0,
    };
    let num_columns = (fields.len() - 1) / 3;
    let mut per_column = Vec::with_capacity(num_columns);
    for col in 0..num_columns {
        let base = 1 + col * 3;
        let lower = value_to_bound(&fields[base]);
        let upper = value_to_bound(&fields[base + 1]);
        let null_count = match &fields[base + 2] {
            Value::I64(nc) => *nc as u64,
            _ => 0,
        };
        per_column.push(ColumnStats {
            lower,
            upper,
            null_count,
            row_count,
        });
    }
    Ok((row_count, per_column))
}

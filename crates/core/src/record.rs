//! Records and value ordering
//!
//! A [`Record`] is a plain field mapping. Stores are free to return richer
//! row types; anything implementing [`IntoRecord`] is flattened into a
//! `Record` before it reaches the encoder.

use std::cmp::Ordering;

use serde_json::{Map, Value};

/// A plain field mapping: field name → JSON value
pub type Record = Map<String, Value>;

/// Conversion from a store-specific row into a plain [`Record`].
pub trait IntoRecord {
    /// Flatten this row into its field mapping
    fn into_record(self) -> Record;
}

impl IntoRecord for Record {
    fn into_record(self) -> Record {
        self
    }
}

/// Build a record from `(field, value)` pairs.
///
/// ```
/// use rowstream_core::record;
/// let r = record([("id", 1.into()), ("name", "ada".into())]);
/// assert_eq!(r["name"], "ada");
/// ```
pub fn record<K, I>(fields: I) -> Record
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Value)>,
{
    fields.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// Total order over JSON values used for sorting and range predicates.
///
/// Values of different kinds order as null < bool < number < string <
/// array < object. Numbers compare as integers when both sides are
/// integers, otherwise as `f64`.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                return x.cmp(&y);
            }
            if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                return x.cmp(&y);
            }
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let ord = compare_values(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

fn kind_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

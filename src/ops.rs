//! Inspection of a resolved record: listing, key lookup and TOML rendering.
//!
//! These work on any [`Record`] through its descriptors, so they show exactly
//! what the pipeline produced. Values are rendered with the scalar codec, the
//! same text a flag or environment variable would accept.

use crate::error::LayerfigError;
use crate::record::{FieldRef, Record, field_by_path};
use crate::scalar::{Scalar, encode};

const NOT_SET: &str = "<not set>";

/// Every populated value as a dotted key and its encoded text, in schema
/// order. Unset optionals and private fields are skipped; map entries are
/// listed individually under `map.key`, sorted.
pub fn entries(record: &dyn Record) -> Vec<(String, String)> {
    let mut out = Vec::new();
    collect_entries(record, "", &mut out);
    out
}

fn collect_entries(record: &dyn Record, prefix: &str, out: &mut Vec<(String, String)>) {
    for (index, spec) in record.schema().iter().enumerate() {
        if !spec.exported {
            continue;
        }
        let key = if prefix.is_empty() {
            spec.name.to_string()
        } else {
            format!("{prefix}.{}", spec.name)
        };
        match record.field(index) {
            Some(FieldRef::Leaf(leaf)) => {
                if let Some(value) = leaf.load() {
                    out.push((key, encode(&value)));
                }
            }
            Some(FieldRef::Map(map)) => {
                let mut pairs: Vec<_> = map
                    .iter()
                    .map(|(k, v)| (format!("{key}.{k}"), v.clone()))
                    .collect();
                pairs.sort();
                out.extend(pairs);
            }
            Some(FieldRef::Record(nested)) => collect_entries(nested, &key, out),
            Some(FieldRef::Optional(optional)) => {
                if let Some(nested) = optional.get() {
                    collect_entries(nested, &key, out);
                }
            }
            None => {}
        }
    }
}

/// The value at dotted `key` as text.
///
/// Leaves use the scalar codec, maps render as `k=v,k=v` and records as a
/// TOML document. An unset optional value reads as `<not set>`. A key that
/// is not in the schema, or that crosses an unset optional record, is
/// [`LayerfigError::KeyNotFound`].
pub fn get_value(record: &dyn Record, key: &str) -> Result<String, LayerfigError> {
    let segments: Vec<&str> = key.split('.').collect();
    let field =
        field_by_path(record, &segments).ok_or_else(|| LayerfigError::KeyNotFound(key.into()))?;
    let text = match field {
        FieldRef::Leaf(leaf) => leaf
            .load()
            .map(|v| encode(&v))
            .unwrap_or_else(|| NOT_SET.into()),
        FieldRef::Map(map) => {
            let mut pairs: Vec<_> = map.iter().map(|(k, v)| format!("{k}={v}")).collect();
            pairs.sort();
            pairs.join(",")
        }
        FieldRef::Record(nested) => render(nested, key)?,
        FieldRef::Optional(optional) => match optional.get() {
            Some(nested) => render(nested, key)?,
            None => NOT_SET.into(),
        },
    };
    Ok(text)
}

fn render(record: &dyn Record, key: &str) -> Result<String, LayerfigError> {
    toml::to_string(&to_table(record)).map_err(|e| LayerfigError::InvalidValue {
        key: key.into(),
        reason: e.to_string(),
    })
}

/// Render the record as a TOML table. Unset optionals and private fields are
/// omitted, nested records become sub-tables.
pub fn to_table(record: &dyn Record) -> toml::Table {
    let mut table = toml::Table::new();
    for (index, spec) in record.schema().iter().enumerate() {
        if !spec.exported {
            continue;
        }
        let value = match record.field(index) {
            Some(FieldRef::Leaf(leaf)) => leaf.load().map(to_toml),
            Some(FieldRef::Map(map)) => Some(toml::Value::Table(
                map.iter()
                    .map(|(k, v)| (k.clone(), toml::Value::String(v.clone())))
                    .collect(),
            )),
            Some(FieldRef::Record(nested)) => Some(toml::Value::Table(to_table(nested))),
            Some(FieldRef::Optional(optional)) => optional
                .get()
                .map(|nested| toml::Value::Table(to_table(nested))),
            None => None,
        };
        if let Some(value) = value {
            table.insert(spec.name.to_string(), value);
        }
    }
    table
}

/// TOML integers are `i64`; wider unsigned values fall back to their text.
fn to_toml(value: Scalar) -> toml::Value {
    let wide = |v: Option<i64>| match v {
        Some(i) => toml::Value::Integer(i),
        None => toml::Value::String(encode(&value)),
    };
    match &value {
        Scalar::Bool(b) => toml::Value::Boolean(*b),
        Scalar::I8(v) => toml::Value::Integer((*v).into()),
        Scalar::I16(v) => toml::Value::Integer((*v).into()),
        Scalar::I32(v) => toml::Value::Integer((*v).into()),
        Scalar::I64(v) => toml::Value::Integer(*v),
        Scalar::Isize(v) => wide(i64::try_from(*v).ok()),
        Scalar::U8(v) => toml::Value::Integer((*v).into()),
        Scalar::U16(v) => toml::Value::Integer((*v).into()),
        Scalar::U32(v) => toml::Value::Integer((*v).into()),
        Scalar::U64(v) => wide(i64::try_from(*v).ok()),
        Scalar::Usize(v) => wide(i64::try_from(*v).ok()),
        Scalar::F32(v) => toml::Value::Float((*v).into()),
        Scalar::F64(v) => toml::Value::Float(*v),
        Scalar::String(s) => toml::Value::String(s.clone()),
        Scalar::Complex32(_) | Scalar::Complex64(_) => toml::Value::String(encode(&value)),
    }
}

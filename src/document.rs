//! Overlay a parsed config document onto a record.
//!
//! Documents are applied sparsely: a key present in the document overwrites
//! the matching field, a key absent leaves whatever earlier sources put there.
//! Tables map onto nested records (allocating optional ones), scalars go
//! through the scalar codec so documents and the environment agree on syntax.
//!
//! Private fields are not addressable from documents; their keys count as
//! unknown. JSON documents are converted to a `toml::Table` first and share
//! the same walk.

use std::collections::HashMap;

use toml::{Table, Value};
use tracing::debug;

use crate::error::LayerfigError;
use crate::record::{FieldMut, Leaf, Record};
use crate::scalar::{Scalar, ScalarKind, decode};
use crate::validate;

/// Parse TOML `content` and overlay it onto `record`.
///
/// With `strict`, keys that match no field are errors reporting their line.
pub fn apply_toml(content: &str, record: &mut dyn Record, strict: bool) -> Result<(), LayerfigError> {
    let table: Table = toml::from_str(content)?;
    let unknown = apply_table(record, &table)?;
    finish(content, unknown, strict)
}

/// Parse JSON `content` and overlay it onto `record`.
///
/// The top level must be an object. `null` members are skipped.
pub fn apply_json(content: &str, record: &mut dyn Record, strict: bool) -> Result<(), LayerfigError> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    let Some(Value::Table(table)) = json_to_toml(value) else {
        return Err(LayerfigError::InvalidValue {
            key: "<root>".into(),
            reason: "expected a JSON object".into(),
        });
    };
    let unknown = apply_table(record, &table)?;
    finish(content, unknown, strict)
}

fn finish(content: &str, unknown: Vec<String>, strict: bool) -> Result<(), LayerfigError> {
    if strict {
        validate::reject_unknown_keys(content, unknown)
    } else {
        if !unknown.is_empty() {
            debug!(keys = ?unknown, "ignoring unknown config keys");
        }
        Ok(())
    }
}

/// Overlay `table` onto `record`, returning the dotted keys that matched no field.
pub fn apply_table(record: &mut dyn Record, table: &Table) -> Result<Vec<String>, LayerfigError> {
    let mut unknown = Vec::new();
    let mut errors = Vec::new();
    walk(record, table, "", &mut unknown, &mut errors);
    LayerfigError::collect(errors)?;
    Ok(unknown)
}

fn walk(
    record: &mut dyn Record,
    table: &Table,
    prefix: &str,
    unknown: &mut Vec<String>,
    errors: &mut Vec<LayerfigError>,
) {
    for (key, value) in table {
        let dotted = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        let Some(index) = record
            .schema()
            .iter()
            .position(|s| s.exported && s.name == key.as_str())
        else {
            unknown.push(dotted);
            continue;
        };
        let Some(field) = record.field_mut(index) else {
            continue;
        };

        let result = match field {
            FieldMut::Leaf(leaf) => store_leaf(leaf, value, &dotted),
            FieldMut::Map(map) => store_map(map, value, &dotted),
            FieldMut::Record(nested) => match value {
                Value::Table(sub) => {
                    walk(nested, sub, &dotted, unknown, errors);
                    Ok(())
                }
                _ => Err(expected_table(&dotted)),
            },
            FieldMut::Optional(optional) => match value {
                Value::Table(sub) => {
                    walk(optional.get_or_insert_default(), sub, &dotted, unknown, errors);
                    Ok(())
                }
                _ => Err(expected_table(&dotted)),
            },
        };
        if let Err(e) = result {
            errors.push(e);
        }
    }
}

fn expected_table(key: &str) -> LayerfigError {
    LayerfigError::InvalidValue {
        key: key.to_string(),
        reason: "expected a table".into(),
    }
}

fn store_leaf(leaf: &mut dyn Leaf, value: &Value, key: &str) -> Result<(), LayerfigError> {
    let kind = leaf.kind();
    let scalar = to_scalar(value, kind, key)?;
    if leaf.store(Some(scalar)) {
        Ok(())
    } else {
        Err(LayerfigError::TypeMismatch {
            path: key.to_string(),
            expected: kind,
        })
    }
}

fn to_scalar(value: &Value, kind: ScalarKind, key: &str) -> Result<Scalar, LayerfigError> {
    let mismatch = || LayerfigError::TypeMismatch {
        path: key.to_string(),
        expected: kind,
    };
    let numeric = !matches!(kind, ScalarKind::Bool | ScalarKind::String);
    let floating = matches!(
        kind,
        ScalarKind::F32 | ScalarKind::F64 | ScalarKind::Complex32 | ScalarKind::Complex64
    );

    let text = match value {
        Value::String(s) => s.clone(),
        Value::Integer(i) if numeric => i.to_string(),
        Value::Float(f) if floating => f.to_string(),
        Value::Boolean(b) if kind == ScalarKind::Bool => b.to_string(),
        Value::Datetime(dt) if kind == ScalarKind::String => dt.to_string(),
        _ => return Err(mismatch()),
    };
    decode(&text, kind).map_err(|e| LayerfigError::InvalidValue {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

fn store_map(
    map: &mut HashMap<String, String>,
    value: &Value,
    key: &str,
) -> Result<(), LayerfigError> {
    let Value::Table(entries) = value else {
        return Err(expected_table(key));
    };
    for (k, v) in entries {
        let text = match v {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Datetime(dt) => dt.to_string(),
            Value::Array(_) | Value::Table(_) => {
                return Err(LayerfigError::InvalidValue {
                    key: format!("{key}.{k}"),
                    reason: "map values must be scalars".into(),
                });
            }
        };
        map.insert(k.clone(), text);
    }
    Ok(())
}

/// Convert a JSON value to its TOML counterpart. `null` has none.
///
/// Unsigned integers beyond `i64::MAX` become strings so the codec can still
/// decode them into a `u64` field.
pub fn json_to_toml(value: serde_json::Value) -> Option<Value> {
    use serde_json::Value as Json;

    Some(match value {
        Json::Null => return None,
        Json::Bool(b) => Value::Boolean(b),
        Json::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => Value::Integer(i),
            (None, Some(u), _) => Value::String(u.to_string()),
            (None, None, Some(f)) => Value::Float(f),
            (None, None, None) => Value::String(n.to_string()),
        },
        Json::String(s) => Value::String(s),
        Json::Array(items) => Value::Array(items.into_iter().filter_map(json_to_toml).collect()),
        Json::Object(members) => Value::Table(
            members
                .into_iter()
                .filter_map(|(k, v)| json_to_toml(v).map(|v| (k, v)))
                .collect(),
        ),
    })
}

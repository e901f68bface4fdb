//! The environment source.
//!
//! Walks the record's descriptor tree and looks up one variable per leaf. The
//! derived name is the prefix followed by each path segment upper-cased,
//! joined with `_`: prefix `APP` and field `server.port` read `APP_SERVER_PORT`.
//! Field options change this:
//!
//! - `env("A", "B")`: `A`, then `B`, are tried before the derived name.
//! - `skip`: the field and everything below it are ignored.
//! - `flatten`: a nested record adds no segment of its own.
//!
//! Every candidate goes through [`sanitize_name`](crate::sanitize_name). The
//! first candidate present in the environment decides; an empty value counts
//! as unset. Private fields are ignored unless they are flattened records.
//!
//! An unset optional record is allocated speculatively and kept only if at
//! least one variable below it was found. Decode failures do not stop the
//! walk: every failure in the record is reported together, and the failing
//! field keeps its previous value.

use tracing::trace;

use crate::context::Context;
use crate::error::LayerfigError;
use crate::record::{EnvBinding, FieldMut, FieldPath, FieldSpec, Leaf, Record};
use crate::sanitize::sanitize_name;
use crate::scalar::decode;
use crate::source::Source;

/// Reads fields from environment variables named under `prefix`.
#[derive(Debug, Clone)]
pub struct EnvSource {
    prefix: String,
}

impl EnvSource {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl<T: Record> Source<T> for EnvSource {
    fn apply(&self, ctx: &Context, cfg: &mut T) -> Result<(), LayerfigError> {
        let mut walker = Walker {
            ctx,
            path: FieldPath::root(),
            errors: Vec::new(),
        };
        walker.record(cfg, &self.prefix);
        LayerfigError::collect(walker.errors)
    }
}

struct Walker<'a> {
    ctx: &'a Context,
    path: FieldPath,
    errors: Vec<LayerfigError>,
}

impl Walker<'_> {
    /// Returns whether at least one variable was found below `record`.
    fn record(&mut self, record: &mut dyn Record, prefix: &str) -> bool {
        let mut found = false;
        for (index, spec) in record.schema().iter().enumerate() {
            if spec.env == EnvBinding::Skip {
                continue;
            }
            if !spec.exported && spec.env != EnvBinding::Flatten {
                continue;
            }
            let Some(field) = record.field_mut(index) else {
                continue;
            };

            let derived = format!("{prefix}_{}", spec.name.to_uppercase());
            self.path.push(spec.name);
            found |= match field {
                FieldMut::Record(nested) => {
                    let prefix = nested_prefix(spec, prefix, &derived);
                    self.record(nested, prefix)
                }
                FieldMut::Optional(optional) => {
                    let prefix = nested_prefix(spec, prefix, &derived);
                    match optional.get_mut() {
                        Some(nested) => self.record(nested, prefix),
                        None => optional.populate_with(&mut |fresh| self.record(fresh, prefix)),
                    }
                }
                FieldMut::Leaf(leaf) => self.leaf(leaf, spec, &derived),
                FieldMut::Map(_) => match self.lookup(spec, &derived) {
                    Some((var, _)) => {
                        self.errors.push(LayerfigError::UnhandledType {
                            var,
                            path: self.path.to_string(),
                        });
                        true
                    }
                    None => false,
                },
            };
            self.path.pop();
        }
        found
    }

    fn leaf(&mut self, leaf: &mut dyn Leaf, spec: &FieldSpec, derived: &str) -> bool {
        let Some((var, raw)) = self.lookup(spec, derived) else {
            return false;
        };
        trace!(var = %var, field = %self.path, "environment variable matched");

        match decode(&raw, leaf.kind()) {
            Ok(value) => {
                if !leaf.store(Some(value)) {
                    self.errors.push(LayerfigError::TypeMismatch {
                        path: self.path.to_string(),
                        expected: leaf.kind(),
                    });
                }
            }
            Err(source) => self.errors.push(LayerfigError::EnvValue {
                var,
                path: self.path.to_string(),
                source,
            }),
        }
        true
    }

    /// First candidate present in the environment, as `(name, value)`.
    /// `None` if none is present or the present one is empty.
    fn lookup(&self, spec: &FieldSpec, derived: &str) -> Option<(String, String)> {
        let mut candidates: Vec<&str> = spec.aliases.to_vec();
        candidates.push(derived);
        let (var, value) = candidates
            .into_iter()
            .map(str::trim)
            .filter(|candidate| !candidate.is_empty())
            .map(sanitize_name)
            .find_map(|var| self.ctx.lookup_env(&var).map(|value| (var, value)))?;
        if value.is_empty() {
            return None;
        }
        Some((var, value))
    }
}

fn nested_prefix<'p>(spec: &FieldSpec, parent: &'p str, derived: &'p str) -> &'p str {
    if spec.env == EnvBinding::Flatten {
        parent
    } else {
        derived
    }
}

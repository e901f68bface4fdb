//! Field descriptor tree for configuration records.
//!
//! Sources never see a record's concrete type. They walk it through the
//! [`Record`] trait: a static list of [`FieldSpec`]s (name, visibility,
//! environment annotations) plus indexed accessors that hand back each field
//! as a [`FieldRef`] / [`FieldMut`]. Four field shapes exist:
//!
//! - **Leaf**: a scalar from the codec's closed set, or `Option` of one.
//! - **Map**: a `HashMap<String, String>`.
//! - **Record**: a nested record, always present.
//! - **Optional**: `Option<R>` for a nested record `R`, allocated lazily.
//!
//! The [`record!`](crate::record) macro generates the struct together with
//! its descriptors, so a record type is declared once and every source picks
//! it up.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use crate::scalar::{Complex32, Complex64, Scalar, ScalarKind, ScalarValue};

/// How the environment source treats a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvBinding {
    /// Name derived from the field's position under the prefix.
    Derived,
    /// Never read from the environment, nor is anything below it.
    Skip,
    /// A nested record whose fields are named as if they belonged to the parent.
    Flatten,
}

/// Static description of one field of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub exported: bool,
    pub env: EnvBinding,
    /// Explicit environment variable names, checked in order before the derived one.
    pub aliases: &'static [&'static str],
}

impl FieldSpec {
    pub const fn new(name: &'static str, exported: bool) -> Self {
        Self {
            name,
            exported,
            env: EnvBinding::Derived,
            aliases: &[],
        }
    }

    pub const fn env(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }

    pub const fn skip(mut self) -> Self {
        self.env = EnvBinding::Skip;
        self
    }

    pub const fn flatten(mut self) -> Self {
        self.env = EnvBinding::Flatten;
        self
    }
}

/// A configuration record: a fixed, named set of fields.
///
/// Implement it with the [`record!`](crate::record) macro rather than by hand.
pub trait Record {
    fn schema(&self) -> &'static [FieldSpec];

    fn field(&self, index: usize) -> Option<FieldRef<'_>>;

    fn field_mut(&mut self, index: usize) -> Option<FieldMut<'_>>;

    /// Fill in application defaults. Records without defaults keep this no-op.
    fn set_defaults(&mut self) {}
}

/// Shared view of a single field.
pub enum FieldRef<'a> {
    Leaf(&'a dyn Leaf),
    Map(&'a HashMap<String, String>),
    Record(&'a dyn Record),
    Optional(&'a dyn OptionalRecord),
}

/// Mutable view of a single field.
pub enum FieldMut<'a> {
    Leaf(&'a mut dyn Leaf),
    Map(&'a mut HashMap<String, String>),
    Record(&'a mut dyn Record),
    Optional(&'a mut dyn OptionalRecord),
}

/// Anything that can sit in a record. Implemented for the scalar set, their
/// `Option`s, string maps, records (by the macro) and optional records.
pub trait Field {
    fn as_field(&self) -> FieldRef<'_>;

    fn as_field_mut(&mut self) -> FieldMut<'_>;
}

/// A scalar-valued field.
pub trait Leaf {
    fn kind(&self) -> ScalarKind;

    /// `None` only for an unset optional leaf.
    fn load(&self) -> Option<Scalar>;

    /// Returns `false` if `value` does not fit this leaf (wrong kind, or
    /// `None` for a non-optional leaf); the leaf is left untouched then.
    fn store(&mut self, value: Option<Scalar>) -> bool;

    fn is_optional(&self) -> bool;
}

/// A nested record that may be absent.
pub trait OptionalRecord {
    fn get(&self) -> Option<&dyn Record>;

    fn get_mut(&mut self) -> Option<&mut dyn Record>;

    fn get_or_insert_default(&mut self) -> &mut dyn Record;

    /// Run `fill` against a freshly allocated record and link it in only if
    /// `fill` returns `true`. Returns what `fill` returned.
    fn populate_with(&mut self, fill: &mut dyn FnMut(&mut dyn Record) -> bool) -> bool;

    /// Replace this field with a copy of `other`. `false` if the types differ.
    fn assign_from(&mut self, other: &dyn OptionalRecord) -> bool;

    fn as_any(&self) -> &dyn Any;
}

impl<R> OptionalRecord for Option<R>
where
    R: Record + Default + Clone + 'static,
{
    fn get(&self) -> Option<&dyn Record> {
        self.as_ref().map(|r| r as &dyn Record)
    }

    fn get_mut(&mut self) -> Option<&mut dyn Record> {
        self.as_mut().map(|r| r as &mut dyn Record)
    }

    fn get_or_insert_default(&mut self) -> &mut dyn Record {
        self.get_or_insert_with(R::default)
    }

    fn populate_with(&mut self, fill: &mut dyn FnMut(&mut dyn Record) -> bool) -> bool {
        let mut fresh = R::default();
        let keep = fill(&mut fresh as &mut dyn Record);
        if keep {
            *self = Some(fresh);
        }
        keep
    }

    fn assign_from(&mut self, other: &dyn OptionalRecord) -> bool {
        match other.as_any().downcast_ref::<Option<R>>() {
            Some(value) => {
                self.clone_from(value);
                true
            }
            None => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<R> Field for Option<R>
where
    R: Record + Default + Clone + 'static,
{
    fn as_field(&self) -> FieldRef<'_> {
        FieldRef::Optional(self)
    }

    fn as_field_mut(&mut self) -> FieldMut<'_> {
        FieldMut::Optional(self)
    }
}

impl Field for HashMap<String, String> {
    fn as_field(&self) -> FieldRef<'_> {
        FieldRef::Map(self)
    }

    fn as_field_mut(&mut self) -> FieldMut<'_> {
        FieldMut::Map(self)
    }
}

macro_rules! leaf_fields {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Leaf for $ty {
                fn kind(&self) -> ScalarKind {
                    <$ty as ScalarValue>::KIND
                }

                fn load(&self) -> Option<Scalar> {
                    Some(self.clone().into_scalar())
                }

                fn store(&mut self, value: Option<Scalar>) -> bool {
                    match value.and_then(<$ty as ScalarValue>::from_scalar) {
                        Some(v) => {
                            *self = v;
                            true
                        }
                        None => false,
                    }
                }

                fn is_optional(&self) -> bool {
                    false
                }
            }

            impl Leaf for Option<$ty> {
                fn kind(&self) -> ScalarKind {
                    <$ty as ScalarValue>::KIND
                }

                fn load(&self) -> Option<Scalar> {
                    self.clone().map(ScalarValue::into_scalar)
                }

                fn store(&mut self, value: Option<Scalar>) -> bool {
                    match value {
                        None => {
                            *self = None;
                            true
                        }
                        Some(scalar) => match <$ty as ScalarValue>::from_scalar(scalar) {
                            Some(v) => {
                                *self = Some(v);
                                true
                            }
                            None => false,
                        },
                    }
                }

                fn is_optional(&self) -> bool {
                    true
                }
            }

            impl Field for $ty {
                fn as_field(&self) -> FieldRef<'_> {
                    FieldRef::Leaf(self)
                }

                fn as_field_mut(&mut self) -> FieldMut<'_> {
                    FieldMut::Leaf(self)
                }
            }

            impl Field for Option<$ty> {
                fn as_field(&self) -> FieldRef<'_> {
                    FieldRef::Leaf(self)
                }

                fn as_field_mut(&mut self) -> FieldMut<'_> {
                    FieldMut::Leaf(self)
                }
            }
        )*
    };
}

leaf_fields!(
    bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, Complex32, Complex64,
    String,
);

/// Position of a field from the record root, e.g. `server.tls.port`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath(Vec<&'static str>);

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn push(&mut self, segment: &'static str) {
        self.0.push(segment);
    }

    pub fn pop(&mut self) {
        self.0.pop();
    }

    pub fn segments(&self) -> &[&'static str] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolve a dotted key against `record`'s schema, so each segment is the
    /// schema's own `'static` name. `None` if any segment is unknown.
    pub fn parse(record: &mut dyn Record, dotted: &str) -> Option<Self> {
        let mut path = Self::root();
        let mut current = record;
        let mut segments = dotted.split('.').peekable();
        while let Some(segment) = segments.next() {
            let index = current.schema().iter().position(|s| s.name == segment)?;
            path.push(current.schema()[index].name);
            if segments.peek().is_none() {
                current.field_mut(index)?;
                break;
            }
            current = match current.field_mut(index)? {
                FieldMut::Record(nested) => nested,
                FieldMut::Optional(optional) => optional.get_or_insert_default(),
                FieldMut::Leaf(_) | FieldMut::Map(_) => return None,
            };
        }
        Some(path)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

fn index_of(record: &dyn Record, name: &str) -> Option<usize> {
    record.schema().iter().position(|s| s.name == name)
}

/// Look up a field by path without allocating. `None` if the path is unknown
/// or crosses an unset optional record.
pub fn field_by_path<'a>(record: &'a dyn Record, path: &[&str]) -> Option<FieldRef<'a>> {
    let (head, rest) = path.split_first()?;
    let field = record.field(index_of(record, head)?)?;
    if rest.is_empty() {
        return Some(field);
    }
    match field {
        FieldRef::Record(nested) => field_by_path(nested, rest),
        FieldRef::Optional(optional) => field_by_path(optional.get()?, rest),
        FieldRef::Leaf(_) | FieldRef::Map(_) => None,
    }
}

/// Look up a field by path for writing, allocating optional records on the way.
pub fn field_by_path_mut<'a>(record: &'a mut dyn Record, path: &[&str]) -> Option<FieldMut<'a>> {
    let (head, rest) = path.split_first()?;
    let index = index_of(record, head)?;
    let field = record.field_mut(index)?;
    if rest.is_empty() {
        return Some(field);
    }
    match field {
        FieldMut::Record(nested) => field_by_path_mut(nested, rest),
        FieldMut::Optional(optional) => field_by_path_mut(optional.get_or_insert_default(), rest),
        FieldMut::Leaf(_) | FieldMut::Map(_) => None,
    }
}

/// Declare a configuration record.
///
/// Generates the struct as written plus its [`Record`] and [`Field`]
/// implementations. Field options follow the type after `=>`:
///
/// - `env("NAME", ...)`: alternate environment names, checked first in order.
/// - `skip`: never read from the environment.
/// - `flatten`: a nested record whose fields are named without its own segment.
///
/// A trailing `defaults(cfg) { ... }` block becomes [`Record::set_defaults`].
/// Records must also implement `Default` and `Clone`.
///
/// ```ignore
/// layerfig::record! {
///     #[derive(Debug, Default, Clone, PartialEq)]
///     pub struct Server {
///         pub host: String => env("BIND_HOST"),
///         pub port: u16,
///         pub tls: Option<Tls>,
///         pub scratch: String => skip,
///     }
///     defaults(cfg) {
///         cfg.host = "localhost".into();
///         cfg.port = 8080;
///     }
/// }
/// ```
#[macro_export]
macro_rules! record {
    (@opt $spec:ident, env($($alias:literal),* $(,)?)) => { $spec.env(&[$($alias),*]) };
    (@opt $spec:ident, skip) => { $spec.skip() };
    (@opt $spec:ident, flatten) => { $spec.flatten() };
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $fty:ty $(=> $opt:ident $(( $($alias:literal),* $(,)? ))?)?
            ),* $(,)?
        }
        $(defaults($this:ident) $defaults:block)?
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$fmeta])*
                $fvis $field: $fty,
            )*
        }

        impl $crate::Record for $name {
            fn schema(&self) -> &'static [$crate::FieldSpec] {
                const FIELDS: &[$crate::FieldSpec] = &[
                    $(
                        {
                            let spec = $crate::FieldSpec::new(
                                stringify!($field),
                                !stringify!($fvis).is_empty(),
                            );
                            $( let spec = $crate::record!(@opt spec, $opt $(( $($alias),* ))?); )?
                            spec
                        }
                    ),*
                ];
                FIELDS
            }

            fn field(&self, index: usize) -> ::core::option::Option<$crate::FieldRef<'_>> {
                let fields: &[fn(&Self) -> $crate::FieldRef<'_>] = &[
                    $( |record| $crate::Field::as_field(&record.$field) ),*
                ];
                let get = fields.get(index)?;
                ::core::option::Option::Some(get(self))
            }

            fn field_mut(&mut self, index: usize) -> ::core::option::Option<$crate::FieldMut<'_>> {
                let fields: &[fn(&mut Self) -> $crate::FieldMut<'_>] = &[
                    $( |record| $crate::Field::as_field_mut(&mut record.$field) ),*
                ];
                let get = fields.get(index)?;
                ::core::option::Option::Some(get(self))
            }

            $(
                fn set_defaults(&mut self) {
                    let $this = self;
                    $defaults
                }
            )?
        }

        impl $crate::Field for $name {
            fn as_field(&self) -> $crate::FieldRef<'_> {
                $crate::FieldRef::Record(self)
            }

            fn as_field_mut(&mut self) -> $crate::FieldMut<'_> {
                $crate::FieldMut::Record(self)
            }
        }
    };
}

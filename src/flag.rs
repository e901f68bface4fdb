//! Flags and the storage they write to.
//!
//! A [`Flag`] pairs its names and description with a [`FlagValuer`], which
//! owns the parse / format / "was I set" logic and knows the identity of the
//! storage it writes to. Identities are explicit [`StorageId`]s rather than
//! addresses:
//!
//! - [`FlagTarget<T>`] is a shared flag destination record. Each
//!   [`FlagTarget::bind`] hands out a valuer writing one field of it, whose
//!   identity is the target's id plus the field path. The flag overlay source
//!   matches those identities against the configuration record.
//! - [`Slot<S>`] is standalone storage for flags that never reach the
//!   configuration (`--verbose`, `--dry-run`).
//!
//! The [`FlagRegistry`] holds the flags of one invocation, split into
//! command-local and persistent (inherited) flags.

use std::cell::{Ref, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::LayerfigError;
use crate::record::{FieldMut, FieldPath, FieldRef, Record, field_by_path, field_by_path_mut};
use crate::scalar::{Scalar, ScalarKind, ScalarValue, decode, encode};

static NEXT_STORAGE_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_STORAGE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Identity of the storage location a flag writes to. Two locations holding
/// equal values are still different identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageId {
    /// A field of a [`FlagTarget`].
    Field { target: u64, path: FieldPath },
    /// A standalone [`Slot`].
    Slot(u64),
}

pub trait FlagValuer {
    /// Parse `raw` into the storage and mark it set. On error the storage is
    /// left as it was.
    fn parse(&mut self, raw: &str) -> Result<(), LayerfigError>;

    /// Whether [`parse`](Self::parse) has succeeded at least once.
    fn is_set(&self) -> bool;

    /// Current storage value as text, `<nil>` when unset optional.
    fn format(&self) -> String;

    fn type_repr(&self) -> String;

    fn storage(&self) -> StorageId;

    /// Boolean flags may be given without a value.
    fn is_bool(&self) -> bool {
        false
    }
}

/// A command-line flag.
pub struct Flag {
    long: Option<String>,
    short: Option<char>,
    description: String,
    valuer: Box<dyn FlagValuer>,
}

impl Flag {
    /// An empty `long` means the flag has only a short name. At least one
    /// name is required.
    pub fn new(
        long: &str,
        short: Option<char>,
        valuer: impl FlagValuer + 'static,
        description: &str,
    ) -> Result<Self, LayerfigError> {
        let long = (!long.is_empty()).then(|| long.to_string());
        if long.is_none() && short.is_none() {
            return Err(LayerfigError::InvalidFlag(
                "a long and/or short name is required".into(),
            ));
        }
        if let Some(c) = short
            && !c.is_ascii_alphanumeric()
        {
            return Err(LayerfigError::InvalidFlag(format!(
                "short name {c:?} must be an ASCII letter or digit"
            )));
        }
        Ok(Self {
            long,
            short,
            description: description.to_string(),
            valuer: Box::new(valuer),
        })
    }

    pub fn long(&self) -> Option<&str> {
        self.long.as_deref()
    }

    pub fn short(&self) -> Option<char> {
        self.short
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// `--long`, or `-s` for short-only flags.
    pub fn display_name(&self) -> String {
        match (&self.long, self.short) {
            (Some(long), _) => format!("--{long}"),
            (None, Some(short)) => format!("-{short}"),
            (None, None) => String::new(),
        }
    }

    /// Whether `name` (without dashes) is this flag's long or short name.
    pub fn is_named(&self, name: &str) -> bool {
        self.long.as_deref() == Some(name)
            || self
                .short
                .is_some_and(|c| name.len() == c.len_utf8() && name.starts_with(c))
    }

    /// Parse `raw`, trimmed, into the flag's storage.
    pub fn parse(&mut self, raw: &str) -> Result<(), LayerfigError> {
        self.valuer
            .parse(raw.trim())
            .map_err(|e| LayerfigError::FlagValue {
                flag: self.display_name(),
                source: Box::new(e),
            })
    }

    pub fn is_set(&self) -> bool {
        self.valuer.is_set()
    }

    pub fn format(&self) -> String {
        self.valuer.format()
    }

    pub fn type_repr(&self) -> String {
        self.valuer.type_repr()
    }

    pub fn storage(&self) -> StorageId {
        self.valuer.storage()
    }

    pub fn is_bool(&self) -> bool {
        self.valuer.is_bool()
    }
}

impl fmt::Debug for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flag")
            .field("long", &self.long)
            .field("short", &self.short)
            .field("value", &self.format())
            .field("set", &self.is_set())
            .finish()
    }
}

/// The flags of one command invocation.
#[derive(Debug, Default)]
pub struct FlagRegistry {
    local: Vec<Flag>,
    persistent: Vec<Flag>,
}

impl FlagRegistry {
    pub fn new(local: Vec<Flag>, persistent: Vec<Flag>) -> Self {
        Self { local, persistent }
    }

    pub fn add_local(&mut self, flag: Flag) {
        self.local.push(flag);
    }

    pub fn add_persistent(&mut self, flag: Flag) {
        self.persistent.push(flag);
    }

    pub fn local(&self) -> &[Flag] {
        &self.local
    }

    pub fn persistent(&self) -> &[Flag] {
        &self.persistent
    }

    /// Local flags first, then persistent ones.
    pub fn iter(&self) -> impl Iterator<Item = &Flag> {
        self.local.iter().chain(&self.persistent)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Flag> {
        self.local.iter_mut().chain(&mut self.persistent)
    }

    /// Look a flag up by long or short name, local flags shadowing persistent ones.
    pub fn find(&self, name: &str) -> Option<&Flag> {
        self.iter().find(|f| f.is_named(name))
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Flag> {
        self.iter_mut().find(|f| f.is_named(name))
    }

    /// Parse `raw` into the flag called `name`, as if given on the command line.
    pub fn set(&mut self, name: &str, raw: &str) -> Result<(), LayerfigError> {
        self.find_mut(name)
            .ok_or_else(|| LayerfigError::InvalidFlag(format!("unknown flag {name:?}")))?
            .parse(raw)
    }
}

/// A flag destination record shared between the flags bound to it and the
/// flag overlay source.
pub struct FlagTarget<T> {
    id: u64,
    cell: Rc<RefCell<T>>,
}

impl<T> Clone for FlagTarget<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<T: Record + Default + 'static> FlagTarget<T> {
    pub fn new(initial: T) -> Self {
        Self {
            id: next_id(),
            cell: Rc::new(RefCell::new(initial)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn borrow(&self) -> Ref<'_, T> {
        self.cell.borrow()
    }

    /// A valuer writing the field at dotted `path`, which must name a scalar
    /// or map field of `T`.
    pub fn bind(&self, path: &str) -> Result<FieldValuer<T>, LayerfigError> {
        let mut probe = T::default();
        let field_path = FieldPath::parse(&mut probe, path)
            .ok_or_else(|| LayerfigError::KeyNotFound(path.to_string()))?;
        let shape = match field_by_path_mut(&mut probe, field_path.segments()) {
            Some(FieldMut::Leaf(leaf)) => Shape::Leaf {
                kind: leaf.kind(),
                optional: leaf.is_optional(),
            },
            Some(FieldMut::Map(_)) => Shape::Map,
            _ => {
                return Err(LayerfigError::Unaddressable {
                    path: path.to_string(),
                });
            }
        };
        Ok(FieldValuer {
            target: self.clone(),
            path: field_path,
            shape,
            changed: false,
        })
    }
}

impl<T: Default + Record + 'static> Default for FlagTarget<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for FlagTarget<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlagTarget")
            .field("id", &self.id)
            .field("value", &self.cell.borrow())
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
enum Shape {
    Leaf { kind: ScalarKind, optional: bool },
    Map,
}

enum Parsed {
    Leaf(Scalar),
    Map(HashMap<String, String>),
}

/// Writes one field of a [`FlagTarget`].
pub struct FieldValuer<T> {
    target: FlagTarget<T>,
    path: FieldPath,
    shape: Shape,
    changed: bool,
}

impl<T: Record> FlagValuer for FieldValuer<T> {
    fn parse(&mut self, raw: &str) -> Result<(), LayerfigError> {
        // Decode before walking: the walk allocates optional records.
        let parsed = match self.shape {
            Shape::Leaf { kind, .. } => Parsed::Leaf(decode(raw, kind)?),
            Shape::Map => Parsed::Map(parse_map(raw)?),
        };
        let mut cfg = self.target.cell.borrow_mut();
        match (field_by_path_mut(&mut *cfg, self.path.segments()), parsed) {
            (Some(FieldMut::Leaf(leaf)), Parsed::Leaf(value)) => {
                if !leaf.store(Some(value)) {
                    return Err(LayerfigError::TypeMismatch {
                        path: self.path.to_string(),
                        expected: leaf.kind(),
                    });
                }
            }
            (Some(FieldMut::Map(map)), Parsed::Map(entries)) => *map = entries,
            _ => {
                return Err(LayerfigError::Unaddressable {
                    path: self.path.to_string(),
                });
            }
        }
        self.changed = true;
        Ok(())
    }

    fn is_set(&self) -> bool {
        self.changed
    }

    fn format(&self) -> String {
        let cfg = self.target.cell.borrow();
        match field_by_path(&*cfg, self.path.segments()) {
            Some(FieldRef::Leaf(leaf)) => leaf
                .load()
                .map(|v| encode(&v))
                .unwrap_or_else(|| "<nil>".into()),
            Some(FieldRef::Map(map)) => format_map(map),
            _ => "<nil>".into(),
        }
    }

    fn type_repr(&self) -> String {
        match self.shape {
            Shape::Leaf {
                kind,
                optional: false,
            } => kind.to_string(),
            Shape::Leaf {
                kind,
                optional: true,
            } => format!("Option<{kind}>"),
            Shape::Map => "HashMap<String, String>".into(),
        }
    }

    fn storage(&self) -> StorageId {
        StorageId::Field {
            target: self.target.id,
            path: self.path.clone(),
        }
    }

    fn is_bool(&self) -> bool {
        matches!(
            self.shape,
            Shape::Leaf {
                kind: ScalarKind::Bool,
                ..
            }
        )
    }
}

/// Standalone flag storage, outside any record.
pub struct Slot<S> {
    id: u64,
    cell: Rc<RefCell<S>>,
}

impl<S> Clone for Slot<S> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<S: ScalarValue + Clone + 'static> Slot<S> {
    pub fn new(initial: S) -> Self {
        Self {
            id: next_id(),
            cell: Rc::new(RefCell::new(initial)),
        }
    }

    pub fn get(&self) -> S {
        self.cell.borrow().clone()
    }

    pub fn valuer(&self) -> SlotValuer<S> {
        SlotValuer {
            slot: self.clone(),
            changed: false,
        }
    }
}

/// Writes a [`Slot`].
pub struct SlotValuer<S> {
    slot: Slot<S>,
    changed: bool,
}

impl<S: ScalarValue + Clone + 'static> FlagValuer for SlotValuer<S> {
    fn parse(&mut self, raw: &str) -> Result<(), LayerfigError> {
        let value = decode(raw, S::KIND)?;
        let value = S::from_scalar(value).ok_or_else(|| LayerfigError::TypeMismatch {
            path: format!("slot#{}", self.slot.id),
            expected: S::KIND,
        })?;
        *self.slot.cell.borrow_mut() = value;
        self.changed = true;
        Ok(())
    }

    fn is_set(&self) -> bool {
        self.changed
    }

    fn format(&self) -> String {
        encode(&self.slot.get().into_scalar())
    }

    fn type_repr(&self) -> String {
        S::KIND.to_string()
    }

    fn storage(&self) -> StorageId {
        StorageId::Slot(self.slot.id)
    }

    fn is_bool(&self) -> bool {
        S::KIND == ScalarKind::Bool
    }
}

/// Parse `key=value,key=value`. Whitespace around entries is ignored.
fn parse_map(raw: &str) -> Result<HashMap<String, String>, LayerfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .ok_or_else(|| LayerfigError::InvalidValue {
                    key: entry.to_string(),
                    reason: "expected key=value".into(),
                })
        })
        .collect()
}

fn format_map(map: &HashMap<String, String>) -> String {
    let mut entries: Vec<_> = map.iter().map(|(k, v)| format!("{k}={v}")).collect();
    entries.sort();
    entries.join(",")
}

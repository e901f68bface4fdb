//! Layered, strongly-typed configuration. Declare a record, stack the
//! sources, resolve.
//!
//! Layerfig builds one configuration value out of several sources applied in
//! order: compiled defaults, config files, environment variables and
//! command-line flags. Each source writes only what it actually has, so a
//! later layer overrides an earlier one field by field.
//!
//! ```ignore
//! layerfig::record! {
//!     #[derive(Debug, Default, Clone)]
//!     pub struct AppConfig {
//!         pub host: String => env("BIND_HOST"),
//!         pub port: u16,
//!         pub tls: Option<Tls>,
//!     }
//!     defaults(cfg) {
//!         cfg.host = "localhost".into();
//!         cfg.port = 8080;
//!     }
//! }
//!
//! let config: AppConfig = Layerfig::builder()
//!     .defaults()
//!     .toml_file(|_| "/etc/myapp.toml".into(), true)
//!     .env("MYAPP")
//!     .flags(&target)
//!     .build()
//!     .resolve(&ctx)?;
//! ```
//!
//! # Design: the record is the schema
//!
//! The [`record!`] macro generates the struct as written plus a descriptor
//! tree ([`Record`]): field names, visibility, environment bindings, and a
//! typed view of every field. Every source walks that tree instead of
//! relying on reflection or serde, which gives them the same notion of
//! "field" and the same path naming:
//!
//! - **Leaves** are the scalar kinds ([`ScalarKind`]): bool, the signed and
//!   unsigned integers, `f32`/`f64`, [`Complex32`]/[`Complex64`] and
//!   `String`, plus `Option` of any of them.
//! - **Nested records** map to TOML sections and to `_`-joined environment
//!   names.
//! - **`Option<Record>`** fields stay `None` until some source actually
//!   writes below them. Sources fill a fresh record speculatively and link it
//!   in only when something landed.
//! - **`HashMap<String, String>`** fields take TOML tables or
//!   `key=value,key=value` flags.
//!
//! # Layer precedence
//!
//! ```text
//! Compiled defaults     defaults(cfg) { ... }        DefaultSource
//!        ↑ overridden by
//! Config files          later files win              FileSource
//!        ↑ overridden by
//! Environment vars      PREFIX_FIELD_NESTED          EnvSource
//!        ↑ overridden by
//! Command-line flags    only flags actually given    FlagSource
//! ```
//!
//! Order is exactly the order sources are added to the [`Pipeline`]; nothing
//! forces the conventional one. A pipeline builds the value in scratch space
//! and swaps it into the destination only when every source succeeded, so a
//! failed reload never leaves a half-updated configuration behind. Pipelines
//! are themselves sources and nest.
//!
//! # Files
//!
//! [`FileSource`] computes its path from the record built so far (a defaults
//! block or an earlier file can point at the next one) and hands the open
//! stream to a decoder. The built-in TOML and JSON decoders overlay the
//! document sparsely: keys present override, keys absent keep what earlier
//! layers set. They are strict by default and report unknown keys with their
//! line number. A missing file can be tolerated; any other open failure is
//! fatal.
//!
//! [`SearchPath`] and [`LayerfigBuilder::discover`] cover the usual
//! locations: the platform config directory, a dotfile directory under
//! `$HOME`, the working directory, or an explicit path.
//!
//! # Environment variables
//!
//! With prefix `MYAPP`, names are derived by joining the prefix and each path
//! segment with `_`, then sanitizing ([`sanitize_name`]):
//!
//! | Env var | Field |
//! |---------|-------|
//! | `MYAPP_PORT` | `port` |
//! | `MYAPP_DATABASE_POOL_SIZE` | `database.pool_size` |
//!
//! Field options tune this: `=> env("A", "B")` checks explicit names first,
//! `=> skip` never reads the field, `=> flatten` nests a record without adding
//! its own segment. Empty values count as unset. Values that fail to parse
//! are collected and reported together, after every other field was applied.
//!
//! # Flags
//!
//! A [`FlagTarget`] is a record of the configuration's shape that flags write
//! into; [`FlagTarget::bind`] hands out the valuer for one field. [`Slot`]s
//! hold flags that never reach the configuration. [`FlagSource`] copies only
//! the flags that were set, matched by storage identity rather than by value,
//! and reports a wiring error for a set flag that has no counterpart in the
//! configuration.
//!
//! The core is parser-agnostic: [`FlagRegistry::set`] parses one value. With
//! the `clap` feature (on by default), `FlagRegistry::augment` and
//! `FlagRegistry::apply_matches` wire the registry into a clap `Command`.
//!
//! # Inspection
//!
//! The [`ops`] module lists, looks up and renders a resolved record through
//! the same descriptors.
//!
//! # Error handling
//!
//! All fallible operations return [`LayerfigError`]. Source failures carry
//! the source's position in the pipeline; field failures carry the dotted
//! path and, for the environment, the variable name. See the [`error`]
//! module for the full set.

pub mod error;
pub mod file;
pub mod ops;
pub mod scalar;
pub mod types;

mod builder;
#[cfg(feature = "clap")]
mod cli;
mod context;
mod document;
mod env;
mod flag;
mod overrides;
mod record;
mod resolve;
mod sanitize;
mod source;
mod validate;

#[cfg(test)]
mod fixtures;

pub use builder::{Layerfig, LayerfigBuilder};
pub use context::Context;
pub use document::{apply_json, apply_toml};
pub use env::EnvSource;
pub use error::{DecodeError, LayerfigError};
pub use file::FileSource;
pub use flag::{FieldValuer, Flag, FlagRegistry, FlagTarget, FlagValuer, Slot, SlotValuer, StorageId};
pub use overrides::FlagSource;
pub use record::{
    EnvBinding, Field, FieldMut, FieldPath, FieldRef, FieldSpec, Leaf, OptionalRecord, Record,
    field_by_path, field_by_path_mut,
};
pub use resolve::{Pipeline, compose};
pub use sanitize::sanitize_name;
pub use scalar::{Complex, Complex32, Complex64, Scalar, ScalarKind, ScalarValue, decode, encode};
pub use source::{DefaultSource, Source};
pub use types::SearchPath;

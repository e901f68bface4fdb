use std::io::Read;
use std::path::PathBuf;

use crate::context::Context;
use crate::env::EnvSource;
use crate::error::{DecodeError, LayerfigError};
use crate::file::{self, FileSource};
use crate::flag::FlagTarget;
use crate::overrides::FlagSource;
use crate::record::Record;
use crate::resolve::Pipeline;
use crate::source::{DefaultSource, Source};
use crate::types::SearchPath;

/// Entry point for building a layered configuration.
pub struct Layerfig;

impl Layerfig {
    pub fn builder<T: Record + Default + 'static>() -> LayerfigBuilder<T> {
        LayerfigBuilder::new()
    }
}

/// Builder assembling a [`Pipeline`] of sources.
///
/// Every call appends one layer; later layers override earlier ones. The
/// usual order is defaults, files, environment, flags:
///
/// ```ignore
/// let pipeline = Layerfig::builder::<AppConfig>()
///     .defaults()
///     .toml_file(|cfg| cfg.config_path.clone().into(), true)
///     .env("MYAPP")
///     .flags(&target)
///     .build();
/// ```
pub struct LayerfigBuilder<T> {
    pipeline: Pipeline<T>,
}

impl<T: Record + Default + 'static> LayerfigBuilder<T> {
    fn new() -> Self {
        Self {
            pipeline: Pipeline::default(),
        }
    }

    /// The record's compiled defaults.
    pub fn defaults(mut self) -> Self {
        self.pipeline.push(DefaultSource);
        self
    }

    /// A file read with a custom decoder. `path` sees the record as built by
    /// the earlier layers.
    pub fn file<P, D>(mut self, path: P, decode: D, allow_missing: bool) -> Self
    where
        P: Fn(&T) -> PathBuf + 'static,
        D: Fn(&mut dyn Read, &mut T) -> Result<(), DecodeError> + 'static,
    {
        self.pipeline
            .push(FileSource::new(path, decode, allow_missing));
        self
    }

    /// A TOML file, strict about unknown keys.
    pub fn toml_file<P>(self, path: P, allow_missing: bool) -> Self
    where
        P: Fn(&T) -> PathBuf + 'static,
    {
        self.file(path, file::toml_decoder::<T>(true), allow_missing)
    }

    /// A JSON file, strict about unknown keys.
    pub fn json_file<P>(self, path: P, allow_missing: bool) -> Self
    where
        P: Fn(&T) -> PathBuf + 'static,
    {
        self.file(path, file::json_decoder::<T>(true), allow_missing)
    }

    /// One optional TOML layer per search path, in the order given, so later
    /// paths win. Directories that cannot be determined are skipped.
    pub fn discover(mut self, paths: &[SearchPath], app_name: &str, file_name: &str) -> Self {
        for search in paths {
            if let Some(path) = file::located(search, app_name, file_name) {
                self = self.toml_file(move |_| path.clone(), true);
            }
        }
        self
    }

    /// Environment variables under `prefix`.
    pub fn env(mut self, prefix: &str) -> Self {
        self.pipeline.push(EnvSource::new(prefix));
        self
    }

    /// Flags bound to `target` that were set on the command line.
    pub fn flags<F: Record + Default + 'static>(mut self, target: &FlagTarget<F>) -> Self {
        self.pipeline.push(FlagSource::new(target));
        self
    }

    /// Any other source, including a closure or a nested pipeline.
    pub fn source(mut self, source: impl Source<T> + 'static) -> Self {
        self.pipeline.push(source);
        self
    }

    pub fn build(self) -> Pipeline<T> {
        self.pipeline
    }

    /// Build and apply in one go. `dest` is only replaced when every layer
    /// succeeds.
    pub fn load(self, ctx: &Context, dest: &mut T) -> Result<(), LayerfigError> {
        self.build().apply(ctx, dest)
    }
}

use std::collections::HashMap;
use std::fmt;

use crate::flag::FlagRegistry;

type EnvLookup = Box<dyn Fn(&str) -> Option<String>>;

/// Per-invocation state handed to every source.
///
/// Holds the environment lookup used by [`EnvSource`](crate::EnvSource) and,
/// once command-line parsing has happened, the [`FlagRegistry`] read by
/// [`FlagSource`](crate::FlagSource).
pub struct Context {
    env: EnvLookup,
    flags: Option<FlagRegistry>,
}

impl Context {
    /// A context reading the real process environment.
    pub fn new() -> Self {
        Self {
            env: Box::new(|name| std::env::var(name).ok()),
            flags: None,
        }
    }

    /// A context whose environment is exactly `vars`. The process
    /// environment is not consulted.
    pub fn with_env_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            env: Box::new(move |name| vars.get(name).cloned()),
            flags: None,
        }
    }

    pub fn with_flags(mut self, flags: FlagRegistry) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn lookup_env(&self, name: &str) -> Option<String> {
        (self.env)(name)
    }

    pub fn flags(&self) -> Option<&FlagRegistry> {
        self.flags.as_ref()
    }

    pub fn flags_mut(&mut self) -> Option<&mut FlagRegistry> {
        self.flags.as_mut()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

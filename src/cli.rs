//! Clap adapter for layerfig flags.
//!
//! This module is the **optional integration layer** between layerfig's
//! parser-agnostic [`Flag`]s and the [clap](https://docs.rs/clap) CLI parser.
//! It is compiled only when the `clap` Cargo feature is enabled (on by
//! default).
//!
//! The flow is two calls around clap's own parsing:
//!
//! ```ignore
//! let command = registry.augment(Cli::command());
//! let matches = command.get_matches();
//! registry.apply_matches(&matches)?;
//! ```
//!
//! [`FlagRegistry::augment`] registers every flag as a clap [`Arg`]; persistent
//! flags become `global` so subcommands inherit them.
//! [`FlagRegistry::apply_matches`] feeds back only the values the user typed.
//! Values clap filled in itself (defaults, env) are ignored, which keeps
//! "was this flag set" meaning "was it on the command line".
//!
//! Without clap, call [`FlagRegistry::set`] for each parsed flag instead.

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::error::LayerfigError;
use crate::flag::{Flag, FlagRegistry};

impl Flag {
    /// The clap argument id: the long name, or the short name for short-only flags.
    pub fn arg_id(&self) -> String {
        match (self.long(), self.short()) {
            (Some(long), _) => long.to_string(),
            (None, Some(short)) => short.to_string(),
            (None, None) => String::new(),
        }
    }

    /// Build the clap argument for this flag.
    ///
    /// Boolean flags may be given bare (`--debug`) or with an attached value
    /// (`--debug=false`).
    pub fn to_arg(&self) -> Arg {
        let mut arg = Arg::new(self.arg_id())
            .help(self.description().to_string())
            .value_name(value_name(&self.type_repr()))
            .action(ArgAction::Set);
        if let Some(long) = self.long() {
            arg = arg.long(long.to_string());
        }
        if let Some(short) = self.short() {
            arg = arg.short(short);
        }
        if self.is_bool() {
            arg = arg
                .num_args(0..=1)
                .require_equals(true)
                .default_missing_value("true");
        }
        arg
    }
}

/// `u16` → `U16`, `Option<string>` → `STRING`, maps → `KEY=VALUE`.
fn value_name(type_repr: &str) -> String {
    if type_repr.starts_with("HashMap") {
        return "KEY=VALUE".into();
    }
    type_repr
        .strip_prefix("Option<")
        .and_then(|inner| inner.strip_suffix('>'))
        .unwrap_or(type_repr)
        .to_uppercase()
}

impl FlagRegistry {
    /// Add every flag to `command`. Persistent flags are global, so they are
    /// accepted by every subcommand.
    pub fn augment(&self, mut command: Command) -> Command {
        for flag in self.local() {
            command = command.arg(flag.to_arg());
        }
        for flag in self.persistent() {
            command = command.arg(flag.to_arg().global(true));
        }
        command
    }

    /// Parse the values the user supplied on the command line into the flags.
    ///
    /// Flags absent from `matches`, or whose value came from anywhere but the
    /// command line, are left untouched and stay unset. When a flag is
    /// repeated the last occurrence wins.
    pub fn apply_matches(&mut self, matches: &ArgMatches) -> Result<(), LayerfigError> {
        for flag in self.iter_mut() {
            let id = flag.arg_id();
            let Ok(Some(values)) = matches.try_get_raw(&id) else {
                continue;
            };
            let Some(raw) = values.last() else {
                continue;
            };
            if matches.value_source(&id) != Some(ValueSource::CommandLine) {
                continue;
            }
            let raw = raw.to_str().ok_or_else(|| {
                LayerfigError::InvalidFlag(format!("{} value is not valid UTF-8", flag.display_name()))
            })?;
            flag.parse(raw)?;
        }
        Ok(())
    }
}

//! # layerfig demo application
//!
//! A sample CLI tool that showcases how to integrate layerfig into a real
//! application. This is **not** a real app; it exists purely to demonstrate
//! and manually verify layerfig's features.
//!
//! ## Running
//!
//! ```sh
//! cargo run --example layerfig_demo -- echo
//! cargo run --example layerfig_demo -- show
//! ```
//!
//! ## Features demonstrated
//!
//! | Feature                  | How to exercise it                                                   |
//! |--------------------------|----------------------------------------------------------------------|
//! | Compiled defaults        | `cargo run --example layerfig_demo -- echo`                          |
//! | Config file (cwd)        | Create `layerfig-demo.toml` in cwd, then run `echo`                  |
//! | Config file (home)       | Place the file under `~/.layerfig-demo/`                             |
//! | Env var override         | `LAYERFIG_DEMO_COLOR=red cargo run --example layerfig_demo -- echo`  |
//! | Env var alias            | `PORT=9999 cargo run --example layerfig_demo -- echo`                |
//! | Optional record via env  | `LAYERFIG_DEMO_TLS_CERT=c.pem cargo run --example layerfig_demo -- show` |
//! | Flag override            | `cargo run --example layerfig_demo -- --port 8080 echo`              |
//! | Bare boolean slot flag   | `cargo run --example layerfig_demo -- -v echo`                       |
//! | Single key lookup        | `cargo run --example layerfig_demo -- echo --key server.port`        |
//! | Rendered TOML            | `cargo run --example layerfig_demo -- show`                          |

mod config;

use std::path::PathBuf;

use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};

use layerfig::{
    Context, Flag, FlagRegistry, FlagTarget, Layerfig, LayerfigBuilder, LayerfigError, SearchPath,
    Slot, file, ops,
};

use config::DemoConfig;

const APP: &str = "layerfig-demo";

// ---------------------------------------------------------------------------
// CLI definitions
// ---------------------------------------------------------------------------

/// layerfig demo: a sample CLI app for showcasing layerfig integration.
///
/// The flags (`--host`, `--port`, `--color`, `--tls-cert`, `-v`) are
/// registered at runtime from flag registries.
#[derive(Parser, Debug)]
#[command(name = "layerfig-demo")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print resolved configuration values (colored by display.color).
    Echo {
        /// Print only this dotted key instead of all values.
        #[arg(long)]
        key: Option<String>,
    },
    /// Print the resolved configuration as TOML.
    Show,
}

// ---------------------------------------------------------------------------
// Flags and layers
// ---------------------------------------------------------------------------

/// Flags writing into `target`. They are persistent so they work before or
/// after the subcommand.
///
/// Only these go into the [`Context`]: the flag layer rejects a set flag that
/// does not write to the configuration.
fn config_flags(target: &FlagTarget<DemoConfig>) -> Result<FlagRegistry, LayerfigError> {
    let mut registry = FlagRegistry::default();
    registry.add_persistent(Flag::new(
        "host",
        None,
        target.bind("server.host")?,
        "Override the server host",
    )?);
    registry.add_persistent(Flag::new(
        "port",
        Some('p'),
        target.bind("server.port")?,
        "Override the server port",
    )?);
    registry.add_persistent(Flag::new(
        "color",
        None,
        target.bind("display.color")?,
        "Override the display color",
    )?);
    registry.add_persistent(Flag::new(
        "tls-cert",
        None,
        target.bind("tls.cert")?,
        "Enable TLS with this certificate",
    )?);
    Ok(registry)
}

/// Flags the app keeps to itself.
fn app_flags(verbose: &Slot<bool>) -> Result<FlagRegistry, LayerfigError> {
    let mut registry = FlagRegistry::default();
    registry.add_persistent(Flag::new(
        "verbose",
        Some('v'),
        verbose.valuer(),
        "Enable verbose output",
    )?);
    Ok(registry)
}

/// Defaults, then the platform directory and `~/.layerfig-demo/`, then the
/// file named by `config_file` in cwd, then `LAYERFIG_DEMO_*`, then flags.
fn make_builder(target: &FlagTarget<DemoConfig>) -> LayerfigBuilder<DemoConfig> {
    Layerfig::builder::<DemoConfig>()
        .defaults()
        .discover(
            &[SearchPath::Platform, SearchPath::Home(".layerfig-demo")],
            APP,
            "layerfig-demo.toml",
        )
        .toml_file(|cfg: &DemoConfig| PathBuf::from(&cfg.config_file), true)
        .env("LAYERFIG_DEMO")
        .flags(target)
}

// ---------------------------------------------------------------------------
// ANSI color helpers
// ---------------------------------------------------------------------------

fn ansi_color_code(name: &str) -> &str {
    match name {
        "red" => "\x1b[31m",
        "green" => "\x1b[32m",
        "yellow" => "\x1b[33m",
        "blue" => "\x1b[34m",
        "magenta" => "\x1b[35m",
        "cyan" => "\x1b[36m",
        "white" => "\x1b[37m",
        _ => "\x1b[0m",
    }
}

const RESET: &str = "\x1b[0m";

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn echo_all(config: &DemoConfig, verbose: bool) {
    let color = ansi_color_code(&config.display.color);

    if verbose {
        println!(
            "{color}[verbose] Resolved configuration for {:?}{RESET}",
            config.name
        );
        if let Some(path) = file::first_existing(&[SearchPath::Cwd], APP, &config.config_file) {
            println!("{color}[verbose] Using {}{RESET}", path.display());
        }
        println!();
    }

    let entries = ops::entries(config);
    if config.display.format == "plain" {
        for (key, value) in &entries {
            println!("{key}={value}");
        }
    } else {
        let max_key_len = entries.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        for (key, value) in &entries {
            println!("{color}{key:<max_key_len$}{RESET}  {value}");
        }
    }
}

fn echo_key(config: &DemoConfig, key: &str) {
    let color = ansi_color_code(&config.display.color);
    match ops::get_value(config, key) {
        Ok(value) => println!("{color}{key}{RESET}  {value}"),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    let target = FlagTarget::<DemoConfig>::default();
    let verbose = Slot::new(false);
    let (mut registry, mut own) = config_flags(&target)
        .and_then(|config| Ok((config, app_flags(&verbose)?)))
        .unwrap_or_else(|e| {
            eprintln!("Invalid flag declaration:\n{e}");
            std::process::exit(2);
        });

    let command = own.augment(registry.augment(Cli::command()));
    let matches = command.get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());
    if let Err(e) = registry
        .apply_matches(&matches)
        .and_then(|()| own.apply_matches(&matches))
    {
        eprintln!("{e}");
        std::process::exit(2);
    }

    let ctx = Context::new().with_flags(registry);
    let config = make_builder(&target)
        .build()
        .resolve(&ctx)
        .unwrap_or_else(|e| {
            eprintln!("Failed to load config:\n{e}");
            std::process::exit(1);
        });

    match cli.command {
        Commands::Echo { key } => match key {
            Some(k) => echo_key(&config, &k),
            None => echo_all(&config, verbose.get()),
        },
        Commands::Show => {
            let table = ops::to_table(&config);
            match toml::to_string(&table) {
                Ok(text) => print!("{text}"),
                Err(e) => {
                    eprintln!("{e}");
                    std::process::exit(1);
                }
            }
        }
    }
}

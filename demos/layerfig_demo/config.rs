//! Configuration records for the layerfig demo application.
//!
//! A root [`DemoConfig`] with two nested records and one optional one, to
//! show how nesting maps onto files, environment variables and flags.
//!
//! # Env var mapping
//!
//! With the prefix `LAYERFIG_DEMO`, names join the path with `_`:
//!
//! | Env var                                 | Config key               |
//! |-----------------------------------------|--------------------------|
//! | `LAYERFIG_DEMO_NAME`                    | `name`                   |
//! | `LAYERFIG_DEMO_SERVER_HOST` or `HOST`   | `server.host`            |
//! | `LAYERFIG_DEMO_SERVER_PORT` or `PORT`   | `server.port`            |
//! | `LAYERFIG_DEMO_SERVER_MAX_CONNECTIONS`  | `server.max_connections` |
//! | `LAYERFIG_DEMO_COLOR`                   | `display.color`          |
//! | `LAYERFIG_DEMO_FORMAT`                  | `display.format`         |
//! | `LAYERFIG_DEMO_TLS_CERT`                | `tls.cert`               |
//!
//! `display` is flattened, so its fields carry no `DISPLAY_` segment.

use layerfig::record;

record! {
    /// Root configuration for the demo application.
    #[derive(Debug, Default, Clone)]
    pub struct DemoConfig {
        /// Application name shown in the echo banner.
        pub name: String,
        /// Where the config file lives. Not read from the environment.
        pub config_file: String => skip,
        /// Server settings.
        pub server: ServerConfig,
        /// Display and formatting settings.
        pub display: DisplayConfig => flatten,
        /// TLS settings. Absent unless some layer sets a field.
        pub tls: Option<TlsConfig>,
    }
    defaults(cfg) {
        cfg.name = "layerfig-demo".into();
        cfg.config_file = "layerfig-demo.toml".into();
        cfg.server.host = "127.0.0.1".into();
        cfg.server.port = 3000;
        cfg.server.max_connections = 100;
        cfg.display.color = "yellow".into();
        cfg.display.format = "pretty".into();
    }
}

record! {
    /// Server-related configuration, the `[server]` section.
    #[derive(Debug, Default, Clone)]
    pub struct ServerConfig {
        /// Hostname to bind to.
        pub host: String => env("HOST"),
        /// Port number.
        pub port: u16 => env("PORT"),
        /// Maximum number of allowed connections.
        pub max_connections: u32,
    }
}

record! {
    /// Display and output formatting, the `[display]` section.
    #[derive(Debug, Default, Clone)]
    pub struct DisplayConfig {
        /// Terminal color: red, green, yellow, blue, magenta, cyan, white.
        pub color: String,
        /// Output format (pretty or plain).
        pub format: String,
    }
}

record! {
    #[derive(Debug, Default, Clone)]
    pub struct TlsConfig {
        pub cert: String,
        pub key: Option<String>,
    }
}

#[cfg(test)]
pub mod test {
    use std::collections::HashMap;

    use crate::scalar::{Complex32, Complex64};

    crate::record! {
        #[derive(Debug, Default, Clone, PartialEq)]
        pub struct ServerConfig {
            /// The application host.
            pub host: String => env("BIND_HOST", "HOST"),
            /// The port number.
            pub port: u16,
            /// Enable debug mode.
            pub debug: bool,
            /// Database settings.
            pub database: Database,
            pub tls: Option<Tls>,
            pub labels: HashMap<String, String>,
            pub scratch: String => skip,
            pub base: Base => flatten,
        }
        defaults(cfg) {
            cfg.host = "localhost".into();
            cfg.port = 8080;
            cfg.database.pool_size = 5;
        }
    }

    crate::record! {
        #[derive(Debug, Default, Clone, PartialEq)]
        pub struct Database {
            /// Connection string URL.
            pub url: Option<String>,
            /// Connection pool size.
            pub pool_size: usize,
            secret: String,
        }
    }

    impl Database {
        pub fn secret(&self) -> &str {
            &self.secret
        }
    }

    crate::record! {
        #[derive(Debug, Default, Clone, PartialEq)]
        pub struct Tls {
            pub cert: String,
            pub key: Option<String>,
            pub client: Option<ClientAuth>,
        }
    }

    crate::record! {
        #[derive(Debug, Default, Clone, PartialEq)]
        pub struct ClientAuth {
            pub ca: String,
        }
    }

    crate::record! {
        #[derive(Debug, Default, Clone, PartialEq)]
        pub struct Base {
            pub region: String,
            pub zone: u8,
        }
    }

    // -- Fixture covering every scalar kind ------------------------------------

    crate::record! {
        #[derive(Debug, Default, Clone, PartialEq)]
        pub struct AllKinds {
            pub d1: bool,
            pub d2: isize,
            pub d3: i8,
            pub d4: i16,
            pub d5: i32,
            pub d6: i64,
            pub d7: usize,
            pub d8: u8,
            pub d9: u16,
            pub d10: u32,
            pub d11: u64,
            pub d12: f32,
            pub d13: f64,
            pub d14: Complex32,
            pub d15: Complex64,
            pub d16: String,
        }
    }

    crate::record! {
        #[derive(Debug, Default, Clone, PartialEq)]
        pub struct KindsHolder {
            pub d: AllKinds,
        }
    }

    #[test]
    fn server_config_defaults() {
        use crate::Record;

        let mut config = ServerConfig::default();
        config.set_defaults();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 8080);
        assert!(!config.debug);
        assert_eq!(config.database.url, None);
        assert_eq!(config.database.pool_size, 5);
        assert_eq!(config.database.secret(), "");
        assert!(config.tls.is_none());
    }
}

//! End-to-end layering through the public API, with records declared outside
//! the crate.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use layerfig::{
    Context, Flag, FlagRegistry, FlagTarget, Layerfig, LayerfigError, Pipeline, Slot, Source, ops,
    record,
};
use tempfile::TempDir;

record! {
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct AppConfig {
        pub name: String,
        pub config_file: String => skip,
        pub server: Server,
        pub cache: Option<Cache>,
        pub tags: HashMap<String, String>,
    }
    defaults(cfg) {
        cfg.name = "app".into();
        cfg.server.host = "localhost".into();
        cfg.server.port = 8080;
    }
}

record! {
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct Server {
        pub host: String => env("BIND_HOST"),
        pub port: u16,
        pub timeout: Option<f64>,
    }
}

record! {
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct Cache {
        pub size: u32,
        pub dir: Option<String>,
    }
}

struct Fixture {
    _dir: TempDir,
    file: PathBuf,
}

fn fixture(content: &str) -> Fixture {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("app.toml");
    fs::write(&file, content).unwrap();
    Fixture { _dir: dir, file }
}

fn pipeline(file: &Path, target: &FlagTarget<AppConfig>) -> Pipeline<AppConfig> {
    let file = file.to_path_buf();
    Layerfig::builder::<AppConfig>()
        .defaults()
        .toml_file(move |_| file.clone(), true)
        .env("APP")
        .flags(target)
        .build()
}

fn flags(target: &FlagTarget<AppConfig>) -> FlagRegistry {
    FlagRegistry::new(
        vec![
            Flag::new("port", Some('p'), target.bind("server.port").unwrap(), "").unwrap(),
            Flag::new("cache-dir", None, target.bind("cache.dir").unwrap(), "").unwrap(),
        ],
        vec![Flag::new("name", None, target.bind("name").unwrap(), "").unwrap()],
    )
}

#[test]
fn later_layers_override_earlier_ones() {
    let fx = fixture("name = \"from-file\"\n[server]\nport = 1000\ntimeout = 2.5\n");
    let target = FlagTarget::<AppConfig>::default();
    let mut registry = flags(&target);
    registry.set("port", "3000").unwrap();
    let ctx = Context::with_env_vars([("APP_SERVER_PORT", "2000"), ("BIND_HOST", "0.0.0.0")])
        .with_flags(registry);

    let config = pipeline(&fx.file, &target).resolve(&ctx).unwrap();

    assert_eq!(config.name, "from-file");
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 3000);
    assert_eq!(config.server.timeout, Some(2.5));
    assert!(config.cache.is_none());
}

#[test]
fn unset_layers_fall_through_to_defaults() {
    let fx = fixture("");
    let target = FlagTarget::<AppConfig>::default();
    let ctx = Context::with_env_vars(Vec::<(String, String)>::new()).with_flags(flags(&target));

    let config = pipeline(&fx.file, &target).resolve(&ctx).unwrap();

    let mut expected = AppConfig::default();
    layerfig::Record::set_defaults(&mut expected);
    assert_eq!(config, expected);
}

#[test]
fn optional_record_allocated_by_whichever_layer_reaches_it() {
    let fx = fixture("");
    let target = FlagTarget::<AppConfig>::default();
    let mut registry = flags(&target);
    registry.set("cache-dir", "/var/cache/app").unwrap();
    let ctx = Context::with_env_vars([("APP_CACHE_SIZE", "64")]).with_flags(registry);

    let config = pipeline(&fx.file, &target).resolve(&ctx).unwrap();

    assert_eq!(
        config.cache,
        Some(Cache {
            size: 64,
            dir: Some("/var/cache/app".into()),
        })
    );
}

#[test]
fn file_path_follows_earlier_layers() {
    let fx = fixture("name = \"chained\"\n");
    let path = fx.file.display().to_string();
    let config = Layerfig::builder::<AppConfig>()
        .source(move |_: &Context, cfg: &mut AppConfig| {
            cfg.config_file = path.clone();
            Ok::<(), LayerfigError>(())
        })
        .toml_file(|cfg: &AppConfig| PathBuf::from(&cfg.config_file), false)
        .build()
        .resolve(&Context::with_env_vars(Vec::<(String, String)>::new()))
        .unwrap();
    assert_eq!(config.name, "chained");
}

#[test]
fn failure_leaves_destination_untouched() {
    let fx = fixture("[server]\nport = 1000\n");
    let target = FlagTarget::<AppConfig>::default();
    let ctx = Context::with_env_vars([("APP_SERVER_PORT", "not-a-port"), ("APP_NAME", "env")])
        .with_flags(flags(&target));

    let mut config = AppConfig {
        name: "before".into(),
        ..AppConfig::default()
    };
    let err = pipeline(&fx.file, &target)
        .apply(&ctx, &mut config)
        .unwrap_err();

    assert!(matches!(err, LayerfigError::Source { index: 2, .. }));
    assert!(err.to_string().contains("APP_SERVER_PORT"));
    assert_eq!(config.name, "before");
}

#[test]
fn set_flag_outside_config_fails_the_flag_layer() {
    let fx = fixture("");
    let target = FlagTarget::<AppConfig>::default();
    let verbose = Slot::new(false);
    let mut registry = flags(&target);
    registry.add_persistent(Flag::new("verbose", Some('v'), verbose.valuer(), "").unwrap());
    registry.set("v", "true").unwrap();
    let ctx = Context::with_env_vars(Vec::<(String, String)>::new()).with_flags(registry);

    let err = pipeline(&fx.file, &target).resolve(&ctx).unwrap_err();
    assert!(matches!(err, LayerfigError::Source { index: 3, .. }));
    assert!(err.to_string().contains("--verbose"));
}

#[test]
fn strict_file_reports_unknown_key_line() {
    let fx = fixture("name = \"x\"\n\n[server]\nprot = 1\n");
    let target = FlagTarget::<AppConfig>::default();
    let err = pipeline(&fx.file, &target)
        .resolve(&Context::with_env_vars(Vec::<(String, String)>::new()))
        .unwrap_err();
    let text = err.to_string();
    assert!(text.contains("unknown key 'server.prot' (line 4)"), "{text}");
}

#[test]
fn resolved_record_can_be_inspected() {
    let fx = fixture("[tags]\nteam = \"core\"\n");
    let target = FlagTarget::<AppConfig>::default();
    let config = pipeline(&fx.file, &target)
        .resolve(&Context::with_env_vars(Vec::<(String, String)>::new()))
        .unwrap();

    assert_eq!(ops::get_value(&config, "server.port").unwrap(), "8080");
    assert_eq!(ops::get_value(&config, "tags").unwrap(), "team=core");
    assert!(ops::entries(&config).contains(&("tags.team".to_string(), "core".to_string())));
}

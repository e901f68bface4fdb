//! The file source.
//!
//! [`FileSource`] opens one file and hands the open stream to a decoder. The
//! path is computed from the record as built so far, so a defaults block (or
//! any earlier source) can decide where the file lives. A missing file can be
//! tolerated; every other open failure is fatal.
//!
//! Decoders are plain functions `Fn(&mut dyn Read, &mut T)`. Two built-ins
//! overlay TOML or JSON documents through the record descriptors, see
//! [`toml_decoder`] and [`json_decoder`].
//!
//! [`located`] and [`first_existing`] turn a [`SearchPath`] into a concrete
//! file path for use inside the path function.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;

use tracing::debug;

use crate::context::Context;
use crate::document;
use crate::error::{DecodeError, LayerfigError};
use crate::record::Record;
use crate::source::Source;
use crate::types::SearchPath;

/// Reads one config file and decodes it onto the record.
pub struct FileSource<P, D> {
    path: P,
    decode: D,
    allow_missing: bool,
}

impl<P, D> FileSource<P, D> {
    /// `path` derives the file location from the partially built record,
    /// `decode` applies the file's bytes to it. With `allow_missing`, a file
    /// that does not exist is skipped.
    pub fn new(path: P, decode: D, allow_missing: bool) -> Self {
        Self {
            path,
            decode,
            allow_missing,
        }
    }
}

impl<T, P, D> Source<T> for FileSource<P, D>
where
    P: Fn(&T) -> PathBuf,
    D: Fn(&mut dyn Read, &mut T) -> Result<(), DecodeError>,
{
    fn apply(&self, _ctx: &Context, cfg: &mut T) -> Result<(), LayerfigError> {
        let path = (self.path)(&*cfg);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && self.allow_missing => {
                debug!(path = %path.display(), "config file not found, skipping");
                return Ok(());
            }
            Err(source) => return Err(LayerfigError::Open { path, source }),
        };

        debug!(path = %path.display(), "decoding config file");
        let mut reader = BufReader::new(file);
        let reader: &mut dyn Read = &mut reader;
        (self.decode)(reader, cfg).map_err(|source| LayerfigError::Decode { path, source })
    }
}

/// Decoder overlaying a TOML document onto the record. With `strict`,
/// unknown keys fail the decode.
pub fn toml_decoder<T: Record>(
    strict: bool,
) -> impl Fn(&mut dyn Read, &mut T) -> Result<(), DecodeError> {
    move |reader: &mut dyn Read, cfg: &mut T| {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        document::apply_toml(&content, cfg, strict)?;
        Ok(())
    }
}

/// Decoder overlaying a JSON document onto the record. With `strict`,
/// unknown keys fail the decode.
pub fn json_decoder<T: Record>(
    strict: bool,
) -> impl Fn(&mut dyn Read, &mut T) -> Result<(), DecodeError> {
    move |reader: &mut dyn Read, cfg: &mut T| {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        document::apply_json(&content, cfg, strict)?;
        Ok(())
    }
}

/// Resolve `search` to a directory and join `file_name` onto it.
///
/// `app_name` names the platform config directory (e.g. `~/.config/{app_name}/`
/// on Linux). Returns `None` if the directory cannot be determined, such as
/// when no home directory exists.
pub fn located(search: &SearchPath, app_name: &str, file_name: &str) -> Option<PathBuf> {
    let dir = match search {
        SearchPath::Platform => {
            let proj = directories::ProjectDirs::from("", "", app_name)?;
            proj.config_dir().to_path_buf()
        }
        SearchPath::Home(subdir) => {
            let user = directories::UserDirs::new()?;
            user.home_dir().join(subdir)
        }
        SearchPath::Cwd => std::env::current_dir().ok()?,
        SearchPath::Path(p) => p.clone(),
    };
    Some(dir.join(file_name))
}

/// The highest-priority existing file among `paths`, which are listed
/// lowest priority first.
pub fn first_existing(paths: &[SearchPath], app_name: &str, file_name: &str) -> Option<PathBuf> {
    paths
        .iter()
        .rev()
        .filter_map(|sp| located(sp, app_name, file_name))
        .find(|p| p.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::ServerConfig;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    fn ctx() -> Context {
        Context::with_env_vars(Vec::<(String, String)>::new())
    }

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn decodes_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "app.toml", "port = 3000\n");
        let source = FileSource::new(
            move |_: &ServerConfig| path.clone(),
            toml_decoder::<ServerConfig>(true),
            false,
        );

        let mut config = ServerConfig::default();
        source.apply(&ctx(), &mut config).unwrap();
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn missing_file_tolerated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        let source = FileSource::new(
            move |_: &ServerConfig| path.clone(),
            toml_decoder::<ServerConfig>(true),
            true,
        );

        let mut config = ServerConfig {
            port: 7,
            ..ServerConfig::default()
        };
        source.apply(&ctx(), &mut config).unwrap();
        assert_eq!(config.port, 7);
    }

    #[test]
    fn missing_file_fatal_when_not_tolerated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        let source = FileSource::new(
            move |_: &ServerConfig| path.clone(),
            toml_decoder::<ServerConfig>(true),
            false,
        );

        let err = source.apply(&ctx(), &mut ServerConfig::default()).unwrap_err();
        assert!(matches!(err, LayerfigError::Open { .. }));
        assert!(err.to_string().starts_with("unable to open config file"));
    }

    #[test]
    fn other_open_failures_are_fatal_even_when_missing_is_tolerated() {
        let dir = TempDir::new().unwrap();
        // A regular file used as a directory fails with ENOTDIR, not NotFound.
        let file = write(&dir, "plain", "");
        let path = file.join("nested.toml");
        let source = FileSource::new(
            move |_: &ServerConfig| path.clone(),
            toml_decoder::<ServerConfig>(true),
            true,
        );

        let err = source.apply(&ctx(), &mut ServerConfig::default()).unwrap_err();
        assert!(matches!(err, LayerfigError::Open { .. }));
    }

    #[test]
    fn decode_failure_is_wrapped() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "bad.toml", "port = [\n");
        let source = FileSource::new(
            move |_: &ServerConfig| path.clone(),
            toml_decoder::<ServerConfig>(true),
            false,
        );

        let err = source.apply(&ctx(), &mut ServerConfig::default()).unwrap_err();
        assert!(matches!(err, LayerfigError::Decode { .. }));
        assert!(err.to_string().starts_with("unable to decode config"));
    }

    #[test]
    fn path_comes_from_accumulated_record() {
        let dir = TempDir::new().unwrap();
        write(&dir, "from-record.json", r#"{"port": 4000}"#);
        let source = FileSource::new(
            |cfg: &ServerConfig| PathBuf::from(&cfg.host),
            json_decoder::<ServerConfig>(true),
            false,
        );

        let mut config = ServerConfig {
            host: dir.path().join("from-record.json").display().to_string(),
            ..ServerConfig::default()
        };
        source.apply(&ctx(), &mut config).unwrap();
        assert_eq!(config.port, 4000);
    }

    #[test]
    fn custom_decoder() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "raw.txt", "  hello  ");
        let source = FileSource::new(
            move |_: &ServerConfig| path.clone(),
            |reader: &mut dyn Read, cfg: &mut ServerConfig| -> Result<(), DecodeError> {
                let mut s = String::new();
                reader.read_to_string(&mut s)?;
                cfg.host = s.trim().to_string();
                Ok(())
            },
            false,
        );

        let mut config = ServerConfig::default();
        source.apply(&ctx(), &mut config).unwrap();
        assert_eq!(config.host, "hello");
    }

    #[test]
    fn located_explicit_path() {
        let path = located(&SearchPath::Path("/opt/app".into()), "app", "app.toml").unwrap();
        assert_eq!(path, PathBuf::from("/opt/app/app.toml"));
    }

    #[test]
    fn located_platform_uses_app_name() {
        if let Some(path) = located(&SearchPath::Platform, "layerfig-test", "c.toml") {
            assert!(path.to_string_lossy().contains("layerfig-test"));
        }
    }

    #[test]
    fn first_existing_prefers_last() {
        let low = TempDir::new().unwrap();
        let high = TempDir::new().unwrap();
        write(&low, "app.toml", "");
        write(&high, "app.toml", "");
        let paths = vec![
            SearchPath::Path(low.path().to_path_buf()),
            SearchPath::Path(high.path().to_path_buf()),
        ];
        assert_eq!(
            first_existing(&paths, "app", "app.toml"),
            Some(high.path().join("app.toml"))
        );
    }

    #[test]
    fn first_existing_skips_missing() {
        let low = TempDir::new().unwrap();
        let empty = TempDir::new().unwrap();
        write(&low, "app.toml", "");
        let paths = vec![
            SearchPath::Path(low.path().to_path_buf()),
            SearchPath::Path(empty.path().to_path_buf()),
        ];
        assert_eq!(
            first_existing(&paths, "app", "app.toml"),
            Some(low.path().join("app.toml"))
        );
        assert_eq!(first_existing(&paths, "app", "other.toml"), None);
    }
}

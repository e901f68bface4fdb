//! The flag overlay source: copy explicitly set flag values onto the config.
//!
//! Flags write into a [`FlagTarget`], a record of the same shape as the
//! configuration. [`FlagSource`] collects the storage identity of every flag
//! that was actually given, then walks the target and the configuration in
//! lock-step. A field whose identity was collected is copied across and
//! ticked off; everything else is left alone, so defaults, files and
//! environment keep their values unless a flag overrides them.
//!
//! Optional records on the configuration side are allocated only when a
//! copied value lands inside them: the walk fills a fresh record and links it
//! into its parent once something below matched, innermost first.
//!
//! Identities still pending after the walk belong to flags that have no
//! counterpart in the configuration. That is a wiring error between the flag
//! declarations and the schema, and is always reported.

use std::collections::HashMap;

use tracing::trace;

use crate::context::Context;
use crate::error::LayerfigError;
use crate::flag::{FlagTarget, StorageId};
use crate::record::{FieldMut, FieldPath, FieldRef, Record};
use crate::source::Source;

/// Overlays flags bound to `target` onto the configuration.
pub struct FlagSource<F> {
    target: FlagTarget<F>,
}

impl<F: Record + Default + 'static> FlagSource<F> {
    pub fn new(target: &FlagTarget<F>) -> Self {
        Self {
            target: target.clone(),
        }
    }
}

impl<F, T> Source<T> for FlagSource<F>
where
    F: Record + Default + 'static,
    T: Record,
{
    fn apply(&self, ctx: &Context, cfg: &mut T) -> Result<(), LayerfigError> {
        let Some(registry) = ctx.flags() else {
            return Ok(());
        };
        let pending: HashMap<StorageId, String> = registry
            .iter()
            .filter(|flag| flag.is_set())
            .map(|flag| (flag.storage(), flag.display_name()))
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        let src = self.target.borrow();
        let mut overlay = Overlay {
            target: self.target.id(),
            pending,
            path: FieldPath::root(),
            errors: Vec::new(),
        };
        overlay.record(&*src, cfg);

        let Overlay {
            pending,
            mut errors,
            ..
        } = overlay;
        if !pending.is_empty() {
            let mut orphans: Vec<String> = pending.into_values().collect();
            orphans.sort();
            errors.push(LayerfigError::Wiring { orphans });
        }
        LayerfigError::collect(errors)
    }
}

struct Overlay {
    target: u64,
    pending: HashMap<StorageId, String>,
    path: FieldPath,
    errors: Vec<LayerfigError>,
}

impl Overlay {
    /// Returns whether anything was copied below `dst`.
    fn record(&mut self, src: &dyn Record, dst: &mut dyn Record) -> bool {
        let mut matched = false;
        for (index, spec) in src.schema().iter().enumerate() {
            if self.pending.is_empty() {
                break;
            }
            self.path.push(spec.name);
            let same_name = dst.schema().get(index).is_some_and(|d| d.name == spec.name);
            matched |= match (src.field(index), dst.field_mut(index)) {
                (Some(from), Some(to)) if same_name => self.field(from, to),
                _ => self.mismatch(),
            };
            self.path.pop();
        }
        matched
    }

    fn field(&mut self, from: FieldRef<'_>, to: FieldMut<'_>) -> bool {
        match (from, to) {
            (FieldRef::Leaf(from), FieldMut::Leaf(to)) => {
                if !self.claim() {
                    return false;
                }
                if !to.store(from.load()) {
                    self.errors.push(LayerfigError::TypeMismatch {
                        path: self.path.to_string(),
                        expected: to.kind(),
                    });
                    return false;
                }
                true
            }
            (FieldRef::Map(from), FieldMut::Map(to)) => {
                if !self.claim() {
                    return false;
                }
                to.clone_from(from);
                true
            }
            (FieldRef::Record(from), FieldMut::Record(to)) => self.record(from, to),
            (FieldRef::Optional(from), FieldMut::Optional(to)) => {
                if self.claim() {
                    if !to.assign_from(from) {
                        self.unaddressable();
                        return false;
                    }
                    return true;
                }
                let Some(from) = from.get() else {
                    return false;
                };
                match to.get_mut() {
                    Some(to) => self.record(from, to),
                    None => to.populate_with(&mut |fresh| self.record(from, fresh)),
                }
            }
            _ => self.mismatch(),
        }
    }

    /// Tick off the current path if a set flag writes to it.
    fn claim(&mut self) -> bool {
        let id = StorageId::Field {
            target: self.target,
            path: self.path.clone(),
        };
        match self.pending.remove(&id) {
            Some(flag) => {
                trace!(flag = %flag, field = %self.path, "flag value copied");
                true
            }
            None => false,
        }
    }

    /// The two sides disagree at the current path. Only an error if a set
    /// flag writes at or below it; those flags are ticked off so they are not
    /// reported again as orphans.
    fn mismatch(&mut self) -> bool {
        let target = self.target;
        let here = self.path.segments().to_vec();
        let before = self.pending.len();
        self.pending.retain(|id, _| match id {
            StorageId::Field { target: t, path } => {
                *t != target || !path.segments().starts_with(&here)
            }
            StorageId::Slot(_) => true,
        });
        if self.pending.len() != before {
            self.unaddressable();
        }
        false
    }

    fn unaddressable(&mut self) {
        self.errors.push(LayerfigError::Unaddressable {
            path: self.path.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{Base, ClientAuth, ServerConfig, Tls};
    use crate::flag::{Flag, FlagRegistry, FlagValuer, Slot};
    use std::collections::HashMap;

    crate::record! {
        #[derive(Debug, Default, Clone, PartialEq)]
        struct Narrow {
            host: String,
        }
    }

    crate::record! {
        #[derive(Debug, Default, Clone, PartialEq)]
        struct PortTarget {
            tls: Option<NumericTls>,
        }
    }

    crate::record! {
        #[derive(Debug, Default, Clone, PartialEq)]
        struct NumericTls {
            port: u16,
        }
    }

    crate::record! {
        #[derive(Debug, Default, Clone, PartialEq)]
        struct PortConfig {
            tls: Option<SwitchTls>,
        }
    }

    crate::record! {
        #[derive(Debug, Default, Clone, PartialEq)]
        struct SwitchTls {
            port: bool,
        }
    }

    /// Marks a whole field of a target as set, whatever its shape.
    struct WholeField {
        target: u64,
        path: FieldPath,
        changed: bool,
    }

    impl WholeField {
        fn new(target: &FlagTarget<ServerConfig>, dotted: &str) -> Self {
            Self {
                target: target.id(),
                path: FieldPath::parse(&mut ServerConfig::default(), dotted).unwrap(),
                changed: false,
            }
        }
    }

    impl FlagValuer for WholeField {
        fn parse(&mut self, _raw: &str) -> Result<(), LayerfigError> {
            self.changed = true;
            Ok(())
        }

        fn is_set(&self) -> bool {
            self.changed
        }

        fn format(&self) -> String {
            String::new()
        }

        fn type_repr(&self) -> String {
            "record".into()
        }

        fn storage(&self) -> StorageId {
            StorageId::Field {
                target: self.target,
                path: self.path.clone(),
            }
        }
    }

    fn flag(target: &FlagTarget<ServerConfig>, long: &str, path: &str) -> Flag {
        Flag::new(long, None, target.bind(path).unwrap(), "").unwrap()
    }

    fn ctx(local: Vec<Flag>, persistent: Vec<Flag>) -> Context {
        Context::with_env_vars(Vec::<(String, String)>::new())
            .with_flags(FlagRegistry::new(local, persistent))
    }

    fn set(ctx: &mut Context, name: &str, raw: &str) {
        ctx.flags_mut().unwrap().set(name, raw).unwrap();
    }

    #[test]
    fn only_set_flags_are_copied() {
        let target = FlagTarget::<ServerConfig>::default();
        let mut ctx = ctx(
            vec![flag(&target, "labels", "labels")],
            vec![
                flag(&target, "host", "host"),
                flag(&target, "port", "port"),
                flag(&target, "db-url", "database.url"),
            ],
        );
        set(&mut ctx, "labels", "a=1,b=2");
        set(&mut ctx, "host", "str");
        set(&mut ctx, "db-url", "str");

        let mut config = ServerConfig {
            port: 8080,
            debug: true,
            ..ServerConfig::default()
        };
        FlagSource::new(&target).apply(&ctx, &mut config).unwrap();

        assert_eq!(config.host, "str");
        assert_eq!(config.database.url.as_deref(), Some("str"));
        assert_eq!(
            config.labels,
            HashMap::from([("a".into(), "1".into()), ("b".into(), "2".into())])
        );
        assert_eq!(config.port, 8080);
        assert!(config.debug);
        assert!(config.tls.is_none());
    }

    #[test]
    fn equal_values_do_not_confuse_identity() {
        let target = FlagTarget::new(ServerConfig {
            base: Base {
                region: "same".into(),
                zone: 0,
            },
            ..ServerConfig::default()
        });
        let mut ctx = ctx(
            vec![flag(&target, "host", "host"), flag(&target, "region", "base.region")],
            vec![],
        );
        set(&mut ctx, "host", "same");

        let mut config = ServerConfig {
            base: Base {
                region: "eu".into(),
                zone: 1,
            },
            ..ServerConfig::default()
        };
        FlagSource::new(&target).apply(&ctx, &mut config).unwrap();
        assert_eq!(config.host, "same");
        assert_eq!(config.base.region, "eu");
    }

    #[test]
    fn no_registry_is_a_no_op() {
        let target = FlagTarget::<ServerConfig>::default();
        let ctx = Context::with_env_vars(Vec::<(String, String)>::new());
        let mut config = ServerConfig {
            port: 1,
            ..ServerConfig::default()
        };
        FlagSource::new(&target).apply(&ctx, &mut config).unwrap();
        assert_eq!(config.port, 1);
    }

    #[test]
    fn nothing_set_is_a_no_op_even_when_miswired() {
        let target = FlagTarget::<ServerConfig>::default();
        let stray = Slot::new(String::new());
        let ctx = ctx(
            vec![Flag::new("stray", None, stray.valuer(), "").unwrap()],
            vec![flag(&target, "port", "port")],
        );
        let mut config = ServerConfig::default();
        let before = config.clone();
        FlagSource::new(&target).apply(&ctx, &mut config).unwrap();
        assert_eq!(config, before);
    }

    #[test]
    fn set_flag_outside_the_config_is_a_wiring_error() {
        let target = FlagTarget::<ServerConfig>::default();
        let stray = Slot::new(String::new());
        let mut ctx = ctx(
            vec![Flag::new("stray", None, stray.valuer(), "").unwrap()],
            vec![flag(&target, "port", "port")],
        );
        set(&mut ctx, "stray", "str");
        set(&mut ctx, "port", "42");

        let mut config = ServerConfig::default();
        let err = FlagSource::new(&target).apply(&ctx, &mut config).unwrap_err();
        match err {
            LayerfigError::Wiring { orphans } => assert_eq!(orphans, vec!["--stray".to_string()]),
            other => panic!("Expected Wiring, got: {other:?}"),
        }
    }

    #[test]
    fn flags_of_another_target_are_orphans() {
        let target = FlagTarget::<ServerConfig>::default();
        let other = FlagTarget::<ServerConfig>::default();
        let mut ctx = ctx(vec![flag(&other, "port", "port")], vec![]);
        set(&mut ctx, "port", "1");

        let err = FlagSource::new(&target)
            .apply(&ctx, &mut ServerConfig::default())
            .unwrap_err();
        assert!(matches!(err, LayerfigError::Wiring { .. }));
    }

    #[test]
    fn optional_record_allocated_only_on_match() {
        let target = FlagTarget::<ServerConfig>::default();
        let mut ctx = ctx(
            vec![flag(&target, "ca", "tls.client.ca"), flag(&target, "port", "port")],
            vec![],
        );
        set(&mut ctx, "ca", "ca.pem");

        let mut config = ServerConfig::default();
        FlagSource::new(&target).apply(&ctx, &mut config).unwrap();
        assert_eq!(
            config.tls,
            Some(Tls {
                client: Some(ClientAuth { ca: "ca.pem".into() }),
                ..Tls::default()
            })
        );
    }

    #[test]
    fn populated_target_branch_without_match_leaves_config_unset() {
        let target = FlagTarget::new(ServerConfig {
            tls: Some(Tls {
                cert: "from-target.pem".into(),
                ..Tls::default()
            }),
            ..ServerConfig::default()
        });
        let mut ctx = ctx(
            vec![flag(&target, "cert", "tls.cert"), flag(&target, "zone", "base.zone")],
            vec![],
        );
        // base comes after tls, so the walk passes through the populated branch.
        set(&mut ctx, "zone", "9");

        let mut config = ServerConfig::default();
        FlagSource::new(&target).apply(&ctx, &mut config).unwrap();
        assert_eq!(config.base.zone, 9);
        assert!(config.tls.is_none());
    }

    #[test]
    fn existing_optional_record_is_updated_in_place() {
        let target = FlagTarget::<ServerConfig>::default();
        let mut ctx = ctx(vec![flag(&target, "key", "tls.key")], vec![]);
        set(&mut ctx, "key", "k.pem");

        let mut config = ServerConfig {
            tls: Some(Tls {
                cert: "keep.pem".into(),
                ..Tls::default()
            }),
            ..ServerConfig::default()
        };
        FlagSource::new(&target).apply(&ctx, &mut config).unwrap();
        let tls = config.tls.unwrap();
        assert_eq!(tls.cert, "keep.pem");
        assert_eq!(tls.key.as_deref(), Some("k.pem"));
    }

    #[test]
    fn shape_mismatch_is_unaddressable() {
        let target = FlagTarget::<ServerConfig>::default();
        let mut ctx = ctx(vec![flag(&target, "port", "port")], vec![]);
        set(&mut ctx, "port", "1");

        let mut narrow = Narrow::default();
        let err = FlagSource::new(&target).apply(&ctx, &mut narrow).unwrap_err();
        assert!(matches!(err, LayerfigError::Unaddressable { path } if path == "port"));
    }

    #[test]
    fn orphans_are_reported_alongside_mismatches() {
        let target = FlagTarget::<ServerConfig>::default();
        let stray = Slot::new(String::new());
        let mut ctx = ctx(
            vec![
                flag(&target, "port", "port"),
                Flag::new("stray", None, stray.valuer(), "").unwrap(),
            ],
            vec![],
        );
        set(&mut ctx, "port", "1");
        set(&mut ctx, "stray", "x");

        let err = FlagSource::new(&target)
            .apply(&ctx, &mut Narrow::default())
            .unwrap_err();
        let all = err.flatten();
        assert_eq!(all.len(), 2, "{err}");
        assert!(
            all.iter()
                .any(|e| matches!(e, LayerfigError::Unaddressable { path } if path == "port"))
        );
        assert!(all.iter().any(|e| matches!(
            e,
            LayerfigError::Wiring { orphans } if orphans == &vec!["--stray".to_string()]
        )));
    }

    #[test]
    fn whole_optional_record_is_copied_when_its_own_flag_is_set() {
        let target = FlagTarget::new(ServerConfig {
            tls: Some(Tls {
                cert: "t.pem".into(),
                ..Tls::default()
            }),
            ..ServerConfig::default()
        });
        let mut ctx = ctx_with(WholeField::new(&target, "tls"));
        set(&mut ctx, "tls", "");

        let mut config = ServerConfig::default();
        FlagSource::new(&target).apply(&ctx, &mut config).unwrap();
        assert_eq!(config.tls, target.borrow().tls);

        let empty = FlagTarget::<ServerConfig>::default();
        let mut ctx = ctx_with(WholeField::new(&empty, "tls"));
        set(&mut ctx, "tls", "");
        FlagSource::new(&empty).apply(&ctx, &mut config).unwrap();
        assert!(config.tls.is_none());
    }

    fn ctx_with(valuer: WholeField) -> Context {
        ctx(vec![Flag::new("tls", None, valuer, "").unwrap()], vec![])
    }

    #[test]
    fn failed_store_does_not_link_optional_record() {
        let target = FlagTarget::<PortTarget>::default();
        let mut ctx = ctx(
            vec![Flag::new("port", None, target.bind("tls.port").unwrap(), "").unwrap()],
            vec![],
        );
        set(&mut ctx, "port", "7");

        let mut config = PortConfig::default();
        let err = FlagSource::new(&target).apply(&ctx, &mut config).unwrap_err();
        assert!(matches!(err, LayerfigError::TypeMismatch { ref path, .. } if path == "tls.port"));
        assert!(config.tls.is_none());
    }
}

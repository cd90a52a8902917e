//! Process-wide cache of frozen configurations, one per composite type and
//! source.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::compose::{compose_with_sections, Composite};
use super::frozen::Frozen;
use super::source::{Source, SourceKey};
use super::ConfigError;

type CacheKey = (TypeId, SourceKey);
type Entry = Box<dyn Any + Send + Sync>;

/// Hands out one frozen instance per composite type and source.
///
/// Create one registry at startup and share it (it is `Sync`). The first
/// request for a `(type, source)` pair loads, validates and freezes the
/// configuration; later requests return the same instance without reading
/// the source again. Failed attempts are not cached.
///
/// ## Example
///
/// ```no_run
/// use mdtc::{Composite, Registry, Sections};
/// # use mdtc::{Fields, HasModelSpec, Model, ModelSpec, Plain, Record};
/// # struct Server { port: u16 }
/// # impl HasModelSpec for Server { const SPEC: ModelSpec = ModelSpec::new("server", "app.server"); }
/// # impl Model for Server { type Strategy = Plain; }
/// # impl Record for Server {
/// #     fn read(f: &mut Fields<'_>) -> Option<Self> { let port = f.required("port"); Some(Self { port: port? }) }
/// # }
///
/// struct AppConfig {
///     server: Server,
/// }
///
/// impl Composite for AppConfig {
///     fn compose(sections: &mut Sections<'_>) -> Option<Self> {
///         let server = sections.required("server");
///         Some(Self { server: server? })
///     }
/// }
///
/// let registry = Registry::new();
/// let config = registry.get_or_create::<AppConfig>(std::path::Path::new("app.toml"))?;
/// println!("listening on {}", config.server.port);
/// # Ok::<(), mdtc::ConfigError>(())
/// ```
pub struct Registry {
    canonicalize_paths: bool,
    entries: Mutex<HashMap<CacheKey, Entry>>,
}

impl Registry {
    /// Creates a registry with default options.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Returns the cached configuration for `source`, building it first if
    /// needed.
    ///
    /// Concurrent calls are serialized, so every caller observes the same
    /// instance and the source is parsed at most once per successful build.
    pub fn get_or_create<C: Composite>(
        &self,
        source: impl Into<Source>,
    ) -> Result<Frozen<C>, ConfigError> {
        let source = source.into();
        let config = std::any::type_name::<C>();
        let key = (TypeId::of::<C>(), source.key(self.canonicalize_paths));

        let mut entries = self.entries.lock();
        if let Some(frozen) = lookup::<C>(&entries, &key) {
            debug!(config, origin = %source, "config cache hit");
            return Ok(frozen);
        }

        let frozen = build::<C>(&source).map_err(|e| {
            warn!(
                config,
                origin = %source,
                problems = e.problems().len(),
                error = %e,
                "configuration rejected"
            );
            e
        })?;

        entries.insert(key, Box::new(frozen.clone()));
        info!(config, origin = %frozen.origin(), "configuration frozen");
        Ok(frozen)
    }

    /// Returns the cached configuration for `source` without building it.
    pub fn get<C: Composite>(&self, source: impl Into<Source>) -> Option<Frozen<C>> {
        let key = (
            TypeId::of::<C>(),
            source.into().key(self.canonicalize_paths),
        );
        lookup::<C>(&self.entries.lock(), &key)
    }

    /// Freezes an already built value under `source`.
    ///
    /// The source is only used as the cache key and is never read, so the
    /// value is not validated and [`Frozen::sections`] is empty for it.
    ///
    /// Fails with [`ConfigError::Immutable`] when a value is already frozen
    /// for that type and source; frozen configurations are never replaced.
    pub fn install<C: Composite>(
        &self,
        source: impl Into<Source>,
        value: C,
    ) -> Result<Frozen<C>, ConfigError> {
        let source = source.into();
        let config = std::any::type_name::<C>();
        let key = (TypeId::of::<C>(), source.key(self.canonicalize_paths));

        let mut entries = self.entries.lock();
        if entries.contains_key(&key) {
            return Err(ConfigError::Immutable {
                config,
                origin: source.to_string(),
            });
        }

        let frozen = Frozen::new(value, source.to_string());
        entries.insert(key, Box::new(frozen.clone()));
        info!(config, origin = %source, "configuration installed");
        Ok(frozen)
    }

    /// Number of frozen configurations held.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("canonicalize_paths", &self.canonicalize_paths)
            .field("entries", &self.len())
            .finish()
    }
}

/// Builder for a [`Registry`].
#[derive(Debug, Clone)]
#[must_use = "builders do nothing until .build() is called"]
pub struct RegistryBuilder {
    canonicalize_paths: bool,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self {
            canonicalize_paths: true,
        }
    }
}

impl RegistryBuilder {
    /// Whether path sources are canonicalized before keying the cache.
    ///
    /// When enabled (the default), `./app.toml` and `app.toml` share one
    /// instance. When disabled, paths are keyed exactly as given.
    pub fn canonicalize_paths(mut self, enabled: bool) -> Self {
        self.canonicalize_paths = enabled;
        self
    }

    pub fn build(self) -> Registry {
        Registry {
            canonicalize_paths: self.canonicalize_paths,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

fn lookup<C: Composite>(entries: &HashMap<CacheKey, Entry>, key: &CacheKey) -> Option<Frozen<C>> {
    entries
        .get(key)
        .and_then(|entry| entry.downcast_ref::<Frozen<C>>())
        .cloned()
}

fn build<C: Composite>(source: &Source) -> Result<Frozen<C>, ConfigError> {
    let doc = source.load()?;
    let composed = compose_with_sections::<C>(&doc)?;
    Ok(Frozen::with_sections(
        composed.value,
        doc.origin().to_string(),
        composed.sections,
    ))
}

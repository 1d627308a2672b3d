//! Plugin discovery and construction.
//!
//! Plugins are Rust types compiled into the host. A plugin directory holds
//! JSON manifests that choose which of them to load and how to configure
//! them:
//!
//! ```json
//! { "kind": "ball_tracker", "name": "Tracker", "enabled": true,
//!   "settings": { "high_ball_height": 350 } }
//! ```
//!
//! # Directory Rules
//!
//! - only `*.json` files directly inside the directory are manifests
//! - files whose name starts with `__` are ignored (use this to park a manifest)
//! - manifests load in file-name order, which fixes the plugin load order
//! - a bad manifest is skipped and reported; it never aborts the load

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::{debug, warn};

use crate::error::{LoadError, PluginError};
use crate::host::panic_message;
use crate::logger::{LogSink, PluginLogger};
use crate::plugin::{Plugin, PluginId, PluginSetup};

/// Manifest file extension.
pub const MANIFEST_EXTENSION: &str = "json";

/// Prefix of files the loader skips.
pub const IGNORED_PREFIX: &str = "__";

// =============================================================================
// Manifest
// =============================================================================

/// Contents of one manifest file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginManifest {
    /// Catalog key of the plugin type
    pub kind: String,
    /// Display name override
    #[serde(default)]
    pub name: Option<String>,
    /// Initial enabled state
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Plugin-specific settings
    #[serde(default)]
    pub settings: Json,
}

fn default_enabled() -> bool {
    true
}

impl PluginManifest {
    /// A manifest for `kind` with defaults everywhere else.
    #[must_use]
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            name: None,
            enabled: true,
            settings: Json::Null,
        }
    }

    /// Reads and parses a manifest file.
    ///
    /// # Errors
    ///
    /// [`LoadError::Io`] if the file cannot be read, [`LoadError::Manifest`]
    /// if it is not a valid manifest.
    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| LoadError::Manifest {
            path: path.to_path_buf(),
            source,
        })
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Builds a plugin from its setup.
pub type PluginFactory =
    Arc<dyn Fn(PluginSetup) -> Result<Arc<dyn Plugin>, PluginError> + Send + Sync>;

/// The plugin kinds a host can instantiate, keyed by manifest `kind`.
///
/// # Example
///
/// ```
/// use sparkline_core::loader::PluginCatalog;
///
/// let catalog = PluginCatalog::with_builtins();
/// assert!(catalog.contains("ball_tracker"));
/// assert!(catalog.contains("input_deadzone"));
/// assert!(!catalog.contains("ExamplePlugin"));
/// ```
#[derive(Clone, Default)]
pub struct PluginCatalog {
    factories: BTreeMap<String, PluginFactory>,
}

impl PluginCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog with every built-in plugin registered.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        crate::plugins::register_builtins(&mut catalog);
        catalog
    }

    /// Registers `factory` under `kind`, replacing any earlier entry.
    pub fn register<F>(&mut self, kind: &str, factory: F) -> &mut Self
    where
        F: Fn(PluginSetup) -> Result<Arc<dyn Plugin>, PluginError> + Send + Sync + 'static,
    {
        self.factories.insert(kind.to_string(), Arc::new(factory));
        self
    }

    /// True if `kind` is registered.
    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Builds a plugin of `kind`, or `None` if the kind is unknown.
    ///
    /// A panicking factory is reported as [`PluginError::Panicked`].
    #[must_use]
    pub fn create(
        &self,
        kind: &str,
        setup: PluginSetup,
    ) -> Option<Result<Arc<dyn Plugin>, PluginError>> {
        let factory = self.factories.get(kind)?;
        Some(
            panic::catch_unwind(AssertUnwindSafe(|| factory(setup))).unwrap_or_else(|payload| {
                Err(PluginError::Panicked(panic_message(payload.as_ref())))
            }),
        )
    }
}

impl fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCatalog")
            .field("kinds", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

// =============================================================================
// Discovery
// =============================================================================

/// Manifest paths found in a plugin directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    /// Manifests to load, in load order
    pub manifests: Vec<PathBuf>,
    /// `__`-prefixed manifests that were skipped
    pub ignored: Vec<PathBuf>,
}

/// Lists the manifests in `dir`.
///
/// # Errors
///
/// Returns [`LoadError::Io`] if the directory cannot be read.
pub fn discover(dir: &Path) -> Result<Discovery, LoadError> {
    let io_err = |source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut found = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let path = entry.path();
        let is_file = path.is_file();
        let is_manifest = path
            .extension()
            .is_some_and(|ext| ext == MANIFEST_EXTENSION);
        if is_file && is_manifest {
            found.push(path);
        }
    }
    found.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let (ignored, manifests): (Vec<_>, Vec<_>) = found.into_iter().partition(|path| {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(IGNORED_PREFIX))
    });
    Ok(Discovery { manifests, ignored })
}

// =============================================================================
// Construction
// =============================================================================

/// A plugin built from a manifest, not yet initialized.
pub struct Constructed {
    /// Registry id (manifest file stem)
    pub id: PluginId,
    /// Manifest the plugin was built from
    pub manifest: PluginManifest,
    /// Manifest path
    pub source: PathBuf,
    /// The instance
    pub plugin: Arc<dyn Plugin>,
    /// The logger handed to the plugin
    pub logger: PluginLogger,
}

impl fmt::Debug for Constructed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructed")
            .field("id", &self.id)
            .field("kind", &self.manifest.kind)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Summary of one load pass.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Plugins constructed, in load order
    pub loaded: Vec<PluginId>,
    /// Manifests that could not be turned into plugins
    pub skipped: Vec<LoadError>,
    /// `__`-prefixed manifests that were not considered
    pub ignored: Vec<PathBuf>,
}

impl LoadReport {
    /// True if every manifest loaded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Discovers and constructs every plugin in `dir`.
///
/// Construction of all plugins completes before this returns; nothing is
/// initialized.
///
/// # Errors
///
/// Only a failure to read `dir` itself is an error. Per-manifest failures go
/// into [`LoadReport::skipped`].
pub fn load_dir(
    dir: &Path,
    catalog: &PluginCatalog,
    sink: Option<&LogSink>,
) -> Result<(Vec<Constructed>, LoadReport), LoadError> {
    let discovery = discover(dir)?;
    let mut report = LoadReport {
        ignored: discovery.ignored,
        ..LoadReport::default()
    };
    for path in &report.ignored {
        debug!(path = %path.display(), "ignoring manifest");
    }

    let mut constructed = Vec::with_capacity(discovery.manifests.len());
    for path in discovery.manifests {
        match construct(&path, catalog, sink) {
            Ok(plugin) => {
                debug!(plugin = %plugin.id, kind = %plugin.manifest.kind, "constructed plugin");
                report.loaded.push(plugin.id.clone());
                constructed.push(plugin);
            }
            Err(e) => {
                warn!(error = %e, "skipping plugin manifest");
                report.skipped.push(e);
            }
        }
    }
    Ok((constructed, report))
}

fn construct(
    path: &Path,
    catalog: &PluginCatalog,
    sink: Option<&LogSink>,
) -> Result<Constructed, LoadError> {
    let manifest = PluginManifest::from_file(path)?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let id = PluginId::from(stem);
    let label = manifest.name.as_deref().unwrap_or(id.as_str()).to_string();
    let logger = PluginLogger::new(id.clone(), &label, sink.cloned());
    let setup = PluginSetup::new(id.clone(), logger.clone()).with_settings(manifest.settings.clone());

    let plugin = catalog
        .create(&manifest.kind, setup)
        .ok_or_else(|| LoadError::UnknownKind {
            path: path.to_path_buf(),
            kind: manifest.kind.clone(),
        })?
        .map_err(|source| LoadError::Factory {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(Constructed {
        id,
        manifest,
        source: path.to_path_buf(),
        plugin,
        logger,
    })
}

//! Error types for plugins, loading and host management.

use std::io;
use std::path::PathBuf;

use sparkline_expr::EvalError;
use thiserror::Error;

use crate::plugin::PluginId;

/// A failure reported by (or caught around) a plugin hook.
///
/// Hook failures are contained by the host: they are logged, counted in the
/// tick outcome, and never stop other plugins.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The hook reported a failure.
    #[error("{0}")]
    Failed(String),
    /// A manifest setting could not be used.
    #[error("invalid setting {key:?}: {reason}")]
    InvalidSettings {
        /// Setting name, or `settings` for the whole object
        key: String,
        /// What was wrong with it
        reason: String,
    },
    /// A condition named a handler the plugin does not provide.
    #[error("no handler named {0:?}")]
    UnknownHandler(String),
    /// A handler condition failed to evaluate.
    #[error("condition failed to evaluate: {0}")]
    Condition(#[from] EvalError),
    /// The hook panicked; carries the panic message.
    #[error("panicked: {0}")]
    Panicked(String),
}

impl PluginError {
    /// Shorthand for [`PluginError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// A manifest that could not be turned into a plugin instance.
///
/// Load errors are per-manifest: the loader skips the manifest, records the
/// error in the [`LoadReport`](crate::loader::LoadReport) and carries on.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The plugin directory or a manifest could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
    /// The manifest is not valid JSON of the expected shape.
    #[error("invalid manifest {}: {source}", path.display())]
    Manifest {
        /// Manifest path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },
    /// The manifest names a kind the catalog does not know.
    #[error("{}: unknown plugin kind {kind:?}", path.display())]
    UnknownKind {
        /// Manifest path
        path: PathBuf,
        /// Requested kind
        kind: String,
    },
    /// The plugin factory refused the manifest.
    #[error("{}: failed to construct plugin: {source}", path.display())]
    Factory {
        /// Manifest path
        path: PathBuf,
        /// Factory error
        #[source]
        source: PluginError,
    },
}

/// Errors from host management calls.
#[derive(Debug, Error)]
pub enum HostError {
    /// No loaded plugin has this id.
    #[error("no plugin with id {0}")]
    UnknownPlugin(PluginId),
    /// The plugin failed to initialize and cannot be enabled.
    #[error("plugin {0} failed to initialize")]
    NotInitialized(PluginId),
    /// The plugin directory could not be scanned.
    #[error(transparent)]
    Scan(#[from] LoadError),
}

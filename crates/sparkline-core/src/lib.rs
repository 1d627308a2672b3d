//! # Sparkline Core
//!
//! Plugin host for game bots: loads plugins from a directory of JSON
//! manifests, drives them every tick, and runs their background tasks.
//!
//! ## Architecture
//!
//! - **Plugins** ([`plugin`]): `Send + Sync` types with optional hooks,
//!   selected by [`Capabilities`]
//! - **Loader** ([`loader`]): manifest discovery and construction through a
//!   [`PluginCatalog`] of compiled-in factories
//! - **Conditions** ([`condition`]): handler guards written in the
//!   `sparkline-expr` language, evaluated in parallel each tick
//! - **Host** ([`host`]): tick dispatch, the controller filter pipeline,
//!   match events, enable/disable and reload
//! - **Supervisor** ([`supervisor`]): one thread per background task with a
//!   wakeable stop signal
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use sparkline_core::{Host, HostConfig, PluginCatalog};
//! use sparkline_core::synthetic::SyntheticMatch;
//!
//! let config = HostConfig::from_file(Path::new("sparkline.json"))?;
//! let mut host = Host::new(config, PluginCatalog::with_builtins());
//! host.load()?;
//!
//! let mut game = SyntheticMatch::new(42, 3);
//! for _ in 0..1200 {
//!     let outcome = host.tick(game.step(), None, &[]);
//!     if let Some(command) = outcome.final_command {
//!         println!("{command}");
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod condition;
pub mod config;
pub mod controller;
pub mod error;
pub mod host;
pub mod loader;
pub mod logger;
pub mod plugin;
pub mod plugins;
pub mod state;
pub mod supervisor;
pub mod synthetic;

pub use config::{ConfigError, HostConfig};
pub use controller::ControllerState;
pub use error::{HostError, LoadError, PluginError};
pub use host::{Hook, Host, PluginFault, PluginInfo, PluginState, TickOutcome};
pub use loader::{LoadReport, PluginCatalog, PluginManifest};
pub use logger::{LogSink, PluginLogger};
pub use plugin::{
    Capabilities, ConditionSpec, GameEvent, HandlerArgs, HandlerParams, MatchEvent, Plugin,
    PluginId, PluginSetup, TickContext,
};
pub use supervisor::{BackgroundContext, StopSignal};

#[cfg(test)]
mod tests;

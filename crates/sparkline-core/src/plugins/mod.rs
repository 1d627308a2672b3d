//! Built-in plugins.
//!
//! - [`BallTracker`] (`ball_tracker`): ball records, possession, goals,
//!   score and winning status, with conditional handlers, input smoothing
//!   and a background reporter
//! - [`InputDeadzone`] (`input_deadzone`): zeroes small analog inputs
//!
//! # Registration
//!
//! [`PluginCatalog::with_builtins`](crate::loader::PluginCatalog::with_builtins)
//! registers every plugin here under its `KIND`.

pub mod ball_tracker;
mod input_deadzone;

pub use ball_tracker::{BallTracker, BallTrackerSettings, MatchStats, WinningStatus};
pub use input_deadzone::InputDeadzone;

use crate::loader::PluginCatalog;

/// Registers the built-in plugin kinds.
pub fn register_builtins(catalog: &mut PluginCatalog) {
    catalog
        .register(BallTracker::KIND, BallTracker::factory)
        .register(InputDeadzone::KIND, InputDeadzone::factory);
}

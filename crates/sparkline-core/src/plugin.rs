//! The plugin contract.
//!
//! A plugin is any `Send + Sync` type implementing [`Plugin`]. Every hook has
//! a default no-op implementation; a plugin advertises which optional hooks it
//! actually uses through [`Capabilities`] so the host can skip the rest.
//!
//! # Hooks
//!
//! - [`initialize`](Plugin::initialize) / [`shutdown`](Plugin::shutdown):
//!   lifecycle, called once per load generation
//! - [`game_tick`](Plugin::game_tick): per-tick, may contribute a command
//! - [`conditions`](Plugin::conditions) + [`handle_condition`](Plugin::handle_condition):
//!   handlers gated by expressions over the tick context
//! - [`controller_filter`](Plugin::controller_filter): sees every command
//! - [`on_match_started`](Plugin::on_match_started) /
//!   [`on_match_destroyed`](Plugin::on_match_destroyed): match events
//! - [`run_background`](Plugin::run_background): long-lived task on its own thread
//!
//! Hooks take `&self`; plugins keep mutable state behind `Mutex`, atomics or
//! similar. The host shares each instance with its background thread.
//!
//! # Example
//!
//! ```
//! use std::borrow::Cow;
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use sparkline_core::plugin::{Capabilities, Plugin, TickContext};
//! use sparkline_core::{ControllerState, PluginError};
//!
//! struct AlwaysForward {
//!     ticks: AtomicU64,
//! }
//!
//! impl Plugin for AlwaysForward {
//!     fn name(&self) -> Cow<'_, str> {
//!         Cow::Borrowed("Always Forward")
//!     }
//!
//!     fn capabilities(&self) -> Capabilities {
//!         Capabilities::TICK
//!     }
//!
//!     fn game_tick(&self, _ctx: &TickContext<'_>) -> Result<Option<ControllerState>, PluginError> {
//!         self.ticks.fetch_add(1, Ordering::Relaxed);
//!         Ok(Some(ControllerState { throttle: 1.0, ..ControllerState::default() }))
//!     }
//! }
//! ```

use std::borrow::Cow;
use std::fmt;

use bitflags::bitflags;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::controller::ControllerState;
use crate::error::PluginError;
use crate::logger::PluginLogger;
use crate::state::{FieldInfo, GameTickPacket};
use crate::supervisor::BackgroundContext;

// =============================================================================
// Plugin Identification
// =============================================================================

/// Identifier of a loaded plugin instance.
///
/// The loader uses the manifest's file stem, so `plugins/ball.json` loads as
/// `ball`. Ids are unique within one plugin directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PluginId(String);

impl PluginId {
    /// Creates a new `PluginId` from a string.
    #[must_use]
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    /// Returns the plugin ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PluginId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PluginId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// =============================================================================
// Capabilities
// =============================================================================

bitflags! {
    /// Optional hooks a plugin implements.
    ///
    /// Lifecycle and match-event hooks are always called; these flags gate
    /// the rest.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Capabilities: u8 {
        /// [`Plugin::game_tick`] is called every tick
        const TICK = 1;
        /// [`Plugin::controller_filter`] sees every command
        const FILTER = 1 << 1;
        /// [`Plugin::run_background`] is started on its own thread
        const BACKGROUND = 1 << 2;
        /// [`Plugin::conditions`] is read at load time
        const CONDITIONS = 1 << 3;
    }
}

bitflags! {
    /// The tick-context values a conditional handler wants to receive.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct HandlerParams: u8 {
        /// The game-state snapshot
        const PACKET = 1;
        /// Index of the local player's car
        const LOCAL_PLAYER_INDEX = 1 << 1;
        /// Name of the local player
        const PLAYERNAME = 1 << 2;
        /// Session field info
        const FIELD_INFO = 1 << 3;
        /// Host process id
        const PID = 1 << 4;
    }
}

// =============================================================================
// Tick Context
// =============================================================================

/// Everything a plugin sees on one tick.
#[derive(Debug, Clone, Copy)]
pub struct TickContext<'a> {
    /// The game-state snapshot
    pub packet: &'a GameTickPacket,
    /// Index of the local player's car in `packet.game_cars`
    pub local_player_index: usize,
    /// Name of the local player
    pub player_name: &'a str,
    /// Field info, when the session provides it
    pub field_info: Option<&'a FieldInfo>,
    /// Host tick counter, starting at 0
    pub tick: u64,
    /// Host process id
    pub pid: u32,
}

/// Arguments passed to a conditional handler.
///
/// Only the fields requested through the handler's [`HandlerParams`] are
/// populated; the rest are `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HandlerArgs<'a> {
    /// The snapshot, if requested
    pub packet: Option<&'a GameTickPacket>,
    /// Local player index, if requested
    pub local_player_index: Option<usize>,
    /// Local player name, if requested
    pub playername: Option<&'a str>,
    /// Field info, if requested and available
    pub field_info: Option<&'a FieldInfo>,
    /// Process id, if requested
    pub pid: Option<u32>,
}

impl<'a> HandlerArgs<'a> {
    /// Picks the requested values out of a tick context.
    #[must_use]
    pub fn select(ctx: &TickContext<'a>, params: HandlerParams) -> Self {
        Self {
            packet: params.contains(HandlerParams::PACKET).then_some(ctx.packet),
            local_player_index: params
                .contains(HandlerParams::LOCAL_PLAYER_INDEX)
                .then_some(ctx.local_player_index),
            playername: params
                .contains(HandlerParams::PLAYERNAME)
                .then_some(ctx.player_name),
            field_info: if params.contains(HandlerParams::FIELD_INFO) {
                ctx.field_info
            } else {
                None
            },
            pid: params.contains(HandlerParams::PID).then_some(ctx.pid),
        }
    }

    /// The snapshot, or an error naming the handler that forgot to request it.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Failed`] when the packet was not requested.
    pub fn require_packet(&self, handler: &str) -> Result<&'a GameTickPacket, PluginError> {
        self.packet
            .ok_or_else(|| PluginError::failed(format!("{handler} did not request the packet")))
    }
}

// =============================================================================
// Conditions
// =============================================================================

/// Declares a handler that runs whenever `expression` is truthy.
///
/// The expression may read `packet`, `local_player_index`, `playername`,
/// `field_info` and `pid`, and call the builtins `abs`, `min`, `max`, `len`,
/// `round`, `int`, `float`, `bool`, `sum` and `sqrt`.
///
/// # Example
///
/// ```
/// use sparkline_core::plugin::{ConditionSpec, HandlerParams};
///
/// let spec = ConditionSpec::new(
///     "on_high_ball",
///     "packet.game_ball.physics.location.z > 300",
///     HandlerParams::PACKET,
/// );
/// assert_eq!(spec.handler, "on_high_ball");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionSpec {
    /// Name passed back to [`Plugin::handle_condition`]
    pub handler: Cow<'static, str>,
    /// Condition source
    pub expression: Cow<'static, str>,
    /// Context values the handler receives
    pub params: HandlerParams,
}

impl ConditionSpec {
    /// Creates a condition spec.
    pub fn new(
        handler: impl Into<Cow<'static, str>>,
        expression: impl Into<Cow<'static, str>>,
        params: HandlerParams,
    ) -> Self {
        Self {
            handler: handler.into(),
            expression: expression.into(),
            params,
        }
    }
}

// =============================================================================
// Match Events
// =============================================================================

/// Details of a match lifecycle event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchEvent {
    /// Host-assigned match number
    pub match_id: u64,
    /// Game clock when the event fired
    pub seconds_elapsed: f32,
}

/// Events delivered through [`Host::dispatch_event`](crate::Host::dispatch_event).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    /// A new match began
    MatchStarted(MatchEvent),
    /// The current match was torn down
    MatchDestroyed(MatchEvent),
}

// =============================================================================
// Plugin Setup
// =============================================================================

/// What a plugin factory receives.
#[derive(Debug, Clone)]
pub struct PluginSetup {
    /// Id the plugin will be registered under
    pub id: PluginId,
    /// Logging handle for the plugin's lifetime
    pub logger: PluginLogger,
    /// The manifest's `settings` object (`null` when absent)
    pub settings: Json,
}

impl PluginSetup {
    /// Creates a setup with no settings.
    #[must_use]
    pub fn new(id: PluginId, logger: PluginLogger) -> Self {
        Self {
            id,
            logger,
            settings: Json::Null,
        }
    }

    /// Replaces the settings object.
    #[must_use]
    pub fn with_settings(mut self, settings: Json) -> Self {
        self.settings = settings;
        self
    }

    /// Deserializes the settings into `T`.
    ///
    /// Missing settings deserialize from an empty object, so a `T` with
    /// `#[serde(default)]` gets its defaults.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::InvalidSettings`] when the object does not match `T`.
    pub fn parse_settings<T: DeserializeOwned>(&self) -> Result<T, PluginError> {
        let value = if self.settings.is_null() {
            Json::Object(serde_json::Map::new())
        } else {
            self.settings.clone()
        };
        serde_json::from_value(value).map_err(|e| PluginError::InvalidSettings {
            key: "settings".to_string(),
            reason: e.to_string(),
        })
    }
}

// =============================================================================
// Plugin Trait
// =============================================================================

/// A host-loaded extension.
///
/// # Thread Safety
///
/// Plugins must be `Send + Sync`: the host calls hooks from its tick thread
/// while [`run_background`](Self::run_background) runs on another.
///
/// # Failure
///
/// Every hook returns `Result`. Errors and panics are caught by the host,
/// logged, and contained to this plugin. A plugin whose `initialize` fails is
/// left loaded but disabled.
pub trait Plugin: Send + Sync {
    /// Display name. May be computed from state.
    fn name(&self) -> Cow<'_, str>;

    /// Optional hooks this plugin implements.
    fn capabilities(&self) -> Capabilities;

    /// Called once after every plugin of a load generation is constructed.
    ///
    /// # Errors
    ///
    /// A failure disables the plugin.
    fn initialize(&self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called before the plugin is unloaded (reload or host exit).
    ///
    /// # Errors
    ///
    /// Failures are logged; the plugin is unloaded regardless.
    fn shutdown(&self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Per-tick hook. `Ok(None)` means no contribution this tick.
    ///
    /// # Errors
    ///
    /// A failure is logged and counted as no contribution.
    fn game_tick(&self, ctx: &TickContext<'_>) -> Result<Option<ControllerState>, PluginError> {
        let _ = ctx;
        Ok(None)
    }

    /// Conditional handlers, read once at load time.
    fn conditions(&self) -> Vec<ConditionSpec> {
        Vec::new()
    }

    /// Runs the handler named `handler` after its condition held.
    ///
    /// # Errors
    ///
    /// The default returns [`PluginError::UnknownHandler`].
    fn handle_condition(&self, handler: &str, args: &HandlerArgs<'_>) -> Result<(), PluginError> {
        let _ = args;
        Err(PluginError::UnknownHandler(handler.to_string()))
    }

    /// Sees every command of the tick.
    ///
    /// Mutate `command` in place and return `Ok(None)`, or return
    /// `Ok(Some(replacement))`; both have the same effect.
    ///
    /// # Errors
    ///
    /// A failure leaves the command as it was before this filter ran.
    fn controller_filter(
        &self,
        command: &mut ControllerState,
    ) -> Result<Option<ControllerState>, PluginError> {
        let _ = command;
        Ok(None)
    }

    /// A new match began.
    ///
    /// # Errors
    ///
    /// Failures are logged.
    fn on_match_started(&self, event: &MatchEvent) -> Result<(), PluginError> {
        let _ = event;
        Ok(())
    }

    /// The current match was torn down.
    ///
    /// # Errors
    ///
    /// Failures are logged.
    fn on_match_destroyed(&self, event: &MatchEvent) -> Result<(), PluginError> {
        let _ = event;
        Ok(())
    }

    /// Long-lived background task, started after initialization.
    ///
    /// Return once [`BackgroundContext::is_stopped`] is true; use
    /// [`BackgroundContext::sleep`] for waits so shutdown is observed
    /// immediately.
    ///
    /// # Errors
    ///
    /// Failures are logged; the task is not restarted.
    fn run_background(&self, ctx: &BackgroundContext) -> Result<(), PluginError> {
        let _ = ctx;
        Ok(())
    }
}

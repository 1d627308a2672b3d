//! The plugin host.
//!
//! [`Host`] owns one load generation of plugins and drives them:
//!
//! 1. **LOAD**: scan the plugin directory, construct every plugin, compile
//!    their conditions, initialize every plugin, start background tasks
//! 2. **TICK**: for each snapshot
//!    - collect commands: external commands first, then each enabled
//!      plugin's `game_tick` contribution in load order
//!    - evaluate every enabled plugin's conditions in parallel, then invoke
//!      the handlers whose condition held, sequentially in load order
//!    - pass every command through every enabled filter in load order
//! 3. **TEARDOWN**: raise stop signals, call `shutdown` on every plugin,
//!    join background threads within the grace period
//!
//! A reload is a teardown followed by a load; no plugin of the new
//! generation is constructed before every plugin of the old one has shut
//! down.
//!
//! # Fault Containment
//!
//! Every hook call is wrapped: errors and panics are logged, recorded in the
//! tick's [`TickOutcome::faults`], and affect only the plugin that raised
//! them.
//!
//! # Example
//!
//! ```no_run
//! use sparkline_core::{Host, HostConfig, PluginCatalog};
//! use sparkline_core::state::GameTickPacket;
//!
//! let mut host = Host::new(HostConfig::with_plugin_dir("plugins"), PluginCatalog::with_builtins());
//! host.load()?;
//!
//! let packet = GameTickPacket::default();
//! let outcome = host.tick(&packet, None, &[]);
//! println!("{:?}", outcome.final_command);
//!
//! host.shutdown();
//! # Ok::<(), sparkline_core::HostError>(())
//! ```

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::condition::{CompiledCondition, ConditionInputs};
use crate::config::HostConfig;
use crate::controller::ControllerState;
use crate::error::{HostError, PluginError};
use crate::loader::{self, Constructed, LoadReport, PluginCatalog};
use crate::logger::{LogSink, PluginLogger};
use crate::plugin::{Capabilities, GameEvent, HandlerArgs, Plugin, PluginId, TickContext};
use crate::state::{FieldInfo, GameTickPacket};
use crate::supervisor::{BackgroundContext, StopReport, StopSignal, Supervisor};

// =============================================================================
// Hooks and Faults
// =============================================================================

/// The plugin hook a fault came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Hook {
    /// [`Plugin::initialize`]
    Initialize,
    /// [`Plugin::shutdown`]
    Shutdown,
    /// [`Plugin::conditions`]
    Conditions,
    /// [`Plugin::game_tick`]
    GameTick,
    /// Evaluating a handler condition
    Condition,
    /// [`Plugin::handle_condition`]
    Handler,
    /// [`Plugin::controller_filter`]
    Filter,
    /// [`Plugin::on_match_started`]
    MatchStarted,
    /// [`Plugin::on_match_destroyed`]
    MatchDestroyed,
}

impl Hook {
    const fn bit(self) -> u16 {
        1 << self as u16
    }

    /// Hook name as used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Shutdown => "shutdown",
            Self::Conditions => "conditions",
            Self::GameTick => "game_tick",
            Self::Condition => "condition",
            Self::Handler => "handler",
            Self::Filter => "controller_filter",
            Self::MatchStarted => "on_match_started",
            Self::MatchDestroyed => "on_match_destroyed",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contained plugin failure.
#[derive(Debug)]
pub struct PluginFault {
    /// Plugin that failed
    pub plugin: PluginId,
    /// Hook that failed
    pub hook: Hook,
    /// What went wrong
    pub error: PluginError,
}

/// Result of one [`Host::tick`].
#[derive(Debug, Default)]
pub struct TickOutcome {
    /// Tick number, starting at 0
    pub tick: u64,
    /// Every command after filtering: external commands first, then plugin
    /// contributions in load order
    pub commands: Vec<ControllerState>,
    /// The last filtered command, clamped to valid ranges
    pub final_command: Option<ControllerState>,
    /// Number of conditional handlers that ran successfully
    pub handlers_fired: usize,
    /// Failures contained during this tick
    pub faults: Vec<PluginFault>,
}

// =============================================================================
// Plugin Records
// =============================================================================

/// Lifecycle state of a loaded plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginState {
    /// Built, `initialize` not yet called
    Constructed,
    /// `initialize` succeeded
    Initialized,
    /// `initialize` failed; the plugin was disabled
    Failed,
    /// `shutdown` has been called
    ShutDown,
}

/// Snapshot of a loaded plugin for management surfaces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginInfo {
    /// Registry id
    pub id: PluginId,
    /// Display name (manifest override or the plugin's own name)
    pub name: String,
    /// Catalog kind
    pub kind: String,
    /// Enabled flag
    pub enabled: bool,
    /// Lifecycle state
    pub state: PluginState,
    /// Advertised hooks
    pub capabilities: Capabilities,
    /// Number of compiled conditions
    pub conditions: usize,
    /// Manifest path
    pub source: PathBuf,
}

struct LoadedPlugin {
    id: PluginId,
    kind: String,
    name_override: Option<String>,
    plugin: Arc<dyn Plugin>,
    capabilities: Capabilities,
    enabled: Arc<AtomicBool>,
    state: PluginState,
    conditions: Vec<CompiledCondition>,
    logger: PluginLogger,
    stop: StopSignal,
    source: PathBuf,
    failing: AtomicU16,
}

impl LoadedPlugin {
    fn from_constructed(c: Constructed) -> Self {
        let capabilities = c.plugin.capabilities();
        Self {
            id: c.id,
            kind: c.manifest.kind,
            name_override: c.manifest.name,
            plugin: c.plugin,
            capabilities,
            enabled: Arc::new(AtomicBool::new(c.manifest.enabled)),
            state: PluginState::Constructed,
            conditions: Vec::new(),
            logger: c.logger,
            stop: StopSignal::new(),
            source: c.source,
            failing: AtomicU16::new(0),
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn uses(&self, capability: Capabilities) -> bool {
        self.is_enabled() && self.capabilities.contains(capability)
    }

    fn display_name(&self) -> String {
        match &self.name_override {
            Some(name) => name.clone(),
            None => guarded(|| Ok(self.plugin.name().into_owned()))
                .unwrap_or_else(|_| self.id.to_string()),
        }
    }

    fn info(&self) -> PluginInfo {
        PluginInfo {
            id: self.id.clone(),
            name: self.display_name(),
            kind: self.kind.clone(),
            enabled: self.is_enabled(),
            state: self.state,
            capabilities: self.capabilities,
            conditions: self.conditions.len(),
            source: self.source.clone(),
        }
    }

    /// Runs `f` with panic isolation, logging and recording a failure.
    fn call<T>(
        &self,
        hook: Hook,
        faults: &mut Vec<PluginFault>,
        f: impl FnOnce() -> Result<T, PluginError>,
    ) -> Option<T> {
        match guarded(f) {
            Ok(value) => {
                self.failing.fetch_and(!hook.bit(), Ordering::AcqRel);
                Some(value)
            }
            Err(error) => {
                faults.push(self.fault(hook, error));
                None
            }
        }
    }

    /// Logs a failure: at `WARN` when it starts a streak for this hook, at
    /// `TRACE` while the streak continues.
    fn fault(&self, hook: Hook, error: PluginError) -> PluginFault {
        let previous = self.failing.fetch_or(hook.bit(), Ordering::AcqRel);
        if previous & hook.bit() == 0 {
            warn!(plugin = %self.id, %hook, %error, "plugin hook failed");
            self.logger.warn(format!("{hook} failed: {error}"));
        } else {
            trace!(plugin = %self.id, %hook, %error, "plugin hook still failing");
        }
        PluginFault {
            plugin: self.id.clone(),
            hook,
            error,
        }
    }
}

/// Runs a hook, converting a panic into [`PluginError::Panicked`].
pub(crate) fn guarded<T>(f: impl FnOnce() -> Result<T, PluginError>) -> Result<T, PluginError> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(PluginError::Panicked(panic_message(payload.as_ref()))))
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

// =============================================================================
// Host
// =============================================================================

/// Loads plugins and dispatches ticks, events and commands to them.
///
/// Dropping the host shuts it down.
pub struct Host {
    config: HostConfig,
    catalog: PluginCatalog,
    sink: Option<LogSink>,
    plugins: Vec<LoadedPlugin>,
    supervisor: Supervisor,
    report: LoadReport,
    next_tick: u64,
    pid: u32,
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("plugin_dir", &self.config.plugin_dir)
            .field("plugins", &self.plugins.iter().map(|p| &p.id).collect::<Vec<_>>())
            .field("background_tasks", &self.supervisor.len())
            .field("next_tick", &self.next_tick)
            .finish_non_exhaustive()
    }
}

impl Host {
    /// Creates a host with no plugins loaded.
    #[must_use]
    pub fn new(config: HostConfig, catalog: PluginCatalog) -> Self {
        Self {
            config,
            catalog,
            sink: None,
            plugins: Vec::new(),
            supervisor: Supervisor::new(),
            report: LoadReport::default(),
            next_tick: 0,
            pid: std::process::id(),
        }
    }

    /// Routes every plugin log line to `sink` as well as `tracing`.
    ///
    /// Applies to plugins constructed after this call.
    #[must_use]
    pub fn with_log_sink(mut self, sink: LogSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// The host configuration.
    #[must_use]
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Changes the local player reported to plugins from the next tick on.
    pub fn set_local_player(&mut self, index: usize, name: &str) {
        self.config.local_player_index = index;
        self.config.player_name = name.to_string();
    }

    /// The report of the most recent load.
    #[must_use]
    pub fn last_report(&self) -> &LoadReport {
        &self.report
    }

    /// Number of ticks dispatched so far.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.next_tick
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Loads every plugin in the configured directory.
    ///
    /// Any currently loaded generation is torn down first, so this doubles as
    /// [`reload`](Self::reload).
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Scan`] if the plugin directory cannot be read; the
    /// host is then left with no plugins. Individual bad manifests are not
    /// errors; see [`LoadReport::skipped`].
    pub fn load(&mut self) -> Result<&LoadReport, HostError> {
        self.teardown();
        self.report = LoadReport::default();

        let (constructed, report) =
            loader::load_dir(&self.config.plugin_dir, &self.catalog, self.sink.as_ref())?;
        self.report = report;
        self.plugins = constructed.into_iter().map(LoadedPlugin::from_constructed).collect();

        for plugin in &mut self.plugins {
            compile_conditions(plugin);
        }
        for plugin in &mut self.plugins {
            initialize(plugin);
        }
        self.start_background();

        info!(
            dir = %self.config.plugin_dir.display(),
            loaded = self.plugins.len(),
            skipped = self.report.skipped.len(),
            ignored = self.report.ignored.len(),
            background = self.supervisor.len(),
            "plugins loaded"
        );
        Ok(&self.report)
    }

    /// Shuts every plugin down, rescans the directory and loads it again.
    ///
    /// # Errors
    ///
    /// As [`load`](Self::load).
    pub fn reload(&mut self) -> Result<&LoadReport, HostError> {
        info!(plugins = self.plugins.len(), "reloading plugins");
        self.load()
    }

    /// Shuts every plugin down and unloads it. Calling it again is a no-op.
    pub fn shutdown(&mut self) {
        if self.plugins.is_empty() && self.supervisor.is_empty() {
            return;
        }
        let report = self.teardown();
        info!(
            joined = report.joined.len(),
            detached = report.detached.len(),
            "host shut down"
        );
    }

    fn start_background(&mut self) {
        for plugin in &self.plugins {
            if plugin.state != PluginState::Initialized
                || !plugin.capabilities.contains(Capabilities::BACKGROUND)
            {
                continue;
            }
            let ctx = BackgroundContext::new(
                plugin.id.clone(),
                plugin.stop.clone(),
                Arc::clone(&plugin.enabled),
                plugin.logger.clone(),
            );
            if let Err(e) = self.supervisor.start(Arc::clone(&plugin.plugin), ctx) {
                warn!(plugin = %plugin.id, error = %e, "failed to spawn background task");
            }
        }
    }

    fn teardown(&mut self) -> StopReport {
        for plugin in &self.plugins {
            plugin.stop.raise();
        }
        self.supervisor.raise_all();

        let mut faults = Vec::new();
        for plugin in &mut self.plugins {
            plugin.call(Hook::Shutdown, &mut faults, || plugin.plugin.shutdown());
            plugin.state = PluginState::ShutDown;
            debug!(plugin = %plugin.id, "plugin shut down");
        }

        let report = self.supervisor.stop_all(self.config.shutdown_grace());
        self.plugins.clear();
        report
    }

    // -------------------------------------------------------------------------
    // Management
    // -------------------------------------------------------------------------

    /// Every loaded plugin in load order.
    #[must_use]
    pub fn plugins(&self) -> Vec<PluginInfo> {
        self.plugins.iter().map(LoadedPlugin::info).collect()
    }

    /// One plugin by id.
    #[must_use]
    pub fn plugin(&self, id: &PluginId) -> Option<PluginInfo> {
        self.find(id).map(LoadedPlugin::info)
    }

    /// Enables or disables a plugin without unloading it.
    ///
    /// A disabled plugin receives no ticks, handlers, filter calls or events.
    /// Its background task keeps running.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::UnknownPlugin`] if no plugin has this id, and
    /// [`HostError::NotInitialized`] when enabling a plugin whose
    /// `initialize` failed.
    pub fn set_enabled(&self, id: &PluginId, enabled: bool) -> Result<(), HostError> {
        let plugin = self
            .find(id)
            .ok_or_else(|| HostError::UnknownPlugin(id.clone()))?;
        if enabled && plugin.state == PluginState::Failed {
            return Err(HostError::NotInitialized(id.clone()));
        }
        let was = plugin.enabled.swap(enabled, Ordering::AcqRel);
        if was != enabled {
            info!(plugin = %id, enabled, "plugin toggled");
        }
        Ok(())
    }

    fn find(&self, id: &PluginId) -> Option<&LoadedPlugin> {
        self.plugins.iter().find(|p| &p.id == id)
    }

    // -------------------------------------------------------------------------
    // Dispatch
    // -------------------------------------------------------------------------

    /// Dispatches one tick.
    ///
    /// `external` commands (for example the bot's own output) go through the
    /// filter pipeline ahead of plugin contributions.
    pub fn tick(
        &mut self,
        packet: &GameTickPacket,
        field_info: Option<&FieldInfo>,
        external: &[ControllerState],
    ) -> TickOutcome {
        let tick = self.next_tick;
        self.next_tick += 1;

        let ctx = TickContext {
            packet,
            local_player_index: self.config.local_player_index,
            player_name: &self.config.player_name,
            field_info,
            tick,
            pid: self.pid,
        };

        let mut faults = Vec::new();
        let mut commands = external.to_vec();
        for plugin in self.plugins.iter().filter(|p| p.uses(Capabilities::TICK)) {
            if let Some(Some(command)) =
                plugin.call(Hook::GameTick, &mut faults, || plugin.plugin.game_tick(&ctx))
            {
                commands.push(command);
            }
        }

        let handlers_fired = self.run_conditions(&ctx, &mut faults);

        let filters: Vec<&LoadedPlugin> = self
            .plugins
            .iter()
            .filter(|p| p.uses(Capabilities::FILTER))
            .collect();
        for command in &mut commands {
            apply_filters(&filters, command, &mut faults);
        }

        let final_command = commands.last().map(|c| c.clamped());
        trace!(
            tick,
            commands = commands.len(),
            handlers_fired,
            faults = faults.len(),
            "tick dispatched"
        );
        TickOutcome {
            tick,
            commands,
            final_command,
            handlers_fired,
            faults,
        }
    }

    /// Evaluates every enabled plugin's conditions and runs the handlers
    /// whose condition held. Returns the number of handlers that succeeded.
    fn run_conditions(&self, ctx: &TickContext<'_>, faults: &mut Vec<PluginFault>) -> usize {
        let jobs: Vec<(&LoadedPlugin, &CompiledCondition)> = self
            .plugins
            .iter()
            .filter(|p| p.uses(Capabilities::CONDITIONS))
            .flat_map(|p| p.conditions.iter().map(move |c| (p, c)))
            .collect();
        if jobs.is_empty() {
            return 0;
        }

        let inputs = ConditionInputs::from_context(ctx);
        let scope = inputs.scope(ctx);
        let results: Vec<_> = jobs
            .par_iter()
            .map(|(_, condition)| condition.evaluate(&scope))
            .collect();

        let mut fired = 0;
        for ((plugin, condition), result) in jobs.into_iter().zip(results) {
            match result {
                Ok(true) => {
                    condition.report_success();
                    let args = HandlerArgs::select(ctx, condition.params());
                    let handled = plugin.call(Hook::Handler, faults, || {
                        plugin.plugin.handle_condition(condition.handler(), &args)
                    });
                    if handled.is_some() {
                        fired += 1;
                    }
                }
                Ok(false) => condition.report_success(),
                Err(error) => {
                    condition.report_failure(&plugin.id, &error);
                    faults.push(PluginFault {
                        plugin: plugin.id.clone(),
                        hook: Hook::Condition,
                        error: error.into(),
                    });
                }
            }
        }
        fired
    }

    /// Delivers a match event to every enabled plugin in load order.
    ///
    /// Returns the failures, which are also logged.
    pub fn dispatch_event(&self, event: &GameEvent) -> Vec<PluginFault> {
        let mut faults = Vec::new();
        for plugin in self.plugins.iter().filter(|p| p.is_enabled()) {
            match event {
                GameEvent::MatchStarted(e) => {
                    plugin.call(Hook::MatchStarted, &mut faults, || plugin.plugin.on_match_started(e));
                }
                GameEvent::MatchDestroyed(e) => {
                    plugin.call(Hook::MatchDestroyed, &mut faults, || {
                        plugin.plugin.on_match_destroyed(e)
                    });
                }
            }
        }
        debug!(?event, faults = faults.len(), "event dispatched");
        faults
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn compile_conditions(plugin: &mut LoadedPlugin) {
    if !plugin.capabilities.contains(Capabilities::CONDITIONS) {
        return;
    }
    let mut faults = Vec::new();
    let Some(specs) = plugin.call(Hook::Conditions, &mut faults, || Ok(plugin.plugin.conditions()))
    else {
        return;
    };
    for spec in specs {
        match CompiledCondition::compile(&spec) {
            Ok(condition) => plugin.conditions.push(condition),
            Err(error) => {
                warn!(
                    plugin = %plugin.id,
                    handler = %spec.handler,
                    condition = %spec.expression,
                    %error,
                    "dropping condition that failed to compile"
                );
                plugin
                    .logger
                    .warn(format!("condition for {} dropped: {error}", spec.handler));
            }
        }
    }
}

fn initialize(plugin: &mut LoadedPlugin) {
    let mut faults = Vec::new();
    if plugin
        .call(Hook::Initialize, &mut faults, || plugin.plugin.initialize())
        .is_some()
    {
        plugin.state = PluginState::Initialized;
        debug!(plugin = %plugin.id, "plugin initialized");
    } else {
        plugin.state = PluginState::Failed;
        plugin.enabled.store(false, Ordering::Release);
        warn!(plugin = %plugin.id, "plugin disabled after failed initialize");
    }
}

/// Runs `command` through every filter in order. A failing filter leaves the
/// command as it was before that filter.
fn apply_filters(
    filters: &[&LoadedPlugin],
    command: &mut ControllerState,
    faults: &mut Vec<PluginFault>,
) {
    for plugin in filters {
        let mut working = *command;
        match plugin.call(Hook::Filter, faults, || plugin.plugin.controller_filter(&mut working)) {
            Some(Some(replacement)) => *command = replacement,
            Some(None) => *command = working,
            None => {}
        }
    }
}

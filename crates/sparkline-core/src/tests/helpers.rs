//! Test helpers: scratch plugin directories, a scriptable recording plugin
//! and snapshot builders.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::{json, Value as Json};

use crate::config::HostConfig;
use crate::controller::ControllerState;
use crate::error::PluginError;
use crate::host::Host;
use crate::loader::PluginCatalog;
use crate::plugin::{
    Capabilities, ConditionSpec, HandlerArgs, HandlerParams, MatchEvent, Plugin, PluginId,
    TickContext,
};
use crate::state::{GameTickPacket, PlayerInfo, Vector3};
use crate::supervisor::BackgroundContext;

// =============================================================================
// Scratch Directories
// =============================================================================

static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

/// A fresh directory under the system temp dir, removed on drop.
#[derive(Debug)]
pub struct TempPluginDir {
    path: PathBuf,
}

impl TempPluginDir {
    /// Creates an empty directory unique to this process and call.
    pub fn new() -> Self {
        let n = NEXT_DIR.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!("sparkline-test-{}-{n}", std::process::id()));
        let _ = fs::remove_dir_all(&path);
        fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    /// The directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `contents` to `name` inside the directory.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    /// Writes a manifest as `<stem>.json`.
    pub fn manifest(&self, stem: &str, manifest: &Json) -> PathBuf {
        self.write(&format!("{stem}.json"), &manifest.to_string())
    }

    /// Writes a `recorder` manifest as `<stem>.json`.
    pub fn recorder(&self, stem: &str, settings: Json) -> PathBuf {
        self.manifest(stem, &json!({"kind": "recorder", "settings": settings}))
    }

    /// Creates a subdirectory.
    pub fn mkdir(&self, name: &str) {
        fs::create_dir_all(self.path.join(name)).unwrap();
    }

    /// Deletes a file inside the directory.
    pub fn remove(&self, name: &str) {
        fs::remove_file(self.path.join(name)).unwrap();
    }
}

impl Drop for TempPluginDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

// =============================================================================
// Journal
// =============================================================================

/// Shared, ordered record of hook calls as `"<plugin>:<event>"`.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    /// Appends an entry.
    pub fn record(&self, entry: String) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(entry);
    }

    /// Every entry so far.
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of entries equal to `entry`.
    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }

    /// True if any entry equals `entry`.
    pub fn contains(&self, entry: &str) -> bool {
        self.count(entry) > 0
    }

    /// Entries ending with `:<event>`, in order.
    pub fn events(&self, event: &str) -> Vec<String> {
        let suffix = format!(":{event}");
        self.entries()
            .into_iter()
            .filter(|e| e.ends_with(&suffix))
            .collect()
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Polls until `entry` is recorded or `timeout` elapses.
    pub fn wait_for(&self, entry: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.contains(entry) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        self.contains(entry)
    }
}

// =============================================================================
// Recording Plugin
// =============================================================================

/// What the recorder's filter does to `steer`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum SteerOp {
    /// `steer += v`, in place
    Add(f32),
    /// `steer *= v`, in place
    Scale(f32),
    /// Returns a replacement with `steer = v`
    Replace(f32),
}

/// A condition declared through recorder settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RecorderCondition {
    /// Handler name
    pub handler: String,
    /// Condition source
    pub expression: String,
    /// Requested parameter names
    #[serde(default)]
    pub params: Vec<String>,
}

/// Manifest settings of the `recorder` kind.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecorderSettings {
    /// `game_tick` contributes a command with this throttle
    pub contribute: Option<f32>,
    /// Filter behavior
    pub steer: Option<SteerOp>,
    /// Hooks that return an error
    pub fail: Vec<String>,
    /// Hooks that panic
    pub panic: Vec<String>,
    /// Declared conditions
    pub conditions: Vec<RecorderCondition>,
    /// Run a background task
    pub background: bool,
}

/// A plugin that journals every hook call and misbehaves on request.
pub struct Recorder {
    id: PluginId,
    settings: RecorderSettings,
    journal: Journal,
}

impl Recorder {
    fn enter(&self, hook: &str, detail: &str) -> Result<(), PluginError> {
        self.journal.record(format!("{}:{hook}{detail}", self.id));
        if self.settings.panic.iter().any(|h| h == hook) {
            panic!("{} panicked in {hook}", self.id);
        }
        if self.settings.fail.iter().any(|h| h == hook) {
            return Err(PluginError::failed(format!("{hook} failed on purpose")));
        }
        Ok(())
    }
}

fn parse_params(names: &[String]) -> Result<HandlerParams, PluginError> {
    names.iter().try_fold(HandlerParams::empty(), |acc, name| {
        let flag = match name.as_str() {
            "packet" => HandlerParams::PACKET,
            "local_player_index" => HandlerParams::LOCAL_PLAYER_INDEX,
            "playername" => HandlerParams::PLAYERNAME,
            "field_info" => HandlerParams::FIELD_INFO,
            "pid" => HandlerParams::PID,
            other => {
                return Err(PluginError::InvalidSettings {
                    key: "params".to_string(),
                    reason: format!("unknown parameter {other}"),
                })
            }
        };
        Ok(acc | flag)
    })
}

fn present_args(args: &HandlerArgs<'_>) -> String {
    let mut present = Vec::new();
    if args.packet.is_some() {
        present.push("packet");
    }
    if args.local_player_index.is_some() {
        present.push("local_player_index");
    }
    if args.playername.is_some() {
        present.push("playername");
    }
    if args.field_info.is_some() {
        present.push("field_info");
    }
    if args.pid.is_some() {
        present.push("pid");
    }
    present.join(",")
}

impl Plugin for Recorder {
    fn name(&self) -> Cow<'_, str> {
        Cow::Owned(format!("Recorder {}", self.id))
    }

    fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::TICK | Capabilities::FILTER | Capabilities::CONDITIONS;
        caps.set(Capabilities::BACKGROUND, self.settings.background);
        caps
    }

    fn initialize(&self) -> Result<(), PluginError> {
        self.enter("initialize", "")
    }

    fn shutdown(&self) -> Result<(), PluginError> {
        self.enter("shutdown", "")
    }

    fn game_tick(&self, _ctx: &TickContext<'_>) -> Result<Option<ControllerState>, PluginError> {
        self.enter("game_tick", "")?;
        Ok(self.settings.contribute.map(|throttle| ControllerState {
            throttle,
            ..ControllerState::default()
        }))
    }

    fn conditions(&self) -> Vec<ConditionSpec> {
        self.settings
            .conditions
            .iter()
            .map(|c| {
                ConditionSpec::new(
                    c.handler.clone(),
                    c.expression.clone(),
                    parse_params(&c.params).unwrap_or(HandlerParams::empty()),
                )
            })
            .collect()
    }

    fn handle_condition(&self, handler: &str, args: &HandlerArgs<'_>) -> Result<(), PluginError> {
        self.enter(
            "handle_condition",
            &format!(" {handler} [{}]", present_args(args)),
        )
    }

    fn controller_filter(
        &self,
        command: &mut ControllerState,
    ) -> Result<Option<ControllerState>, PluginError> {
        let replacement = match self.settings.steer {
            Some(SteerOp::Add(v)) => {
                command.steer += v;
                None
            }
            Some(SteerOp::Scale(v)) => {
                command.steer *= v;
                None
            }
            Some(SteerOp::Replace(v)) => Some(ControllerState {
                steer: v,
                ..*command
            }),
            None => None,
        };
        self.enter("controller_filter", "")?;
        Ok(replacement)
    }

    fn on_match_started(&self, event: &MatchEvent) -> Result<(), PluginError> {
        self.enter("on_match_started", &format!(" {}", event.match_id))
    }

    fn on_match_destroyed(&self, event: &MatchEvent) -> Result<(), PluginError> {
        self.enter("on_match_destroyed", &format!(" {}", event.match_id))
    }

    fn run_background(&self, ctx: &BackgroundContext) -> Result<(), PluginError> {
        self.journal.record(format!("{}:background_started", self.id));
        let mut saw_disabled = false;
        while !ctx.sleep(Duration::from_millis(5)) {
            if !ctx.is_enabled() && !saw_disabled {
                saw_disabled = true;
                self.journal.record(format!("{}:background_saw_disabled", self.id));
            }
        }
        self.journal.record(format!("{}:background_stopped", self.id));
        Ok(())
    }
}

/// Built-in catalog plus the `recorder` kind writing to `journal`.
pub fn recorder_catalog(journal: &Journal) -> PluginCatalog {
    let mut catalog = PluginCatalog::with_builtins();
    let journal = journal.clone();
    catalog.register("recorder", move |setup| {
        journal.record(format!("{}:construct", setup.id));
        let settings: RecorderSettings = setup.parse_settings()?;
        for condition in &settings.conditions {
            parse_params(&condition.params)?;
        }
        Ok(Arc::new(Recorder {
            id: setup.id,
            settings,
            journal: journal.clone(),
        }))
    });
    catalog
}

// =============================================================================
// Hosts and Snapshots
// =============================================================================

/// A host over `dir` with a short shutdown grace.
pub fn host_for(dir: &TempPluginDir, catalog: PluginCatalog) -> Host {
    let config = HostConfig {
        shutdown_grace_ms: 1000,
        player_name: "Blue Bot".to_string(),
        ..HostConfig::with_plugin_dir(dir.path())
    };
    Host::new(config, catalog)
}

/// Two cars, one per team, with the ball at midfield.
pub fn two_car_packet() -> GameTickPacket {
    let mut packet = GameTickPacket::default();
    let mut blue = PlayerInfo::named("Blue Bot", 0);
    blue.physics.location = Vector3::new(0.0, -2000.0, 17.0);
    let mut orange = PlayerInfo::named("Orange Bot", 1);
    orange.physics.location = Vector3::new(0.0, 2000.0, 17.0);
    packet.push_car(blue);
    packet.push_car(orange);
    packet.set_team_scores(0, 0);
    packet.game_ball.physics.location = Vector3::new(0.0, 0.0, 93.0);
    packet
}

/// [`two_car_packet`] with the ball at height `z`.
pub fn packet_with_ball_height(z: f32) -> GameTickPacket {
    let mut packet = two_car_packet();
    packet.game_ball.physics.location.z = z;
    packet
}

/// A command with only `steer` set.
pub fn steer(value: f32) -> ControllerState {
    ControllerState {
        steer: value,
        ..ControllerState::default()
    }
}

/// Plugin ids of a host in load order.
pub fn loaded_ids(host: &Host) -> Vec<String> {
    host.plugins()
        .into_iter()
        .map(|p| p.id.as_str().to_string())
        .collect()
}

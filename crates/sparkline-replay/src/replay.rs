//! Tick sources and run summaries.
//!
//! A recording is a JSON-lines file with one [`ReplayFrame`] per line. Blank
//! lines and lines starting with `#` are skipped.

use std::collections::BTreeMap;
use std::fmt;
use std::io::BufRead;

use anyhow::{Context, Result};
use serde::Deserialize;
use sparkline_core::condition::{ConditionInputs, CONDITION_VARIABLES};
use sparkline_core::state::{FieldInfo, GameTickPacket};
use sparkline_core::synthetic::SyntheticMatch;
use sparkline_core::{
    ControllerState, GameEvent, Host, HostConfig, MatchEvent, PluginFault, TickContext,
    TickOutcome,
};
use sparkline_expr::{Expression, OwnedValue};
use tracing::{debug, info};

// =============================================================================
// Frames
// =============================================================================

/// One recorded tick.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReplayFrame {
    /// Game-state snapshot
    pub packet: GameTickPacket,
    /// Arena geometry, if the recording carries it
    pub field_info: Option<FieldInfo>,
    /// Commands fed through the filter pipeline ahead of plugin output
    pub controls: Vec<ControllerState>,
}

/// Parses a JSON-lines recording.
///
/// # Errors
///
/// Fails on the first unreadable or malformed line, naming its line number.
pub fn read_frames(reader: impl BufRead) -> Result<Vec<ReplayFrame>> {
    let mut frames = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.with_context(|| format!("failed to read line {line_no}"))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let frame = serde_json::from_str(line)
            .with_context(|| format!("line {line_no}: not a valid tick frame"))?;
        frames.push(frame);
    }
    Ok(frames)
}

// =============================================================================
// Summary
// =============================================================================

/// Totals collected over a run.
#[derive(Debug, Default)]
pub struct Summary {
    /// Ticks dispatched
    pub ticks: u64,
    /// Commands emitted after filtering, over all ticks
    pub commands: usize,
    /// Conditional handlers that ran
    pub handlers_fired: usize,
    /// Contained faults keyed by `plugin:hook`
    pub faults: BTreeMap<String, usize>,
    /// The last final command seen
    pub final_command: Option<ControllerState>,
}

impl Summary {
    /// Folds one tick outcome into the totals.
    pub fn record(&mut self, outcome: &TickOutcome) {
        self.ticks += 1;
        self.commands += outcome.commands.len();
        self.handlers_fired += outcome.handlers_fired;
        self.record_faults(&outcome.faults);
        if outcome.final_command.is_some() {
            self.final_command = outcome.final_command;
        }
    }

    /// Counts faults raised outside a tick, such as event dispatch.
    pub fn record_faults(&mut self, faults: &[PluginFault]) {
        for fault in faults {
            *self
                .faults
                .entry(format!("{}:{}", fault.plugin, fault.hook))
                .or_default() += 1;
        }
    }

    /// Total contained faults.
    #[must_use]
    pub fn fault_count(&self) -> usize {
        self.faults.values().sum()
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ticks:          {}", self.ticks)?;
        writeln!(f, "commands:       {}", self.commands)?;
        writeln!(f, "handlers fired: {}", self.handlers_fired)?;
        writeln!(f, "faults:         {}", self.fault_count())?;
        for (source, count) in &self.faults {
            writeln!(f, "  {source}: {count}")?;
        }
        match &self.final_command {
            Some(command) => write!(f, "final command:  {command}"),
            None => write!(f, "final command:  none"),
        }
    }
}

// =============================================================================
// Drivers
// =============================================================================

fn match_event(match_id: u64, seconds_elapsed: f32) -> MatchEvent {
    MatchEvent {
        match_id,
        seconds_elapsed,
    }
}

/// Plays `frames` through `host` as a single match.
pub fn replay(host: &mut Host, frames: &[ReplayFrame]) -> Summary {
    let mut summary = Summary::default();
    let start = frames.first().map_or(0.0, |f| f.packet.game_info.seconds_elapsed);
    summary.record_faults(&host.dispatch_event(&GameEvent::MatchStarted(match_event(1, start))));

    for frame in frames {
        let outcome = host.tick(&frame.packet, frame.field_info.as_ref(), &frame.controls);
        debug!(tick = outcome.tick, commands = outcome.commands.len(), "replayed frame");
        summary.record(&outcome);
    }

    let end = frames.last().map_or(0.0, |f| f.packet.game_info.seconds_elapsed);
    summary.record_faults(&host.dispatch_event(&GameEvent::MatchDestroyed(match_event(1, end))));
    summary
}

/// Runs up to `ticks` generated ticks, stopping early if the match ends.
///
/// Each tick feeds one random command from the generator through the filter
/// pipeline.
pub fn synthetic(host: &mut Host, game: &mut SyntheticMatch, ticks: u64) -> Summary {
    let field = FieldInfo::standard();
    let mut summary = Summary::default();
    let start = game.packet().game_info.seconds_elapsed;
    summary.record_faults(&host.dispatch_event(&GameEvent::MatchStarted(match_event(1, start))));

    for _ in 0..ticks {
        let command = game.command();
        let packet = game.step();
        let outcome = host.tick(packet, Some(&field), &[command]);
        summary.record(&outcome);
        if packet.game_info.is_match_ended {
            info!(tick = outcome.tick, "synthetic match ended");
            break;
        }
    }

    let end = game.packet().game_info.seconds_elapsed;
    summary.record_faults(&host.dispatch_event(&GameEvent::MatchDestroyed(match_event(1, end))));
    summary
}

// =============================================================================
// Condition Evaluation
// =============================================================================

/// Evaluates a condition expression the way the host would for `packet`.
///
/// # Errors
///
/// Returns the compile error, or the evaluation error.
pub fn evaluate_condition(
    config: &HostConfig,
    packet: &GameTickPacket,
    field_info: Option<&FieldInfo>,
    source: &str,
) -> Result<OwnedValue> {
    let expression = Expression::compile_with(source, &CONDITION_VARIABLES)
        .with_context(|| format!("failed to compile {source:?}"))?;
    let ctx = TickContext {
        packet,
        local_player_index: config.local_player_index,
        player_name: &config.player_name,
        field_info,
        tick: 0,
        pid: std::process::id(),
    };
    let inputs = ConditionInputs::from_context(&ctx);
    let scope = inputs.scope(&ctx);
    let value = expression
        .evaluate(&scope)
        .with_context(|| format!("failed to evaluate {source:?}"))?;
    Ok(value.into_owned())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Cursor;
    use std::path::PathBuf;

    use sparkline_core::state::PlayerInfo;
    use sparkline_core::{Hook, PluginCatalog, PluginError, PluginId};

    use super::*;

    struct ScratchDir(PathBuf);

    impl ScratchDir {
        fn new(name: &str) -> Self {
            let dir = std::env::temp_dir()
                .join(format!("sparkline-replay-{}-{name}", std::process::id()));
            let _ = fs::remove_dir_all(&dir);
            fs::create_dir_all(&dir).unwrap();
            Self(dir)
        }
    }

    impl Drop for ScratchDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    fn host_with(dir: &ScratchDir, manifests: &[(&str, &str)]) -> Host {
        for (file, text) in manifests {
            fs::write(dir.0.join(file), text).unwrap();
        }
        let mut host = Host::new(
            HostConfig::with_plugin_dir(&dir.0),
            PluginCatalog::with_builtins(),
        );
        host.load().unwrap();
        host
    }

    #[test]
    fn frames_skip_blank_and_comment_lines() {
        let text = "# recorded by hand\n\
                    {\"packet\": {\"num_cars\": 0}}\n\
                    \n\
                    {\"controls\": [{\"throttle\": 0.5}]}\n";
        let frames = read_frames(Cursor::new(text)).unwrap();
        assert_eq!(frames.len(), 2);
        assert!(frames[0].controls.is_empty());
        assert_eq!(frames[1].controls[0].throttle, 0.5);
        assert!(frames[1].field_info.is_none());
    }

    #[test]
    fn bad_frame_names_its_line() {
        let text = "{}\n{\"packet\": 3}\n";
        let err = read_frames(Cursor::new(text)).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn unknown_frame_keys_rejected() {
        assert!(read_frames(Cursor::new("{\"pakcet\": {}}")).is_err());
    }

    #[test]
    fn summary_counts_faults_by_source() {
        let mut summary = Summary::default();
        let outcome = TickOutcome {
            tick: 0,
            commands: vec![ControllerState::default(); 2],
            final_command: Some(ControllerState::default()),
            handlers_fired: 3,
            faults: vec![
                PluginFault {
                    plugin: PluginId::new("a"),
                    hook: Hook::GameTick,
                    error: PluginError::Failed("boom".to_string()),
                },
                PluginFault {
                    plugin: PluginId::new("a"),
                    hook: Hook::GameTick,
                    error: PluginError::Failed("boom".to_string()),
                },
            ],
        };
        summary.record(&outcome);
        summary.record(&TickOutcome::default());

        assert_eq!(summary.ticks, 2);
        assert_eq!(summary.commands, 2);
        assert_eq!(summary.handlers_fired, 3);
        assert_eq!(summary.fault_count(), 2);
        assert_eq!(summary.faults.get("a:game_tick"), Some(&2));
        // An empty tick does not erase the last command
        assert!(summary.final_command.is_some());
        assert!(summary.to_string().contains("a:game_tick: 2"));
    }

    #[test]
    fn replay_filters_recorded_controls() {
        let dir = ScratchDir::new("replay");
        let mut host = host_with(&dir, &[("deadzone.json", r#"{"kind": "input_deadzone"}"#)]);
        let frame = ReplayFrame {
            controls: vec![ControllerState {
                throttle: 1.0,
                steer: 0.05,
                ..ControllerState::default()
            }],
            ..ReplayFrame::default()
        };
        let summary = replay(&mut host, &[frame.clone(), frame]);

        assert_eq!(summary.ticks, 2);
        assert_eq!(summary.commands, 2);
        assert_eq!(summary.fault_count(), 0);
        let last = summary.final_command.unwrap();
        assert_eq!(last.throttle, 1.0);
        assert_eq!(last.steer, 0.0);
    }

    #[test]
    fn synthetic_run_is_fault_free_with_builtins() {
        let dir = ScratchDir::new("synthetic");
        let mut host = host_with(
            &dir,
            &[
                ("a_tracker.json", r#"{"kind": "ball_tracker"}"#),
                ("b_deadzone.json", r#"{"kind": "input_deadzone"}"#),
            ],
        );
        let mut game = SyntheticMatch::new(3, 2);
        let summary = synthetic(&mut host, &mut game, 600);

        assert_eq!(summary.ticks, 600);
        assert_eq!(summary.commands, 600);
        assert_eq!(summary.fault_count(), 0);
        assert!(summary.final_command.unwrap().is_valid());
    }

    #[test]
    fn synthetic_stops_when_match_ends() {
        let dir = ScratchDir::new("short");
        let mut host = host_with(&dir, &[]);
        // Three seconds of kickoff plus one second of play
        let mut game = SyntheticMatch::new(9, 1).with_duration(1.0);
        let summary = synthetic(&mut host, &mut game, 100_000);

        assert!(summary.ticks < 100_000);
        assert!(game.packet().game_info.is_match_ended);
    }

    #[test]
    fn conditions_see_host_identity() {
        let mut packet = GameTickPacket::default();
        packet.push_car(PlayerInfo::named("Sparkline", 0));
        let config = HostConfig::default();

        let value = evaluate_condition(
            &config,
            &packet,
            None,
            "packet.game_cars[local_player_index].name == playername",
        )
        .unwrap();
        assert_eq!(value, OwnedValue::Bool(true));

        let value = evaluate_condition(&config, &packet, None, "field_info").unwrap();
        assert_eq!(value, OwnedValue::None);
    }

    #[test]
    fn unknown_condition_names_rejected() {
        let packet = GameTickPacket::default();
        let err = evaluate_condition(&HostConfig::default(), &packet, None, "ball.z > 1")
            .unwrap_err();
        assert!(err.to_string().contains("failed to compile"));
    }
}

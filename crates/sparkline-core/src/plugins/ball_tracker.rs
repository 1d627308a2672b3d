//! Ball and match statistics tracker.
//!
//! Watches every tick and keeps per-match records:
//!
//! - highest ball and fastest ball
//! - possession: the car closest to the ball, if within `possession_distance`
//! - goals, detected from per-player goal counters
//! - team scores and whether the local player's team is winning
//!
//! It also registers conditional handlers for kickoffs, high balls, fast
//! balls and the end of the match, smooths analog inputs with a moving
//! average, and runs a background reporter that logs a status line whenever
//! something changed since the previous report.
//!
//! # Settings
//!
//! | Key                    | Default | Meaning                              |
//! |------------------------|---------|--------------------------------------|
//! | `possession_distance`  | `200`   | Max car-ball distance for possession |
//! | `high_ball_height`     | `300`   | `on_high_ball` threshold             |
//! | `fast_ball_speed`      | `2000`  | `on_fast_ball` threshold             |
//! | `smoothing_window`     | `1`     | Moving-average length (1 = off)      |
//! | `report_interval_ms`   | `5000`  | Background report period             |

use std::borrow::Cow;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::controller::ControllerState;
use crate::error::PluginError;
use crate::logger::PluginLogger;
use crate::plugin::{
    Capabilities, ConditionSpec, HandlerArgs, HandlerParams, MatchEvent, Plugin, PluginSetup,
    TickContext,
};
use crate::state::GameTickPacket;
use crate::supervisor::BackgroundContext;

/// Handler names registered by [`BallTracker`].
pub mod handlers {
    /// Kickoff pause began
    pub const KICKOFF: &str = "on_kickoff";
    /// Ball above the height threshold
    pub const HIGH_BALL: &str = "on_high_ball";
    /// Ball above the speed threshold
    pub const FAST_BALL: &str = "on_fast_ball";
    /// Match ended
    pub const MATCH_END: &str = "on_match_end_summary";
}

/// A handler only logs when the value is within this fraction of the record.
const NEAR_RECORD: f32 = 0.95;

// =============================================================================
// Settings
// =============================================================================

/// Manifest settings for [`BallTracker`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BallTrackerSettings {
    /// Max car-ball distance for possession, in unreal units
    pub possession_distance: f32,
    /// Height above which `on_high_ball` fires
    pub high_ball_height: f32,
    /// Speed above which `on_fast_ball` fires
    pub fast_ball_speed: f32,
    /// Number of commands averaged per axis
    pub smoothing_window: usize,
    /// Background report period in milliseconds
    pub report_interval_ms: u64,
}

impl Default for BallTrackerSettings {
    fn default() -> Self {
        Self {
            possession_distance: 200.0,
            high_ball_height: 300.0,
            fast_ball_speed: 2000.0,
            smoothing_window: 1,
            report_interval_ms: 5000,
        }
    }
}

impl BallTrackerSettings {
    fn validate(&self) -> Result<(), PluginError> {
        let positive = [
            ("possession_distance", self.possession_distance),
            ("high_ball_height", self.high_ball_height),
            ("fast_ball_speed", self.fast_ball_speed),
        ];
        for (key, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid(key, format!("must be a positive number, got {value}")));
            }
        }
        if self.smoothing_window == 0 {
            return Err(invalid("smoothing_window", "must be at least 1".to_string()));
        }
        if self.report_interval_ms == 0 {
            return Err(invalid("report_interval_ms", "must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn invalid(key: &str, reason: String) -> PluginError {
    PluginError::InvalidSettings {
        key: key.to_string(),
        reason,
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// The local team's standing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WinningStatus {
    /// Local team leads
    Winning,
    /// Local team trails
    Losing,
    /// Scores are level
    Tied,
    /// Local player's team not seen yet
    #[default]
    Unknown,
}

impl WinningStatus {
    /// Standing of `team` given `[blue, orange]` scores.
    #[must_use]
    pub fn of(team: Option<u8>, scores: [i32; 2]) -> Self {
        let Some(team) = team else {
            return Self::Unknown;
        };
        let (ours, theirs) = if team == 0 {
            (scores[0], scores[1])
        } else {
            (scores[1], scores[0])
        };
        match ours.cmp(&theirs) {
            std::cmp::Ordering::Greater => Self::Winning,
            std::cmp::Ordering::Less => Self::Losing,
            std::cmp::Ordering::Equal => Self::Tied,
        }
    }
}

impl fmt::Display for WinningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Winning => "winning",
            Self::Losing => "losing",
            Self::Tied => "tied",
            Self::Unknown => "team unknown",
        })
    }
}

/// One detected goal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalRecord {
    /// Scorer's name
    pub scorer: String,
    /// Scorer's team
    pub team: u8,
    /// Scorer's goal count after this goal
    pub goals: i32,
    /// Game clock when the goal was seen
    pub seconds_elapsed: f32,
}

/// Per-match statistics. Reset on match start and match destroy.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchStats {
    /// Highest ball location seen
    pub height_record: f32,
    /// Fastest ball speed seen
    pub speed_record: f32,
    /// Car currently in possession
    pub possession: Option<usize>,
    /// Game clock when possession last changed
    pub possession_since: f32,
    /// Goals in detection order
    pub goals: Vec<GoalRecord>,
    /// `[blue, orange]`
    pub team_scores: [i32; 2],
    /// Local player's team, once seen
    pub local_team: Option<u8>,
}

impl MatchStats {
    /// The local team's standing.
    #[must_use]
    pub fn winning_status(&self) -> WinningStatus {
        WinningStatus::of(self.local_team, self.team_scores)
    }
}

/// What the background reporter last logged.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Report {
    team_scores: [i32; 2],
    status: WinningStatus,
    height_record: f32,
    speed_record: f32,
}

impl Report {
    fn of(stats: &MatchStats) -> Self {
        Self {
            team_scores: stats.team_scores,
            status: stats.winning_status(),
            height_record: stats.height_record,
            speed_record: stats.speed_record,
        }
    }
}

/// Per-axis moving average over the last `window` commands.
#[derive(Debug)]
struct Smoother {
    window: usize,
    history: [VecDeque<f32>; 5],
}

impl Smoother {
    fn new(window: usize) -> Self {
        Self {
            window,
            history: std::array::from_fn(|_| VecDeque::with_capacity(window)),
        }
    }

    fn apply(&mut self, command: &mut ControllerState) {
        for (axis, history) in command.axes_mut().into_iter().zip(&mut self.history) {
            if history.len() == self.window {
                history.pop_front();
            }
            history.push_back(*axis);
            #[allow(clippy::cast_precision_loss)]
            let len = history.len() as f32;
            *axis = history.iter().sum::<f32>() / len;
        }
    }

    fn clear(&mut self) {
        for history in &mut self.history {
            history.clear();
        }
    }
}

#[derive(Debug)]
struct TrackerState {
    stats: MatchStats,
    /// Last goal count per player name
    last_goals: HashMap<String, i32>,
    last_report: Option<Report>,
    summary_logged: bool,
    started: Option<Instant>,
}

impl TrackerState {
    fn new() -> Self {
        Self {
            stats: MatchStats::default(),
            last_goals: HashMap::new(),
            last_report: None,
            summary_logged: false,
            started: None,
        }
    }

    fn reset_match(&mut self) {
        self.stats = MatchStats::default();
        self.last_goals.clear();
        self.last_report = None;
        self.summary_logged = false;
    }
}

// =============================================================================
// Plugin
// =============================================================================

/// Tracks ball records, possession, goals and score for the current match.
#[derive(Debug)]
pub struct BallTracker {
    settings: BallTrackerSettings,
    logger: PluginLogger,
    state: Mutex<TrackerState>,
    smoother: Mutex<Smoother>,
}

impl BallTracker {
    /// Manifest `kind` for this plugin.
    pub const KIND: &'static str = "ball_tracker";

    /// Creates a tracker.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::InvalidSettings`] for non-positive thresholds or
    /// a zero window or interval.
    pub fn new(settings: BallTrackerSettings, logger: PluginLogger) -> Result<Self, PluginError> {
        settings.validate()?;
        Ok(Self {
            smoother: Mutex::new(Smoother::new(settings.smoothing_window)),
            settings,
            logger,
            state: Mutex::new(TrackerState::new()),
        })
    }

    /// Catalog factory.
    ///
    /// # Errors
    ///
    /// As [`new`](Self::new), plus malformed settings objects.
    pub fn factory(setup: PluginSetup) -> Result<Arc<dyn Plugin>, PluginError> {
        let settings: BallTrackerSettings = setup.parse_settings()?;
        Ok(Arc::new(Self::new(settings, setup.logger)?))
    }

    /// The active settings.
    #[must_use]
    pub fn settings(&self) -> &BallTrackerSettings {
        &self.settings
    }

    /// A copy of the current match statistics.
    #[must_use]
    pub fn snapshot(&self) -> MatchStats {
        self.lock().stats.clone()
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn track(&self, packet: &GameTickPacket, local_player_index: usize) {
        let mut state = self.lock();
        if let Some(car) = packet.car(local_player_index) {
            state.stats.local_team = Some(car.team);
        }
        update_records(&mut state.stats, packet);
        self.update_possession(&mut state.stats, packet);
        self.detect_goals(&mut state, packet);
        state.stats.team_scores = team_scores(packet);
    }

    fn update_possession(&self, stats: &mut MatchStats, packet: &GameTickPacket) {
        let ball: Vec3 = packet.game_ball.physics.location.into();
        let closest = packet
            .cars()
            .map(|(index, car)| (index, ball.distance(car.physics.location.into())))
            .min_by(|a, b| a.1.total_cmp(&b.1));

        match closest {
            Some((index, distance)) if distance < self.settings.possession_distance => {
                if stats.possession != Some(index) {
                    stats.possession = Some(index);
                    stats.possession_since = packet.game_info.seconds_elapsed;
                    let name = packet.car(index).map_or("?", |c| c.name.as_str());
                    self.logger.info(format!(
                        "possession changed to {name} (index {index}) at {distance:.0} units"
                    ));
                }
            }
            _ => {
                if stats.possession.take().is_some() {
                    self.logger.info("ball is now loose");
                }
            }
        }
    }

    fn detect_goals(&self, state: &mut TrackerState, packet: &GameTickPacket) {
        for (_, car) in packet.cars() {
            let current = car.score_info.goals;
            let Some(previous) = state.last_goals.insert(car.name.clone(), current) else {
                continue;
            };
            if current > previous {
                self.logger.info(format!(
                    "*** goal scored by {} ({previous} -> {current}) ***",
                    car.name
                ));
                state.stats.goals.push(GoalRecord {
                    scorer: car.name.clone(),
                    team: car.team,
                    goals: current,
                    seconds_elapsed: packet.game_info.seconds_elapsed,
                });
            }
        }
    }

    fn on_kickoff(&self, packet: &GameTickPacket) {
        let mut state = self.lock();
        if state.stats.possession.take().is_some() {
            self.logger.debug("kickoff: possession reset");
        }
        state.stats.possession_since = packet.game_info.seconds_elapsed;
        for (_, car) in packet.cars() {
            state.last_goals.insert(car.name.clone(), car.score_info.goals);
        }
    }

    fn on_high_ball(&self, packet: &GameTickPacket) {
        let height = packet.game_ball.physics.location.z;
        let record = self.lock().stats.height_record;
        if height > record * NEAR_RECORD {
            self.logger
                .debug(format!("high ball: {height:.0} (record {record:.0})"));
        }
    }

    fn on_fast_ball(&self, packet: &GameTickPacket) {
        let speed = packet.game_ball.physics.speed();
        let record = self.lock().stats.speed_record;
        if speed > record * NEAR_RECORD {
            self.logger
                .debug(format!("fast ball: {speed:.0} (record {record:.0})"));
        }
    }

    fn on_match_end(&self) {
        let mut state = self.lock();
        if state.summary_logged {
            return;
        }
        state.summary_logged = true;
        let stats = &state.stats;
        let [blue, orange] = stats.team_scores;
        let result = match blue.cmp(&orange) {
            std::cmp::Ordering::Greater => "blue wins",
            std::cmp::Ordering::Less => "orange wins",
            std::cmp::Ordering::Equal => "draw",
        };
        self.logger.info(format!(
            "match summary: blue {blue} - {orange} orange ({result}), max height {:.0}, max speed {:.0}, {} goals",
            stats.height_record,
            stats.speed_record,
            stats.goals.len()
        ));
        for goal in &stats.goals {
            self.logger.info(format!(
                "  goal by {} (team {}) at {:.0}s",
                goal.scorer, goal.team, goal.seconds_elapsed
            ));
        }
    }

    /// Returns the status line when something changed since the last report.
    fn report_if_changed(&self) -> Option<String> {
        let mut state = self.lock();
        let report = Report::of(&state.stats);
        if state.last_report == Some(report) {
            return None;
        }
        state.last_report = Some(report);
        let runtime = state.started.map_or(0, |s| s.elapsed().as_secs());
        let [blue, orange] = report.team_scores;
        Some(format!(
            "runtime {runtime}s | score B {blue} - O {orange} | {} | max height {:.0} | max speed {:.0}",
            report.status, report.height_record, report.speed_record
        ))
    }

    fn reset(&self, reason: &str) {
        self.lock().reset_match();
        self.smoother
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.logger.info(format!("{reason}: match stats reset"));
    }
}

fn update_records(stats: &mut MatchStats, packet: &GameTickPacket) {
    let physics = &packet.game_ball.physics;
    stats.height_record = stats.height_record.max(physics.location.z);
    stats.speed_record = stats.speed_record.max(physics.speed());
}

/// `[blue, orange]` from the team table, or summed player goals when the
/// packet carries no teams.
fn team_scores(packet: &GameTickPacket) -> [i32; 2] {
    let mut scores = [0, 0];
    let teams = &packet.teams[..packet.num_teams.min(packet.teams.len())];
    if teams.is_empty() {
        for (_, car) in packet.cars() {
            if let Some(slot) = scores.get_mut(usize::from(car.team)) {
                *slot += car.score_info.goals;
            }
        }
    } else {
        for team in teams {
            if let Some(slot) = scores.get_mut(usize::from(team.team_index)) {
                *slot = team.score;
            }
        }
    }
    scores
}

impl Plugin for BallTracker {
    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed("Ball Tracker Enhanced")
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::TICK | Capabilities::FILTER | Capabilities::BACKGROUND | Capabilities::CONDITIONS
    }

    fn initialize(&self) -> Result<(), PluginError> {
        let mut state = self.lock();
        state.reset_match();
        state.started = Some(Instant::now());
        self.logger.info("tracking started");
        Ok(())
    }

    fn shutdown(&self) -> Result<(), PluginError> {
        let started = self.lock().started.take();
        match started {
            Some(started) => self.logger.info(format!(
                "shutting down after {:.1}s",
                started.elapsed().as_secs_f32()
            )),
            None => self.logger.info("shutting down"),
        }
        Ok(())
    }

    fn game_tick(&self, ctx: &TickContext<'_>) -> Result<Option<ControllerState>, PluginError> {
        self.track(ctx.packet, ctx.local_player_index);
        Ok(None)
    }

    fn conditions(&self) -> Vec<ConditionSpec> {
        let s = &self.settings;
        vec![
            ConditionSpec::new(
                handlers::KICKOFF,
                "packet.game_info.is_kickoff_pause",
                HandlerParams::PACKET | HandlerParams::LOCAL_PLAYER_INDEX | HandlerParams::PLAYERNAME,
            ),
            ConditionSpec::new(
                handlers::HIGH_BALL,
                format!("packet.game_ball.physics.location.z > {}", s.high_ball_height),
                HandlerParams::PACKET | HandlerParams::LOCAL_PLAYER_INDEX,
            ),
            ConditionSpec::new(
                handlers::FAST_BALL,
                format!(
                    "(packet.game_ball.physics.velocity.x ** 2 \
                     + packet.game_ball.physics.velocity.y ** 2 \
                     + packet.game_ball.physics.velocity.z ** 2) ** 0.5 > {}",
                    s.fast_ball_speed
                ),
                HandlerParams::PACKET,
            ),
            ConditionSpec::new(
                handlers::MATCH_END,
                "packet.game_info.is_match_ended",
                HandlerParams::PACKET,
            ),
        ]
    }

    fn handle_condition(&self, handler: &str, args: &HandlerArgs<'_>) -> Result<(), PluginError> {
        match handler {
            handlers::KICKOFF => self.on_kickoff(args.require_packet(handler)?),
            handlers::HIGH_BALL => self.on_high_ball(args.require_packet(handler)?),
            handlers::FAST_BALL => self.on_fast_ball(args.require_packet(handler)?),
            handlers::MATCH_END => self.on_match_end(),
            other => return Err(PluginError::UnknownHandler(other.to_string())),
        }
        Ok(())
    }

    fn controller_filter(
        &self,
        command: &mut ControllerState,
    ) -> Result<Option<ControllerState>, PluginError> {
        if self.settings.smoothing_window > 1 {
            self.smoother
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .apply(command);
        }
        Ok(None)
    }

    fn on_match_started(&self, event: &MatchEvent) -> Result<(), PluginError> {
        self.reset(&format!("match {} started", event.match_id));
        Ok(())
    }

    fn on_match_destroyed(&self, event: &MatchEvent) -> Result<(), PluginError> {
        self.reset(&format!("match {} destroyed", event.match_id));
        Ok(())
    }

    fn run_background(&self, ctx: &BackgroundContext) -> Result<(), PluginError> {
        let interval = Duration::from_millis(self.settings.report_interval_ms);
        ctx.logger().debug("reporter started");
        while !ctx.sleep(interval) {
            if !ctx.is_enabled() {
                continue;
            }
            if let Some(line) = self.report_if_changed() {
                ctx.logger().info(line);
            }
        }
        ctx.logger().debug("reporter finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginId;
    use crate::state::{PlayerInfo, Vector3};
    use serde_json::json;

    fn tracker(settings: BallTrackerSettings) -> BallTracker {
        BallTracker::new(settings, PluginLogger::detached("tracker")).unwrap()
    }

    fn two_car_packet() -> GameTickPacket {
        let mut packet = GameTickPacket::default();
        let mut blue = PlayerInfo::named("Blue", 0);
        blue.physics.location = Vector3::new(0.0, -1000.0, 17.0);
        let mut orange = PlayerInfo::named("Orange", 1);
        orange.physics.location = Vector3::new(0.0, 1000.0, 17.0);
        packet.push_car(blue);
        packet.push_car(orange);
        packet
    }

    mod settings_tests {
        use super::*;

        #[test]
        fn defaults_match_documentation() {
            let s = BallTrackerSettings::default();
            assert_eq!(s.possession_distance, 200.0);
            assert_eq!(s.high_ball_height, 300.0);
            assert_eq!(s.fast_ball_speed, 2000.0);
            assert_eq!(s.smoothing_window, 1);
            assert_eq!(s.report_interval_ms, 5000);
        }

        #[test]
        fn factory_applies_settings() {
            let setup = PluginSetup::new(PluginId::new("t"), PluginLogger::detached("t"))
                .with_settings(json!({"high_ball_height": 500}));
            let plugin = BallTracker::factory(setup).unwrap();
            let specs = plugin.conditions();
            assert!(specs[1].expression.ends_with("> 500"));
        }

        #[test]
        fn invalid_settings_rejected() {
            let bad = BallTrackerSettings {
                smoothing_window: 0,
                ..BallTrackerSettings::default()
            };
            assert!(matches!(
                BallTracker::new(bad, PluginLogger::detached("t")),
                Err(PluginError::InvalidSettings { ref key, .. }) if key == "smoothing_window"
            ));
            let bad = BallTrackerSettings {
                fast_ball_speed: -1.0,
                ..BallTrackerSettings::default()
            };
            assert!(BallTracker::new(bad, PluginLogger::detached("t")).is_err());
        }
    }

    mod tracking_tests {
        use super::*;

        #[test]
        fn records_only_grow() {
            let t = tracker(BallTrackerSettings::default());
            let mut packet = two_car_packet();
            packet.game_ball.physics.location.z = 800.0;
            packet.game_ball.physics.velocity = Vector3::new(3000.0, 0.0, 0.0);
            t.track(&packet, 0);
            packet.game_ball.physics.location.z = 100.0;
            packet.game_ball.physics.velocity = Vector3::ZERO;
            t.track(&packet, 0);

            let stats = t.snapshot();
            assert_eq!(stats.height_record, 800.0);
            assert_eq!(stats.speed_record, 3000.0);
        }

        #[test]
        fn possession_follows_closest_car() {
            let t = tracker(BallTrackerSettings::default());
            let mut packet = two_car_packet();
            packet.game_ball.physics.location = Vector3::new(0.0, 900.0, 93.0);
            t.track(&packet, 0);
            assert_eq!(t.snapshot().possession, Some(1));

            packet.game_ball.physics.location = Vector3::new(0.0, 0.0, 93.0);
            t.track(&packet, 0);
            assert_eq!(t.snapshot().possession, None);
        }

        #[test]
        fn first_sighting_is_not_a_goal() {
            let t = tracker(BallTrackerSettings::default());
            let mut packet = two_car_packet();
            packet.game_cars[0].score_info.goals = 2;
            t.track(&packet, 0);
            assert!(t.snapshot().goals.is_empty());

            packet.game_cars[0].score_info.goals = 3;
            t.track(&packet, 0);
            let goals = t.snapshot().goals;
            assert_eq!(goals.len(), 1);
            assert_eq!(goals[0].scorer, "Blue");
            assert_eq!(goals[0].goals, 3);
        }

        #[test]
        fn team_scores_prefer_team_table() {
            let mut packet = two_car_packet();
            packet.game_cars[1].score_info.goals = 4;
            assert_eq!(team_scores(&packet), [0, 4]);
            packet.set_team_scores(2, 1);
            assert_eq!(team_scores(&packet), [2, 1]);
        }

        #[test]
        fn winning_status_is_relative_to_local_team() {
            assert_eq!(WinningStatus::of(Some(0), [2, 1]), WinningStatus::Winning);
            assert_eq!(WinningStatus::of(Some(1), [2, 1]), WinningStatus::Losing);
            assert_eq!(WinningStatus::of(Some(1), [1, 1]), WinningStatus::Tied);
            assert_eq!(WinningStatus::of(None, [5, 0]), WinningStatus::Unknown);

            let t = tracker(BallTrackerSettings::default());
            let mut packet = two_car_packet();
            packet.set_team_scores(0, 1);
            t.track(&packet, 1);
            assert_eq!(t.snapshot().winning_status(), WinningStatus::Winning);
        }

        #[test]
        fn kickoff_syncs_scores_and_clears_possession() {
            let t = tracker(BallTrackerSettings::default());
            let mut packet = two_car_packet();
            packet.game_ball.physics.location = Vector3::new(0.0, -950.0, 93.0);
            t.track(&packet, 0);
            assert_eq!(t.snapshot().possession, Some(0));

            packet.game_cars[1].score_info.goals = 1;
            t.on_kickoff(&packet);
            t.track(&packet, 0);
            let stats = t.snapshot();
            assert!(stats.goals.is_empty());
        }

        #[test]
        fn match_events_reset_stats() {
            let t = tracker(BallTrackerSettings::default());
            let mut packet = two_car_packet();
            packet.game_ball.physics.location.z = 1200.0;
            t.track(&packet, 0);
            t.on_match_started(&MatchEvent::default()).unwrap();
            assert_eq!(t.snapshot(), MatchStats::default());
        }
    }

    mod handler_tests {
        use super::*;

        #[test]
        fn unknown_handler_is_an_error() {
            let t = tracker(BallTrackerSettings::default());
            assert!(matches!(
                t.handle_condition("on_nothing", &HandlerArgs::default()),
                Err(PluginError::UnknownHandler(_))
            ));
        }

        #[test]
        fn handler_without_packet_fails() {
            let t = tracker(BallTrackerSettings::default());
            assert!(t
                .handle_condition(handlers::HIGH_BALL, &HandlerArgs::default())
                .is_err());
            assert!(t
                .handle_condition(handlers::MATCH_END, &HandlerArgs::default())
                .is_ok());
        }

        #[test]
        fn every_declared_handler_is_handled() {
            let t = tracker(BallTrackerSettings::default());
            let packet = two_car_packet();
            let args = HandlerArgs {
                packet: Some(&packet),
                ..HandlerArgs::default()
            };
            for spec in t.conditions() {
                t.handle_condition(&spec.handler, &args).unwrap();
            }
        }
    }

    mod report_tests {
        use super::*;

        #[test]
        fn reports_only_on_change() {
            let t = tracker(BallTrackerSettings::default());
            assert!(t.report_if_changed().is_some());
            assert!(t.report_if_changed().is_none());

            let mut packet = two_car_packet();
            packet.game_ball.physics.location.z = 640.0;
            t.track(&packet, 0);
            let line = t.report_if_changed().unwrap();
            assert!(line.contains("max height 640"));
            assert!(t.report_if_changed().is_none());
        }
    }

    mod smoothing_tests {
        use super::*;

        #[test]
        fn window_of_one_is_identity() {
            let t = tracker(BallTrackerSettings::default());
            let mut command = ControllerState {
                steer: 0.7,
                ..ControllerState::default()
            };
            t.controller_filter(&mut command).unwrap();
            assert_eq!(command.steer, 0.7);
        }

        #[test]
        fn averages_over_window() {
            let t = tracker(BallTrackerSettings {
                smoothing_window: 2,
                ..BallTrackerSettings::default()
            });
            let mut first = ControllerState {
                throttle: 1.0,
                jump: true,
                ..ControllerState::default()
            };
            t.controller_filter(&mut first).unwrap();
            assert_eq!(first.throttle, 1.0);

            let mut second = ControllerState {
                throttle: 0.0,
                ..ControllerState::default()
            };
            t.controller_filter(&mut second).unwrap();
            assert_eq!(second.throttle, 0.5);
            assert!(!second.jump);

            let mut third = ControllerState::default();
            t.controller_filter(&mut third).unwrap();
            assert_eq!(third.throttle, 0.0);
        }
    }
}

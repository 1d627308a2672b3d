//! Per-tick game-state snapshot and session field info.
//!
//! Field names follow the packet format the plugin ecosystem already writes
//! conditions against (`game_cars`, `game_ball`, `game_info`, ...). Every
//! struct deserializes with defaults for missing fields so partial recordings
//! replay without preprocessing.
//!
//! # Example
//!
//! ```
//! use sparkline_core::state::{GameTickPacket, PlayerInfo, Vector3};
//!
//! let mut packet = GameTickPacket::default();
//! packet.push_car(PlayerInfo::named("Blue Bot", 0));
//! packet.game_ball.physics.location = Vector3::new(0.0, 0.0, 320.0);
//!
//! assert_eq!(packet.num_cars, 1);
//! assert_eq!(packet.car(0).map(|c| c.team), Some(0));
//! ```

mod field;
mod vector;

pub use field::{BoostPad, FieldInfo, GoalInfo};
pub use vector::{Rotator, Vector3};

use serde::{Deserialize, Serialize};

// =============================================================================
// Physics
// =============================================================================

/// Rigid-body state of a car or the ball.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Physics {
    /// Position in world space
    pub location: Vector3,
    /// Orientation
    pub rotation: Rotator,
    /// Linear velocity (uu/s)
    pub velocity: Vector3,
    /// Angular velocity (rad/s)
    pub angular_velocity: Vector3,
}

impl Physics {
    /// Linear speed.
    #[must_use]
    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }
}

// =============================================================================
// Players
// =============================================================================

/// Scoreboard statistics for one player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreInfo {
    /// Points
    pub score: i32,
    /// Goals scored
    pub goals: i32,
    /// Own goals
    pub own_goals: i32,
    /// Assists
    pub assists: i32,
    /// Saves
    pub saves: i32,
    /// Shots on goal
    pub shots: i32,
    /// Demolitions inflicted
    pub demolitions: i32,
}

/// One car in the match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerInfo {
    /// Rigid-body state
    pub physics: Physics,
    /// Scoreboard
    pub score_info: ScoreInfo,
    /// Currently demolished
    pub is_demolished: bool,
    /// All wheels touching a surface
    pub has_wheel_contact: bool,
    /// Above supersonic speed
    pub is_super_sonic: bool,
    /// Controlled by a bot
    pub is_bot: bool,
    /// Has jumped since last landing
    pub jumped: bool,
    /// Has used the second jump
    pub double_jumped: bool,
    /// Display name
    pub name: String,
    /// 0 for blue, 1 for orange
    pub team: u8,
    /// Boost amount, 0 to 100
    pub boost: i32,
}

impl PlayerInfo {
    /// A car with a name and team and everything else defaulted.
    #[must_use]
    pub fn named(name: impl Into<String>, team: u8) -> Self {
        Self {
            name: name.into(),
            team,
            has_wheel_contact: true,
            ..Self::default()
        }
    }
}

// =============================================================================
// Ball
// =============================================================================

/// The most recent touch of the ball.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Touch {
    /// Name of the toucher
    pub player_name: String,
    /// Index of the toucher in `game_cars`
    pub player_index: usize,
    /// Team of the toucher
    pub team: u8,
    /// Game time of the touch
    pub time_seconds: f32,
    /// Contact point
    pub hit_location: Vector3,
}

/// The ball.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BallInfo {
    /// Rigid-body state
    pub physics: Physics,
    /// Last touch, if any
    pub latest_touch: Touch,
}

// =============================================================================
// Match
// =============================================================================

/// Match clock and phase flags.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameInfo {
    /// Seconds since the match started
    pub seconds_elapsed: f32,
    /// Seconds left on the clock
    pub game_time_remaining: f32,
    /// Overtime is being played
    pub is_overtime: bool,
    /// No time limit
    pub is_unlimited_time: bool,
    /// Cars can move
    pub is_round_active: bool,
    /// Waiting for the kickoff touch
    pub is_kickoff_pause: bool,
    /// The match is over
    pub is_match_ended: bool,
    /// Gravity along z
    pub world_gravity_z: f32,
    /// Simulation speed multiplier
    pub game_speed: f32,
}

impl Default for GameInfo {
    fn default() -> Self {
        Self {
            seconds_elapsed: 0.0,
            game_time_remaining: 300.0,
            is_overtime: false,
            is_unlimited_time: false,
            is_round_active: false,
            is_kickoff_pause: false,
            is_match_ended: false,
            world_gravity_z: -650.0,
            game_speed: 1.0,
        }
    }
}

/// Per-team scoreboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamInfo {
    /// 0 for blue, 1 for orange
    pub team_index: u8,
    /// Goals
    pub score: i32,
}

/// Runtime state of one boost pad.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostPadState {
    /// Pad can be picked up
    pub is_active: bool,
    /// Seconds since it was picked up
    pub timer: f32,
}

// =============================================================================
// Packet
// =============================================================================

/// Read-only game state for one tick.
///
/// The `num_*` counters mirror the lengths of their vectors; use
/// [`push_car`](Self::push_car) and friends when building packets by hand so
/// they stay in sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameTickPacket {
    /// Cars in the match
    pub game_cars: Vec<PlayerInfo>,
    /// Number of valid entries in `game_cars`
    pub num_cars: usize,
    /// Boost pad states, indexed like [`FieldInfo::boost_pads`]
    pub game_boosts: Vec<BoostPadState>,
    /// Number of valid entries in `game_boosts`
    pub num_boost: usize,
    /// The ball
    pub game_ball: BallInfo,
    /// Clock and phase
    pub game_info: GameInfo,
    /// Team scoreboards
    pub teams: Vec<TeamInfo>,
    /// Number of valid entries in `teams`
    pub num_teams: usize,
}

impl GameTickPacket {
    /// Appends a car and updates `num_cars`.
    pub fn push_car(&mut self, car: PlayerInfo) {
        self.game_cars.push(car);
        self.num_cars = self.game_cars.len();
    }

    /// Sets the two team scoreboards and `num_teams`.
    pub fn set_team_scores(&mut self, blue: i32, orange: i32) {
        self.teams = vec![
            TeamInfo {
                team_index: 0,
                score: blue,
            },
            TeamInfo {
                team_index: 1,
                score: orange,
            },
        ];
        self.num_teams = 2;
    }

    /// The car at `index`, if it is within `num_cars`.
    #[must_use]
    pub fn car(&self, index: usize) -> Option<&PlayerInfo> {
        if index < self.num_cars {
            self.game_cars.get(index)
        } else {
            None
        }
    }

    /// Iterates over the valid cars with their indices.
    pub fn cars(&self) -> impl Iterator<Item = (usize, &PlayerInfo)> {
        self.game_cars.iter().take(self.num_cars).enumerate()
    }
}

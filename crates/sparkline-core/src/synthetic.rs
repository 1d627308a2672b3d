//! Deterministic synthetic matches.
//!
//! [`SyntheticMatch`] produces a plausible stream of [`GameTickPacket`]s from
//! a seed: cars chase the ball, touches send it toward the opposing goal,
//! goals bump the scoreboard and trigger a kickoff pause, and the match ends
//! when the clock runs out. The same seed always yields the same stream.
//!
//! Used by the replay tool, the integration tests and the benchmarks.
//!
//! # Example
//!
//! ```
//! use sparkline_core::synthetic::SyntheticMatch;
//!
//! let mut a = SyntheticMatch::new(7, 2);
//! let mut b = SyntheticMatch::new(7, 2);
//! for _ in 0..100 {
//!     assert_eq!(a.step(), b.step());
//! }
//! ```

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::controller::ControllerState;
use crate::state::{BoostPadState, GameTickPacket, PlayerInfo, Vector3};

/// Simulation rate of the generated stream.
pub const TICK_RATE: f32 = 120.0;

const DT: f32 = 1.0 / TICK_RATE;
const GRAVITY: f32 = -650.0;
const BALL_RADIUS: f32 = 92.75;
const CAR_HEIGHT: f32 = 17.0;
const CAR_SPEED: f32 = 1400.0;
const SIDE_WALL: f32 = 4096.0;
const GOAL_LINE: f32 = 5120.0;
const GOAL_HALF_WIDTH: f32 = 892.755;
const CEILING: f32 = 2044.0;
const TOUCH_DISTANCE: f32 = 160.0;
const KICKOFF_PAUSE: f32 = 3.0;
const BOOST_PADS: usize = 34;

/// A seeded match simulation.
#[derive(Debug, Clone)]
pub struct SyntheticMatch {
    rng: ChaCha8Rng,
    packet: GameTickPacket,
    kickoff_remaining: f32,
}

impl SyntheticMatch {
    /// Creates a match with `players_per_team` cars on each side and a
    /// five-minute clock.
    #[must_use]
    pub fn new(seed: u64, players_per_team: usize) -> Self {
        let mut packet = GameTickPacket::default();
        for team in 0..2u8 {
            for slot in 0..players_per_team {
                let side = if team == 0 { "Blue" } else { "Orange" };
                let mut car = PlayerInfo::named(format!("{side} {}", slot + 1), team);
                car.is_bot = true;
                car.boost = 33;
                packet.push_car(car);
            }
        }
        packet.game_boosts = vec![
            BoostPadState {
                is_active: true,
                timer: 0.0,
            };
            BOOST_PADS
        ];
        packet.num_boost = BOOST_PADS;
        packet.set_team_scores(0, 0);
        packet.game_info.is_round_active = true;

        let mut synthetic = Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            packet,
            kickoff_remaining: 0.0,
        };
        synthetic.start_kickoff();
        synthetic
    }

    /// Replaces the match length.
    #[must_use]
    pub fn with_duration(mut self, seconds: f32) -> Self {
        self.packet.game_info.game_time_remaining = seconds;
        self
    }

    /// The current snapshot.
    #[must_use]
    pub fn packet(&self) -> &GameTickPacket {
        &self.packet
    }

    /// Advances one tick and returns the new snapshot.
    pub fn step(&mut self) -> &GameTickPacket {
        let info = &mut self.packet.game_info;
        if info.is_match_ended {
            return &self.packet;
        }
        info.seconds_elapsed += DT;

        if self.kickoff_remaining > 0.0 {
            self.kickoff_remaining -= DT;
            if self.kickoff_remaining <= 0.0 {
                self.packet.game_info.is_kickoff_pause = false;
            }
            return &self.packet;
        }

        let info = &mut self.packet.game_info;
        if !info.is_unlimited_time {
            info.game_time_remaining = (info.game_time_remaining - DT).max(0.0);
            if info.game_time_remaining <= 0.0 {
                info.is_match_ended = true;
                info.is_round_active = false;
                return &self.packet;
            }
        }

        self.move_cars();
        self.move_ball();
        &self.packet
    }

    /// A random but plausible command for the local car.
    pub fn command(&mut self) -> ControllerState {
        let rng = &mut self.rng;
        ControllerState {
            throttle: rng.gen_range(-0.2..1.0),
            steer: rng.gen_range(-1.0..1.0),
            pitch: rng.gen_range(-1.0..1.0),
            yaw: rng.gen_range(-1.0..1.0),
            roll: rng.gen_range(-0.3..0.3),
            jump: rng.gen_bool(0.05),
            boost: rng.gen_bool(0.3),
            handbrake: rng.gen_bool(0.02),
            use_item: false,
        }
    }

    fn start_kickoff(&mut self) {
        let ball = &mut self.packet.game_ball.physics;
        ball.location = Vector3::new(0.0, 0.0, BALL_RADIUS);
        ball.velocity = Vector3::ZERO;
        ball.angular_velocity = Vector3::ZERO;

        let per_team = (self.packet.num_cars / 2).max(1);
        for (index, car) in self.packet.game_cars.iter_mut().enumerate() {
            let sign = if car.team == 0 { -1.0 } else { 1.0 };
            #[allow(clippy::cast_precision_loss)]
            let lane = (index % per_team) as f32 - (per_team as f32 - 1.0) / 2.0;
            car.physics.location = Vector3::new(lane * 512.0, sign * 4608.0, CAR_HEIGHT);
            car.physics.velocity = Vector3::ZERO;
            car.has_wheel_contact = true;
            car.is_super_sonic = false;
        }

        self.packet.game_info.is_kickoff_pause = true;
        self.kickoff_remaining = KICKOFF_PAUSE;
    }

    fn move_cars(&mut self) {
        let ball: Vec3 = self.packet.game_ball.physics.location.into();
        for car in &mut self.packet.game_cars {
            let position: Vec3 = car.physics.location.into();
            let jitter = Vec3::new(
                self.rng.gen_range(-300.0..300.0),
                self.rng.gen_range(-300.0..300.0),
                0.0,
            );
            let target = Vec3::new(ball.x, ball.y, CAR_HEIGHT) + jitter;
            let heading = (target - position).normalize_or_zero();
            let velocity = heading * CAR_SPEED * self.rng.gen_range(0.6..1.0);
            let mut next = position + velocity * DT;
            next.x = next.x.clamp(-SIDE_WALL, SIDE_WALL);
            next.y = next.y.clamp(-GOAL_LINE, GOAL_LINE);
            next.z = CAR_HEIGHT;

            car.physics.velocity = velocity.into();
            car.physics.location = next.into();
            car.is_super_sonic = velocity.length() > 2200.0;
        }
    }

    fn move_ball(&mut self) {
        let mut position: Vec3 = self.packet.game_ball.physics.location.into();
        let mut velocity: Vec3 = self.packet.game_ball.physics.velocity.into();

        if let Some(index) = self.closest_car_within(position, TOUCH_DISTANCE) {
            velocity = self.kick(index, position);
        }

        velocity.z += GRAVITY * DT;
        position += velocity * DT;

        if position.z < BALL_RADIUS {
            position.z = BALL_RADIUS;
            velocity.z = -velocity.z * 0.6;
        } else if position.z > CEILING - BALL_RADIUS {
            position.z = CEILING - BALL_RADIUS;
            velocity.z = -velocity.z.abs();
        }
        if position.x.abs() > SIDE_WALL - BALL_RADIUS {
            position.x = position.x.signum() * (SIDE_WALL - BALL_RADIUS);
            velocity.x = -velocity.x * 0.6;
        }
        velocity *= 0.998;

        if position.y.abs() > GOAL_LINE {
            if position.x.abs() < GOAL_HALF_WIDTH {
                // Ball past the orange goal line scores for blue.
                let scoring_team = u8::from(position.y < 0.0);
                self.score(scoring_team);
                self.start_kickoff();
                return;
            }
            position.y = position.y.signum() * GOAL_LINE;
            velocity.y = -velocity.y * 0.6;
        }

        let ball = &mut self.packet.game_ball.physics;
        ball.location = position.into();
        ball.velocity = velocity.into();
    }

    fn closest_car_within(&self, ball: Vec3, radius: f32) -> Option<usize> {
        self.packet
            .cars()
            .map(|(index, car)| (index, ball.distance(car.physics.location.into())))
            .filter(|(_, distance)| *distance < radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| index)
    }

    /// Sends the ball toward the goal the touching car attacks.
    fn kick(&mut self, index: usize, ball: Vec3) -> Vec3 {
        let Some(car) = self.packet.game_cars.get(index) else {
            return Vec3::ZERO;
        };
        let attacking = if car.team == 0 { GOAL_LINE } else { -GOAL_LINE };
        let aim = Vec3::new(
            self.rng.gen_range(-GOAL_HALF_WIDTH * 1.5..GOAL_HALF_WIDTH * 1.5),
            attacking,
            self.rng.gen_range(0.0..600.0),
        );
        let speed = self.rng.gen_range(1200.0..3200.0);

        let touch = &mut self.packet.game_ball.latest_touch;
        touch.player_name.clone_from(&car.name);
        touch.player_index = index;
        touch.team = car.team;
        touch.time_seconds = self.packet.game_info.seconds_elapsed;
        touch.hit_location = ball.into();

        (aim - ball).normalize_or_zero() * speed
    }

    fn score(&mut self, team: u8) {
        let scorer = self
            .packet
            .game_ball
            .latest_touch
            .player_index
            .min(self.packet.num_cars.saturating_sub(1));
        if let Some(car) = self.packet.game_cars.get_mut(scorer) {
            if car.team == team {
                car.score_info.goals += 1;
                car.score_info.score += 100;
            } else {
                car.score_info.own_goals += 1;
            }
        }
        if let Some(entry) = self.packet.teams.get_mut(usize::from(team)) {
            entry.score += 1;
        }
    }
}

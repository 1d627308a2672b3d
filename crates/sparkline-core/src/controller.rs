//! Control commands.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Requested inputs for the controlled car.
///
/// Analog axes are nominally in `[-1, 1]`. Plugins may produce values outside
/// that range while a command moves through the filter pipeline; the host
/// calls [`clamped`](Self::clamped) on the command it finally emits.
///
/// # Example
///
/// ```
/// use sparkline_core::ControllerState;
///
/// let raw = ControllerState { throttle: 1.7, steer: f32::NAN, ..ControllerState::default() };
/// let out = raw.clamped();
/// assert_eq!(out.throttle, 1.0);
/// assert_eq!(out.steer, 0.0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerState {
    /// Forward/backward
    pub throttle: f32,
    /// Left/right
    pub steer: f32,
    /// Nose up/down in the air
    pub pitch: f32,
    /// Nose left/right in the air
    pub yaw: f32,
    /// Barrel roll
    pub roll: f32,
    /// Jump button
    pub jump: bool,
    /// Boost button
    pub boost: bool,
    /// Powerslide button
    pub handbrake: bool,
    /// Item button (rumble modes)
    pub use_item: bool,
}

impl ControllerState {
    /// Returns a copy with every axis forced into `[-1, 1]`.
    ///
    /// Non-finite axis values become `0.0`.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            throttle: clamp_axis(self.throttle),
            steer: clamp_axis(self.steer),
            pitch: clamp_axis(self.pitch),
            yaw: clamp_axis(self.yaw),
            roll: clamp_axis(self.roll),
            ..self
        }
    }

    /// True if every axis is within `[-1, 1]` and finite.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.axes()
            .iter()
            .all(|a| a.is_finite() && (-1.0..=1.0).contains(a))
    }

    /// The five analog axes in field order.
    #[must_use]
    pub fn axes(&self) -> [f32; 5] {
        [self.throttle, self.steer, self.pitch, self.yaw, self.roll]
    }

    /// Mutable references to the five analog axes in field order.
    pub fn axes_mut(&mut self) -> [&mut f32; 5] {
        [
            &mut self.throttle,
            &mut self.steer,
            &mut self.pitch,
            &mut self.yaw,
            &mut self.roll,
        ]
    }
}

fn clamp_axis(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "T:{:.2} S:{:.2} P:{:.2} Y:{:.2} R:{:.2}",
            self.throttle, self.steer, self.pitch, self.yaw, self.roll
        )?;
        for (flag, label) in [
            (self.jump, " J"),
            (self.boost, " B"),
            (self.handbrake, " H"),
            (self.use_item, " I"),
        ] {
            if flag {
                f.write_str(label)?;
            }
        }
        Ok(())
    }
}

//! Deadzone filter for analog inputs.
//!
//! Zeroes every analog axis whose magnitude is below the configured
//! deadzone. Buttons pass through untouched.
//!
//! # Settings
//!
//! | Key        | Default | Meaning                          |
//! |------------|---------|----------------------------------|
//! | `deadzone` | `0.1`   | Axes with `abs(v) < deadzone` become 0 |

use std::borrow::Cow;
use std::sync::Arc;

use serde::Deserialize;

use crate::controller::ControllerState;
use crate::error::PluginError;
use crate::plugin::{Capabilities, Plugin, PluginSetup};

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DeadzoneSettings {
    deadzone: f32,
}

impl Default for DeadzoneSettings {
    fn default() -> Self {
        Self { deadzone: 0.1 }
    }
}

/// Filter that snaps small analog inputs to zero.
///
/// # Example
///
/// ```
/// use sparkline_core::plugins::InputDeadzone;
/// use sparkline_core::plugin::Plugin;
/// use sparkline_core::ControllerState;
///
/// let filter = InputDeadzone::new(0.2).unwrap();
/// let mut command = ControllerState { throttle: 1.0, steer: 0.15, ..ControllerState::default() };
/// filter.controller_filter(&mut command).unwrap();
/// assert_eq!(command.steer, 0.0);
/// assert_eq!(command.throttle, 1.0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct InputDeadzone {
    deadzone: f32,
}

impl InputDeadzone {
    /// Manifest `kind` for this plugin.
    pub const KIND: &'static str = "input_deadzone";

    /// Creates a filter with the given deadzone.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::InvalidSettings`] unless `0 <= deadzone < 1`.
    pub fn new(deadzone: f32) -> Result<Self, PluginError> {
        if !(0.0..1.0).contains(&deadzone) {
            return Err(PluginError::InvalidSettings {
                key: "deadzone".to_string(),
                reason: format!("must be in [0, 1), got {deadzone}"),
            });
        }
        Ok(Self { deadzone })
    }

    /// The configured deadzone.
    #[must_use]
    pub fn deadzone(&self) -> f32 {
        self.deadzone
    }

    /// Catalog factory.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::InvalidSettings`] for malformed or out-of-range
    /// settings.
    pub fn factory(setup: PluginSetup) -> Result<Arc<dyn Plugin>, PluginError> {
        let settings: DeadzoneSettings = setup.parse_settings()?;
        let plugin = Self::new(settings.deadzone)?;
        setup
            .logger
            .debug(format!("deadzone set to {:.3}", plugin.deadzone));
        Ok(Arc::new(plugin))
    }
}

impl Plugin for InputDeadzone {
    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed("Input Deadzone")
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::FILTER
    }

    fn controller_filter(
        &self,
        command: &mut ControllerState,
    ) -> Result<Option<ControllerState>, PluginError> {
        for axis in command.axes_mut() {
            if axis.abs() < self.deadzone {
                *axis = 0.0;
            }
        }
        Ok(None)
    }
}

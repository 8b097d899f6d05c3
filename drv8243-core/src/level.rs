//! Perceptual level mapping for the PWM input.
//!
//! The H-bridge output has a dead zone near zero duty, so commands are lifted
//! onto a floor and shaped with an exponential curve before reaching the PWM.
//! Pure math, no timing dependency; safe to run on every brightness update.

use micromath::F32Ext;

/// Commands at or below this are treated as fully off. Guards against
/// flicker from floating-point noise near zero.
pub const OFF_EPSILON: f32 = 0.000_5;
/// Default floor matching the board's measured dead zone.
pub const DEFAULT_MIN_LEVEL: f32 = 0.014;
/// Default perceptual exponent.
pub const DEFAULT_EXPONENT: f32 = 1.8;

/// Result of mapping a normalized command.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum MappedLevel {
    /// Command was effectively zero; the actuator must be driven off.
    Off,
    /// Duty value in `[floor, 1.0]` for the PWM input.
    Drive(f32),
}

impl MappedLevel {
    /// Raw duty value, `0.0` for [`MappedLevel::Off`].
    #[must_use]
    pub fn level(self) -> f32 {
        match self {
            MappedLevel::Off => 0.0,
            MappedLevel::Drive(level) => level,
        }
    }
}

/// Floor plus exponential transfer curve, fixed for the device lifetime.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LevelCurve {
    floor: f32,
    exponent: f32,
}

impl LevelCurve {
    /// Creates a curve, clamping the floor into `[0, 1]`. A non-positive
    /// exponent selects the linear mapping.
    #[must_use]
    pub fn new(floor: f32, exponent: f32) -> Self {
        Self {
            floor: floor.clamp(0.0, 1.0),
            exponent,
        }
    }

    #[must_use]
    pub fn floor(&self) -> f32 {
        self.floor
    }

    #[must_use]
    pub fn exponent(&self) -> f32 {
        self.exponent
    }

    /// Maps a normalized command onto the duty range.
    ///
    /// The command is clamped to `[0, 1]` first; anything at or below
    /// [`OFF_EPSILON`] maps to [`MappedLevel::Off`]. The result is clamped
    /// again to guard against floating-point overshoot at the boundaries.
    #[must_use]
    pub fn map(&self, command: f32) -> MappedLevel {
        let x = command.clamp(0.0, 1.0);
        if x <= OFF_EPSILON {
            return MappedLevel::Off;
        }

        let shaped = if self.exponent <= 0.0 {
            x
        } else {
            x.powf(self.exponent)
        };
        let duty = self.floor + (1.0 - self.floor) * shaped;
        MappedLevel::Drive(duty.clamp(0.0, 1.0))
    }
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_LEVEL, DEFAULT_EXPONENT)
    }
}

//! Actuator driver interface for cascade-controlled motors.
//!
//! The driver owns the numeric control law. The core only chooses the
//! outermost loop stage, where the angle loop takes its feedback from, and a
//! reference value for that stage. Measured feedback arrives through the
//! driver's own receive path and is exposed as a latest-value view.

use std::fmt;
use std::ops::BitOr;

use twinboard_types::CoreError;

/// Set of active loops in a cascade. The outermost enabled stage is the one
/// the reference value is applied to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StageMask(u8);

impl StageMask {
    pub const NONE: StageMask = StageMask(0);
    pub const CURRENT: StageMask = StageMask(0b001);
    pub const SPEED: StageMask = StageMask(0b010);
    pub const ANGLE: StageMask = StageMask(0b100);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: StageMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// The stage the reference is applied to.
    pub fn outermost(self) -> StageMask {
        if self.contains(Self::ANGLE) {
            Self::ANGLE
        } else if self.contains(Self::SPEED) {
            Self::SPEED
        } else if self.contains(Self::CURRENT) {
            Self::CURRENT
        } else {
            Self::NONE
        }
    }
}

impl BitOr for StageMask {
    type Output = StageMask;

    fn bitor(self, rhs: StageMask) -> StageMask {
        StageMask(self.0 | rhs.0)
    }
}

impl fmt::Debug for StageMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::ANGLE) {
            names.push("ANGLE");
        }
        if self.contains(Self::SPEED) {
            names.push("SPEED");
        }
        if self.contains(Self::CURRENT) {
            names.push("CURRENT");
        }
        if names.is_empty() {
            write!(f, "StageMask(NONE)")
        } else {
            write!(f, "StageMask({})", names.join("|"))
        }
    }
}

/// Where the angle and speed loops read their measurement from.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum FeedbackSource {
    /// The motor's own encoder.
    #[default]
    Motor,
    /// An external sensor, typically the IMU, sampled by the caller each
    /// cycle.
    External { angle: f32, speed: f32 },
}

/// Latest measured state reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotorFeedback {
    /// Multi-turn angle in degrees.
    pub angle: f32,
    /// Angle within one revolution, `[0, 360)` degrees.
    pub single_round_angle: f32,
    /// Degrees per second.
    pub speed: f32,
    pub current: f32,
}

/// A cascade-controlled motor (wheel, gimbal axis, loader, friction wheel).
pub trait ActuatorDriver: Send {
    /// Stable identifier, e.g. `"wheel_lf"` or `"yaw"`.
    fn id(&self) -> &str;

    /// Set the reference for the outermost selected stage.
    ///
    /// # Errors
    ///
    /// [`CoreError::Hardware`] if the driver cannot accept the value.
    fn set_reference(&mut self, reference: f32) -> Result<(), CoreError>;

    fn select_loop_stage(&mut self, stages: StageMask);

    fn set_feedback_source(&mut self, source: FeedbackSource);

    fn enable(&mut self);

    /// Stop driving the motor. Output current drops to zero.
    fn disable(&mut self);

    fn feedback(&self) -> MotorFeedback;
}

//! Chassis controller: four wheels, omni or mecanum.
//!
//! Wheel order is `lf, rf, lb, rb` everywhere (references, feedback, the
//! [`ChassisWheels`] bundle). Commanded velocities arrive in the gimbal frame;
//! they are rotated by the yaw offset into the chassis frame before being
//! resolved to wheel speeds.

use std::f32::consts::FRAC_1_SQRT_2;

use serde::{Deserialize, Serialize};
use tracing::debug;
use twinboard_hal::{ActuatorDriver, StageMask};
use twinboard_middleware::{MailboxBus, Publisher, Subscriber};
use twinboard_types::{
    ChassisCommand, ChassisFeedback, ChassisKinematics, ChassisMode, ConfigError, CoreError,
};

use super::SubsystemController;
use crate::topics;

/// Highest speed buff level honoured.
pub const MAX_SPEED_BUFF_LEVEL: i32 = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChassisConfig {
    /// Rotation reference while spinning in place.
    pub rotate_wz: f32,
    /// `k` in `wz = -k * offset * |offset|` while following the gimbal.
    pub follow_gain: f32,
    /// Scales `wz` into a per-wheel speed contribution; folds in the wheel
    /// distance from the rotation centre.
    pub rotation_arm: f32,
}

impl Default for ChassisConfig {
    fn default() -> Self {
        Self {
            rotate_wz: 4000.0,
            follow_gain: 1.5,
            rotation_arm: 1.0,
        }
    }
}

/// Wheel drivers in `lf, rf, lb, rb` order.
pub struct ChassisWheels {
    pub lf: Box<dyn ActuatorDriver>,
    pub rf: Box<dyn ActuatorDriver>,
    pub lb: Box<dyn ActuatorDriver>,
    pub rb: Box<dyn ActuatorDriver>,
}

impl ChassisWheels {
    fn into_array(self) -> [Box<dyn ActuatorDriver>; 4] {
        [self.lf, self.rf, self.lb, self.rb]
    }
}

/// Scale factor for a speed buff level. Levels outside `0..=4` are clamped.
pub fn speed_buff_scale(level: i32) -> f32 {
    1.0 + 0.25 * level.clamp(0, MAX_SPEED_BUFF_LEVEL) as f32
}

/// Rotate a gimbal-frame velocity by `offset_deg` into the chassis frame.
pub fn to_chassis_frame(vx: f32, vy: f32, offset_deg: f32) -> (f32, f32) {
    let (sin, cos) = offset_deg.to_radians().sin_cos();
    (vx * cos - vy * sin, vx * sin + vy * cos)
}

/// Resolve a chassis-frame twist into wheel speed references.
pub fn wheel_speeds(kinematics: ChassisKinematics, vx: f32, vy: f32, spin: f32) -> [f32; 4] {
    let (vx, vy) = match kinematics {
        ChassisKinematics::Mecanum => (vx, vy),
        // Omni wheels sit at 45 degrees, so each carries 1/sqrt(2) of the
        // translation.
        ChassisKinematics::Omni => (vx * FRAC_1_SQRT_2, vy * FRAC_1_SQRT_2),
    };
    [
        -vx - vy - spin,
        -vx + vy - spin,
        vx - vy - spin,
        vx + vy - spin,
    ]
}

pub struct ChassisController {
    kinematics: ChassisKinematics,
    config: ChassisConfig,
    wheels: [Box<dyn ActuatorDriver>; 4],
    commands: Subscriber<ChassisCommand>,
    feedback: Publisher<ChassisFeedback>,
    last_mode: ChassisMode,
}

impl ChassisController {
    pub fn new(
        bus: &mut MailboxBus,
        kinematics: ChassisKinematics,
        config: ChassisConfig,
        wheels: ChassisWheels,
    ) -> Result<Self, ConfigError> {
        let mut wheels = wheels.into_array();
        for wheel in &mut wheels {
            wheel.select_loop_stage(StageMask::SPEED | StageMask::CURRENT);
        }
        Ok(Self {
            kinematics,
            config,
            wheels,
            commands: bus.subscribe(topics::CHASSIS_CMD)?,
            feedback: bus.register(topics::CHASSIS_FEED)?,
            last_mode: ChassisMode::ZeroForce,
        })
    }

    fn rotation(&self, cmd: &ChassisCommand) -> f32 {
        match cmd.chassis_mode {
            ChassisMode::Rotate => self.config.rotate_wz,
            ChassisMode::FollowGimbalYaw => {
                -self.config.follow_gain * cmd.offset_angle * cmd.offset_angle.abs()
            }
            ChassisMode::NoFollow | ChassisMode::ZeroForce => 0.0,
        }
    }
}

impl SubsystemController for ChassisController {
    fn name(&self) -> &'static str {
        "chassis"
    }

    fn tick(&mut self) -> Result<(), CoreError> {
        let cmd = self.commands.fetch();
        if cmd.chassis_mode != self.last_mode {
            debug!(from = ?self.last_mode, to = ?cmd.chassis_mode, "chassis mode change");
            self.last_mode = cmd.chassis_mode;
        }

        if cmd.chassis_mode == ChassisMode::ZeroForce {
            for wheel in &mut self.wheels {
                wheel.disable();
            }
            self.feedback.publish(ChassisFeedback {
                wheel_refs: [0.0; 4],
                chassis_mode: cmd.chassis_mode,
            });
            return Ok(());
        }

        let (vx, vy) = to_chassis_frame(cmd.vx, cmd.vy, cmd.offset_angle);
        let scale = speed_buff_scale(cmd.speed_buff_level);
        let spin = self.rotation(&cmd) * self.config.rotation_arm;
        let refs = wheel_speeds(self.kinematics, vx * scale, vy * scale, spin);

        let mut outcome = Ok(());
        for (wheel, reference) in self.wheels.iter_mut().zip(refs) {
            wheel.enable();
            let applied = wheel.set_reference(reference);
            if outcome.is_ok() {
                outcome = applied;
            }
        }
        self.feedback.publish(ChassisFeedback {
            wheel_refs: refs,
            chassis_mode: cmd.chassis_mode,
        });
        outcome
    }
}

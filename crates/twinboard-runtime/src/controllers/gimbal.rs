//! Gimbal controller for one or both aiming axes.
//!
//! Which axes a board drives is fixed at construction:
//!
//! | Constructor | Command topic | Attitude source |
//! |---|---|---|
//! | [`GimbalController::both_axes`] | `gimbal_cmd` | local IMU |
//! | [`GimbalController::yaw_axis`] | `gimbal_yaw_cmd` | relayed in the command (`up_yaw`, `up_speed`) |
//! | [`GimbalController::pitch_axis`] | `gimbal_pitch_cmd` | local IMU |
//!
//! Per axis: `ZeroForce` disables the motor, `Free` closes the angle loop on
//! the motor encoder, `Gyro` closes it on the attitude sensor.

use tracing::debug;
use twinboard_hal::{ActuatorDriver, Attitude, AttitudeSensor, FeedbackSource, StageMask};
use twinboard_middleware::{MailboxBus, Publisher, Subscriber};
use twinboard_types::{
    ConfigError, CoreError, GimbalCommand, GimbalFeedback, GimbalMode, GimbalPitchCommand,
    GimbalYawCommand,
};

use super::SubsystemController;
use crate::topics;

enum Axes {
    Both {
        commands: Subscriber<GimbalCommand>,
        yaw: Box<dyn ActuatorDriver>,
        pitch: Box<dyn ActuatorDriver>,
        imu: Box<dyn AttitudeSensor>,
    },
    Yaw {
        commands: Subscriber<GimbalYawCommand>,
        yaw: Box<dyn ActuatorDriver>,
    },
    Pitch {
        commands: Subscriber<GimbalPitchCommand>,
        pitch: Box<dyn ActuatorDriver>,
        imu: Box<dyn AttitudeSensor>,
    },
}

pub struct GimbalController {
    axes: Axes,
    feedback: Publisher<GimbalFeedback>,
    last_mode: GimbalMode,
}

impl GimbalController {
    /// Single-board gimbal: yaw and pitch on one board.
    pub fn both_axes(
        bus: &mut MailboxBus,
        yaw: Box<dyn ActuatorDriver>,
        pitch: Box<dyn ActuatorDriver>,
        imu: Box<dyn AttitudeSensor>,
    ) -> Result<Self, ConfigError> {
        let commands = bus.subscribe(topics::GIMBAL_CMD)?;
        Self::build(
            bus,
            Axes::Both {
                commands,
                yaw,
                pitch,
                imu,
            },
        )
    }

    /// Lower board of a split robot: only the yaw motor is local.
    pub fn yaw_axis(
        bus: &mut MailboxBus,
        yaw: Box<dyn ActuatorDriver>,
    ) -> Result<Self, ConfigError> {
        let commands = bus.subscribe(topics::GIMBAL_YAW_CMD)?;
        Self::build(bus, Axes::Yaw { commands, yaw })
    }

    /// Upper board of a split robot: pitch motor and IMU.
    pub fn pitch_axis(
        bus: &mut MailboxBus,
        pitch: Box<dyn ActuatorDriver>,
        imu: Box<dyn AttitudeSensor>,
    ) -> Result<Self, ConfigError> {
        let commands = bus.subscribe(topics::GIMBAL_PITCH_CMD)?;
        Self::build(bus, Axes::Pitch {
            commands,
            pitch,
            imu,
        })
    }

    fn build(bus: &mut MailboxBus, axes: Axes) -> Result<Self, ConfigError> {
        Ok(Self {
            axes,
            feedback: bus.register(topics::GIMBAL_FEED)?,
            last_mode: GimbalMode::ZeroForce,
        })
    }

    fn note_mode(&mut self, mode: GimbalMode) {
        if mode != self.last_mode {
            debug!(from = ?self.last_mode, to = ?mode, "gimbal mode change");
            self.last_mode = mode;
        }
    }
}

/// Drive one axis to `target` in `mode`. `external` is the attitude the
/// `Gyro` loop closes on.
fn drive_axis(
    axis: &mut dyn ActuatorDriver,
    mode: GimbalMode,
    target: f32,
    external: (f32, f32),
) -> Result<(), CoreError> {
    let source = match mode {
        GimbalMode::ZeroForce => {
            axis.disable();
            return Ok(());
        }
        GimbalMode::Free => FeedbackSource::Motor,
        GimbalMode::Gyro => FeedbackSource::External {
            angle: external.0,
            speed: external.1,
        },
    };
    axis.set_feedback_source(source);
    axis.select_loop_stage(StageMask::ANGLE | StageMask::SPEED | StageMask::CURRENT);
    axis.enable();
    axis.set_reference(target)
}

fn yaw_feedback(yaw: &dyn ActuatorDriver, feedback: &mut GimbalFeedback) {
    let motor = yaw.feedback();
    feedback.yaw_motor_angle = motor.single_round_angle;
    feedback.yaw_total_angle = motor.angle;
    feedback.yaw_speed = motor.speed;
}

fn attitude_feedback(attitude: Attitude, feedback: &mut GimbalFeedback) {
    feedback.imu_yaw = attitude.yaw;
    feedback.imu_yaw_speed = attitude.yaw_speed;
    feedback.pitch_angle = attitude.pitch;
}

impl SubsystemController for GimbalController {
    fn name(&self) -> &'static str {
        "gimbal"
    }

    fn tick(&mut self) -> Result<(), CoreError> {
        let mut feedback = GimbalFeedback::default();
        let outcome = match &mut self.axes {
            Axes::Both {
                commands,
                yaw,
                pitch,
                imu,
            } => {
                let cmd = commands.fetch();
                let attitude = imu.attitude();
                let yaw_result = drive_axis(
                    yaw.as_mut(),
                    cmd.gimbal_mode,
                    cmd.yaw,
                    (attitude.yaw, attitude.yaw_speed),
                );
                let pitch_result = drive_axis(
                    pitch.as_mut(),
                    cmd.gimbal_mode,
                    cmd.pitch,
                    (attitude.pitch, attitude.pitch_speed),
                );
                yaw_feedback(yaw.as_ref(), &mut feedback);
                attitude_feedback(attitude, &mut feedback);
                feedback.gimbal_mode = cmd.gimbal_mode;
                yaw_result.and(pitch_result)
            }
            Axes::Yaw { commands, yaw } => {
                let cmd = commands.fetch();
                let mut mode = cmd.gimbal_mode;
                if mode == GimbalMode::Gyro && cmd.is_init == 0 {
                    debug!("gyro yaw requested without relayed attitude; releasing yaw");
                    mode = GimbalMode::ZeroForce;
                }
                let result = drive_axis(yaw.as_mut(), mode, cmd.yaw, (cmd.up_yaw, cmd.up_speed));
                yaw_feedback(yaw.as_ref(), &mut feedback);
                feedback.imu_yaw = cmd.up_yaw;
                feedback.imu_yaw_speed = cmd.up_speed;
                feedback.gimbal_mode = mode;
                result
            }
            Axes::Pitch {
                commands,
                pitch,
                imu,
            } => {
                let cmd = commands.fetch();
                let attitude = imu.attitude();
                let result = drive_axis(
                    pitch.as_mut(),
                    cmd.gimbal_mode,
                    cmd.pitch,
                    (attitude.pitch, attitude.pitch_speed),
                );
                attitude_feedback(attitude, &mut feedback);
                feedback.gimbal_mode = cmd.gimbal_mode;
                result
            }
        };
        self.note_mode(feedback.gimbal_mode);
        self.feedback.publish(feedback);
        outcome
    }
}

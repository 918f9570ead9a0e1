//! Command, feedback and link payloads carried over the mailbox bus.
//!
//! All payloads are plain `Copy` values whose [`Default`] is the all-zero,
//! safe state.

use serde::{Deserialize, Serialize};

use crate::modes::{ChassisMode, FrictionMode, GimbalMode, LidMode, LoaderMode, ShootMode};

/// Dispatcher → chassis controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChassisCommand {
    /// Forward velocity.
    pub vx: f32,
    /// Lateral velocity.
    pub vy: f32,
    /// Rotation rate; overridden by the controller for every mode but
    /// `NoFollow`.
    pub wz: f32,
    /// Angle between chassis front and the gimbal's aligned position, degrees.
    pub offset_angle: f32,
    pub chassis_mode: ChassisMode,
    pub speed_buff_level: i32,
}

/// Dispatcher → gimbal controller when one board drives both axes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GimbalCommand {
    pub yaw: f32,
    pub pitch: f32,
    pub chassis_rotate_wz: f32,
    pub gimbal_mode: GimbalMode,
}

/// Yaw-axis command used when the boards are split. Also the first member of
/// [`UplinkFrame`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GimbalYawCommand {
    /// Target yaw, degrees.
    pub yaw: f32,
    /// Attitude-sensor yaw measured on the gimbal board.
    pub up_yaw: f32,
    /// Attitude-sensor yaw rate measured on the gimbal board.
    pub up_speed: f32,
    /// Non-zero once the gimbal board has a valid attitude estimate.
    pub is_init: u8,
    pub gimbal_mode: GimbalMode,
}

/// Pitch-axis command used when the boards are split. The only member of
/// [`DownlinkFrame`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GimbalPitchCommand {
    pub pitch: f32,
    pub gimbal_mode: GimbalMode,
}

/// Dispatcher → shooter controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ShootCommand {
    pub shoot_mode: ShootMode,
    pub loader_mode: LoaderMode,
    pub lid_mode: LidMode,
    pub friction_mode: FrictionMode,
    /// Remaining heat budget reported by the referee system.
    pub rest_heat: u16,
    /// Burst-fire rate, shots per second.
    pub shoot_rate: f32,
    /// Wrapping pulse counter; each increment requests one single/triple shot.
    pub trigger_seq: u16,
}

/// Chassis controller → bus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChassisFeedback {
    /// Wheel speed references in `lf, rf, lb, rb` order.
    pub wheel_refs: [f32; 4],
    pub chassis_mode: ChassisMode,
}

/// Gimbal controller → bus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GimbalFeedback {
    /// Yaw motor encoder angle within one revolution, degrees.
    pub yaw_motor_angle: f32,
    /// Yaw motor multi-turn angle, degrees.
    pub yaw_total_angle: f32,
    pub yaw_speed: f32,
    pub pitch_angle: f32,
    /// Attitude-sensor yaw, degrees.
    pub imu_yaw: f32,
    pub imu_yaw_speed: f32,
    pub gimbal_mode: GimbalMode,
}

/// Shooter controller → bus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ShootFeedback {
    /// Loader mode after safety gating.
    pub loader_mode_applied: LoaderMode,
    pub limit_switch_closed: bool,
    /// Set on cycles where a firing request was downgraded for heat.
    pub heat_fault: bool,
    /// Projectiles fed since start-up; burst shots are counted at the
    /// commanded rate.
    pub shots_fired: u32,
}

/// Gimbal board → chassis board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UplinkFrame {
    pub yaw_cmd: GimbalYawCommand,
    /// Measured gimbal yaw, degrees.
    pub yaw: f32,
    /// Measured gimbal yaw rate.
    pub yaw_speed: f32,
}

/// Chassis board → gimbal board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DownlinkFrame {
    pub pitch_cmd: GimbalPitchCommand,
}

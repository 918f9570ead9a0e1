//! Closed, mutually-exclusive operating modes.
//!
//! Every enum uses discriminant `0` for its fail-safe value, and that value is
//! also its [`Default`], so a never-published mailbox slot always reads as
//! "stationary and disarmed".

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

/// Whole-robot run state, latched by the operator's emergency-stop gesture.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    IntoPrimitive,
    TryFromPrimitive,
)]
#[repr(u8)]
pub enum RobotStatus {
    #[default]
    Stop = 0,
    Ready = 1,
}

/// Health of the input feeds a board's dispatcher depends on.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    IntoPrimitive,
    TryFromPrimitive,
)]
#[repr(u8)]
pub enum AppStatus {
    /// A required feed exceeded its staleness timeout.
    #[default]
    Offline = 0,
    Online = 1,
    /// A required feed delivered a malformed snapshot.
    Error = 2,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    IntoPrimitive,
    TryFromPrimitive,
)]
#[repr(u8)]
pub enum ChassisMode {
    /// Zero current on every wheel.
    #[default]
    ZeroForce = 0,
    /// Continuous spin ("gyro" / small-top mode).
    Rotate = 1,
    /// Free translation, no rotation.
    NoFollow = 2,
    /// Rotation closes the angle between chassis and gimbal yaw.
    FollowGimbalYaw = 3,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    IntoPrimitive,
    TryFromPrimitive,
)]
#[repr(u8)]
pub enum GimbalMode {
    #[default]
    ZeroForce = 0,
    /// Angle loop closed on the motor's own encoder.
    Free = 1,
    /// Angle loop closed on the attitude sensor.
    Gyro = 2,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    IntoPrimitive,
    TryFromPrimitive,
)]
#[repr(u8)]
pub enum ShootMode {
    #[default]
    Off = 0,
    On = 1,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    IntoPrimitive,
    TryFromPrimitive,
)]
#[repr(u8)]
pub enum LoaderMode {
    #[default]
    Stop = 0,
    Reverse = 1,
    OneRound = 2,
    ThreeRound = 3,
    Burst = 4,
}

impl LoaderMode {
    /// Whether this mode consumes heat budget when honoured.
    pub fn is_firing(self) -> bool {
        matches!(self, Self::OneRound | Self::ThreeRound | Self::Burst)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    IntoPrimitive,
    TryFromPrimitive,
)]
#[repr(u8)]
pub enum LidMode {
    #[default]
    Open = 0,
    Close = 1,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    IntoPrimitive,
    TryFromPrimitive,
)]
#[repr(u8)]
pub enum FrictionMode {
    #[default]
    Off = 0,
    On = 1,
}

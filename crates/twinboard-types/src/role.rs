//! Startup-time board role descriptor.
//!
//! A process reads these choices once at initialisation; nothing in the
//! control path branches on them per cycle except through the implementations
//! they select.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which half of the (possibly split) robot this process runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoardRole {
    /// One board drives chassis, both gimbal axes and the shooter.
    Full,
    /// Lower board: operator input, chassis, gimbal yaw, shooter.
    #[default]
    ChassisSide,
    /// Upper board: vision input, attitude sensor, gimbal pitch.
    GimbalSide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChassisKinematics {
    #[default]
    Omni,
    Mecanum,
}

/// How the vision host is attached, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VisionTransport {
    #[default]
    VirtualSerial,
    HardwareUart,
    Absent,
}

/// Which receiver carries the operator's commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperatorLink {
    /// Handheld transmitter: sticks, switches, dial, plus keyboard and mouse.
    #[default]
    Remote,
    /// Keyboard and mouse relayed by the video transmitter.
    VideoLink,
}

/// Fixed-for-the-process-lifetime description of what this board is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleDescriptor {
    pub role: BoardRole,
    pub kinematics: ChassisKinematics,
    pub vision: VisionTransport,
    pub operator_link: OperatorLink,
}

impl RoleDescriptor {
    pub fn has_operator_input(&self) -> bool {
        matches!(self.role, BoardRole::Full | BoardRole::ChassisSide)
    }

    /// Vision is only sampled on boards that both own the aiming axes' target
    /// and have a transport configured.
    pub fn has_vision_input(&self) -> bool {
        matches!(self.role, BoardRole::Full | BoardRole::GimbalSide)
            && self.vision != VisionTransport::Absent
    }

    /// Operator commands arrive on the handheld transmitter's receiver.
    pub fn has_remote_receiver(&self) -> bool {
        self.has_operator_input() && self.operator_link == OperatorLink::Remote
    }

    /// Operator commands arrive over the video transmitter.
    pub fn has_video_link(&self) -> bool {
        self.has_operator_input() && self.operator_link == OperatorLink::VideoLink
    }

    pub fn has_chassis(&self) -> bool {
        matches!(self.role, BoardRole::Full | BoardRole::ChassisSide)
    }

    /// Pitch motor and attitude sensor live here.
    pub fn has_pitch_axis(&self) -> bool {
        matches!(self.role, BoardRole::Full | BoardRole::GimbalSide)
    }

    pub fn has_shooter(&self) -> bool {
        matches!(self.role, BoardRole::Full | BoardRole::ChassisSide)
    }

    pub fn is_split(&self) -> bool {
        self.role != BoardRole::Full
    }
}

impl fmt::Display for BoardRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardRole::Full => write!(f, "full"),
            BoardRole::ChassisSide => write!(f, "chassis-side"),
            BoardRole::GimbalSide => write!(f, "gimbal-side"),
        }
    }
}

impl FromStr for BoardRole {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" | "one-board" => Ok(Self::Full),
            "chassis-side" | "chassis" => Ok(Self::ChassisSide),
            "gimbal-side" | "gimbal" => Ok(Self::GimbalSide),
            other => Err(ConfigError::Invalid(format!("unknown board role '{other}'"))),
        }
    }
}

impl fmt::Display for ChassisKinematics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChassisKinematics::Omni => write!(f, "omni"),
            ChassisKinematics::Mecanum => write!(f, "mecanum"),
        }
    }
}

impl FromStr for ChassisKinematics {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "omni" => Ok(Self::Omni),
            "mecanum" => Ok(Self::Mecanum),
            other => Err(ConfigError::Invalid(format!(
                "unknown chassis kinematics '{other}'"
            ))),
        }
    }
}

impl fmt::Display for VisionTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VisionTransport::VirtualSerial => write!(f, "virtual-serial"),
            VisionTransport::HardwareUart => write!(f, "hardware-uart"),
            VisionTransport::Absent => write!(f, "absent"),
        }
    }
}

impl FromStr for VisionTransport {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "virtual-serial" | "vcp" => Ok(Self::VirtualSerial),
            "hardware-uart" | "uart" => Ok(Self::HardwareUart),
            "absent" | "none" => Ok(Self::Absent),
            other => Err(ConfigError::Invalid(format!(
                "unknown vision transport '{other}'"
            ))),
        }
    }
}

impl fmt::Display for OperatorLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorLink::Remote => write!(f, "remote"),
            OperatorLink::VideoLink => write!(f, "video-link"),
        }
    }
}

impl FromStr for OperatorLink {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" | "rc" => Ok(Self::Remote),
            "video-link" | "video" => Ok(Self::VideoLink),
            other => Err(ConfigError::Invalid(format!(
                "unknown operator link '{other}'"
            ))),
        }
    }
}

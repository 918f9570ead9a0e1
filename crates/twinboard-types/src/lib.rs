//! `twinboard-types` – shared vocabulary of the twin-board control core.
//!
//! Everything that crosses a task or board boundary is defined here: the
//! per-subsystem mode enums, the command and feedback payloads that live in
//! mailbox slots, the link frames, the raw input snapshots, the startup role
//! descriptor and the error taxonomy.

pub mod command;
pub mod error;
pub mod input;
pub mod modes;
pub mod role;

pub use command::{
    ChassisCommand, ChassisFeedback, DownlinkFrame, GimbalCommand, GimbalFeedback,
    GimbalPitchCommand, GimbalYawCommand, ShootCommand, ShootFeedback, UplinkFrame,
};
pub use error::{ConfigError, CoreError, InputFault, LinkError, SafetyFault};
pub use input::{
    KeyMask, OperatorInput, Snapshot, SwitchPosition, VideoLinkInput, VisionInput, STICK_RANGE,
};
pub use modes::{
    AppStatus, ChassisMode, FrictionMode, GimbalMode, LidMode, LoaderMode, RobotStatus, ShootMode,
};
pub use role::{BoardRole, ChassisKinematics, OperatorLink, RoleDescriptor, VisionTransport};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_descriptor_toml_style_roundtrip() {
        let desc = RoleDescriptor {
            role: BoardRole::GimbalSide,
            kinematics: ChassisKinematics::Mecanum,
            vision: VisionTransport::HardwareUart,
            operator_link: OperatorLink::VideoLink,
        };
        let json = serde_json::to_string(&desc).unwrap();
        assert!(json.contains("gimbal-side"));
        assert!(json.contains("hardware-uart"));
        assert!(json.contains("video-link"));
        let back: RoleDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(desc, back);
    }

    #[test]
    fn default_commands_are_safe() {
        let chassis = ChassisCommand::default();
        let gimbal = GimbalCommand::default();
        let shoot = ShootCommand::default();
        assert_eq!(chassis.chassis_mode, ChassisMode::ZeroForce);
        assert_eq!(gimbal.gimbal_mode, GimbalMode::ZeroForce);
        assert_eq!(shoot.shoot_mode, ShootMode::Off);
        assert_eq!(shoot.loader_mode, LoaderMode::Stop);
        assert_eq!(shoot.friction_mode, FrictionMode::Off);
        assert_eq!(chassis.vx, 0.0);
    }

    #[test]
    fn shoot_command_json_roundtrip() {
        let cmd = ShootCommand {
            shoot_mode: ShootMode::On,
            loader_mode: LoaderMode::Burst,
            lid_mode: LidMode::Close,
            friction_mode: FrictionMode::On,
            rest_heat: 120,
            shoot_rate: 8.0,
            trigger_seq: 3,
        };
        let json = serde_json::to_string(&cmd).unwrap();
        let back: ShootCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(cmd, back);
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::SizeMismatch {
            topic: "chassis_cmd".to_string(),
            registered: 24,
            requested: 16,
        };
        assert!(err.to_string().contains("chassis_cmd"));

        let err: CoreError = LinkError::TransportBusy.into();
        assert!(err.to_string().contains("cannot accept"));
    }
}

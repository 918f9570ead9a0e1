//! [`SimBoard`] – a full set of simulated peripherals for one board.
//!
//! Every handle is a cheap clone of the driver handed to the board, so a
//! test or the CLI keeps full control after wiring: push operator frames,
//! tilt the IMU, close the limit switch, read back actuator state.
//!
//! ```rust
//! use twinboard_runtime::board::{Board, BoardConfig};
//! use twinboard_runtime::simulation::SimBoard;
//!
//! let config = BoardConfig::default();
//! let sim = SimBoard::new(config.descriptor());
//! let mut board = Board::new(&config, sim.io()).unwrap();
//! board.tick();
//! ```

use twinboard_hal::sim::{SimActuator, SimAttitude, SimInput, SimLid, SimLimitSwitch};
use twinboard_types::{OperatorInput, RoleDescriptor, VideoLinkInput, VisionInput};

use crate::board::BoardIo;
use crate::controllers::{ChassisWheels, ShooterActuators};

#[derive(Debug, Clone)]
pub struct SimShooter {
    pub friction_left: SimActuator,
    pub friction_right: SimActuator,
    pub loader: SimActuator,
    pub friction_limit: SimActuator,
    pub lid: SimLid,
    pub limit_switch: SimLimitSwitch,
}

impl SimShooter {
    fn new() -> Self {
        Self {
            friction_left: SimActuator::new("friction_left"),
            friction_right: SimActuator::new("friction_right"),
            loader: SimActuator::new("loader"),
            friction_limit: SimActuator::new("friction_limit"),
            lid: SimLid::new(),
            limit_switch: SimLimitSwitch::new(),
        }
    }

    fn actuators(&self) -> ShooterActuators {
        ShooterActuators {
            friction_left: Box::new(self.friction_left.clone()),
            friction_right: Box::new(self.friction_right.clone()),
            loader: Box::new(self.loader.clone()),
            friction_limit: Box::new(self.friction_limit.clone()),
            lid: Box::new(self.lid.clone()),
            limit_switch: Box::new(self.limit_switch.clone()),
        }
    }
}

/// Simulated peripherals for the role in `descriptor`.
#[derive(Debug, Clone)]
pub struct SimBoard {
    descriptor: RoleDescriptor,
    pub operator: SimInput<OperatorInput>,
    pub video_link: SimInput<VideoLinkInput>,
    pub vision: SimInput<VisionInput>,
    /// Left-front, right-front, left-back, right-back.
    pub wheels: [SimActuator; 4],
    pub yaw: SimActuator,
    pub pitch: SimActuator,
    pub imu: SimAttitude,
    pub shooter: SimShooter,
}

impl SimBoard {
    pub fn new(descriptor: RoleDescriptor) -> Self {
        Self {
            descriptor,
            operator: SimInput::new(),
            video_link: SimInput::new(),
            vision: SimInput::new(),
            wheels: [
                SimActuator::new("wheel_lf"),
                SimActuator::new("wheel_rf"),
                SimActuator::new("wheel_lb"),
                SimActuator::new("wheel_rb"),
            ],
            yaw: SimActuator::new("yaw"),
            pitch: SimActuator::new("pitch"),
            imu: SimAttitude::new(),
            shooter: SimShooter::new(),
        }
    }

    /// A [`BoardIo`] holding only what the role uses. The link is left
    /// unset; split-board callers plug in their transport.
    pub fn io(&self) -> BoardIo {
        let d = &self.descriptor;
        let [lf, rf, lb, rb] = self.wheels.clone();
        BoardIo {
            operator: d
                .has_remote_receiver()
                .then(|| Box::new(self.operator.clone()) as _),
            video_link: d
                .has_video_link()
                .then(|| Box::new(self.video_link.clone()) as _),
            vision: d
                .has_vision_input()
                .then(|| Box::new(self.vision.clone()) as _),
            wheels: d.has_chassis().then(|| ChassisWheels {
                lf: Box::new(lf),
                rf: Box::new(rf),
                lb: Box::new(lb),
                rb: Box::new(rb),
            }),
            yaw: d.has_chassis().then(|| Box::new(self.yaw.clone()) as _),
            pitch: d
                .has_pitch_axis()
                .then(|| Box::new(self.pitch.clone()) as _),
            imu: d.has_pitch_axis().then(|| Box::new(self.imu.clone()) as _),
            shooter: d.has_shooter().then(|| self.shooter.actuators()),
            link: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twinboard_types::{BoardRole, ChassisKinematics, OperatorLink, VisionTransport};

    fn descriptor(role: BoardRole) -> RoleDescriptor {
        RoleDescriptor {
            role,
            kinematics: ChassisKinematics::Mecanum,
            vision: VisionTransport::VirtualSerial,
            operator_link: OperatorLink::Remote,
        }
    }

    #[test]
    fn gimbal_side_io_has_no_chassis_hardware() {
        let io = SimBoard::new(descriptor(BoardRole::GimbalSide)).io();
        assert!(io.wheels.is_none());
        assert!(io.shooter.is_none());
        assert!(io.operator.is_none());
        assert!(io.pitch.is_some());
        assert!(io.imu.is_some());
    }

    #[test]
    fn chassis_side_io_has_no_pitch_or_imu() {
        let io = SimBoard::new(descriptor(BoardRole::ChassisSide)).io();
        assert!(io.wheels.is_some());
        assert!(io.yaw.is_some());
        assert!(io.pitch.is_none());
        assert!(io.imu.is_none());
    }

    #[test]
    fn full_io_has_everything_but_a_link() {
        let io = SimBoard::new(descriptor(BoardRole::Full)).io();
        assert!(io.operator.is_some() && io.vision.is_some());
        assert!(io.wheels.is_some() && io.shooter.is_some());
        assert!(io.yaw.is_some() && io.pitch.is_some() && io.imu.is_some());
        assert!(io.link.is_none());
    }

    #[test]
    fn absent_vision_still_wires_the_pitch_axis() {
        let mut d = descriptor(BoardRole::Full);
        d.vision = VisionTransport::Absent;
        let io = SimBoard::new(d).io();
        assert!(io.vision.is_none());
        assert!(io.pitch.is_some() && io.imu.is_some());
    }

    #[test]
    fn video_link_replaces_the_remote_receiver() {
        let mut d = descriptor(BoardRole::ChassisSide);
        d.operator_link = OperatorLink::VideoLink;
        let io = SimBoard::new(d).io();
        assert!(io.operator.is_none());
        assert!(io.video_link.is_some());
    }
}

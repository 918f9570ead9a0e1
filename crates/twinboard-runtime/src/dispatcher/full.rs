//! Single-board rules: one controller runs every subsystem.

use twinboard_hal::input::InputSource;
use twinboard_kernel::FeedWatchdog;
use twinboard_middleware::{MailboxBus, Publisher, Subscriber};
use twinboard_types::{
    AppStatus, BoardRole, ChassisCommand, ConfigError, GimbalCommand, GimbalFeedback,
    OperatorInput, RobotStatus, ShootCommand, ShootFeedback, VisionInput,
};

use super::{
    poll_operator, poll_vision, safe_shoot, wrap_degrees, CycleStatus, DispatcherConfig,
    MappingRules, OperatorMapper, OPERATOR_FEED, VISION_FEED,
};
use crate::heat::HeatModel;
use crate::topics;

/// Command topics owned by the full-board dispatcher. Registered before the
/// controllers so they can subscribe.
pub struct FullOutputs {
    chassis: Publisher<ChassisCommand>,
    gimbal: Publisher<GimbalCommand>,
    shoot: Publisher<ShootCommand>,
}

impl FullOutputs {
    pub fn register(bus: &mut MailboxBus) -> Result<Self, ConfigError> {
        Ok(Self {
            chassis: bus.register(topics::CHASSIS_CMD)?,
            gimbal: bus.register(topics::GIMBAL_CMD)?,
            shoot: bus.register(topics::SHOOT_CMD)?,
        })
    }
}

pub struct FullRules {
    out: FullOutputs,
    operator: Box<dyn InputSource<OperatorInput>>,
    vision: Option<Box<dyn InputSource<VisionInput>>>,
    watchdog: FeedWatchdog,
    mapper: OperatorMapper,
    heat: HeatModel,
    gimbal_feed: Subscriber<GimbalFeedback>,
    shoot_feed: Subscriber<ShootFeedback>,
    yaw_align_angle: f32,
}

impl FullRules {
    pub fn new(
        bus: &MailboxBus,
        out: FullOutputs,
        operator: Box<dyn InputSource<OperatorInput>>,
        vision: Option<Box<dyn InputSource<VisionInput>>>,
        config: &DispatcherConfig,
        heat: HeatModel,
    ) -> Result<Self, ConfigError> {
        let mut watchdog = FeedWatchdog::new();
        watchdog.register(OPERATOR_FEED, config.operator_stale_cycles);
        if vision.is_some() {
            watchdog.register(VISION_FEED, config.vision_stale_cycles);
        }
        Ok(Self {
            out,
            operator,
            vision,
            watchdog,
            mapper: OperatorMapper::new(config),
            heat,
            gimbal_feed: bus.subscribe(topics::GIMBAL_FEED)?,
            shoot_feed: bus.subscribe(topics::SHOOT_FEED)?,
            yaw_align_angle: config.yaw_align_angle,
        })
    }

    fn publish_defaults(&self, offset_angle: f32, rest_heat: u16) {
        self.out.chassis.publish(ChassisCommand {
            offset_angle,
            ..Default::default()
        });
        self.out.gimbal.publish(GimbalCommand::default());
        self.out
            .shoot
            .publish(safe_shoot(self.mapper.trigger_seq(), rest_heat));
    }
}

impl MappingRules for FullRules {
    fn role(&self) -> BoardRole {
        BoardRole::Full
    }

    fn dispatch(&mut self) -> CycleStatus {
        let gimbal = self.gimbal_feed.fetch();
        let rest_heat = self.heat.update(self.shoot_feed.fetch().shots_fired);
        let (app_status, input) = poll_operator(self.operator.as_mut(), &mut self.watchdog);
        let aim = poll_vision(self.vision.as_deref_mut(), &mut self.watchdog);
        let offset_angle = wrap_degrees(gimbal.yaw_motor_angle - self.yaw_align_angle);

        if app_status != AppStatus::Online {
            self.mapper.reset_edges(&input);
            self.mapper.hold(gimbal.imu_yaw, gimbal.pitch_angle);
            self.publish_defaults(offset_angle, rest_heat);
            return CycleStatus {
                app_status,
                robot_status: self.mapper.robot_status(),
                remote_fresh: None,
            };
        }

        let intent = self.mapper.map(&input, aim);
        if intent.robot_status == RobotStatus::Stop {
            self.mapper.hold(gimbal.imu_yaw, gimbal.pitch_angle);
            self.publish_defaults(offset_angle, rest_heat);
        } else {
            self.out.chassis.publish(ChassisCommand {
                vx: intent.vx,
                vy: intent.vy,
                wz: 0.0,
                offset_angle,
                chassis_mode: intent.chassis_mode,
                speed_buff_level: intent.speed_buff_level,
            });
            self.out.gimbal.publish(GimbalCommand {
                yaw: intent.yaw,
                pitch: intent.pitch,
                chassis_rotate_wz: 0.0,
                gimbal_mode: intent.gimbal_mode,
            });
            self.out.shoot.publish(ShootCommand {
                rest_heat,
                ..intent.shoot
            });
        }
        CycleStatus {
            app_status,
            robot_status: intent.robot_status,
            remote_fresh: None,
        }
    }

    fn publish_safe(&mut self) {
        let offset_angle =
            wrap_degrees(self.gimbal_feed.fetch().yaw_motor_angle - self.yaw_align_angle);
        self.publish_defaults(offset_angle, self.heat.rest_heat());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heat::HeatConfig;
    use twinboard_hal::sim::SimInput;
    use twinboard_types::{
        ChassisMode, FrictionMode, GimbalMode, LoaderMode, ShootMode, SwitchPosition,
    };

    struct Rig {
        bus: MailboxBus,
        rules: FullRules,
        operator: SimInput<OperatorInput>,
        vision: SimInput<VisionInput>,
        gimbal_fb: Publisher<GimbalFeedback>,
        _shoot_fb: Publisher<ShootFeedback>,
    }

    fn rig() -> Rig {
        let config = DispatcherConfig {
            operator_stale_cycles: 3,
            ..Default::default()
        };
        let mut bus = MailboxBus::new();
        let out = FullOutputs::register(&mut bus).unwrap();
        let gimbal_fb = bus.register::<GimbalFeedback>(topics::GIMBAL_FEED).unwrap();
        let shoot_fb = bus.register::<ShootFeedback>(topics::SHOOT_FEED).unwrap();
        let operator = SimInput::new();
        let vision = SimInput::new();
        let rules = FullRules::new(
            &bus,
            out,
            Box::new(operator.clone()),
            Some(Box::new(vision.clone())),
            &config,
            HeatModel::new(&HeatConfig::default(), 10, config.rate_hz),
        )
        .unwrap();
        Rig {
            bus,
            rules,
            operator,
            vision,
            gimbal_fb,
            _shoot_fb: shoot_fb,
        }
    }

    fn armed_follow() -> OperatorInput {
        OperatorInput {
            switch_left: SwitchPosition::Down,
            switch_right: SwitchPosition::Down,
            ..Default::default()
        }
    }

    #[test]
    fn online_operator_drives_all_commands() {
        let mut rig = rig();
        let chassis = rig.bus.subscribe::<ChassisCommand>(topics::CHASSIS_CMD).unwrap();
        let gimbal = rig.bus.subscribe::<GimbalCommand>(topics::GIMBAL_CMD).unwrap();
        let shoot = rig.bus.subscribe::<ShootCommand>(topics::SHOOT_CMD).unwrap();

        let mut input = OperatorInput {
            switch_left: SwitchPosition::Mid,
            switch_right: SwitchPosition::Down,
            right_stick_y: 300,
            dial: -200,
            ..Default::default()
        };
        input.left_stick_x = 0;
        rig.operator.push(input);
        let status = rig.rules.dispatch();
        assert_eq!(status.app_status, AppStatus::Online);

        let c = chassis.fetch();
        assert_eq!(c.chassis_mode, ChassisMode::FollowGimbalYaw);
        assert_eq!(c.vy, 3000.0);
        assert_eq!(gimbal.fetch().gimbal_mode, GimbalMode::Gyro);
        let s = shoot.fetch();
        assert_eq!(s.friction_mode, FrictionMode::On);
        assert_eq!(s.shoot_mode, ShootMode::On);
        assert_eq!(s.rest_heat, 200);
    }

    #[test]
    fn input_loss_forces_safe_defaults_within_window() {
        let mut rig = rig();
        let chassis = rig.bus.subscribe::<ChassisCommand>(topics::CHASSIS_CMD).unwrap();
        let gimbal = rig.bus.subscribe::<GimbalCommand>(topics::GIMBAL_CMD).unwrap();
        let shoot = rig.bus.subscribe::<ShootCommand>(topics::SHOOT_CMD).unwrap();

        let mut input = armed_follow();
        input.switch_left = SwitchPosition::Mid;
        input.dial = -200;
        rig.operator.push(input);
        rig.rules.dispatch();
        assert_eq!(chassis.fetch().chassis_mode, ChassisMode::FollowGimbalYaw);

        // Transmitter goes silent. Window is 3 cycles.
        assert_eq!(rig.rules.dispatch().app_status, AppStatus::Online);
        assert_eq!(rig.rules.dispatch().app_status, AppStatus::Online);
        assert_eq!(rig.rules.dispatch().app_status, AppStatus::Offline);

        assert_eq!(chassis.fetch().chassis_mode, ChassisMode::ZeroForce);
        assert_eq!(gimbal.fetch().gimbal_mode, GimbalMode::ZeroForce);
        let s = shoot.fetch();
        assert_eq!(s.shoot_mode, ShootMode::Off);
        assert_eq!(s.loader_mode, LoaderMode::Stop);
        assert_eq!(s.friction_mode, FrictionMode::Off);
    }

    #[test]
    fn malformed_frame_is_not_mapped_on_later_cycles() {
        let mut rig = rig();
        let chassis = rig.bus.subscribe::<ChassisCommand>(topics::CHASSIS_CMD).unwrap();
        let gimbal = rig.bus.subscribe::<GimbalCommand>(topics::GIMBAL_CMD).unwrap();
        let shoot = rig.bus.subscribe::<ShootCommand>(topics::SHOOT_CMD).unwrap();

        rig.operator.push(OperatorInput {
            switch_left: SwitchPosition::Mid,
            switch_right: SwitchPosition::Mid,
            dial: -200,
            ..Default::default()
        });
        assert_eq!(rig.rules.dispatch().app_status, AppStatus::Online);
        assert_eq!(shoot.fetch().friction_mode, FrictionMode::On);

        rig.operator.push(OperatorInput {
            switch_left: SwitchPosition::Mid,
            switch_right: SwitchPosition::Mid,
            right_stick_x: 32000,
            dial: -200,
            ..Default::default()
        });
        // Stale window is 3 cycles; run past it.
        for cycle in 0..6 {
            let status = rig.rules.dispatch();
            assert_ne!(status.app_status, AppStatus::Online, "cycle {cycle}");
            let c = chassis.fetch();
            assert_eq!(c.chassis_mode, ChassisMode::ZeroForce, "cycle {cycle}");
            assert_eq!((c.vx, c.vy), (0.0, 0.0), "cycle {cycle}");
            assert_eq!(gimbal.fetch().gimbal_mode, GimbalMode::ZeroForce);
            let s = shoot.fetch();
            assert_eq!(s.shoot_mode, ShootMode::Off, "cycle {cycle}");
            assert_eq!(s.friction_mode, FrictionMode::Off, "cycle {cycle}");
            assert_eq!(s.loader_mode, LoaderMode::Stop, "cycle {cycle}");
        }
    }

    #[test]
    fn emergency_stop_forces_safe_defaults_while_online() {
        let mut rig = rig();
        let chassis = rig.bus.subscribe::<ChassisCommand>(topics::CHASSIS_CMD).unwrap();
        rig.operator.push(armed_follow());
        let status = rig.rules.dispatch();
        assert_eq!(status.app_status, AppStatus::Online);
        assert_eq!(status.robot_status, RobotStatus::Stop);
        assert_eq!(chassis.fetch().chassis_mode, ChassisMode::ZeroForce);
    }

    #[test]
    fn vision_target_used_with_left_switch_mid() {
        let mut rig = rig();
        let gimbal = rig.bus.subscribe::<GimbalCommand>(topics::GIMBAL_CMD).unwrap();
        rig.vision.push(VisionInput {
            target_found: true,
            yaw: 15.0,
            pitch: 4.0,
            fire_advice: false,
        });
        rig.operator.push(OperatorInput {
            switch_left: SwitchPosition::Mid,
            switch_right: SwitchPosition::Down,
            ..Default::default()
        });
        rig.rules.dispatch();
        let cmd = gimbal.fetch();
        assert_eq!(cmd.yaw, 15.0);
        assert_eq!(cmd.pitch, 4.0);
    }

    #[test]
    fn offset_angle_follows_yaw_motor() {
        let mut rig = rig();
        let chassis = rig.bus.subscribe::<ChassisCommand>(topics::CHASSIS_CMD).unwrap();
        rig.gimbal_fb.publish(GimbalFeedback {
            yaw_motor_angle: 350.0,
            ..Default::default()
        });
        rig.operator.push(OperatorInput {
            switch_left: SwitchPosition::Down,
            switch_right: SwitchPosition::Mid,
            ..Default::default()
        });
        rig.rules.dispatch();
        assert!((chassis.fetch().offset_angle - -10.0).abs() < 1e-4);
    }
}

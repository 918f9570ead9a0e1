//! Lower-board rules of a split robot.
//!
//! The chassis side owns the transmitter, so every operator decision is made
//! here. It drives the chassis, the yaw motor and the shooter locally and
//! sends the pitch command up over the downlink. The uplink brings back the
//! upper board's attitude and its vision-proposed yaw; without it the yaw
//! axis has no sensor to close on and is released.

use std::sync::Arc;

use twinboard_hal::input::InputSource;
use twinboard_kernel::FeedWatchdog;
use twinboard_middleware::{LinkHealth, MailboxBus, Publisher, Subscriber};
use twinboard_types::{
    AppStatus, BoardRole, ChassisCommand, ChassisMode, ConfigError, DownlinkFrame,
    GimbalFeedback, GimbalMode, GimbalPitchCommand, GimbalYawCommand, OperatorInput,
    RobotStatus, ShootCommand, ShootFeedback, UplinkFrame,
};

use super::{
    poll_operator, safe_shoot, wrap_degrees, Aim, CycleStatus, DispatcherConfig, MappingRules,
    OperatorMapper, OPERATOR_FEED,
};
use crate::heat::HeatModel;
use crate::topics;

pub struct ChassisSideOutputs {
    chassis: Publisher<ChassisCommand>,
    yaw: Publisher<GimbalYawCommand>,
    shoot: Publisher<ShootCommand>,
    downlink: Publisher<DownlinkFrame>,
}

impl ChassisSideOutputs {
    pub fn register(bus: &mut MailboxBus) -> Result<Self, ConfigError> {
        Ok(Self {
            chassis: bus.register(topics::CHASSIS_CMD)?,
            yaw: bus.register(topics::GIMBAL_YAW_CMD)?,
            shoot: bus.register(topics::SHOOT_CMD)?,
            downlink: bus.register(topics::DOWNLINK_TX)?,
        })
    }
}

pub struct ChassisSideRules {
    out: ChassisSideOutputs,
    operator: Box<dyn InputSource<OperatorInput>>,
    watchdog: FeedWatchdog,
    mapper: OperatorMapper,
    heat: HeatModel,
    uplink: Subscriber<UplinkFrame>,
    uplink_health: Arc<LinkHealth>,
    gimbal_feed: Subscriber<GimbalFeedback>,
    shoot_feed: Subscriber<ShootFeedback>,
    yaw_align_angle: f32,
}

impl ChassisSideRules {
    pub fn new(
        bus: &MailboxBus,
        out: ChassisSideOutputs,
        operator: Box<dyn InputSource<OperatorInput>>,
        uplink_health: Arc<LinkHealth>,
        config: &DispatcherConfig,
        heat: HeatModel,
    ) -> Result<Self, ConfigError> {
        let mut watchdog = FeedWatchdog::new();
        watchdog.register(OPERATOR_FEED, config.operator_stale_cycles);
        Ok(Self {
            out,
            operator,
            watchdog,
            mapper: OperatorMapper::new(config),
            heat,
            uplink: bus.subscribe(topics::UPLINK_RX)?,
            uplink_health,
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
        self.out.yaw.publish(GimbalYawCommand::default());
        self.out
            .shoot
            .publish(safe_shoot(self.mapper.trigger_seq(), rest_heat));
        self.out.downlink.publish(DownlinkFrame::default());
    }
}

impl MappingRules for ChassisSideRules {
    fn role(&self) -> BoardRole {
        BoardRole::ChassisSide
    }

    fn dispatch(&mut self) -> CycleStatus {
        let remote_fresh = self.uplink_health.is_fresh();
        let uplink = self.uplink.fetch();
        let yaw_motor = self.gimbal_feed.fetch().yaw_motor_angle;
        let rest_heat = self.heat.update(self.shoot_feed.fetch().shots_fired);
        let (app_status, input) = poll_operator(self.operator.as_mut(), &mut self.watchdog);
        let offset_angle = wrap_degrees(yaw_motor - self.yaw_align_angle);

        // Vision pitch never reaches this board; the upper board applies it
        // to its own axis, so the proposed aim keeps the current pitch.
        let aim = (remote_fresh && uplink.yaw_cmd.is_init != 0).then(|| Aim {
            yaw: uplink.yaw_cmd.yaw,
            pitch: self.mapper.pitch(),
        });

        if app_status != AppStatus::Online {
            self.mapper.reset_edges(&input);
            self.mapper.hold(uplink.yaw, self.mapper.pitch());
            self.publish_defaults(offset_angle, rest_heat);
            return CycleStatus {
                app_status,
                robot_status: self.mapper.robot_status(),
                remote_fresh: Some(remote_fresh),
            };
        }

        let intent = self.mapper.map(&input, aim);
        if intent.robot_status == RobotStatus::Stop {
            self.mapper.hold(uplink.yaw, self.mapper.pitch());
            self.publish_defaults(offset_angle, rest_heat);
            return CycleStatus {
                app_status,
                robot_status: intent.robot_status,
                remote_fresh: Some(remote_fresh),
            };
        }

        let (chassis_mode, yaw_mode) = if remote_fresh {
            (intent.chassis_mode, intent.gimbal_mode)
        } else {
            // No attitude to follow or to close the yaw loop on.
            let chassis_mode = match intent.chassis_mode {
                ChassisMode::FollowGimbalYaw => ChassisMode::NoFollow,
                other => other,
            };
            (chassis_mode, GimbalMode::ZeroForce)
        };

        self.out.chassis.publish(ChassisCommand {
            vx: intent.vx,
            vy: intent.vy,
            wz: 0.0,
            offset_angle,
            chassis_mode,
            speed_buff_level: intent.speed_buff_level,
        });
        self.out.yaw.publish(GimbalYawCommand {
            yaw: intent.yaw,
            up_yaw: uplink.yaw,
            up_speed: uplink.yaw_speed,
            is_init: u8::from(remote_fresh),
            gimbal_mode: yaw_mode,
        });
        self.out.shoot.publish(ShootCommand {
            rest_heat,
            ..intent.shoot
        });
        self.out.downlink.publish(DownlinkFrame {
            pitch_cmd: GimbalPitchCommand {
                pitch: intent.pitch,
                gimbal_mode: intent.gimbal_mode,
            },
        });

        CycleStatus {
            app_status,
            robot_status: intent.robot_status,
            remote_fresh: Some(remote_fresh),
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
    use twinboard_middleware::{BridgeTopics, CrossBoardBridge, InboundPort, NullLink, WireFrame};
    use twinboard_types::SwitchPosition;

    struct Rig {
        bus: MailboxBus,
        rules: ChassisSideRules,
        bridge: CrossBoardBridge<DownlinkFrame, UplinkFrame>,
        uplink: InboundPort<UplinkFrame>,
        operator: SimInput<OperatorInput>,
        _feeds: (Publisher<GimbalFeedback>, Publisher<ShootFeedback>),
    }

    fn rig() -> Rig {
        let config = DispatcherConfig::default();
        let mut bus = MailboxBus::new();
        let out = ChassisSideOutputs::register(&mut bus).unwrap();
        let bridge = CrossBoardBridge::<DownlinkFrame, UplinkFrame>::new(
            &mut bus,
            BridgeTopics {
                outbound: topics::DOWNLINK_TX,
                inbound: topics::UPLINK_RX,
            },
            3,
            Box::new(NullLink),
        )
        .unwrap();
        let feeds = (
            bus.register::<GimbalFeedback>(topics::GIMBAL_FEED).unwrap(),
            bus.register::<ShootFeedback>(topics::SHOOT_FEED).unwrap(),
        );
        let operator = SimInput::new();
        let rules = ChassisSideRules::new(
            &bus,
            out,
            Box::new(operator.clone()),
            bridge.health(),
            &config,
            HeatModel::new(&HeatConfig::default(), 10, config.rate_hz),
        )
        .unwrap();
        Rig {
            uplink: bridge.inbound_port(),
            bus,
            rules,
            bridge,
            operator,
            _feeds: feeds,
        }
    }

    fn follow_input() -> OperatorInput {
        OperatorInput {
            switch_left: SwitchPosition::Mid,
            switch_right: SwitchPosition::Down,
            ..Default::default()
        }
    }

    #[test]
    fn stale_uplink_releases_yaw_and_drops_follow() {
        let mut rig = rig();
        let chassis = rig.bus.subscribe::<ChassisCommand>(topics::CHASSIS_CMD).unwrap();
        let yaw = rig.bus.subscribe::<GimbalYawCommand>(topics::GIMBAL_YAW_CMD).unwrap();

        rig.operator.push(follow_input());
        let status = rig.rules.dispatch();
        assert_eq!(status.app_status, AppStatus::Online);
        assert_eq!(status.remote_fresh, Some(false));
        assert_eq!(chassis.fetch().chassis_mode, ChassisMode::NoFollow);
        let cmd = yaw.fetch();
        assert_eq!(cmd.gimbal_mode, GimbalMode::ZeroForce);
        assert_eq!(cmd.is_init, 0);
    }

    #[test]
    fn fresh_uplink_closes_yaw_on_remote_attitude() {
        let mut rig = rig();
        let chassis = rig.bus.subscribe::<ChassisCommand>(topics::CHASSIS_CMD).unwrap();
        let yaw = rig.bus.subscribe::<GimbalYawCommand>(topics::GIMBAL_YAW_CMD).unwrap();

        let frame = UplinkFrame {
            yaw: 12.0,
            yaw_speed: 1.5,
            ..Default::default()
        };
        rig.uplink.on_frame(&frame.to_bytes()).unwrap();
        rig.operator.push(follow_input());
        let status = rig.rules.dispatch();
        assert_eq!(status.remote_fresh, Some(true));
        assert_eq!(chassis.fetch().chassis_mode, ChassisMode::FollowGimbalYaw);
        let cmd = yaw.fetch();
        assert_eq!(cmd.gimbal_mode, GimbalMode::Gyro);
        assert_eq!(cmd.up_yaw, 12.0);
        assert_eq!(cmd.up_speed, 1.5);
        assert_eq!(cmd.is_init, 1);
    }

    #[test]
    fn locked_remote_vision_sets_yaw_target() {
        let mut rig = rig();
        let yaw = rig.bus.subscribe::<GimbalYawCommand>(topics::GIMBAL_YAW_CMD).unwrap();
        let frame = UplinkFrame {
            yaw_cmd: GimbalYawCommand {
                yaw: 33.0,
                is_init: 1,
                gimbal_mode: GimbalMode::Gyro,
                ..Default::default()
            },
            ..Default::default()
        };
        rig.uplink.on_frame(&frame.to_bytes()).unwrap();
        rig.operator.push(follow_input());
        rig.rules.dispatch();
        assert_eq!(yaw.fetch().yaw, 33.0);
    }

    #[test]
    fn pitch_goes_out_on_the_downlink() {
        let mut rig = rig();
        let downlink = rig.bus.subscribe::<DownlinkFrame>(topics::DOWNLINK_TX).unwrap();
        rig.uplink
            .on_frame(&UplinkFrame::default().to_bytes())
            .unwrap();
        let input = OperatorInput {
            switch_left: SwitchPosition::Down,
            switch_right: SwitchPosition::Mid,
            left_stick_y: 500,
            ..Default::default()
        };
        rig.operator.push(input);
        rig.rules.dispatch();
        let frame = downlink.fetch();
        assert_eq!(frame.pitch_cmd.gimbal_mode, GimbalMode::Free);
        assert!((frame.pitch_cmd.pitch - 0.5).abs() < 1e-5);
    }

    #[test]
    fn uplink_goes_stale_after_window() {
        let mut rig = rig();
        rig.uplink
            .on_frame(&UplinkFrame::default().to_bytes())
            .unwrap();
        rig.operator.push(follow_input());
        for _ in 0..3 {
            assert_eq!(rig.rules.dispatch().remote_fresh, Some(true));
            rig.bridge.end_cycle();
            rig.operator.push(follow_input());
        }
        assert_eq!(rig.rules.dispatch().remote_fresh, Some(false));
    }

    #[test]
    fn malformed_frame_keeps_outputs_safe_across_stale_window() {
        let mut rig = rig();
        let chassis = rig.bus.subscribe::<ChassisCommand>(topics::CHASSIS_CMD).unwrap();
        let shoot = rig.bus.subscribe::<ShootCommand>(topics::SHOOT_CMD).unwrap();
        let downlink = rig.bus.subscribe::<DownlinkFrame>(topics::DOWNLINK_TX).unwrap();

        rig.operator.push(follow_input());
        assert_eq!(rig.rules.dispatch().app_status, AppStatus::Online);

        rig.operator.push(OperatorInput {
            right_stick_x: 32000,
            dial: -200,
            ..follow_input()
        });
        let window = DispatcherConfig::default().operator_stale_cycles;
        for cycle in 0..window + 3 {
            let status = rig.rules.dispatch();
            assert_ne!(status.app_status, AppStatus::Online, "cycle {cycle}");
            let c = chassis.fetch();
            assert_eq!(c.chassis_mode, ChassisMode::ZeroForce, "cycle {cycle}");
            assert_eq!((c.vx, c.vy), (0.0, 0.0), "cycle {cycle}");
            let s = shoot.fetch();
            assert_eq!(s.shoot_mode, twinboard_types::ShootMode::Off, "cycle {cycle}");
            assert_eq!(
                s.friction_mode,
                twinboard_types::FrictionMode::Off,
                "cycle {cycle}"
            );
            assert_eq!(downlink.fetch().pitch_cmd.gimbal_mode, GimbalMode::ZeroForce);
        }
    }

    #[test]
    fn operator_loss_disarms_everything_including_downlink() {
        let mut rig = rig();
        let shoot = rig.bus.subscribe::<ShootCommand>(topics::SHOOT_CMD).unwrap();
        let downlink = rig.bus.subscribe::<DownlinkFrame>(topics::DOWNLINK_TX).unwrap();
        let status = rig.rules.dispatch();
        assert_eq!(status.app_status, AppStatus::Offline);
        assert_eq!(downlink.fetch().pitch_cmd.gimbal_mode, GimbalMode::ZeroForce);
        assert_eq!(shoot.fetch().loader_mode, twinboard_types::LoaderMode::Stop);
    }
}

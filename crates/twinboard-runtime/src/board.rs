//! [`Board`] – everything one controller board runs, and its fixed-rate loop.
//!
//! A board owns its [`MailboxBus`], the [`Dispatcher`], the subsystem
//! controllers its role needs and, on split roles, its end of the
//! cross-board bridge. Nothing is global; two boards can share one process.
//!
//! Construction order matters because a subscription needs the topic to be
//! registered first:
//!
//! 1. the dispatcher's command and outbound-link topics,
//! 2. the bridge (subscribes the outbound topic, owns the inbound one),
//! 3. the controllers (subscribe commands, own feedback),
//! 4. the mapping rules (subscribe feedback and the inbound topic).
//!
//! Each [`tick`](Board::tick) then runs dispatcher → controllers → bridge.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use twinboard_hal::{ActuatorDriver, AttitudeSensor, InputSource, VideoLinkOperator};
use twinboard_middleware::{
    BridgeTopics, CrossBoardBridge, FrameSource, LinkHealth, LinkTransport, MailboxBus, NullLink,
    Payload, WireFrame,
};
use twinboard_types::{
    BoardRole, ChassisKinematics, ConfigError, DownlinkFrame, LinkError, OperatorInput,
    OperatorLink, RoleDescriptor, UplinkFrame, VideoLinkInput, VisionInput, VisionTransport,
};

use crate::controllers::{
    ChassisConfig, ChassisController, ChassisWheels, GimbalController, ShootController,
    ShooterActuators, ShooterConfig, SubsystemController,
};
use crate::dispatcher::{
    ChassisSideOutputs, ChassisSideRules, DispatchReport, Dispatcher, DispatcherConfig,
    FullOutputs, FullRules, GimbalSideOutputs, GimbalSideRules, MappingRules,
};
use crate::heat::{HeatConfig, HeatModel};
use crate::topics;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Startup configuration of one board. Not changed while running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub role: BoardRole,
    pub kinematics: ChassisKinematics,
    pub vision: VisionTransport,
    /// Receiver the operator's commands come in on. Ignored on the gimbal side.
    pub operator_link: OperatorLink,
    /// Missed cycles after which the remote board's feed is unavailable.
    pub link_stale_cycles: u32,
    pub dispatch: DispatcherConfig,
    pub chassis: ChassisConfig,
    pub shooter: ShooterConfig,
    pub heat: HeatConfig,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            role: BoardRole::default(),
            kinematics: ChassisKinematics::default(),
            vision: VisionTransport::default(),
            operator_link: OperatorLink::default(),
            link_stale_cycles: 10,
            dispatch: DispatcherConfig::default(),
            chassis: ChassisConfig::default(),
            shooter: ShooterConfig::default(),
            heat: HeatConfig::default(),
        }
    }
}

impl BoardConfig {
    pub fn descriptor(&self) -> RoleDescriptor {
        RoleDescriptor {
            role: self.role,
            kinematics: self.kinematics,
            vision: self.vision,
            operator_link: self.operator_link,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.dispatch.validate()?;
        self.shooter.validate()?;
        if self.link_stale_cycles == 0 {
            return Err(ConfigError::Invalid(
                "link staleness must be at least one cycle".to_string(),
            ));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Hardware bundle
// ─────────────────────────────────────────────────────────────────────────────

/// Drivers a board is wired to. Fields the role does not use are ignored;
/// fields it needs must be present.
#[derive(Default)]
pub struct BoardIo {
    /// Handheld transmitter receiver, used with [`OperatorLink::Remote`].
    pub operator: Option<Box<dyn InputSource<OperatorInput>>>,
    /// Video transmitter receiver, used with [`OperatorLink::VideoLink`].
    pub video_link: Option<Box<dyn InputSource<VideoLinkInput>>>,
    pub vision: Option<Box<dyn InputSource<VisionInput>>>,
    pub wheels: Option<ChassisWheels>,
    pub yaw: Option<Box<dyn ActuatorDriver>>,
    pub pitch: Option<Box<dyn ActuatorDriver>>,
    pub imu: Option<Box<dyn AttitudeSensor>>,
    pub shooter: Option<ShooterActuators>,
    /// Outbound link transport. A split board without one talks to nobody.
    pub link: Option<Box<dyn LinkTransport>>,
}

fn require<T>(slot: Option<T>, role: BoardRole, what: &str) -> Result<T, ConfigError> {
    slot.ok_or_else(|| ConfigError::Invalid(format!("{role} board needs {what}")))
}

/// The operator receiver selected by `descriptor.operator_link`. Either way
/// the dispatcher sees an [`OperatorInput`] stream.
fn operator_source(
    io: &mut BoardIo,
    descriptor: &RoleDescriptor,
) -> Result<Box<dyn InputSource<OperatorInput>>, ConfigError> {
    let role = descriptor.role;
    match descriptor.operator_link {
        OperatorLink::Remote => require(io.operator.take(), role, "an operator receiver"),
        OperatorLink::VideoLink => {
            let link = require(io.video_link.take(), role, "a video-link receiver")?;
            Ok(Box::new(VideoLinkOperator::new(link)))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Bridge endpoint
// ─────────────────────────────────────────────────────────────────────────────

/// Role-independent view of a [`CrossBoardBridge`].
trait BridgeEndpoint: Send {
    fn end_cycle(&mut self);
    fn health(&self) -> Arc<LinkHealth>;
    fn receive(&self, payload: &[u8]) -> Result<(), LinkError>;
    fn spawn_pump(&self, source: Box<dyn FrameSource>) -> JoinHandle<()>;
}

impl<Tx, Rx> BridgeEndpoint for CrossBoardBridge<Tx, Rx>
where
    Tx: Payload + WireFrame,
    Rx: Payload + WireFrame,
{
    fn end_cycle(&mut self) {
        CrossBoardBridge::end_cycle(self);
    }

    fn health(&self) -> Arc<LinkHealth> {
        CrossBoardBridge::health(self)
    }

    fn receive(&self, payload: &[u8]) -> Result<(), LinkError> {
        self.inbound_port().on_frame(payload).map(|_| ())
    }

    fn spawn_pump(&self, source: Box<dyn FrameSource>) -> JoinHandle<()> {
        tokio::spawn(self.inbound_port().pump(source))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Board
// ─────────────────────────────────────────────────────────────────────────────

pub struct Board {
    descriptor: RoleDescriptor,
    bus: MailboxBus,
    dispatcher: Dispatcher,
    controllers: Vec<Box<dyn SubsystemController>>,
    bridge: Option<Box<dyn BridgeEndpoint>>,
    period: Duration,
}

impl Board {
    /// Wire a board for `config.role` from `io`.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] when the configuration is invalid, a driver the role
    /// needs is missing, or topic registration fails.
    pub fn new(config: &BoardConfig, mut io: BoardIo) -> Result<Self, ConfigError> {
        config.validate()?;
        let descriptor = config.descriptor();
        let role = descriptor.role;
        let rate_hz = config.dispatch.rate_hz;
        let heat = HeatModel::new(&config.heat, config.shooter.heat_per_shot, rate_hz);
        let vision = if descriptor.has_vision_input() {
            io.vision.take()
        } else {
            None
        };
        let link = io.link.take().unwrap_or_else(|| Box::new(NullLink));

        let mut bus = MailboxBus::new();
        let mut controllers: Vec<Box<dyn SubsystemController>> = Vec::new();

        let (rules, bridge): (Box<dyn MappingRules>, Option<Box<dyn BridgeEndpoint>>) = match role {
            BoardRole::Full => {
                let out = FullOutputs::register(&mut bus)?;
                controllers.push(Box::new(ChassisController::new(
                    &mut bus,
                    descriptor.kinematics,
                    config.chassis.clone(),
                    require(io.wheels.take(), role, "chassis wheels")?,
                )?));
                controllers.push(Box::new(GimbalController::both_axes(
                    &mut bus,
                    require(io.yaw.take(), role, "a yaw motor")?,
                    require(io.pitch.take(), role, "a pitch motor")?,
                    require(io.imu.take(), role, "an attitude sensor")?,
                )?));
                controllers.push(Box::new(ShootController::new(
                    &mut bus,
                    config.shooter.clone(),
                    rate_hz,
                    require(io.shooter.take(), role, "shooter actuators")?,
                )?));
                let rules = FullRules::new(
                    &bus,
                    out,
                    operator_source(&mut io, &descriptor)?,
                    vision,
                    &config.dispatch,
                    heat,
                )?;
                (Box::new(rules), None)
            }
            BoardRole::ChassisSide => {
                let out = ChassisSideOutputs::register(&mut bus)?;
                let bridge = CrossBoardBridge::<DownlinkFrame, UplinkFrame>::new(
                    &mut bus,
                    BridgeTopics {
                        outbound: topics::DOWNLINK_TX,
                        inbound: topics::UPLINK_RX,
                    },
                    config.link_stale_cycles,
                    link,
                )?;
                controllers.push(Box::new(ChassisController::new(
                    &mut bus,
                    descriptor.kinematics,
                    config.chassis.clone(),
                    require(io.wheels.take(), role, "chassis wheels")?,
                )?));
                controllers.push(Box::new(GimbalController::yaw_axis(
                    &mut bus,
                    require(io.yaw.take(), role, "a yaw motor")?,
                )?));
                controllers.push(Box::new(ShootController::new(
                    &mut bus,
                    config.shooter.clone(),
                    rate_hz,
                    require(io.shooter.take(), role, "shooter actuators")?,
                )?));
                let rules = ChassisSideRules::new(
                    &bus,
                    out,
                    operator_source(&mut io, &descriptor)?,
                    bridge.health(),
                    &config.dispatch,
                    heat,
                )?;
                (Box::new(rules), Some(Box::new(bridge)))
            }
            BoardRole::GimbalSide => {
                let out = GimbalSideOutputs::register(&mut bus)?;
                let bridge = CrossBoardBridge::<UplinkFrame, DownlinkFrame>::new(
                    &mut bus,
                    BridgeTopics {
                        outbound: topics::UPLINK_TX,
                        inbound: topics::DOWNLINK_RX,
                    },
                    config.link_stale_cycles,
                    link,
                )?;
                controllers.push(Box::new(GimbalController::pitch_axis(
                    &mut bus,
                    require(io.pitch.take(), role, "a pitch motor")?,
                    require(io.imu.take(), role, "an attitude sensor")?,
                )?));
                let rules = GimbalSideRules::new(
                    &bus,
                    out,
                    vision,
                    bridge.health(),
                    &config.dispatch,
                )?;
                (Box::new(rules), Some(Box::new(bridge)))
            }
        };

        info!(
            role = %role,
            kinematics = %descriptor.kinematics,
            vision = %descriptor.vision,
            operator_link = %descriptor.operator_link,
            rate_hz,
            controllers = ?controllers.iter().map(|c| c.name()).collect::<Vec<_>>(),
            topics = ?bus.topic_names(),
            "board wired"
        );

        Ok(Self {
            descriptor,
            bus,
            dispatcher: Dispatcher::new(rules),
            controllers,
            bridge,
            period: Duration::from_secs_f64(1.0 / f64::from(rate_hz)),
        })
    }

    pub fn descriptor(&self) -> RoleDescriptor {
        self.descriptor
    }

    /// The board's bus, for diagnostics and for subscribing in tests.
    pub fn bus(&self) -> &MailboxBus {
        &self.bus
    }

    pub fn cycle(&self) -> u64 {
        self.dispatcher.cycle()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Freshness of the remote board's feed. `None` on a full board.
    pub fn link_health(&self) -> Option<Arc<LinkHealth>> {
        self.bridge.as_ref().map(|b| b.health())
    }

    /// Hand one received link payload to the bridge. Callable from any
    /// receive context.
    ///
    /// # Errors
    ///
    /// [`LinkError`] if the payload does not decode, or
    /// [`LinkError::Closed`] on a full board, which has no link.
    pub fn receive_frame(&self, payload: &[u8]) -> Result<(), LinkError> {
        match &self.bridge {
            Some(bridge) => bridge.receive(payload),
            None => Err(LinkError::Closed),
        }
    }

    /// Spawn the asynchronous receive pump for `source`. Must be called from
    /// within a Tokio runtime. `None` on a full board.
    pub fn spawn_link_pump<S: FrameSource + 'static>(&self, source: S) -> Option<JoinHandle<()>> {
        self.bridge
            .as_ref()
            .map(|bridge| bridge.spawn_pump(Box::new(source)))
    }

    /// Run one cycle: dispatcher, then every controller, then the bridge.
    pub fn tick(&mut self) -> DispatchReport {
        let report = self.dispatcher.tick();
        self.tick_controllers();
        if let Some(bridge) = &mut self.bridge {
            bridge.end_cycle();
        }
        report
    }

    /// Publish safe defaults and let the controllers and the bridge act on
    /// them once, so actuators are released and the peer is told.
    pub fn force_safe(&mut self) {
        self.dispatcher.force_safe();
        self.tick_controllers();
        if let Some(bridge) = &mut self.bridge {
            bridge.end_cycle();
        }
    }

    fn tick_controllers(&mut self) {
        for controller in &mut self.controllers {
            if let Err(e) = controller.tick() {
                warn!(controller = controller.name(), error = %e, "controller cycle failed");
            }
        }
    }

    /// Tick at the configured rate until `shutdown` is set or `max_cycles`
    /// have run, then force safe outputs. Late ticks are skipped, never
    /// bunched. Returns the number of cycles run.
    pub async fn run(&mut self, shutdown: &AtomicBool, max_cycles: Option<u64>) -> u64 {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(role = %self.descriptor.role, period = ?self.period, "board loop started");

        let mut cycles = 0u64;
        while !shutdown.load(Ordering::Acquire) && max_cycles.is_none_or(|max| cycles < max) {
            interval.tick().await;
            self.tick();
            cycles += 1;
        }

        self.force_safe();
        info!(role = %self.descriptor.role, cycles, "board loop stopped; outputs released");
        cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::SimBoard;
    use twinboard_middleware::loopback_pair;
    use twinboard_types::{
        ChassisCommand, ChassisMode, GimbalMode, GimbalYawCommand, SwitchPosition,
    };

    fn config(role: BoardRole) -> BoardConfig {
        BoardConfig {
            role,
            link_stale_cycles: 3,
            ..Default::default()
        }
    }

    fn follow() -> OperatorInput {
        OperatorInput {
            switch_left: SwitchPosition::Mid,
            switch_right: SwitchPosition::Down,
            right_stick_x: 100,
            ..Default::default()
        }
    }

    #[test]
    fn missing_hardware_is_a_config_error() {
        let err = Board::new(&config(BoardRole::Full), BoardIo::default()).err();
        assert!(matches!(err, Some(ConfigError::Invalid(_))));
    }

    #[test]
    fn invalid_rate_is_rejected_before_wiring() {
        let mut cfg = config(BoardRole::Full);
        cfg.dispatch.rate_hz = 50;
        let sim = SimBoard::new(cfg.descriptor());
        assert!(Board::new(&cfg, sim.io()).is_err());
    }

    #[test]
    fn full_board_drives_wheels_from_operator() {
        let cfg = config(BoardRole::Full);
        let sim = SimBoard::new(cfg.descriptor());
        let mut board = Board::new(&cfg, sim.io()).unwrap();
        let chassis = board.bus().subscribe::<ChassisCommand>(topics::CHASSIS_CMD).unwrap();

        sim.operator.push(follow());
        board.tick();
        assert_eq!(chassis.fetch().chassis_mode, ChassisMode::FollowGimbalYaw);
        assert!(sim.wheels.iter().all(|w| w.is_enabled()));
        assert!(board.link_health().is_none());
    }

    #[test]
    fn video_link_board_drives_from_keyboard_frames() {
        let cfg = BoardConfig {
            operator_link: OperatorLink::VideoLink,
            ..config(BoardRole::Full)
        };
        let sim = SimBoard::new(cfg.descriptor());
        let mut board = Board::new(&cfg, sim.io()).unwrap();
        let chassis = board.bus().subscribe::<ChassisCommand>(topics::CHASSIS_CMD).unwrap();

        // The handheld receiver is not wired; its frames go nowhere.
        sim.operator.push(follow());
        board.tick();
        assert_eq!(chassis.fetch().chassis_mode, ChassisMode::ZeroForce);

        sim.video_link.push(VideoLinkInput {
            keys: twinboard_types::KeyMask(twinboard_types::KeyMask::W),
            ..Default::default()
        });
        board.tick();
        let cmd = chassis.fetch();
        assert_eq!(cmd.chassis_mode, ChassisMode::FollowGimbalYaw);
        assert_eq!(cmd.vy, cfg.dispatch.key_speed);
    }

    #[test]
    fn video_link_without_receiver_is_a_config_error() {
        let cfg = BoardConfig {
            operator_link: OperatorLink::VideoLink,
            ..config(BoardRole::ChassisSide)
        };
        let mut io = SimBoard::new(cfg.descriptor()).io();
        io.video_link = None;
        let err = Board::new(&cfg, io).err();
        assert!(matches!(err, Some(ConfigError::Invalid(msg)) if msg.contains("video-link")));
    }

    #[test]
    fn full_board_force_safe_releases_actuators() {
        let cfg = config(BoardRole::Full);
        let sim = SimBoard::new(cfg.descriptor());
        let mut board = Board::new(&cfg, sim.io()).unwrap();
        sim.operator.push(follow());
        board.tick();
        assert!(sim.yaw.is_enabled());

        board.force_safe();
        assert!(!sim.yaw.is_enabled());
        assert!(sim.wheels.iter().all(|w| !w.is_enabled()));
    }

    #[test]
    fn split_boards_share_attitude_and_pitch_over_link() {
        let (lower_end, upper_end, cable) = loopback_pair(4);
        let mut lower_rx = lower_end.rx;
        let mut upper_rx = upper_end.rx;

        let lower_cfg = config(BoardRole::ChassisSide);
        let lower_sim = SimBoard::new(lower_cfg.descriptor());
        let mut lower_io = lower_sim.io();
        lower_io.link = Some(Box::new(lower_end.tx));
        let mut lower = Board::new(&lower_cfg, lower_io).unwrap();

        let upper_cfg = config(BoardRole::GimbalSide);
        let upper_sim = SimBoard::new(upper_cfg.descriptor());
        let mut upper_io = upper_sim.io();
        upper_io.link = Some(Box::new(upper_end.tx));
        let mut upper = Board::new(&upper_cfg, upper_io).unwrap();

        upper_sim.imu.set(twinboard_hal::Attitude {
            yaw: 25.0,
            yaw_speed: 1.0,
            pitch: 0.0,
            pitch_speed: 0.0,
        });
        let yaw_cmd = lower
            .bus()
            .subscribe::<GimbalYawCommand>(topics::GIMBAL_YAW_CMD)
            .unwrap();

        let mut exchange = |lower: &mut Board, upper: &mut Board| {
            lower_sim.operator.push(follow());
            lower.tick();
            upper.tick();
            while let Some(frame) = upper_rx.try_next() {
                upper.receive_frame(&frame).unwrap();
            }
            while let Some(frame) = lower_rx.try_next() {
                lower.receive_frame(&frame).unwrap();
            }
        };

        for _ in 0..3 {
            exchange(&mut lower, &mut upper);
        }
        let cmd = yaw_cmd.fetch();
        assert_eq!(cmd.gimbal_mode, GimbalMode::Gyro);
        assert_eq!(cmd.up_yaw, 25.0);
        assert!(lower_sim.yaw.is_enabled());
        assert!(upper_sim.pitch.is_enabled(), "pitch follows the downlink");

        cable.sever();
        for _ in 0..4 {
            exchange(&mut lower, &mut upper);
        }
        assert_eq!(yaw_cmd.fetch().gimbal_mode, GimbalMode::ZeroForce);
        assert!(!lower_sim.yaw.is_enabled());
        assert!(!upper_sim.pitch.is_enabled());
        assert!(lower.link_health().is_some_and(|h| !h.is_fresh()));
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_after_cycle_budget() {
        let cfg = config(BoardRole::Full);
        let sim = SimBoard::new(cfg.descriptor());
        let mut board = Board::new(&cfg, sim.io()).unwrap();
        let shutdown = AtomicBool::new(false);
        assert_eq!(board.run(&shutdown, Some(5)).await, 5);
        assert_eq!(board.cycle(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn run_honours_shutdown_flag() {
        let cfg = config(BoardRole::GimbalSide);
        let sim = SimBoard::new(cfg.descriptor());
        let mut board = Board::new(&cfg, sim.io()).unwrap();
        let shutdown = AtomicBool::new(true);
        assert_eq!(board.run(&shutdown, None).await, 0);
    }

    #[tokio::test]
    async fn async_pump_delivers_frames() {
        let (lower_end, upper_end, _cable) = loopback_pair(4);
        let cfg = config(BoardRole::ChassisSide);
        let sim = SimBoard::new(cfg.descriptor());
        let board = Board::new(&cfg, sim.io()).unwrap();
        let pump = board.spawn_link_pump(lower_end.rx).unwrap();

        let mut upper_tx = upper_end.tx;
        upper_tx
            .try_send(UplinkFrame::default().to_bytes())
            .unwrap();
        drop(upper_tx);
        pump.await.unwrap();
        assert!(board.link_health().is_some_and(|h| h.received() == 1));
    }
}

//! Upper-board rules of a split robot.
//!
//! The gimbal side has no transmitter. It follows the pitch command that
//! arrives over the downlink, lets a locked vision target override the pitch
//! angle, and reports its attitude plus the vision-proposed yaw back over the
//! uplink every cycle, whether or not the downlink is alive.

use std::sync::Arc;

use twinboard_hal::input::InputSource;
use twinboard_kernel::FeedWatchdog;
use twinboard_middleware::{LinkHealth, MailboxBus, Publisher, Subscriber};
use twinboard_types::{
    AppStatus, BoardRole, ConfigError, DownlinkFrame, GimbalFeedback, GimbalMode,
    GimbalPitchCommand, GimbalYawCommand, RobotStatus, UplinkFrame, VisionInput,
};

use super::{poll_vision, CycleStatus, DispatcherConfig, MappingRules, VISION_FEED};
use crate::topics;

pub struct GimbalSideOutputs {
    pitch: Publisher<GimbalPitchCommand>,
    uplink: Publisher<UplinkFrame>,
}

impl GimbalSideOutputs {
    pub fn register(bus: &mut MailboxBus) -> Result<Self, ConfigError> {
        Ok(Self {
            pitch: bus.register(topics::GIMBAL_PITCH_CMD)?,
            uplink: bus.register(topics::UPLINK_TX)?,
        })
    }
}

pub struct GimbalSideRules {
    out: GimbalSideOutputs,
    vision: Option<Box<dyn InputSource<VisionInput>>>,
    watchdog: FeedWatchdog,
    downlink: Subscriber<DownlinkFrame>,
    downlink_health: Arc<LinkHealth>,
    gimbal_feed: Subscriber<GimbalFeedback>,
    pitch_min: f32,
    pitch_max: f32,
}

impl GimbalSideRules {
    pub fn new(
        bus: &MailboxBus,
        out: GimbalSideOutputs,
        vision: Option<Box<dyn InputSource<VisionInput>>>,
        downlink_health: Arc<LinkHealth>,
        config: &DispatcherConfig,
    ) -> Result<Self, ConfigError> {
        let mut watchdog = FeedWatchdog::new();
        if vision.is_some() {
            watchdog.register(VISION_FEED, config.vision_stale_cycles);
        }
        Ok(Self {
            out,
            vision,
            watchdog,
            downlink: bus.subscribe(topics::DOWNLINK_RX)?,
            downlink_health,
            gimbal_feed: bus.subscribe(topics::GIMBAL_FEED)?,
            pitch_min: config.pitch_min,
            pitch_max: config.pitch_max,
        })
    }

    fn publish_uplink(&self, feedback: &GimbalFeedback, target_yaw: Option<f32>) {
        self.out.uplink.publish(UplinkFrame {
            yaw_cmd: GimbalYawCommand {
                yaw: target_yaw.unwrap_or(feedback.imu_yaw),
                up_yaw: feedback.imu_yaw,
                up_speed: feedback.imu_yaw_speed,
                is_init: u8::from(target_yaw.is_some()),
                gimbal_mode: if target_yaw.is_some() {
                    GimbalMode::Gyro
                } else {
                    GimbalMode::ZeroForce
                },
            },
            yaw: feedback.imu_yaw,
            yaw_speed: feedback.imu_yaw_speed,
        });
    }
}

impl MappingRules for GimbalSideRules {
    fn role(&self) -> BoardRole {
        BoardRole::GimbalSide
    }

    fn dispatch(&mut self) -> CycleStatus {
        let remote_fresh = self.downlink_health.is_fresh();
        let downlink = self.downlink.fetch();
        let feedback = self.gimbal_feed.fetch();
        let aim = poll_vision(self.vision.as_deref_mut(), &mut self.watchdog);

        // The downlink carries no aim-source selector, so a locked target
        // overrides pitch whatever the operator picked. Yaw is only adopted
        // by the chassis side under vision aiming.
        let requested = downlink.pitch_cmd;
        let pitch_cmd = if !remote_fresh || requested.gimbal_mode == GimbalMode::ZeroForce {
            GimbalPitchCommand::default()
        } else {
            let pitch = aim.map_or(requested.pitch, |target| target.pitch);
            GimbalPitchCommand {
                pitch: pitch.clamp(self.pitch_min, self.pitch_max),
                gimbal_mode: requested.gimbal_mode,
            }
        };
        self.out.pitch.publish(pitch_cmd);
        self.publish_uplink(&feedback, aim.map(|target| target.yaw));

        CycleStatus {
            app_status: if remote_fresh {
                AppStatus::Online
            } else {
                AppStatus::Offline
            },
            robot_status: RobotStatus::Ready,
            remote_fresh: Some(remote_fresh),
        }
    }

    fn publish_safe(&mut self) {
        self.out.pitch.publish(GimbalPitchCommand::default());
        self.publish_uplink(&self.gimbal_feed.fetch(), None);
    }
}

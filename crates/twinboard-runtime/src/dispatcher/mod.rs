//! [`Dispatcher`] – the fixed-rate mode/state machine.
//!
//! Once per cycle the dispatcher turns the latest raw inputs into one command
//! per subsystem:
//!
//! 1. **Sample** – poll the operator and vision receivers and read any
//!    bridge-delivered frame together with its freshness.
//! 2. **Assess** – derive [`AppStatus`] from the required feeds:
//!    `Online` while fresh, `Offline` once a feed misses its staleness
//!    window, `Error` for a malformed snapshot.
//! 3. **Override** – anything but `Online`, or a latched
//!    [`RobotStatus::Stop`], forces every command to its safe default.
//! 4. **Map** – otherwise the board's [`MappingRules`] translate input into
//!    commands.
//! 5. **Publish** – every command topic the role owns, plus the outbound
//!    link payload on split boards, is written exactly once.
//!
//! Which rules run is decided once at startup from the
//! [`RoleDescriptor`][twinboard_types::RoleDescriptor]; there is no per-cycle
//! role branching.

pub mod chassis_side;
pub mod full;
pub mod gimbal_side;
pub mod operator;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};
use twinboard_hal::input::InputSource;
use twinboard_kernel::FeedWatchdog;
use twinboard_types::{
    AppStatus, BoardRole, ConfigError, LidMode, OperatorInput, RobotStatus, ShootCommand,
    VisionInput,
};

pub use chassis_side::{ChassisSideOutputs, ChassisSideRules};
pub use full::{FullOutputs, FullRules};
pub use gimbal_side::{GimbalSideOutputs, GimbalSideRules};
pub use operator::{Aim, OperatorIntent, OperatorMapper};

/// Watchdog key of the operator transmitter.
pub const OPERATOR_FEED: &str = "operator";
/// Watchdog key of the vision host.
pub const VISION_FEED: &str = "vision";

/// Fastest expected input producer (vision). The dispatch rate must exceed
/// it so that no sample is skipped.
pub const MIN_DISPATCH_RATE_HZ: u32 = 100;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Startup-time dispatcher settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Cycles per second.
    pub rate_hz: u32,
    /// Consecutive cycles without a transmitter frame before going offline.
    pub operator_stale_cycles: u32,
    /// Consecutive cycles without a vision frame before ignoring vision.
    pub vision_stale_cycles: u32,
    /// Yaw motor single-round angle at which gimbal and chassis face the same
    /// way, degrees.
    pub yaw_align_angle: f32,
    pub pitch_min: f32,
    pub pitch_max: f32,
    /// Degrees of yaw per stick count per cycle.
    pub yaw_stick_gain: f32,
    /// Degrees of pitch per stick count per cycle.
    pub pitch_stick_gain: f32,
    /// Chassis speed per stick count.
    pub velocity_gain: f32,
    pub mouse_yaw_gain: f32,
    pub mouse_pitch_gain: f32,
    /// Chassis speed for a held W/A/S/D key.
    pub key_speed: f32,
    /// Speed buff level while Shift is held.
    pub shift_buff_level: i32,
    /// Continuous fire rate, shots per second.
    pub shoot_rate: f32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            rate_hz: 200,
            operator_stale_cycles: 20,
            vision_stale_cycles: 20,
            yaw_align_angle: 0.0,
            pitch_min: -20.0,
            pitch_max: 30.0,
            yaw_stick_gain: 0.005,
            pitch_stick_gain: 0.001,
            velocity_gain: 10.0,
            mouse_yaw_gain: 0.01,
            mouse_pitch_gain: 0.005,
            key_speed: 3000.0,
            shift_buff_level: 2,
            shoot_rate: 8.0,
        }
    }
}

impl DispatcherConfig {
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] when the rate does not exceed the fastest
    /// input, a staleness window is zero, or the pitch limits are inverted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_hz <= MIN_DISPATCH_RATE_HZ {
            return Err(ConfigError::Invalid(format!(
                "dispatch rate {} Hz must exceed the {MIN_DISPATCH_RATE_HZ} Hz input rate",
                self.rate_hz
            )));
        }
        if self.operator_stale_cycles == 0 || self.vision_stale_cycles == 0 {
            return Err(ConfigError::Invalid(
                "staleness windows must be at least one cycle".to_string(),
            ));
        }
        if !(self.pitch_min < self.pitch_max) {
            return Err(ConfigError::Invalid(format!(
                "pitch limits [{}, {}] are empty",
                self.pitch_min, self.pitch_max
            )));
        }
        if !self.shoot_rate.is_finite() || self.shoot_rate < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "shoot rate {} is not a valid rate",
                self.shoot_rate
            )));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rules seam
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of one cycle as seen by the rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleStatus {
    pub app_status: AppStatus,
    pub robot_status: RobotStatus,
    /// Freshness of the bridge-delivered feed, on split boards.
    pub remote_fresh: Option<bool>,
}

/// Role-specific half of the dispatcher.
pub trait MappingRules: Send {
    fn role(&self) -> BoardRole;

    /// Run steps 1–5 for one cycle.
    fn dispatch(&mut self) -> CycleStatus;

    /// Publish safe defaults on every owned topic, regardless of input.
    fn publish_safe(&mut self);
}

/// Per-cycle summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub cycle: u64,
    pub status: CycleStatus,
}

/// Drives one [`MappingRules`] implementation at the board's cycle rate.
pub struct Dispatcher {
    rules: Box<dyn MappingRules>,
    cycle: u64,
    last: Option<CycleStatus>,
}

impl Dispatcher {
    pub fn new(rules: Box<dyn MappingRules>) -> Self {
        Self {
            rules,
            cycle: 0,
            last: None,
        }
    }

    pub fn role(&self) -> BoardRole {
        self.rules.role()
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Status of the most recent cycle.
    pub fn last_status(&self) -> Option<CycleStatus> {
        self.last
    }

    pub fn tick(&mut self) -> DispatchReport {
        let status = self.rules.dispatch();
        trace!(
            cycle = self.cycle,
            app = ?status.app_status,
            robot = ?status.robot_status,
            "dispatch cycle"
        );
        if let Some(prev) = self.last
            && prev.remote_fresh == Some(true)
            && status.remote_fresh == Some(false)
        {
            warn!(role = %self.rules.role(), "remote board lost; dependent axes disarmed");
        }
        self.last = Some(status);
        let report = DispatchReport {
            cycle: self.cycle,
            status,
        };
        self.cycle += 1;
        report
    }

    /// Publish safe defaults immediately, e.g. on shutdown.
    pub fn force_safe(&mut self) {
        self.rules.publish_safe();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Wrap `angle` in degrees into `(-180, 180]`.
pub fn wrap_degrees(angle: f32) -> f32 {
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped <= -180.0 { 180.0 } else { wrapped }
}

/// Disarmed shoot command that keeps the trigger sequence where it is, so no
/// pulse is invented or lost across the override.
pub fn safe_shoot(trigger_seq: u16, rest_heat: u16) -> ShootCommand {
    ShootCommand {
        lid_mode: LidMode::Close,
        trigger_seq,
        rest_heat,
        ..Default::default()
    }
}

/// Poll the transmitter and classify it.
///
/// The latest frame is range-checked on every cycle, not only when it
/// arrives: a malformed frame keeps the feed in `Error` until a well-formed
/// one replaces it or the watchdog takes it offline.
pub(crate) fn poll_operator(
    source: &mut dyn InputSource<OperatorInput>,
    watchdog: &mut FeedWatchdog,
) -> (AppStatus, OperatorInput) {
    let snapshot = source.latest_snapshot();
    let mut status = watchdog.observe(OPERATOR_FEED, snapshot.fresh);
    if status == AppStatus::Online
        && let Err(fault) = snapshot.value.validate()
    {
        if snapshot.fresh {
            warn!(%fault, "malformed transmitter frame");
        }
        status = AppStatus::Error;
    }
    (status, snapshot.value)
}

/// Poll the vision host. Returns a target only while the feed is online,
/// well-formed and locked.
pub(crate) fn poll_vision(
    source: Option<&mut (dyn InputSource<VisionInput> + 'static)>,
    watchdog: &mut FeedWatchdog,
) -> Option<Aim> {
    let source = source?;
    let snapshot = source.latest_snapshot();
    if watchdog.observe(VISION_FEED, snapshot.fresh) != AppStatus::Online {
        return None;
    }
    if let Err(fault) = snapshot.value.validate() {
        if snapshot.fresh {
            warn!(%fault, "malformed vision frame ignored");
        }
        return None;
    }
    snapshot.value.target_found.then_some(Aim {
        yaw: snapshot.value.yaw,
        pitch: snapshot.value.pitch,
    })
}

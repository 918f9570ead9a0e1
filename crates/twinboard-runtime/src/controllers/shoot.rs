//! Shooter controller.
//!
//! Each cycle, in this order:
//!
//! 1. The limit switch drives the loader-limit motor through
//!    [`LimitSwitchPolicy`], whatever the command says.
//! 2. Friction wheels spin at `friction_speed` while `ShootMode::On`.
//! 3. The command passes the [`Interlock`]; a violated rule stops the loader
//!    for this cycle.
//! 4. The loader runs the effective [`LoaderMode`]. Single and triple shots
//!    are counted from the command's trigger sequence and spaced by a dead
//!    time.
//! 5. The lid follows `lid_mode`.
//!
//! Loader angles and speeds are in motor-side degrees: a bullet slot is
//! `bullet_delta_angle * reduction` of motor travel.

use serde::{Deserialize, Serialize};
use tracing::debug;
use twinboard_hal::{ActuatorDriver, LidActuator, LimitSwitch, StageMask};
use twinboard_kernel::{Interlock, LimitStage, LimitSwitchPolicy};
use twinboard_middleware::{MailboxBus, PulseDetector, Publisher, Subscriber};
use twinboard_types::{
    ConfigError, CoreError, LidMode, LoaderMode, SafetyFault, ShootCommand, ShootFeedback,
    ShootMode,
};

use super::SubsystemController;
use crate::topics;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShooterConfig {
    pub heat_per_shot: u16,
    /// Shots of heat BURST must be able to afford before it may start.
    pub burst_reserve_shots: u16,
    /// Friction wheel speed reference while armed.
    pub friction_speed: f32,
    /// Loader speed reference while clearing a jam.
    pub reverse_speed: f32,
    /// Loader output angle per bullet, degrees.
    pub bullet_delta_angle: f32,
    /// Loader gearbox reduction.
    pub reduction: f32,
    /// Bullet slots per loader revolution.
    pub slots_per_revolution: u16,
    /// Cycles the loader rests after each single or triple advance.
    pub one_shot_dead_cycles: u32,
}

impl Default for ShooterConfig {
    fn default() -> Self {
        Self {
            heat_per_shot: 10,
            burst_reserve_shots: 5,
            friction_speed: 30000.0,
            reverse_speed: 2000.0,
            bullet_delta_angle: 36.0,
            reduction: 49.0,
            slots_per_revolution: 10,
            one_shot_dead_cycles: 30,
        }
    }
}

impl ShooterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slots_per_revolution == 0 {
            return Err(ConfigError::Invalid(
                "shooter needs at least one bullet slot".to_string(),
            ));
        }
        if !(self.reduction > 0.0) || !(self.bullet_delta_angle > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "loader reduction {} and bullet angle {} must be positive",
                self.reduction, self.bullet_delta_angle
            )));
        }
        Ok(())
    }

    /// Loader motor speed for `rate` shots per second.
    pub fn burst_speed(&self, rate: f32) -> f32 {
        rate * 360.0 * self.reduction / f32::from(self.slots_per_revolution.max(1))
    }
}

/// Shooter hardware.
pub struct ShooterActuators {
    pub friction_left: Box<dyn ActuatorDriver>,
    pub friction_right: Box<dyn ActuatorDriver>,
    pub loader: Box<dyn ActuatorDriver>,
    /// Motor that seats the next projectile against the friction wheels.
    pub friction_limit: Box<dyn ActuatorDriver>,
    pub lid: Box<dyn LidActuator>,
    pub limit_switch: Box<dyn LimitSwitch>,
}

pub struct ShootController {
    config: ShooterConfig,
    rate_hz: u32,
    hw: ShooterActuators,
    interlock: Interlock,
    limit_policy: LimitSwitchPolicy,
    commands: Subscriber<ShootCommand>,
    feedback: Publisher<ShootFeedback>,
    trigger: PulseDetector,
    pending_shots: u32,
    dead_cycles: u32,
    angle_target: Option<f32>,
    burst_fraction: f32,
    shots_fired: u32,
    last_switch: Option<bool>,
    last_loader: LoaderMode,
}

impl ShootController {
    /// `rate_hz` is the board cycle rate, used to count burst shots.
    pub fn new(
        bus: &mut MailboxBus,
        config: ShooterConfig,
        rate_hz: u32,
        hw: ShooterActuators,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let commands = bus.subscribe::<ShootCommand>(topics::SHOOT_CMD)?;
        let feedback = bus.register(topics::SHOOT_FEED)?;
        Ok(Self {
            interlock: Interlock::standard(config.heat_per_shot, config.burst_reserve_shots),
            limit_policy: LimitSwitchPolicy::default(),
            trigger: PulseDetector::starting_at(commands.fetch().trigger_seq),
            config,
            rate_hz: rate_hz.max(1),
            hw,
            commands,
            feedback,
            pending_shots: 0,
            dead_cycles: 0,
            angle_target: None,
            burst_fraction: 0.0,
            shots_fired: 0,
            last_switch: None,
            last_loader: LoaderMode::Stop,
        })
    }

    fn apply_limit_switch(&mut self) -> Result<bool, CoreError> {
        let closed = self.hw.limit_switch.is_closed();
        let action = self.limit_policy.resolve(closed);
        if self.last_switch != Some(closed) {
            debug!(fault = %action.fault, "loader limit override");
            self.last_switch = Some(closed);
        }
        let stages = match action.stage {
            LimitStage::Speed => StageMask::SPEED | StageMask::CURRENT,
            LimitStage::Angle => StageMask::ANGLE | StageMask::SPEED | StageMask::CURRENT,
        };
        let motor = &mut self.hw.friction_limit;
        motor.select_loop_stage(stages);
        motor.enable();
        motor.set_reference(action.reference)?;
        Ok(closed)
    }

    fn apply_friction(&mut self, mode: ShootMode) -> Result<(), CoreError> {
        let speed = self.config.friction_speed;
        let mut outcome = Ok(());
        for wheel in [&mut self.hw.friction_left, &mut self.hw.friction_right] {
            if mode == ShootMode::On {
                wheel.select_loop_stage(StageMask::SPEED | StageMask::CURRENT);
                wheel.enable();
                let applied = wheel.set_reference(speed);
                if outcome.is_ok() {
                    outcome = applied;
                }
            } else {
                wheel.disable();
            }
        }
        outcome
    }

    fn run_loader_speed(&mut self, speed: f32) -> Result<(), CoreError> {
        self.angle_target = None;
        let loader = &mut self.hw.loader;
        loader.select_loop_stage(StageMask::SPEED | StageMask::CURRENT);
        loader.enable();
        loader.set_reference(speed)
    }

    fn run_loader_rounds(&mut self, per_trigger: u32) -> Result<(), CoreError> {
        let current = self.hw.loader.feedback().angle;
        let mut target = self.angle_target.unwrap_or(current);
        if self.dead_cycles > 0 {
            self.dead_cycles -= 1;
        } else if self.pending_shots > 0 {
            self.pending_shots -= 1;
            target = current
                + per_trigger as f32 * self.config.bullet_delta_angle * self.config.reduction;
            self.shots_fired = self.shots_fired.wrapping_add(per_trigger);
            self.dead_cycles = self.config.one_shot_dead_cycles;
        }
        self.angle_target = Some(target);
        let loader = &mut self.hw.loader;
        loader.select_loop_stage(StageMask::ANGLE | StageMask::SPEED | StageMask::CURRENT);
        loader.enable();
        loader.set_reference(target)
    }

    fn count_burst(&mut self, rate: f32) {
        self.burst_fraction += rate / self.rate_hz as f32;
        let whole = self.burst_fraction.floor();
        self.burst_fraction -= whole;
        self.shots_fired = self.shots_fired.wrapping_add(whole as u32);
    }
}

impl SubsystemController for ShootController {
    fn name(&self) -> &'static str {
        "shoot"
    }

    fn tick(&mut self) -> Result<(), CoreError> {
        let mut outcome = Ok(());
        let mut keep = |result: Result<(), CoreError>| {
            if outcome.is_ok() {
                outcome = result;
            }
        };

        let limit_closed = match self.apply_limit_switch() {
            Ok(closed) => closed,
            Err(e) => {
                keep(Err(e));
                self.last_switch.unwrap_or(false)
            }
        };

        let requested = self.commands.fetch();
        keep(self.apply_friction(requested.shoot_mode));

        let (cmd, fault) = self.interlock.apply(requested);
        let new_pulses = u32::from(self.trigger.observe(cmd.trigger_seq));
        let loader_mode = cmd.loader_mode;
        if loader_mode != self.last_loader {
            debug!(from = ?self.last_loader, to = ?loader_mode, "loader mode change");
            if !matches!(loader_mode, LoaderMode::OneRound | LoaderMode::ThreeRound) {
                self.pending_shots = 0;
            }
            self.last_loader = loader_mode;
        }

        let loader_result = match loader_mode {
            LoaderMode::Stop => self.run_loader_speed(0.0),
            LoaderMode::Reverse => self.run_loader_speed(-self.config.reverse_speed),
            LoaderMode::Burst => {
                self.count_burst(cmd.shoot_rate);
                self.run_loader_speed(self.config.burst_speed(cmd.shoot_rate))
            }
            LoaderMode::OneRound | LoaderMode::ThreeRound => {
                self.pending_shots = self.pending_shots.saturating_add(new_pulses);
                let per_trigger = if loader_mode == LoaderMode::ThreeRound { 3 } else { 1 };
                self.run_loader_rounds(per_trigger)
            }
        };
        keep(loader_result);

        keep(self.hw.lid.set_open(cmd.lid_mode == LidMode::Open));

        self.feedback.publish(ShootFeedback {
            loader_mode_applied: loader_mode,
            limit_switch_closed: limit_closed,
            heat_fault: matches!(fault, Some(SafetyFault::HeatExhausted { .. })),
            shots_fired: self.shots_fired,
        });
        outcome
    }
}

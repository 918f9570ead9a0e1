//! [`Interlock`] – shooter safety rule engine.
//!
//! Before the shoot controller acts on a [`ShootCommand`] it passes the
//! command through [`Interlock::apply`]. Every registered [`Rule`] is
//! evaluated in order; the first violation downgrades the loader to
//! [`LoaderMode::Stop`] for this cycle and is reported back so it can be
//! surfaced in the shooter feedback. Nothing is latched: the next cycle
//! starts from the fresh command again.
//!
//! Built-in rules:
//! - [`HeatBudgetRule`] – a firing loader mode is honoured only while the
//!   remaining heat covers the shots it would fire.
//! - [`FrictionRule`] – no firing loader mode while the friction wheels are
//!   commanded off.
//!
//! The loader-limit actuator is governed separately by
//! [`LimitSwitchPolicy`], which overrides whatever the command says.

use tracing::debug;
use twinboard_types::{FrictionMode, LoaderMode, SafetyFault, ShootCommand};

// ────────────────────────────────────────────────────────────────────────────
// Rule trait
// ────────────────────────────────────────────────────────────────────────────

/// A single invariant a shoot command must satisfy.
pub trait Rule: Send + Sync {
    /// Name used in log lines.
    fn name(&self) -> &str;

    fn check(&self, cmd: &ShootCommand) -> Result<(), SafetyFault>;
}

// ────────────────────────────────────────────────────────────────────────────
// Interlock
// ────────────────────────────────────────────────────────────────────────────

/// Ordered set of [`Rule`]s.
///
/// # Example
///
/// ```
/// use twinboard_kernel::interlock::{HeatBudgetRule, Interlock};
/// use twinboard_types::{FrictionMode, LoaderMode, ShootCommand};
///
/// let mut interlock = Interlock::new();
/// interlock.add_rule(Box::new(HeatBudgetRule::new(10, 5)));
///
/// let cmd = ShootCommand {
///     loader_mode: LoaderMode::Burst,
///     friction_mode: FrictionMode::On,
///     rest_heat: 20,
///     ..Default::default()
/// };
/// let (effective, fault) = interlock.apply(cmd);
/// assert_eq!(effective.loader_mode, LoaderMode::Stop);
/// assert!(fault.is_some());
/// ```
#[derive(Default)]
pub struct Interlock {
    rules: Vec<Box<dyn Rule>>,
}

impl Interlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// The rule set every shooter runs with.
    pub fn standard(heat_per_shot: u16, burst_reserve_shots: u16) -> Self {
        let mut interlock = Self::new();
        interlock.add_rule(Box::new(FrictionRule));
        interlock.add_rule(Box::new(HeatBudgetRule::new(
            heat_per_shot,
            burst_reserve_shots,
        )));
        interlock
    }

    /// Rules are evaluated in insertion order.
    pub fn add_rule(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    /// First violated rule, if any.
    pub fn verify(&self, cmd: &ShootCommand) -> Result<(), SafetyFault> {
        for rule in &self.rules {
            rule.check(cmd).inspect_err(|fault| {
                debug!(rule = rule.name(), %fault, "shoot command violates interlock");
            })?;
        }
        Ok(())
    }

    /// `cmd` with the loader stopped if any rule is violated, plus the
    /// violation.
    pub fn apply(&self, cmd: ShootCommand) -> (ShootCommand, Option<SafetyFault>) {
        match self.verify(&cmd) {
            Ok(()) => (cmd, None),
            Err(fault) => {
                let downgraded = ShootCommand {
                    loader_mode: LoaderMode::Stop,
                    ..cmd
                };
                (downgraded, Some(fault))
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Built-in rules
// ────────────────────────────────────────────────────────────────────────────

/// Heat gate for firing loader modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeatBudgetRule {
    pub heat_per_shot: u16,
    /// Shots BURST must be able to afford before it is allowed to start.
    pub burst_reserve_shots: u16,
}

impl HeatBudgetRule {
    pub fn new(heat_per_shot: u16, burst_reserve_shots: u16) -> Self {
        Self {
            heat_per_shot,
            burst_reserve_shots,
        }
    }

    /// Heat `mode` needs. Zero for non-firing modes.
    pub fn cost(&self, mode: LoaderMode) -> u16 {
        let shots = match mode {
            LoaderMode::OneRound => 1,
            LoaderMode::ThreeRound => 3,
            LoaderMode::Burst => self.burst_reserve_shots,
            LoaderMode::Stop | LoaderMode::Reverse => 0,
        };
        shots.saturating_mul(self.heat_per_shot)
    }
}

impl Rule for HeatBudgetRule {
    fn name(&self) -> &str {
        "heat_budget"
    }

    fn check(&self, cmd: &ShootCommand) -> Result<(), SafetyFault> {
        let cost = self.cost(cmd.loader_mode);
        if cmd.loader_mode.is_firing() && cmd.rest_heat < cost {
            return Err(SafetyFault::HeatExhausted {
                requested: cmd.loader_mode,
                rest_heat: cmd.rest_heat,
                cost,
            });
        }
        Ok(())
    }
}

/// Projectiles must not be pushed into stopped friction wheels.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrictionRule;

impl Rule for FrictionRule {
    fn name(&self) -> &str {
        "friction_ready"
    }

    fn check(&self, cmd: &ShootCommand) -> Result<(), SafetyFault> {
        if cmd.loader_mode.is_firing() && cmd.friction_mode == FrictionMode::Off {
            return Err(SafetyFault::FrictionOff {
                requested: cmd.loader_mode,
            });
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Limit switch override
// ────────────────────────────────────────────────────────────────────────────

/// Outer loop the loader-limit motor runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitStage {
    Speed,
    Angle,
}

/// What the loader-limit motor must do this cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct LimitAction {
    pub stage: LimitStage,
    pub reference: f32,
    /// The override, for feedback and logging.
    pub fault: SafetyFault,
}

/// Maps the limit switch level straight to a loader-limit motor command,
/// bypassing the dispatcher entirely.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimitSwitchPolicy {
    /// Speed reference while the switch is open.
    pub open_reference: f32,
    /// Angle reference while the switch is closed.
    pub closed_reference: f32,
}

impl Default for LimitSwitchPolicy {
    fn default() -> Self {
        Self {
            open_reference: 1000.0,
            closed_reference: -1000.0,
        }
    }
}

impl LimitSwitchPolicy {
    pub fn resolve(&self, closed: bool) -> LimitAction {
        if closed {
            LimitAction {
                stage: LimitStage::Angle,
                reference: self.closed_reference,
                fault: SafetyFault::LimitSwitchOverride { state: "closed" },
            }
        } else {
            LimitAction {
                stage: LimitStage::Speed,
                reference: self.open_reference,
                fault: SafetyFault::LimitSwitchOverride { state: "open" },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn armed(loader_mode: LoaderMode, rest_heat: u16) -> ShootCommand {
        ShootCommand {
            loader_mode,
            friction_mode: FrictionMode::On,
            rest_heat,
            ..Default::default()
        }
    }

    #[test]
    fn burst_needs_full_reserve() {
        let interlock = Interlock::standard(10, 5);
        let (cmd, fault) = interlock.apply(armed(LoaderMode::Burst, 49));
        assert_eq!(cmd.loader_mode, LoaderMode::Stop);
        assert_eq!(
            fault,
            Some(SafetyFault::HeatExhausted {
                requested: LoaderMode::Burst,
                rest_heat: 49,
                cost: 50
            })
        );

        let (cmd, fault) = interlock.apply(armed(LoaderMode::Burst, 50));
        assert_eq!(cmd.loader_mode, LoaderMode::Burst);
        assert!(fault.is_none());
    }

    #[test]
    fn single_shot_allowed_while_burst_is_not() {
        let interlock = Interlock::standard(10, 5);
        assert!(interlock.verify(&armed(LoaderMode::OneRound, 10)).is_ok());
        assert!(interlock.verify(&armed(LoaderMode::ThreeRound, 29)).is_err());
        assert!(interlock.verify(&armed(LoaderMode::Burst, 30)).is_err());
    }

    #[test]
    fn reverse_and_stop_never_gated() {
        let interlock = Interlock::standard(10, 5);
        let mut cmd = armed(LoaderMode::Reverse, 0);
        cmd.friction_mode = FrictionMode::Off;
        assert!(interlock.verify(&cmd).is_ok());
        assert!(interlock.verify(&armed(LoaderMode::Stop, 0)).is_ok());
    }

    #[test]
    fn firing_with_friction_off_is_downgraded() {
        let interlock = Interlock::standard(10, 5);
        let mut cmd = armed(LoaderMode::OneRound, 100);
        cmd.friction_mode = FrictionMode::Off;
        let (effective, fault) = interlock.apply(cmd);
        assert_eq!(effective.loader_mode, LoaderMode::Stop);
        assert_eq!(
            fault,
            Some(SafetyFault::FrictionOff {
                requested: LoaderMode::OneRound
            })
        );
    }

    #[test]
    fn downgrade_keeps_other_fields() {
        let interlock = Interlock::standard(10, 5);
        let mut cmd = armed(LoaderMode::Burst, 0);
        cmd.shoot_rate = 8.0;
        cmd.trigger_seq = 7;
        let (effective, _) = interlock.apply(cmd);
        assert_eq!(effective.shoot_rate, 8.0);
        assert_eq!(effective.trigger_seq, 7);
        assert_eq!(effective.friction_mode, FrictionMode::On);
    }

    #[test]
    fn empty_interlock_passes_everything() {
        let interlock = Interlock::new();
        assert!(interlock.verify(&armed(LoaderMode::Burst, 0)).is_ok());
    }

    #[test]
    fn limit_switch_open_runs_speed_stage_forward() {
        let action = LimitSwitchPolicy::default().resolve(false);
        assert_eq!(action.stage, LimitStage::Speed);
        assert_eq!(action.reference, 1000.0);
    }

    #[test]
    fn limit_switch_closed_holds_angle_backward() {
        let action = LimitSwitchPolicy::default().resolve(true);
        assert_eq!(action.stage, LimitStage::Angle);
        assert_eq!(action.reference, -1000.0);
        assert_eq!(
            action.fault,
            SafetyFault::LimitSwitchOverride { state: "closed" }
        );
    }
}

//! `twinboard-kernel` – safety and liveness rules.
//!
//! It does not compute commands; it decides when a command may not be
//! trusted or may not be executed.
//!
//! # Modules
//!
//! - [`watchdog`] – [`FeedWatchdog`][watchdog::FeedWatchdog]: counts cycles
//!   without a sample per input feed and reports
//!   [`AppStatus`][twinboard_types::AppStatus].
//! - [`interlock`] – [`Interlock`][interlock::Interlock]: ordered shooter
//!   rules (heat budget, friction readiness) that downgrade the loader, and
//!   [`LimitSwitchPolicy`][interlock::LimitSwitchPolicy] for the
//!   loader-limit motor.

pub mod interlock;
pub mod watchdog;

pub use interlock::{
    FrictionRule, HeatBudgetRule, Interlock, LimitAction, LimitStage, LimitSwitchPolicy, Rule,
};
pub use watchdog::FeedWatchdog;

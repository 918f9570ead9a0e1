//! `twinboard-runtime` – the per-board control loop.
//!
//! # Modules
//!
//! - [`board`] – [`Board`]: wires bus, dispatcher, controllers and the
//!   cross-board bridge for one [`BoardRole`][twinboard_types::BoardRole]
//!   and runs them at a fixed rate.
//! - [`dispatcher`] – [`Dispatcher`]: operator/vision input to per-subsystem
//!   commands, with safe-default override while a feed is stale.
//! - [`controllers`] – chassis, gimbal and shooter control tasks.
//! - [`heat`] – [`HeatModel`]: barrel heat estimate behind the shot budget.
//! - [`simulation`] – [`SimBoard`][simulation::SimBoard]: simulated
//!   peripherals for tests and the CLI.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console
//!   logging plus optional OTLP span export.
//! - [`topics`] – bus topic names.
//!
//! # Safety interlocks
//!
//! Command validation lives in `twinboard-kernel`; the shooter controller
//! runs every [`ShootCommand`][twinboard_types::ShootCommand] through the
//! kernel [`Interlock`] before touching the loader.

pub mod board;
pub mod controllers;
pub mod dispatcher;
pub mod heat;
pub mod simulation;
pub mod telemetry;
pub mod topics;

pub use board::{Board, BoardConfig, BoardIo};
pub use dispatcher::{DispatchReport, Dispatcher, DispatcherConfig};
pub use heat::{HeatConfig, HeatModel};
pub use telemetry::{TracerProviderGuard, init_tracing};

pub use twinboard_kernel::Interlock;

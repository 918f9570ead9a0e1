//! Subsystem controllers.
//!
//! Each controller reads its command topic, drives its actuators through the
//! [`ActuatorDriver`][twinboard_hal::ActuatorDriver] seam and publishes a
//! feedback topic. Controllers never talk to each other or to the
//! dispatcher directly; the bus is the only coupling.

pub mod chassis;
pub mod gimbal;
pub mod shoot;

use twinboard_types::CoreError;

pub use chassis::{ChassisConfig, ChassisController, ChassisWheels};
pub use gimbal::GimbalController;
pub use shoot::{ShootController, ShooterActuators, ShooterConfig};

/// One cooperatively scheduled control task.
pub trait SubsystemController: Send {
    /// Name used in log lines.
    fn name(&self) -> &'static str;

    /// Run one cycle. An `Err` is logged by the board and the controller is
    /// ticked again next cycle.
    fn tick(&mut self) -> Result<(), CoreError>;
}

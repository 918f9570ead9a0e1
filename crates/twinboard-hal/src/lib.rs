//! `twinboard-hal` – hardware seams of a controller board.
//!
//! The core never calls a peripheral directly; it talks to these traits and
//! the board wiring supplies real drivers or the [`sim`] stand-ins.
//!
//! - [`actuator`] – cascade motor driver: reference, loop stage, feedback.
//! - [`lid`] / [`limit_switch`] – shooter discrete I/O.
//! - [`attitude`] – IMU attitude.
//! - [`input`] – decoded input receivers.

pub mod actuator;
pub mod attitude;
pub mod input;
pub mod lid;
pub mod limit_switch;
pub mod sim;

pub use actuator::{ActuatorDriver, FeedbackSource, MotorFeedback, StageMask};
pub use attitude::{Attitude, AttitudeSensor};
pub use input::{InputSource, VideoLinkOperator};
pub use lid::LidActuator;
pub use limit_switch::{FixedSwitch, LimitSwitch};

//! Magazine lid: a discrete open/closed servo.

use twinboard_types::CoreError;

/// The magazine lid servo.
pub trait LidActuator: Send {
    /// Drive the lid to `open` (`true`) or closed (`false`).
    ///
    /// # Errors
    ///
    /// [`CoreError::Hardware`] if the command cannot be applied.
    fn set_open(&mut self, open: bool) -> Result<(), CoreError>;

    /// Last commanded state.
    fn is_open(&self) -> bool;
}

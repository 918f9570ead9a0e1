//! Loader limit switch.

/// Microswitch at the feed throat. Closed means a projectile is seated
/// against it.
pub trait LimitSwitch: Send {
    fn is_closed(&self) -> bool;
}

/// Switch wired to a fixed level, for boards without the sensor fitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedSwitch(pub bool);

impl LimitSwitch for FixedSwitch {
    fn is_closed(&self) -> bool {
        self.0
    }
}

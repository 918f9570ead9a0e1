//! Attitude sensor (IMU) interface.

/// One attitude sample in degrees and degrees per second.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Attitude {
    /// Continuous yaw angle, not wrapped.
    pub yaw: f32,
    pub yaw_speed: f32,
    pub pitch: f32,
    pub pitch_speed: f32,
}

/// An inertial sensor fused into a world-frame attitude.
pub trait AttitudeSensor: Send {
    /// Latest fused attitude. Never blocks.
    fn attitude(&self) -> Attitude;
}

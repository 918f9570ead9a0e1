//! In-process simulated hardware for headless runs and tests.
//!
//! Every simulated device is a cheap `Clone` handle over shared state: give
//! one clone to the controller that owns the device and keep another to
//! inspect what was commanded or to inject measurements.
//!
//! # Stub behaviour
//!
//! | Device | Behaviour |
//! |---|---|
//! | [`SimActuator`] | Records stage, source and reference; when enabled the feedback tracks the reference of the outermost stage. |
//! | [`SimLid`] | Records the last open/closed command. |
//! | [`SimLimitSwitch`] | Reports whatever the test set. |
//! | [`SimAttitude`] | Reports whatever the test set. |
//! | [`SimInput`] | Latest pushed sample; fresh until polled once. |
//!
//! # Example
//!
//! ```rust
//! use twinboard_hal::actuator::{ActuatorDriver, StageMask};
//! use twinboard_hal::sim::SimActuator;
//!
//! let probe = SimActuator::new("loader");
//! let mut driver = probe.clone();
//! driver.select_loop_stage(StageMask::SPEED);
//! driver.enable();
//! driver.set_reference(1200.0).unwrap();
//! assert_eq!(probe.feedback().speed, 1200.0);
//! ```

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;
use twinboard_types::{CoreError, Snapshot};

use crate::actuator::{ActuatorDriver, FeedbackSource, MotorFeedback, StageMask};
use crate::attitude::{Attitude, AttitudeSensor};
use crate::input::InputSource;
use crate::lid::LidActuator;
use crate::limit_switch::LimitSwitch;

// ────────────────────────────────────────────────────────────────────────────
// Simulated actuator
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct ActuatorState {
    enabled: bool,
    stages: StageMask,
    source: FeedbackSource,
    reference: f32,
    feedback: MotorFeedback,
    references_applied: u64,
}

/// A simulated cascade motor.
#[derive(Debug, Clone)]
pub struct SimActuator {
    id: Arc<str>,
    state: Arc<RwLock<ActuatorState>>,
}

impl SimActuator {
    pub fn new(id: &str) -> Self {
        Self {
            id: Arc::from(id),
            state: Arc::new(RwLock::new(ActuatorState::default())),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state.read().enabled
    }

    pub fn stages(&self) -> StageMask {
        self.state.read().stages
    }

    pub fn feedback_source(&self) -> FeedbackSource {
        self.state.read().source
    }

    /// Last reference accepted while enabled.
    pub fn reference(&self) -> f32 {
        self.state.read().reference
    }

    pub fn references_applied(&self) -> u64 {
        self.state.read().references_applied
    }

    /// Overwrite the measured feedback, as the motor's receive path would.
    pub fn inject_feedback(&self, feedback: MotorFeedback) {
        self.state.write().feedback = feedback;
    }
}

impl ActuatorDriver for SimActuator {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_reference(&mut self, reference: f32) -> Result<(), CoreError> {
        if !reference.is_finite() {
            return Err(CoreError::Hardware {
                component: self.id.to_string(),
                details: format!("reference {reference} is not finite"),
            });
        }
        let mut state = self.state.write();
        if !state.enabled {
            return Ok(());
        }
        state.reference = reference;
        state.references_applied += 1;
        match state.stages.outermost() {
            StageMask::ANGLE => {
                state.feedback.angle = reference;
                state.feedback.single_round_angle = reference.rem_euclid(360.0);
            }
            StageMask::SPEED => state.feedback.speed = reference,
            StageMask::CURRENT => state.feedback.current = reference,
            _ => {}
        }
        Ok(())
    }

    fn select_loop_stage(&mut self, stages: StageMask) {
        self.state.write().stages = stages;
    }

    fn set_feedback_source(&mut self, source: FeedbackSource) {
        self.state.write().source = source;
    }

    fn enable(&mut self) {
        let mut state = self.state.write();
        if !state.enabled {
            debug!(actuator = %self.id, "sim actuator enabled");
        }
        state.enabled = true;
    }

    fn disable(&mut self) {
        let mut state = self.state.write();
        if state.enabled {
            debug!(actuator = %self.id, "sim actuator disabled");
        }
        state.enabled = false;
        state.reference = 0.0;
        state.feedback.speed = 0.0;
        state.feedback.current = 0.0;
    }

    fn feedback(&self) -> MotorFeedback {
        self.state.read().feedback
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Lid, limit switch, IMU
// ────────────────────────────────────────────────────────────────────────────

/// A simulated lid servo.
#[derive(Debug, Clone, Default)]
pub struct SimLid {
    open: Arc<RwLock<bool>>,
}

impl SimLid {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LidActuator for SimLid {
    fn set_open(&mut self, open: bool) -> Result<(), CoreError> {
        *self.open.write() = open;
        Ok(())
    }

    fn is_open(&self) -> bool {
        *self.open.read()
    }
}

/// A simulated limit switch, open until told otherwise.
#[derive(Debug, Clone, Default)]
pub struct SimLimitSwitch {
    closed: Arc<RwLock<bool>>,
}

impl SimLimitSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_closed(&self, closed: bool) {
        *self.closed.write() = closed;
    }
}

impl LimitSwitch for SimLimitSwitch {
    fn is_closed(&self) -> bool {
        *self.closed.read()
    }
}

/// A simulated IMU.
#[derive(Debug, Clone, Default)]
pub struct SimAttitude {
    attitude: Arc<RwLock<Attitude>>,
}

impl SimAttitude {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, attitude: Attitude) {
        *self.attitude.write() = attitude;
    }
}

impl AttitudeSensor for SimAttitude {
    fn attitude(&self) -> Attitude {
        *self.attitude.read()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Input source
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct InputState<T> {
    latest: T,
    fresh: bool,
    pushes: u64,
}

/// A simulated receiver. [`push`](Self::push) plays the role of the
/// receive interrupt; stopping pushes simulates a lost transmitter.
#[derive(Debug, Clone)]
pub struct SimInput<T> {
    state: Arc<RwLock<InputState<T>>>,
}

impl<T: Default> Default for SimInput<T> {
    fn default() -> Self {
        Self {
            state: Arc::new(RwLock::new(InputState::default())),
        }
    }
}

impl<T: Copy + Default> SimInput<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, sample: T) {
        let mut state = self.state.write();
        state.latest = sample;
        state.fresh = true;
        state.pushes += 1;
    }

    pub fn pushes(&self) -> u64 {
        self.state.read().pushes
    }
}

impl<T: Copy + Default + Send + Sync> InputSource<T> for SimInput<T> {
    fn latest_snapshot(&mut self) -> Snapshot<T> {
        let mut state = self.state.write();
        let snapshot = Snapshot {
            value: state.latest,
            fresh: state.fresh,
        };
        state.fresh = false;
        snapshot
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

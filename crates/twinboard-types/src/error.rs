//! Error taxonomy.
//!
//! Only [`ConfigError`] is fatal, and only at startup. [`LinkError`] and
//! [`SafetyFault`] are always recovered where they are raised by degrading to
//! a safe command.

use thiserror::Error;

use crate::modes::LoaderMode;

/// Topic registry or startup configuration is inconsistent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("topic '{topic}' registered with {registered} bytes, requested {requested}")]
    SizeMismatch {
        topic: String,
        registered: usize,
        requested: usize,
    },

    #[error("topic '{topic}' payload type differs from its registration")]
    TypeMismatch { topic: String },

    #[error("topic '{0}' is not registered")]
    UnknownTopic(String),

    #[error("topic '{0}' already has a publisher")]
    DuplicatePublisher(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Cross-board link failures. Never fatal: the affected feed is treated as
/// unavailable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("frame is {actual} bytes, expected {expected}")]
    FrameLength { expected: usize, actual: usize },

    #[error("field '{field}' carries invalid discriminant {value}")]
    InvalidDiscriminant { field: &'static str, value: u32 },

    #[error("field '{field}' is not a finite number")]
    NonFinite { field: &'static str },

    #[error("transport cannot accept a frame right now")]
    TransportBusy,

    #[error("transport closed")]
    Closed,

    #[error("feed '{feed}' stale after {missed} missed cycles")]
    Stale { feed: String, missed: u32 },
}

/// A decoded input snapshot that cannot be trusted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputFault {
    #[error("channel '{channel}' out of range: {value}")]
    ChannelOutOfRange { channel: &'static str, value: i32 },

    #[error("field '{field}' is not a finite number")]
    NonFinite { field: &'static str },
}

/// A command was downgraded before it reached an actuator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SafetyFault {
    #[error("{requested:?} needs {cost} heat, only {rest_heat} left")]
    HeatExhausted {
        requested: LoaderMode,
        rest_heat: u16,
        cost: u16,
    },

    #[error("{requested:?} requested with friction wheels off")]
    FrictionOff { requested: LoaderMode },

    #[error("limit switch {state} overrides loader-limit command")]
    LimitSwitchOverride { state: &'static str },
}

/// Umbrella error for APIs that can fail in more than one category.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Safety(#[from] SafetyFault),

    #[error(transparent)]
    Input(#[from] InputFault),

    #[error("hardware fault on {component}: {details}")]
    Hardware { component: String, details: String },
}

//! Structured input snapshots delivered by the (external) peripheral decoders.

use serde::{Deserialize, Serialize};

use crate::error::InputFault;

/// Full-scale stick and dial deflection of the operator transmitter.
pub const STICK_RANGE: i16 = 660;

/// Position of a three-way transmitter switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SwitchPosition {
    Up,
    #[default]
    Mid,
    Down,
}

/// Keyboard state as a bit set, one bit per key in transmitter order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct KeyMask(pub u16);

impl KeyMask {
    pub const W: u16 = 1 << 0;
    pub const S: u16 = 1 << 1;
    pub const A: u16 = 1 << 2;
    pub const D: u16 = 1 << 3;
    pub const SHIFT: u16 = 1 << 4;
    pub const CTRL: u16 = 1 << 5;
    pub const Q: u16 = 1 << 6;
    pub const E: u16 = 1 << 7;
    pub const R: u16 = 1 << 8;
    pub const F: u16 = 1 << 9;
    pub const G: u16 = 1 << 10;
    pub const Z: u16 = 1 << 11;
    pub const X: u16 = 1 << 12;
    pub const C: u16 = 1 << 13;
    pub const V: u16 = 1 << 14;
    pub const B: u16 = 1 << 15;

    pub fn pressed(self, key: u16) -> bool {
        self.0 & key != 0
    }
}

/// Decoded operator transmitter frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OperatorInput {
    pub right_stick_x: i16,
    pub right_stick_y: i16,
    pub left_stick_x: i16,
    pub left_stick_y: i16,
    /// Thumb dial; pushed away from the operator reads negative.
    pub dial: i16,
    pub switch_left: SwitchPosition,
    pub switch_right: SwitchPosition,
    pub mouse_x: i16,
    pub mouse_y: i16,
    pub mouse_left: bool,
    pub mouse_right: bool,
    pub keys: KeyMask,
}

impl OperatorInput {
    /// Reject frames whose analogue channels are outside the transmitter's
    /// physical range.
    pub fn validate(&self) -> Result<(), InputFault> {
        let channels = [
            ("right_stick_x", self.right_stick_x),
            ("right_stick_y", self.right_stick_y),
            ("left_stick_x", self.left_stick_x),
            ("left_stick_y", self.left_stick_y),
            ("dial", self.dial),
        ];
        for (channel, value) in channels {
            if !(-STICK_RANGE..=STICK_RANGE).contains(&value) {
                return Err(InputFault::ChannelOutOfRange {
                    channel,
                    value: i32::from(value),
                });
            }
        }
        Ok(())
    }
}

/// Keyboard and mouse state relayed by the video transmitter.
///
/// The video link has no sticks, switches or dial; an operator on it always
/// drives in keyboard mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VideoLinkInput {
    pub mouse_x: i16,
    pub mouse_y: i16,
    /// Scroll wheel.
    pub mouse_z: i16,
    pub mouse_left: bool,
    pub mouse_right: bool,
    pub keys: KeyMask,
}

impl From<VideoLinkInput> for OperatorInput {
    /// Keyboard mode (left switch up) with the right switch parked mid, where
    /// neither the stop latch nor its release can trigger.
    fn from(link: VideoLinkInput) -> Self {
        Self {
            switch_left: SwitchPosition::Up,
            switch_right: SwitchPosition::Mid,
            mouse_x: link.mouse_x,
            mouse_y: link.mouse_y,
            mouse_left: link.mouse_left,
            mouse_right: link.mouse_right,
            keys: link.keys,
            ..Default::default()
        }
    }
}

/// Decoded aiming solution from the vision host.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VisionInput {
    pub target_found: bool,
    /// Absolute yaw target, degrees.
    pub yaw: f32,
    /// Absolute pitch target, degrees.
    pub pitch: f32,
    /// The host judges the current aim good enough to fire.
    pub fire_advice: bool,
}

impl VisionInput {
    pub fn validate(&self) -> Result<(), InputFault> {
        if !self.yaw.is_finite() {
            return Err(InputFault::NonFinite { field: "yaw" });
        }
        if !self.pitch.is_finite() {
            return Err(InputFault::NonFinite { field: "pitch" });
        }
        Ok(())
    }
}

/// A source's most recent sample plus whether it arrived since the last poll.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Snapshot<T> {
    pub value: T,
    pub fresh: bool,
}

impl<T> Snapshot<T> {
    pub fn fresh(value: T) -> Self {
        Self { value, fresh: true }
    }

    /// Convert the sample, keeping its freshness.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Snapshot<U> {
        Snapshot {
            value: f(self.value),
            fresh: self.fresh,
        }
    }

    pub fn stale(value: T) -> Self {
        Self {
            value,
            fresh: false,
        }
    }
}

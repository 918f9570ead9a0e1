//! Edge counting for one-shot events carried over latest-value slots.
//!
//! The mailbox keeps only the newest payload, so a boolean "fire" flag set in
//! two consecutive publishes that land in one unread window is seen once.
//! Instead the producer bumps a wrapping sequence number per event and embeds
//! it in the payload; the consumer compares it with the last sequence it
//! handled and gets the exact number of events in between.
//!
//! ```
//! use twinboard_middleware::pulse::{PulseCounter, PulseDetector};
//!
//! let mut counter = PulseCounter::new();
//! let mut detector = PulseDetector::new();
//!
//! counter.fire();
//! counter.fire(); // two events before the consumer looks
//! assert_eq!(detector.observe(counter.sequence()), 2);
//! assert_eq!(detector.observe(counter.sequence()), 0);
//! ```

/// Producer side: owns the sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PulseCounter {
    seq: u16,
}

impl PulseCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one event and return the new sequence.
    pub fn fire(&mut self) -> u16 {
        self.seq = self.seq.wrapping_add(1);
        self.seq
    }

    pub fn sequence(&self) -> u16 {
        self.seq
    }
}

/// Consumer side: remembers the last sequence it handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PulseDetector {
    last: u16,
}

impl PulseDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from `seq` without counting anything before it.
    pub fn starting_at(seq: u16) -> Self {
        Self { last: seq }
    }

    /// Number of events since the previous call.
    ///
    /// Correct as long as fewer than `u16::MAX` events happen between two
    /// observations.
    pub fn observe(&mut self, seq: u16) -> u16 {
        let new = seq.wrapping_sub(self.last);
        self.last = seq;
        new
    }
}

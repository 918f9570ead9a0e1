//! `twinboard-middleware` – data plumbing shared by both boards.
//!
//! Moves payloads between producers and consumers on one board and across the
//! link to the other, without interpreting them.
//!
//! # Modules
//!
//! - [`bus`] – lock-free single-slot mailbox topics, one writer each.
//! - [`pulse`] – wrapping sequence counters for one-shot events.
//! - [`wire`] – explicit little-endian layout of the link payloads.
//! - [`link`] – transport traits plus an in-process loopback pair.
//! - [`bridge`] – republishes remote payloads locally and tracks their age.

pub mod bridge;
pub mod bus;
pub mod link;
pub mod pulse;
pub mod wire;

pub use bridge::{BridgeTopics, CrossBoardBridge, InboundPort, LinkHealth};
pub use bus::{MailboxBus, Payload, Publisher, Subscriber};
pub use link::{FrameSource, LinkControl, LinkTransport, LoopbackEnd, NullLink, loopback_pair};
pub use pulse::{PulseCounter, PulseDetector};
pub use wire::WireFrame;

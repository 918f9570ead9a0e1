//! Cross-board bridge.
//!
//! Makes the board boundary invisible to consumers:
//!
//! 1. **Inbound** – payloads arriving from the peer are decoded and published
//!    on the local [`MailboxBus`] exactly as a local producer would, through
//!    an [`InboundPort`] that may be driven from any thread or task.
//! 2. **Outbound** – once per dispatch cycle the latest value of a local
//!    topic is encoded and handed to the [`LinkTransport`].
//!
//! Freshness is tracked by [`LinkHealth`]: an age counter bumped at the end of
//! every local cycle and reset by every successfully decoded frame. The feed
//! is unavailable from the cycle on which the age reaches the configured
//! threshold. The bridge only *reports* freshness; it never touches modes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use tracing::{debug, info, warn};
use twinboard_types::{ConfigError, LinkError};

use crate::bus::{MailboxBus, Payload, Publisher, Subscriber};
use crate::link::{FrameSource, LinkTransport};
use crate::wire::WireFrame;

// ---------------------------------------------------------------------------
// LinkHealth
// ---------------------------------------------------------------------------

/// Per-direction freshness and error counters. Shared lock-free between the
/// receive context and the dispatch cycle.
#[derive(Debug)]
pub struct LinkHealth {
    feed: String,
    stale_after: u32,
    age: AtomicU32,
    received: AtomicU64,
    decode_errors: AtomicU64,
    send_failures: AtomicU64,
}

impl LinkHealth {
    /// `stale_after` is the number of consecutive missed cycles that makes
    /// the feed unavailable. The feed starts unavailable until the first
    /// frame arrives.
    pub fn new(feed: impl Into<String>, stale_after: u32) -> Self {
        let stale_after = stale_after.max(1);
        Self {
            feed: feed.into(),
            stale_after,
            age: AtomicU32::new(stale_after),
            received: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
        }
    }

    pub fn feed(&self) -> &str {
        &self.feed
    }

    /// Cycles since the last good frame.
    pub fn age(&self) -> u32 {
        self.age.load(Ordering::Acquire)
    }

    pub fn stale_after(&self) -> u32 {
        self.stale_after
    }

    pub fn is_fresh(&self) -> bool {
        self.age() < self.stale_after
    }

    /// `Ok` while fresh, otherwise the [`LinkError::Stale`] describing why.
    pub fn check(&self) -> Result<(), LinkError> {
        let age = self.age();
        if age < self.stale_after {
            Ok(())
        } else {
            Err(LinkError::Stale {
                feed: self.feed.clone(),
                missed: age,
            })
        }
    }

    /// Advance the age by one local cycle and return it.
    pub fn end_cycle(&self) -> u32 {
        let previous = self
            .age
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |age| {
                Some(age.saturating_add(1))
            })
            .unwrap_or(u32::MAX);
        previous.saturating_add(1)
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Acquire)
    }

    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Acquire)
    }

    pub fn send_failures(&self) -> u64 {
        self.send_failures.load(Ordering::Acquire)
    }

    fn mark_received(&self) {
        self.age.store(0, Ordering::Release);
        self.received.fetch_add(1, Ordering::AcqRel);
    }
}

// ---------------------------------------------------------------------------
// InboundPort
// ---------------------------------------------------------------------------

struct InboundInner<F: Payload> {
    publisher: Publisher<F>,
    health: Arc<LinkHealth>,
}

/// Entry point for frames arriving from the peer.
///
/// Cloning yields another handle to the same single writer, so the port can
/// be moved into an interrupt-style callback or a Tokio task.
pub struct InboundPort<F: Payload> {
    inner: Arc<InboundInner<F>>,
}

impl<F: Payload> Clone for InboundPort<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: Payload + WireFrame> InboundPort<F> {
    /// Decode `payload`, publish it locally and reset the age counter.
    ///
    /// Never blocks. A payload that fails to decode is counted and dropped;
    /// the age keeps growing so a peer sending garbage goes stale like a
    /// silent one.
    pub fn on_frame(&self, payload: &[u8]) -> Result<F, LinkError> {
        match F::decode(payload) {
            Ok(frame) => {
                self.inner.publisher.publish(frame);
                self.inner.health.mark_received();
                Ok(frame)
            }
            Err(e) => {
                self.inner.health.decode_errors.fetch_add(1, Ordering::AcqRel);
                warn!(feed = %self.inner.health.feed, error = %e, "dropping undecodable frame");
                Err(e)
            }
        }
    }

    /// Feed every payload from `source` into [`on_frame`](Self::on_frame)
    /// until the source closes.
    pub async fn pump<S: FrameSource>(self, mut source: S) {
        while let Some(payload) = source.next_frame().await {
            let _ = self.on_frame(&payload);
        }
        info!(feed = %self.inner.health.feed, "link receive pump finished");
    }

    pub fn health(&self) -> Arc<LinkHealth> {
        Arc::clone(&self.inner.health)
    }
}

// ---------------------------------------------------------------------------
// CrossBoardBridge
// ---------------------------------------------------------------------------

/// Topic names a bridge binds to.
#[derive(Debug, Clone, Copy)]
pub struct BridgeTopics<'a> {
    /// Local topic whose latest value is transmitted every cycle.
    pub outbound: &'a str,
    /// Remote-origin topic the bridge publishes decoded frames to.
    pub inbound: &'a str,
}

/// One board's end of the link: transmits `Tx`, receives `Rx`.
pub struct CrossBoardBridge<Tx: Payload + WireFrame, Rx: Payload + WireFrame> {
    outbound: Subscriber<Tx>,
    inbound: InboundPort<Rx>,
    transport: Box<dyn LinkTransport>,
    was_fresh: bool,
}

impl<Tx: Payload + WireFrame, Rx: Payload + WireFrame> CrossBoardBridge<Tx, Rx> {
    /// Subscribe to the outbound topic and become the sole publisher of the
    /// inbound one.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] from the bus: the outbound topic must already be
    /// registered and the inbound one must not have a publisher yet.
    pub fn new(
        bus: &mut MailboxBus,
        topics: BridgeTopics<'_>,
        stale_after: u32,
        transport: Box<dyn LinkTransport>,
    ) -> Result<Self, ConfigError> {
        let outbound = bus.subscribe::<Tx>(topics.outbound)?;
        let publisher = bus.register::<Rx>(topics.inbound)?;
        let health = Arc::new(LinkHealth::new(topics.inbound, stale_after));
        info!(
            outbound = topics.outbound,
            inbound = topics.inbound,
            tx_bytes = Tx::SIZE,
            rx_bytes = Rx::SIZE,
            stale_after,
            "cross-board bridge bound"
        );
        Ok(Self {
            outbound,
            inbound: InboundPort {
                inner: Arc::new(InboundInner { publisher, health }),
            },
            transport,
            was_fresh: false,
        })
    }

    /// Handle for the receive context.
    pub fn inbound_port(&self) -> InboundPort<Rx> {
        self.inbound.clone()
    }

    pub fn health(&self) -> Arc<LinkHealth> {
        self.inbound.health()
    }

    /// End-of-cycle step: transmit the latest outbound value, then age the
    /// inbound feed by one cycle. Never blocks.
    pub fn end_cycle(&mut self) {
        let payload = self.outbound.fetch().to_bytes();
        if let Err(e) = self.transport.try_send(payload) {
            let health = &self.inbound.inner.health;
            health.send_failures.fetch_add(1, Ordering::AcqRel);
            debug!(feed = %health.feed, error = %e, "outbound frame superseded");
        }

        let health = &self.inbound.inner.health;
        let age = health.end_cycle();
        let fresh = health.is_fresh();
        if fresh != self.was_fresh {
            if fresh {
                info!(feed = %health.feed, "remote feed available");
            } else {
                warn!(feed = %health.feed, missed = age, "remote feed stale");
            }
            self.was_fresh = fresh;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{loopback_pair, NullLink};
    use twinboard_types::{DownlinkFrame, GimbalMode, GimbalPitchCommand, UplinkFrame};

    fn pitch_frame(pitch: f32) -> DownlinkFrame {
        DownlinkFrame {
            pitch_cmd: GimbalPitchCommand {
                pitch,
                gimbal_mode: GimbalMode::Gyro,
            },
        }
    }

    #[test]
    fn inbound_frame_is_published_locally() -> Result<(), ConfigError> {
        let mut bus = MailboxBus::new();
        let _out = bus.register::<UplinkFrame>("uplink_tx")?;
        let bridge = CrossBoardBridge::<UplinkFrame, DownlinkFrame>::new(
            &mut bus,
            BridgeTopics {
                outbound: "uplink_tx",
                inbound: "downlink_rx",
            },
            5,
            Box::new(NullLink),
        )?;
        let sub = bus.subscribe::<DownlinkFrame>("downlink_rx")?;

        let frame = pitch_frame(4.5);
        bridge
            .inbound_port()
            .on_frame(&frame.to_bytes())
            .expect("valid frame");
        assert_eq!(sub.fetch(), frame);
        assert_eq!(bridge.health().age(), 0);
        assert_eq!(bridge.health().received(), 1);
        Ok(())
    }

    #[test]
    fn feed_goes_stale_exactly_at_threshold() -> Result<(), ConfigError> {
        const K: u32 = 3;
        let mut bus = MailboxBus::new();
        let _out = bus.register::<UplinkFrame>("uplink_tx")?;
        let mut bridge = CrossBoardBridge::<UplinkFrame, DownlinkFrame>::new(
            &mut bus,
            BridgeTopics {
                outbound: "uplink_tx",
                inbound: "downlink_rx",
            },
            K,
            Box::new(NullLink),
        )?;
        let health = bridge.health();
        assert!(!health.is_fresh(), "no frame yet");

        bridge.inbound_port().on_frame(&pitch_frame(0.0).to_bytes()).unwrap();
        assert!(health.is_fresh());

        for missed in 1..K {
            bridge.end_cycle();
            assert_eq!(health.age(), missed);
            assert!(health.is_fresh(), "still fresh after {missed} missed cycles");
        }
        bridge.end_cycle();
        assert_eq!(health.age(), K);
        assert!(!health.is_fresh());
        assert!(matches!(health.check(), Err(LinkError::Stale { missed: K, .. })));
        Ok(())
    }

    #[test]
    fn decode_failure_does_not_refresh_feed() -> Result<(), ConfigError> {
        let mut bus = MailboxBus::new();
        let _out = bus.register::<UplinkFrame>("uplink_tx")?;
        let bridge = CrossBoardBridge::<UplinkFrame, DownlinkFrame>::new(
            &mut bus,
            BridgeTopics {
                outbound: "uplink_tx",
                inbound: "downlink_rx",
            },
            2,
            Box::new(NullLink),
        )?;
        let sub = bus.subscribe::<DownlinkFrame>("downlink_rx")?;

        assert!(bridge.inbound_port().on_frame(&[1, 2, 3]).is_err());
        assert_eq!(bridge.health().decode_errors(), 1);
        assert!(!bridge.health().is_fresh());
        assert_eq!(sub.fetch(), DownlinkFrame::default());
        Ok(())
    }

    #[test]
    fn bridge_without_outbound_topic_is_config_error() {
        let mut bus = MailboxBus::new();
        let result = CrossBoardBridge::<UplinkFrame, DownlinkFrame>::new(
            &mut bus,
            BridgeTopics {
                outbound: "uplink_tx",
                inbound: "downlink_rx",
            },
            2,
            Box::new(NullLink),
        );
        assert!(matches!(result, Err(ConfigError::UnknownTopic(_))));
    }

    /// Two bridges on two buses joined by a loopback link: what one board
    /// publishes appears on the other after one cycle.
    #[tokio::test]
    async fn two_boards_exchange_frames() -> Result<(), ConfigError> {
        let (gimbal_end, chassis_end, _control) = loopback_pair(8);

        let mut gimbal_bus = MailboxBus::new();
        let uplink_out = gimbal_bus.register::<UplinkFrame>("uplink_tx")?;
        let mut gimbal_bridge = CrossBoardBridge::<UplinkFrame, DownlinkFrame>::new(
            &mut gimbal_bus,
            BridgeTopics {
                outbound: "uplink_tx",
                inbound: "downlink_rx",
            },
            4,
            Box::new(gimbal_end.tx),
        )?;

        let mut chassis_bus = MailboxBus::new();
        let downlink_out = chassis_bus.register::<DownlinkFrame>("downlink_tx")?;
        let mut chassis_bridge = CrossBoardBridge::<DownlinkFrame, UplinkFrame>::new(
            &mut chassis_bus,
            BridgeTopics {
                outbound: "downlink_tx",
                inbound: "uplink_rx",
            },
            4,
            Box::new(chassis_end.tx),
        )?;
        let uplink_in = chassis_bus.subscribe::<UplinkFrame>("uplink_rx")?;
        let downlink_in = gimbal_bus.subscribe::<DownlinkFrame>("downlink_rx")?;

        let chassis_pump = tokio::spawn(chassis_bridge.inbound_port().pump(chassis_end.rx));
        let gimbal_pump = tokio::spawn(gimbal_bridge.inbound_port().pump(gimbal_end.rx));

        let mut up = UplinkFrame::default();
        up.yaw = 33.0;
        up.yaw_cmd.gimbal_mode = GimbalMode::Gyro;
        uplink_out.publish(up);
        downlink_out.publish(pitch_frame(-2.0));

        gimbal_bridge.end_cycle();
        chassis_bridge.end_cycle();

        for _ in 0..100 {
            if chassis_bridge.health().received() > 0 && gimbal_bridge.health().received() > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
        assert_eq!(uplink_in.fetch(), up);
        assert_eq!(downlink_in.fetch(), pitch_frame(-2.0));

        drop(gimbal_bridge);
        drop(chassis_bridge);
        chassis_pump.await.unwrap();
        gimbal_pump.await.unwrap();
        Ok(())
    }
}

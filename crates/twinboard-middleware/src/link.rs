//! Link transport seams.
//!
//! The core never speaks to a UART directly. Outbound, the bridge hands an
//! encoded payload to a [`LinkTransport`], which frames and sends it or
//! refuses immediately. Inbound, a [`FrameSource`] yields de-framed payloads
//! as they arrive; the bridge's receive pump feeds them to the decoder.
//!
//! # Provided transports
//!
//! - [`loopback_pair`] – two in-process board ends joined by bounded Tokio
//!   channels, for simulation and tests. A [`LinkControl`] can cut the wire.
//! - [`NullLink`] – the peer is absent; every frame is silently dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TrySendError};
use twinboard_types::LinkError;

/// Outbound half of a point-to-point link.
pub trait LinkTransport: Send {
    /// Queue one payload for transmission without waiting.
    ///
    /// # Errors
    ///
    /// [`LinkError::TransportBusy`] when the transport has no room, in which
    /// case the payload is dropped and the next cycle's frame supersedes it;
    /// [`LinkError::Closed`] when the peer is gone.
    fn try_send(&mut self, payload: Bytes) -> Result<(), LinkError>;
}

/// Inbound half of a point-to-point link.
#[async_trait]
pub trait FrameSource: Send {
    /// Wait for the next de-framed payload. `None` once the link is closed.
    async fn next_frame(&mut self) -> Option<Bytes>;
}

#[async_trait]
impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    async fn next_frame(&mut self) -> Option<Bytes> {
        (**self).next_frame().await
    }
}

/// Transport for a board with no peer.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLink;

impl LinkTransport for NullLink {
    fn try_send(&mut self, _payload: Bytes) -> Result<(), LinkError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-process loopback
// ---------------------------------------------------------------------------

/// Shared switch that simulates a pulled cable on a loopback link.
#[derive(Debug, Clone, Default)]
pub struct LinkControl {
    severed: Arc<AtomicBool>,
}

impl LinkControl {
    pub fn sever(&self) {
        self.severed.store(true, Ordering::Release);
    }

    pub fn restore(&self) {
        self.severed.store(false, Ordering::Release);
    }

    pub fn is_severed(&self) -> bool {
        self.severed.load(Ordering::Acquire)
    }
}

/// Sending end of one loopback direction.
#[derive(Debug)]
pub struct LoopbackTx {
    tx: mpsc::Sender<Bytes>,
    control: LinkControl,
}

impl LinkTransport for LoopbackTx {
    fn try_send(&mut self, payload: Bytes) -> Result<(), LinkError> {
        if self.control.is_severed() {
            return Ok(());
        }
        self.tx.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => LinkError::TransportBusy,
            TrySendError::Closed(_) => LinkError::Closed,
        })
    }
}

/// Receiving end of one loopback direction.
#[derive(Debug)]
pub struct LoopbackRx {
    rx: mpsc::Receiver<Bytes>,
}

impl LoopbackRx {
    /// Non-waiting poll, for drivers that deliver frames from a cyclic task
    /// instead of a Tokio runtime.
    pub fn try_next(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }
}

#[async_trait]
impl FrameSource for LoopbackRx {
    async fn next_frame(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }
}

/// One board's view of a loopback link.
#[derive(Debug)]
pub struct LoopbackEnd {
    pub tx: LoopbackTx,
    pub rx: LoopbackRx,
}

/// Build two connected board ends plus the shared cable switch. `capacity`
/// is the number of frames each direction buffers before `try_send` reports
/// [`LinkError::TransportBusy`].
pub fn loopback_pair(capacity: usize) -> (LoopbackEnd, LoopbackEnd, LinkControl) {
    let control = LinkControl::default();
    let (a_tx, b_rx) = mpsc::channel(capacity.max(1));
    let (b_tx, a_rx) = mpsc::channel(capacity.max(1));
    let a = LoopbackEnd {
        tx: LoopbackTx {
            tx: a_tx,
            control: control.clone(),
        },
        rx: LoopbackRx { rx: a_rx },
    };
    let b = LoopbackEnd {
        tx: LoopbackTx {
            tx: b_tx,
            control: control.clone(),
        },
        rx: LoopbackRx { rx: b_rx },
    };
    (a, b, control)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loopback_delivers_in_both_directions() {
        let (mut a, mut b, _control) = loopback_pair(4);
        a.tx.try_send(Bytes::from_static(b"up")).unwrap();
        b.tx.try_send(Bytes::from_static(b"down")).unwrap();
        assert_eq!(b.rx.next_frame().await.unwrap(), Bytes::from_static(b"up"));
        assert_eq!(a.rx.next_frame().await.unwrap(), Bytes::from_static(b"down"));
    }

    #[test]
    fn full_transport_reports_busy_without_blocking() {
        let (mut a, _b, _control) = loopback_pair(1);
        a.tx.try_send(Bytes::from_static(b"1")).unwrap();
        assert_eq!(
            a.tx.try_send(Bytes::from_static(b"2")),
            Err(LinkError::TransportBusy)
        );
    }

    #[test]
    fn closed_peer_reports_closed() {
        let (mut a, b, _control) = loopback_pair(1);
        drop(b);
        assert_eq!(a.tx.try_send(Bytes::from_static(b"x")), Err(LinkError::Closed));
    }

    #[test]
    fn severed_link_drops_frames() {
        let (mut a, mut b, control) = loopback_pair(4);
        control.sever();
        a.tx.try_send(Bytes::from_static(b"lost")).unwrap();
        assert!(b.rx.try_next().is_none());
        control.restore();
        a.tx.try_send(Bytes::from_static(b"kept")).unwrap();
        assert_eq!(b.rx.try_next().unwrap(), Bytes::from_static(b"kept"));
    }
}

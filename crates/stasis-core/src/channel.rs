//! The broadcast channel seam.
//!
//! Peers exchange records over a topic-based publish/subscribe transport.
//! Every delivered message carries the id of the peer that published it so
//! a peer can recognise (and skip) its own messages echoed back.
//!
//! [`LoopbackHub`] is an in-process transport: every [`LoopbackChannel`]
//! created from one hub sees every other channel's messages. It backs the
//! multi-peer tests and single-process demos.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::BoxFuture;
use tokio::sync::broadcast;
use tracing::warn;

use crate::error::ChannelError;

/// Capacity of the loopback hub before slow subscribers start lagging.
const LOOPBACK_CAPACITY: usize = 1024;

/// One delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Network identity of the publishing peer.
    pub from_peer: String,
    /// Raw payload.
    pub data: Vec<u8>,
}

/// An active subscription to one topic.
pub trait Subscription: Send {
    /// Wait for the next message.
    ///
    /// Returns `Ok(None)` once the subscription has closed.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] on an unrecoverable transport failure.
    fn next(&mut self) -> BoxFuture<'_, Result<Option<Envelope>, ChannelError>>;

    /// Tear the subscription down.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] if the transport rejects the request.
    fn unsubscribe(self: Box<Self>) -> BoxFuture<'static, Result<(), ChannelError>>;
}

/// Topic-based publish/subscribe transport.
pub trait BroadcastChannel: Send + Sync {
    /// Network identity this channel publishes as.
    fn peer_id(&self) -> &str;

    /// Publish `data` on `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Unavailable`] if the transport is down.
    fn publish<'a>(
        &'a self,
        topic: &'a str,
        data: Vec<u8>,
    ) -> BoxFuture<'a, Result<(), ChannelError>>;

    /// Subscribe to `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Unavailable`] if the transport is down.
    fn subscribe<'a>(
        &'a self,
        topic: &'a str,
    ) -> BoxFuture<'a, Result<Box<dyn Subscription>, ChannelError>>;
}

// ---------------------------------------------------------------------------
// Loopback transport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Frame {
    topic: Arc<str>,
    envelope: Envelope,
}

/// In-process broadcast hub shared by several [`LoopbackChannel`]s.
#[derive(Debug, Clone)]
pub struct LoopbackHub {
    sender: broadcast::Sender<Frame>,
    available: Arc<AtomicBool>,
}

impl Default for LoopbackHub {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(LOOPBACK_CAPACITY);
        Self {
            sender,
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// A channel publishing as `peer_id`.
    pub fn channel(&self, peer_id: impl Into<String>) -> LoopbackChannel {
        LoopbackChannel {
            hub: self.clone(),
            peer_id: peer_id.into(),
        }
    }

    /// Toggle simulated availability for publish and subscribe.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), ChannelError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ChannelError::Unavailable("loopback hub offline".to_owned()))
        }
    }
}

/// One peer's view of a [`LoopbackHub`].
#[derive(Debug, Clone)]
pub struct LoopbackChannel {
    hub: LoopbackHub,
    peer_id: String,
}

impl BroadcastChannel for LoopbackChannel {
    fn peer_id(&self) -> &str {
        &self.peer_id
    }

    fn publish<'a>(
        &'a self,
        topic: &'a str,
        data: Vec<u8>,
    ) -> BoxFuture<'a, Result<(), ChannelError>> {
        Box::pin(async move {
            self.hub.check()?;
            let frame = Frame {
                topic: Arc::from(topic),
                envelope: Envelope {
                    from_peer: self.peer_id.clone(),
                    data,
                },
            };
            // No receivers is not an error: nobody is listening yet.
            let _ = self.hub.sender.send(frame);
            Ok(())
        })
    }

    fn subscribe<'a>(
        &'a self,
        topic: &'a str,
    ) -> BoxFuture<'a, Result<Box<dyn Subscription>, ChannelError>> {
        Box::pin(async move {
            self.hub.check()?;
            let sub: Box<dyn Subscription> = Box::new(LoopbackSubscription {
                topic: Arc::from(topic),
                receiver: self.hub.sender.subscribe(),
            });
            Ok(sub)
        })
    }
}

struct LoopbackSubscription {
    topic: Arc<str>,
    receiver: broadcast::Receiver<Frame>,
}

impl Subscription for LoopbackSubscription {
    fn next(&mut self) -> BoxFuture<'_, Result<Option<Envelope>, ChannelError>> {
        Box::pin(async move {
            loop {
                match self.receiver.recv().await {
                    Ok(frame) if frame.topic == self.topic => return Ok(Some(frame.envelope)),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, topic = %self.topic, "loopback subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return Ok(None),
                }
            }
        })
    }

    fn unsubscribe(self: Box<Self>) -> BoxFuture<'static, Result<(), ChannelError>> {
        drop(self);
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn messages_reach_other_peers_on_the_same_topic() {
        let hub = LoopbackHub::new();
        let a = hub.channel("peer-a");
        let b = hub.channel("peer-b");

        let mut sub = b.subscribe("demand").await.unwrap();
        a.publish("critical", b"ignored".to_vec()).await.unwrap();
        a.publish("demand", b"hello".to_vec()).await.unwrap();

        let env = sub.next().await.unwrap().unwrap();
        assert_eq!(env.from_peer, "peer-a");
        assert_eq!(env.data, b"hello");
        sub.unsubscribe().await.unwrap();
    }

    #[tokio::test]
    async fn publishers_hear_their_own_echo() {
        let hub = LoopbackHub::new();
        let a = hub.channel("peer-a");
        let mut sub = a.subscribe("demand").await.unwrap();
        a.publish("demand", b"x".to_vec()).await.unwrap();
        assert_eq!(sub.next().await.unwrap().unwrap().from_peer, a.peer_id());
    }

    #[tokio::test]
    async fn offline_hub_is_unavailable() {
        let hub = LoopbackHub::new();
        let a = hub.channel("peer-a");
        hub.set_available(false);
        assert!(matches!(
            a.publish("demand", Vec::new()).await,
            Err(ChannelError::Unavailable(_))
        ));
        assert!(a.subscribe("demand").await.is_err());
    }
}

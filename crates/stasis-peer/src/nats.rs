//! NATS transport for the broadcast channel.
//!
//! Topics map one-to-one onto NATS subjects. Every published message
//! carries the publisher's peer id in the `Stasis-Peer` header so
//! receivers can skip their own echoes.
//!
//! The client is created with `retry_on_initial_connect`: the peer starts
//! even when NATS is down and the client keeps reconnecting in the
//! background.

use async_nats::{Client, ConnectOptions, HeaderMap, Subscriber};
use futures::StreamExt;
use futures::future::BoxFuture;
use stasis_core::{BroadcastChannel, ChannelError, Envelope, Subscription};
use tracing::{debug, info};

/// Header carrying the publishing peer id.
pub const PEER_HEADER: &str = "Stasis-Peer";

/// Broadcast channel over a NATS connection.
pub struct NatsChannel {
    client: Client,
    peer_id: String,
}

impl NatsChannel {
    /// Create a NATS client for `peer_id`.
    ///
    /// The connection is established in the background.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Unavailable`] if the URL is unusable.
    pub async fn connect(url: &str, peer_id: String) -> Result<Self, ChannelError> {
        info!(url = url, peer_id = %peer_id, "connecting to NATS server");
        let client = ConnectOptions::new()
            .name(format!("stasis-peer-{peer_id}"))
            .retry_on_initial_connect()
            .connect(url)
            .await
            .map_err(|e| ChannelError::Unavailable(format!("failed to connect to {url}: {e}")))?;
        Ok(Self { client, peer_id })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(PEER_HEADER, self.peer_id.as_str());
        headers
    }
}

impl BroadcastChannel for NatsChannel {
    fn peer_id(&self) -> &str {
        &self.peer_id
    }

    fn publish<'a>(
        &'a self,
        topic: &'a str,
        data: Vec<u8>,
    ) -> BoxFuture<'a, Result<(), ChannelError>> {
        Box::pin(async move {
            debug!(subject = topic, bytes = data.len(), "publishing");
            self.client
                .publish_with_headers(topic.to_owned(), self.headers(), data.into())
                .await
                .map_err(|e| {
                    ChannelError::Unavailable(format!("failed to publish to {topic}: {e}"))
                })
        })
    }

    fn subscribe<'a>(
        &'a self,
        topic: &'a str,
    ) -> BoxFuture<'a, Result<Box<dyn Subscription>, ChannelError>> {
        Box::pin(async move {
            let subscriber = self.client.subscribe(topic.to_owned()).await.map_err(|e| {
                ChannelError::Unavailable(format!("failed to subscribe to {topic}: {e}"))
            })?;
            info!(subject = topic, "subscribed");
            Ok(Box::new(NatsSubscription { subscriber }) as Box<dyn Subscription>)
        })
    }
}

impl std::fmt::Debug for NatsChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsChannel")
            .field("peer_id", &self.peer_id)
            .finish_non_exhaustive()
    }
}

struct NatsSubscription {
    subscriber: Subscriber,
}

impl Subscription for NatsSubscription {
    fn next(&mut self) -> BoxFuture<'_, Result<Option<Envelope>, ChannelError>> {
        Box::pin(async move {
            Ok(self.subscriber.next().await.map(|message| Envelope {
                from_peer: publisher(message.headers.as_ref()),
                data: message.payload.to_vec(),
            }))
        })
    }

    fn unsubscribe(self: Box<Self>) -> BoxFuture<'static, Result<(), ChannelError>> {
        let mut subscriber = self.subscriber;
        Box::pin(async move {
            subscriber
                .unsubscribe()
                .await
                .map_err(|e| ChannelError::Unavailable(format!("unsubscribe failed: {e}")))
        })
    }
}

/// Peer id from a message's headers; empty when the publisher set none.
pub fn publisher(headers: Option<&HeaderMap>) -> String {
    headers
        .and_then(|h| h.get(PEER_HEADER))
        .map(|v| v.as_str().to_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn publisher_reads_peer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(PEER_HEADER, "QmPeer0001");
        assert_eq!(publisher(Some(&headers)), "QmPeer0001");
    }

    #[test]
    fn publisher_is_empty_without_header() {
        assert_eq!(publisher(None), "");
        assert_eq!(publisher(Some(&HeaderMap::new())), "");
    }

    // Integration tests that require a live NATS server are marked #[ignore].
    #[tokio::test]
    #[ignore]
    async fn echo_carries_peer_id() {
        let channel = NatsChannel::connect("nats://localhost:4222", "QmPeerEcho".to_owned())
            .await
            .unwrap();
        let mut sub = channel.subscribe("stasis-test").await.unwrap();
        channel
            .publish("stasis-test", b"hello".to_vec())
            .await
            .unwrap();

        let envelope = sub.next().await.unwrap().unwrap();
        assert_eq!(envelope.from_peer, "QmPeerEcho");
        assert_eq!(envelope.data, b"hello");
        sub.unsubscribe().await.unwrap();
    }
}

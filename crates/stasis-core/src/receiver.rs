//! The receive loop and its supervisor.
//!
//! [`receive_loop`] drains one subscription: it hands every message to the
//! ingestor and immediately waits for the next one. It ends on shutdown,
//! when the subscription closes, or on a channel error, and always
//! unsubscribes on the way out. [`supervise`] resubscribes with backoff
//! until shutdown.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::channel::Subscription;
use crate::error::{ChannelError, IngestError};
use crate::ingest::RecordIngestor;
use crate::retry::compute_delay;

/// Why a receive loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    /// Shutdown was requested.
    Shutdown,
    /// The subscription ended.
    Closed,
    /// The channel failed.
    Failed(ChannelError),
    /// The peer actor stopped; nothing can be applied any more.
    ActorGone,
}

/// Drain `subscription` into `ingestor` until shutdown or failure.
pub async fn receive_loop(
    ingestor: &RecordIngestor,
    mut subscription: Box<dyn Subscription>,
    shutdown: &mut watch::Receiver<bool>,
) -> LoopExit {
    let exit = loop {
        if *shutdown.borrow() {
            break LoopExit::Shutdown;
        }
        let next = tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break LoopExit::Shutdown;
                }
                continue;
            }
            next = subscription.next() => next,
        };
        let envelope = match next {
            Ok(Some(envelope)) => envelope,
            Ok(None) => break LoopExit::Closed,
            Err(e) => break LoopExit::Failed(e),
        };
        match ingestor.on_receive(&envelope).await {
            Ok(_) => {}
            Err(IngestError::Actor(_)) => break LoopExit::ActorGone,
            Err(e) => warn!(error = %e, "dropping inbound message"),
        }
    };

    if let Err(e) = subscription.unsubscribe().await {
        warn!(error = %e, "unsubscribe failed");
    }
    debug!(?exit, "receive loop ended");
    exit
}

/// Keep a subscription to the demand topic alive until shutdown.
///
/// `initial` is used first when present, so a caller can subscribe before
/// bootstrapping and miss nothing.
pub async fn supervise(
    ingestor: Arc<RecordIngestor>,
    initial: Option<Box<dyn Subscription>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let topic = ingestor.settings().demand_topic.clone();
    let retry = ingestor.settings().retry.clone();
    let mut pending = initial;
    let mut failures: u32 = 0;

    loop {
        if *shutdown.borrow() {
            break;
        }
        let subscription = match pending.take() {
            Some(sub) => Some(sub),
            None => match ingestor.channel().subscribe(&topic).await {
                Ok(sub) => Some(sub),
                Err(e) => {
                    warn!(topic = %topic, error = %e, "subscribe failed");
                    None
                }
            },
        };

        if let Some(subscription) = subscription {
            info!(topic = %topic, "receiving");
            failures = 0;
            match receive_loop(&ingestor, subscription, &mut shutdown).await {
                LoopExit::Shutdown => break,
                LoopExit::ActorGone => {
                    error!("peer actor stopped, receiver exiting");
                    break;
                }
                LoopExit::Closed => warn!(topic = %topic, "subscription closed"),
                LoopExit::Failed(e) => warn!(topic = %topic, error = %e, "subscription failed"),
            }
        }

        failures = failures.saturating_add(1);
        let delay = compute_delay(&retry, failures);
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            () = tokio::time::sleep(delay) => {}
        }
    }
    info!(topic = %topic, "receiver stopped");
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::time::Duration;

    use chrono::Utc;
    use rust_decimal::Decimal;
    use stasis_db::MemoryStore;
    use stasis_types::{Category, CitizenId, Record, RecordId};

    use super::*;
    use crate::actor::{self, PeerState};
    use crate::channel::{BroadcastChannel, LoopbackHub};
    use crate::codec::encode_record;
    use crate::config::{NotificationConfig, RetryConfig};
    use crate::ingest::IngestSettings;

    fn ingestor(hub: &LoopbackHub) -> Arc<RecordIngestor> {
        let state = PeerState::new(CitizenId::from("me"), &NotificationConfig::default());
        let peer = actor::spawn(state, Duration::from_secs(5));
        Arc::new(RecordIngestor::new(
            Arc::new(MemoryStore::new()),
            Arc::new(hub.channel("peer-local")),
            peer,
            IngestSettings {
                db_address: "supply-demand".to_owned(),
                demand_topic: "demand".to_owned(),
                critical_topic: "critical".to_owned(),
                retry: RetryConfig {
                    max_attempts: 2,
                    initial_delay_ms: 5,
                    max_delay_ms: 10,
                },
            },
        ))
    }

    fn record(id: u64) -> Vec<u8> {
        encode_record(&Record::pending(
            RecordId::new(id),
            CitizenId::from("remote"),
            Category::Food,
            Decimal::ONE,
            String::new(),
            Utc::now(),
        ))
        .unwrap()
    }

    async fn wait_for_pending(ingestor: &RecordIngestor, n: usize) {
        for _ in 0..200 {
            if ingestor.peer().pending().await.unwrap().len() == n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(ingestor.peer().pending().await.unwrap().len(), n);
    }

    #[tokio::test]
    async fn loop_survives_bad_messages_and_stops_on_shutdown() {
        let hub = LoopbackHub::new();
        let ingestor = ingestor(&hub);
        let remote = hub.channel("peer-remote");
        let sub = ingestor.channel().subscribe("demand").await.unwrap();
        let (tx, mut rx) = watch::channel(false);

        let task = {
            let ingestor = Arc::clone(&ingestor);
            tokio::spawn(async move { receive_loop(&ingestor, sub, &mut rx).await })
        };

        remote.publish("demand", b"garbage".to_vec()).await.unwrap();
        remote.publish("demand", record(1)).await.unwrap();
        wait_for_pending(&ingestor, 1).await;

        tx.send(true).unwrap();
        assert_eq!(task.await.unwrap(), LoopExit::Shutdown);
    }

    #[tokio::test]
    async fn supervisor_resubscribes_after_outage() {
        let hub = LoopbackHub::new();
        let ingestor = ingestor(&hub);
        let remote = hub.channel("peer-remote");
        let (tx, rx) = watch::channel(false);

        hub.set_available(false);
        let task = tokio::spawn(supervise(Arc::clone(&ingestor), None, rx));
        tokio::time::sleep(Duration::from_millis(30)).await;
        hub.set_available(true);

        // Keep publishing until the resubscribed loop picks a record up.
        for _ in 0..200 {
            remote.publish("demand", record(1)).await.unwrap();
            if ingestor.peer().pending().await.unwrap().len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        wait_for_pending(&ingestor, 1).await;

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}

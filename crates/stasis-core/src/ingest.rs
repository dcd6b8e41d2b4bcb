//! Record ingestion: bootstrap, local submissions, and inbound messages.
//!
//! The [`RecordIngestor`] performs every suspending operation on behalf of
//! the actor: it reads the snapshot, writes records to the store, and
//! publishes them on the channel. The actor applies the result; the
//! ingestor never touches the ledger directly.
//!
//! Local submissions are optimistic. The actor applies the record first,
//! then the ingestor delivers it. If delivery fails after all retries the
//! record stays in the local ledger and the caller gets
//! [`SubmitError::NotDelivered`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use stasis_db::{LedgerStore, SNAPSHOT_KEY, StoreError};
use stasis_ledger::Upsert;
use stasis_types::{DemandDraft, Record, RecordId};

use crate::actor::PeerHandle;
use crate::channel::{BroadcastChannel, Envelope};
use crate::codec::{decode_record, decode_snapshot, encode_record};
use crate::config::{RetryConfig, StasisConfig};
use crate::error::{ActorError, DeliveryError, IngestError, SubmitError};
use crate::notify::Message;
use crate::retry::retry_with_backoff;

/// A change the local citizen wants to make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Ask for something.
    Demand(DemandDraft),
    /// Supply a pending record.
    Supply(RecordId),
}

/// How a bootstrap ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The snapshot was read; this many records were decoded.
    Loaded(usize),
    /// The store holds no ledger yet.
    Empty,
    /// The store could not be read; the peer runs on what it has and will
    /// try again before the next submission.
    Degraded,
}

/// Where records are stored and broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSettings {
    /// Database holding the ledger.
    pub db_address: String,
    /// Topic carrying records.
    pub demand_topic: String,
    /// Topic carrying shortage headers.
    pub critical_topic: String,
    /// Backoff for store writes and publishes.
    pub retry: RetryConfig,
}

impl IngestSettings {
    /// Extract the ingest settings from the peer configuration.
    pub fn from_config(config: &StasisConfig) -> Self {
        Self {
            db_address: config.ledger.db_address.clone(),
            demand_topic: config.channel.demand_topic.clone(),
            critical_topic: config.channel.critical_topic.clone(),
            retry: config.retry.clone(),
        }
    }
}

/// Moves records between the store, the channel, and the peer actor.
pub struct RecordIngestor {
    store: Arc<dyn LedgerStore>,
    channel: Arc<dyn BroadcastChannel>,
    peer: PeerHandle,
    settings: IngestSettings,
    needs_bootstrap: AtomicBool,
}

impl std::fmt::Debug for RecordIngestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordIngestor")
            .field("peer_id", &self.channel.peer_id())
            .field("settings", &self.settings)
            .field("needs_bootstrap", &self.needs_bootstrap)
            .finish_non_exhaustive()
    }
}

impl RecordIngestor {
    /// Create an ingestor. Nothing is read until [`Self::bootstrap`].
    pub fn new(
        store: Arc<dyn LedgerStore>,
        channel: Arc<dyn BroadcastChannel>,
        peer: PeerHandle,
        settings: IngestSettings,
    ) -> Self {
        Self {
            store,
            channel,
            peer,
            settings,
            needs_bootstrap: AtomicBool::new(true),
        }
    }

    /// The channel records are published on.
    pub fn channel(&self) -> &Arc<dyn BroadcastChannel> {
        &self.channel
    }

    /// The actor this ingestor feeds.
    pub const fn peer(&self) -> &PeerHandle {
        &self.peer
    }

    /// The ingest settings.
    pub const fn settings(&self) -> &IngestSettings {
        &self.settings
    }

    /// Whether the last bootstrap could not reach the store.
    pub fn is_degraded(&self) -> bool {
        self.needs_bootstrap.load(Ordering::SeqCst)
    }

    /// Load the ledger snapshot into the actor.
    ///
    /// A missing ledger counts as success. An unreachable store degrades to
    /// whatever the peer already holds and marks the ingestor for another
    /// attempt before the next submission.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError`] if the peer actor has stopped.
    pub async fn bootstrap(&self) -> Result<BootstrapOutcome, ActorError> {
        let db = self.settings.db_address.as_str();
        let (records, outcome) = match self.store.get(db, SNAPSHOT_KEY).await {
            Ok(bytes) => match decode_snapshot(&bytes) {
                Ok(records) => {
                    let n = records.len();
                    (records, BootstrapOutcome::Loaded(n))
                }
                Err(e) => {
                    warn!(db, error = %e, "ledger snapshot is malformed");
                    (Vec::new(), BootstrapOutcome::Degraded)
                }
            },
            Err(StoreError::NotFound { .. }) => {
                info!(db, "no ledger yet, starting empty");
                (Vec::new(), BootstrapOutcome::Empty)
            }
            Err(e) => {
                warn!(db, error = %e, "ledger store unavailable, continuing degraded");
                (Vec::new(), BootstrapOutcome::Degraded)
            }
        };

        let degraded = outcome == BootstrapOutcome::Degraded;
        let alerts = self.peer.bootstrap(records, degraded).await?;
        self.needs_bootstrap.store(degraded, Ordering::SeqCst);
        self.publish_alerts(alerts).await;
        Ok(outcome)
    }

    /// Apply a local submission and deliver it to the store and channel.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Rejected`] if the ledger refuses it and
    /// [`SubmitError::NotDelivered`] if it was applied locally but could
    /// not be written or broadcast.
    pub async fn submit(&self, submission: Submission) -> Result<Record, SubmitError> {
        if self.needs_bootstrap.load(Ordering::SeqCst) {
            self.bootstrap().await?;
        }

        let applied = match submission {
            Submission::Demand(draft) => self.peer.submit_demand(draft).await?,
            Submission::Supply(id) => self.peer.submit_supply(id).await?,
        };
        self.publish_alerts(applied.alerts).await;
        let record = applied.value;

        let bytes = encode_record(&record).map_err(SubmitError::Encode)?;
        if let Err(source) = self.deliver(&record, bytes).await {
            warn!(id = %record.id, error = %source, "record kept locally but not delivered");
            if let Err(e) = self.peer.notify(Message::not_delivered(&record)).await {
                debug!(error = %e, "could not raise delivery warning");
            }
            return Err(SubmitError::NotDelivered {
                record: Box::new(record),
                source,
            });
        }
        info!(
            id = %record.id,
            category = %record.category,
            fulfilled = record.fulfilled,
            "record delivered"
        );
        Ok(record)
    }

    /// Handle one message from the demand topic.
    ///
    /// Returns `Ok(None)` for this peer's own echo.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Decode`] or [`IngestError::Rejected`] for a
    /// message that must be dropped, and [`IngestError::Actor`] if the peer
    /// actor has stopped.
    pub async fn on_receive(&self, envelope: &Envelope) -> Result<Option<Upsert>, IngestError> {
        if envelope.from_peer == self.channel.peer_id() {
            debug!("ignoring own message");
            return Ok(None);
        }
        let record = decode_record(&envelope.data)?;
        let id = record.id;
        let applied = self.peer.apply_remote(record).await?;
        debug!(
            id = %id,
            from = %envelope.from_peer,
            outcome = ?applied.value,
            "remote record applied"
        );
        self.publish_alerts(applied.alerts).await;
        Ok(Some(applied.value))
    }

    async fn deliver(&self, record: &Record, bytes: Vec<u8>) -> Result<(), DeliveryError> {
        let key = record.id.to_string();
        let key = key.as_str();
        let db = self.settings.db_address.as_str();

        retry_with_backoff(
            &self.settings.retry,
            "store put",
            |e: &StoreError| matches!(e, StoreError::Unavailable(_)),
            || self.store.put(db, key, bytes.clone()),
        )
        .await?;

        retry_with_backoff(
            &self.settings.retry,
            "channel publish",
            |_| true,
            || self.channel.publish(&self.settings.demand_topic, bytes.clone()),
        )
        .await?;
        Ok(())
    }

    /// Publish shortage headers once each; failures are only logged.
    async fn publish_alerts(&self, alerts: Vec<String>) {
        for alert in alerts {
            if let Err(e) = self
                .channel
                .publish(&self.settings.critical_topic, alert.into_bytes())
                .await
            {
                warn!(error = %e, "failed to publish shortage alert");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use rust_decimal::Decimal;
    use stasis_db::MemoryStore;
    use stasis_types::{Category, CitizenId};

    use super::*;
    use crate::actor::{self, PeerState};
    use crate::channel::LoopbackHub;
    use crate::config::NotificationConfig;

    fn settings() -> IngestSettings {
        IngestSettings {
            db_address: "supply-demand".to_owned(),
            demand_topic: "demand".to_owned(),
            critical_topic: "critical".to_owned(),
            retry: RetryConfig {
                max_attempts: 2,
                initial_delay_ms: 1,
                max_delay_ms: 2,
            },
        }
    }

    fn ingestor(store: &MemoryStore, hub: &LoopbackHub) -> RecordIngestor {
        let state = PeerState::new(CitizenId::from("me"), &NotificationConfig::default());
        let peer = actor::spawn(state, std::time::Duration::from_secs(5));
        RecordIngestor::new(
            Arc::new(store.clone()),
            Arc::new(hub.channel("peer-local")),
            peer,
            settings(),
        )
    }

    fn water() -> DemandDraft {
        DemandDraft {
            category: Category::Water,
            quantity: Decimal::new(3, 0),
            details: "bottles".to_owned(),
        }
    }

    #[tokio::test]
    async fn empty_store_bootstraps_empty() {
        let ingestor = ingestor(&MemoryStore::new(), &LoopbackHub::new());
        assert_eq!(ingestor.bootstrap().await.unwrap(), BootstrapOutcome::Empty);
        assert!(!ingestor.is_degraded());
    }

    #[tokio::test]
    async fn unavailable_store_degrades_then_recovers_on_submit() {
        let store = MemoryStore::new();
        let hub = LoopbackHub::new();
        let ingestor = ingestor(&store, &hub);

        store.set_available(false);
        assert_eq!(ingestor.bootstrap().await.unwrap(), BootstrapOutcome::Degraded);
        assert!(ingestor.is_degraded());

        store.set_available(true);
        let record = ingestor.submit(Submission::Demand(water())).await.unwrap();
        assert_eq!(record.id, RecordId::new(1));
        assert!(!ingestor.is_degraded());
        assert_eq!(store.len("supply-demand").await, 1);
    }

    #[tokio::test]
    async fn undelivered_supply_survives_the_lazy_rebootstrap() {
        let store = MemoryStore::new();
        let hub = LoopbackHub::new();
        let requested = Record::pending(
            RecordId::new(1),
            CitizenId::from("other"),
            Category::Food,
            Decimal::ONE,
            String::new(),
            chrono::Utc::now(),
        );
        store
            .put("supply-demand", "1", encode_record(&requested).unwrap())
            .await
            .unwrap();
        let ingestor = ingestor(&store, &hub);
        assert_eq!(ingestor.bootstrap().await.unwrap(), BootstrapOutcome::Loaded(1));

        store.set_available(false);
        assert_eq!(ingestor.bootstrap().await.unwrap(), BootstrapOutcome::Degraded);
        let err = ingestor
            .submit(Submission::Supply(RecordId::new(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::NotDelivered { .. }));
        assert!(ingestor.peer().pending().await.unwrap().is_empty());

        // The next submission reloads the stale snapshot that still has #1 pending.
        store.set_available(true);
        let demand = ingestor.submit(Submission::Demand(water())).await.unwrap();
        assert_eq!(demand.id, RecordId::new(2));
        assert!(!ingestor.is_degraded());

        let pending: Vec<RecordId> = ingestor
            .peer()
            .pending()
            .await
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(pending, vec![RecordId::new(2)]);
    }

    #[tokio::test]
    async fn submission_is_stored_and_broadcast() {
        let store = MemoryStore::new();
        let hub = LoopbackHub::new();
        let ingestor = ingestor(&store, &hub);
        ingestor.bootstrap().await.unwrap();

        let listener = hub.channel("peer-remote");
        let mut sub = listener.subscribe("demand").await.unwrap();
        let record = ingestor.submit(Submission::Demand(water())).await.unwrap();

        let envelope = sub.next().await.unwrap().unwrap();
        assert_eq!(envelope.from_peer, "peer-local");
        assert_eq!(decode_record(&envelope.data).unwrap(), record);

        let stored = store.get("supply-demand", "1").await.unwrap();
        assert_eq!(decode_record(&stored).unwrap(), record);
    }

    #[tokio::test]
    async fn failed_delivery_keeps_the_local_record() {
        let store = MemoryStore::new();
        let hub = LoopbackHub::new();
        let ingestor = ingestor(&store, &hub);
        ingestor.bootstrap().await.unwrap();

        hub.set_available(false);
        let err = ingestor.submit(Submission::Demand(water())).await.unwrap_err();
        match err {
            SubmitError::NotDelivered { record, source } => {
                assert_eq!(record.id, RecordId::new(1));
                assert!(matches!(source, DeliveryError::Channel(_)));
            }
            other => panic!("unexpected error: {other}"),
        }

        let pending = ingestor.peer().pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        let notes = ingestor.peer().notifications().await.unwrap();
        assert!(notes.iter().any(|n| n.title == "Not delivered"));
    }

    #[tokio::test]
    async fn supplying_an_unknown_record_is_rejected() {
        let ingestor = ingestor(&MemoryStore::new(), &LoopbackHub::new());
        ingestor.bootstrap().await.unwrap();
        let err = ingestor
            .submit(Submission::Supply(RecordId::new(9)))
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Rejected(_)));
    }

    #[tokio::test]
    async fn own_echo_and_garbage_are_dropped() {
        let ingestor = ingestor(&MemoryStore::new(), &LoopbackHub::new());
        ingestor.bootstrap().await.unwrap();

        let echo = Envelope {
            from_peer: "peer-local".to_owned(),
            data: b"anything".to_vec(),
        };
        assert_eq!(ingestor.on_receive(&echo).await.unwrap(), None);

        let garbage = Envelope {
            from_peer: "peer-remote".to_owned(),
            data: b"{not json".to_vec(),
        };
        assert!(matches!(
            ingestor.on_receive(&garbage).await,
            Err(IngestError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn fulfilled_records_cannot_be_rewritten_remotely() {
        let ingestor = ingestor(&MemoryStore::new(), &LoopbackHub::new());
        ingestor.bootstrap().await.unwrap();
        let record = ingestor.submit(Submission::Demand(water())).await.unwrap();
        ingestor
            .submit(Submission::Supply(record.id))
            .await
            .unwrap();

        let rewrite = Envelope {
            from_peer: "peer-remote".to_owned(),
            data: encode_record(&record).unwrap(),
        };
        assert!(matches!(
            ingestor.on_receive(&rewrite).await,
            Err(IngestError::Rejected(_))
        ));
    }
}

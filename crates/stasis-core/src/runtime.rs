//! Peer lifecycle: start, run, and shut down.
//!
//! Startup order: derive the citizen id, spawn the actor, subscribe to the
//! demand topic, bootstrap from the store, then hand the subscription to
//! the supervised receive loop. Subscribing before the bootstrap means a
//! record published in between is not lost; the bootstrap merge keeps it.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use stasis_db::LedgerStore;
use stasis_types::CitizenId;

use crate::actor::{self, PeerHandle, PeerState};
use crate::channel::BroadcastChannel;
use crate::config::StasisConfig;
use crate::error::StartError;
use crate::identity;
use crate::ingest::{BootstrapOutcome, IngestSettings, RecordIngestor};
use crate::receiver::supervise;

/// A running peer.
#[derive(Debug)]
pub struct PeerRuntime {
    citizen: CitizenId,
    ingestor: Arc<RecordIngestor>,
    bootstrap: BootstrapOutcome,
    shutdown: watch::Sender<bool>,
    receiver: JoinHandle<()>,
}

impl PeerRuntime {
    /// Start a peer on `store` and `channel`.
    ///
    /// An unreachable store or channel does not fail startup; the peer runs
    /// degraded and recovers in the background.
    ///
    /// # Errors
    ///
    /// Returns [`StartError::Identity`] if the citizen id cannot be derived.
    pub async fn start(
        config: &StasisConfig,
        store: Arc<dyn LedgerStore>,
        channel: Arc<dyn BroadcastChannel>,
    ) -> Result<Self, StartError> {
        let citizen = identity::citizen_id(&config.peer.identity_secret, channel.peer_id())?;
        info!(peer_id = %channel.peer_id(), citizen = %citizen, "starting peer");

        let state = PeerState::new(citizen.clone(), &config.notifications);
        let peer = actor::spawn(state, config.notifications.ttl());
        let ingestor = Arc::new(RecordIngestor::new(
            store,
            channel,
            peer,
            IngestSettings::from_config(config),
        ));

        let initial = match ingestor
            .channel()
            .subscribe(&config.channel.demand_topic)
            .await
        {
            Ok(sub) => Some(sub),
            Err(e) => {
                warn!(error = %e, "initial subscribe failed, receiver will retry");
                None
            }
        };

        let bootstrap = ingestor.bootstrap().await?;

        let (shutdown, rx) = watch::channel(false);
        let receiver = tokio::spawn(supervise(Arc::clone(&ingestor), initial, rx));

        Ok(Self {
            citizen,
            ingestor,
            bootstrap,
            shutdown,
            receiver,
        })
    }

    /// The local citizen.
    pub const fn citizen(&self) -> &CitizenId {
        &self.citizen
    }

    /// The ingestor for local submissions.
    pub const fn ingestor(&self) -> &Arc<RecordIngestor> {
        &self.ingestor
    }

    /// The actor for queries.
    pub fn peer(&self) -> &PeerHandle {
        self.ingestor.peer()
    }

    /// How the startup bootstrap ended.
    pub const fn bootstrap_outcome(&self) -> BootstrapOutcome {
        self.bootstrap
    }

    /// Stop the receive loop and wait for it to unsubscribe.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.receiver.await {
            warn!(error = %e, "receiver task ended abnormally");
        }
        info!(citizen = %self.citizen, "peer stopped");
    }
}

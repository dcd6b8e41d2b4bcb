//! The mutation actor: sole owner of a peer's ledger and derived state.
//!
//! # Architecture
//!
//! [`PeerState`] holds the ledger, the rankings, and the notification
//! center, and exposes synchronous operations that take "now" explicitly.
//! [`spawn`] moves it into a tokio task that serves [`Command`]s one at a
//! time from an mpsc queue; [`PeerHandle`] is the cloneable front door.
//!
//! No I/O happens inside the actor. Operations that raise a shortage alert
//! return its plain-text header as part of [`Applied`] so the caller can
//! publish it on the critical topic.
//!
//! Notification expiry is a delayed `Expire` command the actor sends to
//! itself through a weak sender, so pending timers never keep the actor
//! alive after the last handle is dropped.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use stasis_chart::{ChartError, aggregate};
use stasis_ledger::{Ledger, LedgerError, Upsert, ranking};
use stasis_types::{
    Category, CategoryFilter, Chart, ChartFilter, CitizenId, DemandDraft, Notification,
    NotificationId, Period, Ranking, Record, RecordId, StatsScope,
};

use crate::config::NotificationConfig;
use crate::error::{ActorError, IngestError, QueryError, SubmitError};
use crate::notify::{Message, NotificationCenter};

/// Depth of the command queue.
const COMMAND_QUEUE: usize = 256;

/// Result of a mutation plus the shortage headers it raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Applied<T> {
    /// What the mutation produced.
    pub value: T,
    /// Shortage headers to publish on the critical topic.
    pub alerts: Vec<String>,
}

/// Snapshot of the peer's health for the observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerStatus {
    /// The local citizen.
    pub citizen_id: CitizenId,
    /// Records in the local ledger.
    pub records: usize,
    /// Records still awaiting a supplier.
    pub pending: usize,
    /// Notifications currently held.
    pub notifications: usize,
    /// Whether a bootstrap from the store has succeeded.
    pub bootstrapped: bool,
}

/// Notifications raised by one operation.
type Raised = Applied<Vec<Notification>>;

// ---------------------------------------------------------------------------
// PeerState
// ---------------------------------------------------------------------------

/// Everything a peer knows, mutated only by its actor.
#[derive(Debug)]
pub struct PeerState {
    citizen: CitizenId,
    ledger: Ledger,
    rankings: Vec<Ranking>,
    notifications: NotificationCenter,
    milestone_every: u64,
    bootstrapped: bool,
    welcomed: bool,
    ranked_first: bool,
    negative: bool,
}

impl PeerState {
    /// Fresh state for `citizen` with an empty ledger.
    pub fn new(citizen: CitizenId, config: &NotificationConfig) -> Self {
        Self {
            citizen,
            ledger: Ledger::new(),
            rankings: Vec::new(),
            notifications: NotificationCenter::new(config.ttl()),
            milestone_every: config.milestone_every,
            bootstrapped: false,
            welcomed: false,
            ranked_first: false,
            negative: false,
        }
    }

    /// The local citizen.
    pub const fn citizen(&self) -> &CitizenId {
        &self.citizen
    }

    /// The local ledger.
    pub const fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Current rankings, best first.
    pub fn rankings(&self) -> &[Ranking] {
        &self.rankings
    }

    /// Replace the ledger with a bootstrap snapshot.
    ///
    /// The snapshot wins for every id it contains, except that a record this
    /// peer already holds as fulfilled never goes back to pending. Records
    /// only this peer knows (for example, submitted while the store was
    /// down) are kept. `degraded` marks a bootstrap that could not reach the
    /// store.
    pub fn bootstrap(
        &mut self,
        records: Vec<Record>,
        degraded: bool,
        now: DateTime<Utc>,
    ) -> Applied<Vec<Notification>> {
        let previous = std::mem::replace(&mut self.ledger, Ledger::from_records(records));
        for record in previous.iter() {
            let keep = self
                .ledger
                .get(record.id)
                .is_none_or(|snapshot| record.fulfilled && !snapshot.fulfilled);
            if keep {
                if let Err(e) = self.ledger.upsert(record.clone()) {
                    warn!(id = %record.id, error = %e, "dropping local record during bootstrap");
                }
            }
        }
        self.bootstrapped = self.bootstrapped || !degraded;
        info!(
            records = self.ledger.len(),
            degraded,
            next_id = ?self.ledger.next_id().ok(),
            "ledger bootstrapped"
        );

        let mut raised = Raised::default();
        if !degraded && !self.welcomed {
            self.welcomed = true;
            if !self.ledger.knows_citizen(&self.citizen) {
                raised
                    .value
                    .push(self.notifications.raise(Message::welcome_local(), now));
            }
        }
        self.after_ingest(now, &mut raised);
        raised
    }

    /// Append a demand from the local citizen.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if no id is available or the draft is invalid.
    pub fn submit_demand(
        &mut self,
        draft: DemandDraft,
        now: DateTime<Utc>,
    ) -> Result<(Record, Applied<Vec<Notification>>), LedgerError> {
        let record = self.ledger.append_demand(self.citizen.clone(), draft, now)?;
        let mut raised = Raised::default();
        raised
            .value
            .push(self.notifications.raise(Message::demand_sent(&record), now));

        let count = count_u64(self.ledger.iter().filter(|r| r.citizen_id == self.citizen).count());
        if self.is_milestone(count) {
            raised
                .value
                .push(self.notifications.raise(Message::demand_milestone(count), now));
        }
        self.after_ingest(now, &mut raised);
        Ok((record, raised))
    }

    /// Fulfill a pending record on behalf of the local citizen.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] or [`LedgerError::AlreadyFulfilled`].
    pub fn submit_supply(
        &mut self,
        id: RecordId,
        now: DateTime<Utc>,
    ) -> Result<(Record, Applied<Vec<Notification>>), LedgerError> {
        let record = self.ledger.fulfill(id, self.citizen.clone(), now)?;
        let mut raised = Raised::default();
        raised
            .value
            .push(self.notifications.raise(Message::supply_sent(&record), now));

        let count = count_u64(
            self.ledger
                .iter()
                .filter(|r| r.fulfilled_by.as_ref() == Some(&self.citizen))
                .count(),
        );
        if self.is_milestone(count) {
            raised
                .value
                .push(self.notifications.raise(Message::supply_milestone(count), now));
        }
        self.after_ingest(now, &mut raised);
        Ok((record, raised))
    }

    /// Merge a record received from another peer.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the record is invalid or would modify a
    /// fulfilled record.
    pub fn apply_remote(
        &mut self,
        record: Record,
        now: DateTime<Utc>,
    ) -> Result<(Upsert, Applied<Vec<Notification>>), LedgerError> {
        let newcomers: Vec<CitizenId> = std::iter::once(&record.citizen_id)
            .chain(record.fulfilled_by.as_ref())
            .filter(|c| **c != self.citizen && !self.ledger.knows_citizen(c))
            .cloned()
            .collect();

        let outcome = self.ledger.upsert(record)?;
        let mut raised = Raised::default();
        if outcome.changed() {
            for citizen in newcomers {
                raised.value.push(
                    self.notifications
                        .raise(Message::welcome_remote(citizen.as_str()), now),
                );
            }
            self.after_ingest(now, &mut raised);
        }
        Ok((outcome, raised))
    }

    /// Build a chart as seen at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`ChartError`] for an unusable filter.
    pub fn chart(&self, filter: &ChartFilter, now: DateTime<Utc>) -> Result<Chart, ChartError> {
        aggregate(&self.ledger, filter, &self.citizen, now)
    }

    /// Unfulfilled records, ascending by id.
    pub fn pending(&self) -> Vec<Record> {
        self.ledger.pending().cloned().collect()
    }

    /// Notifications visible at `now`.
    pub fn notifications(&self, now: DateTime<Utc>) -> Vec<Notification> {
        self.notifications.active(now)
    }

    /// Raise an arbitrary notification.
    pub fn notify(&mut self, message: Message, now: DateTime<Utc>) -> Notification {
        self.notifications.raise(message, now)
    }

    /// Drop a notification whose time is up.
    pub fn expire(&mut self, id: NotificationId) -> bool {
        self.notifications.expire(id)
    }

    /// Health summary.
    pub fn status(&self) -> PeerStatus {
        PeerStatus {
            citizen_id: self.citizen.clone(),
            records: self.ledger.len(),
            pending: self.ledger.pending().count(),
            notifications: self.notifications.len(),
            bootstrapped: self.bootstrapped,
        }
    }

    const fn is_milestone(&self, count: u64) -> bool {
        count > 0 && matches!(count.checked_rem(self.milestone_every), Some(0))
    }

    /// Recompute rankings, then raise standing and shortage notifications.
    ///
    /// Standing notifications fire when the local citizen enters the state,
    /// not on every ingestion while it holds.
    fn after_ingest(&mut self, now: DateTime<Utc>, raised: &mut Raised) {
        self.rankings = ranking::recompute(&self.ledger);

        let first = self.rankings.len() > 1
            && ranking::rank_of(&self.rankings, &self.citizen) == Some(0);
        if first && !self.ranked_first {
            raised
                .value
                .push(self.notifications.raise(Message::ranked_first(), now));
        }
        self.ranked_first = first;

        let negative = self
            .rankings
            .iter()
            .find(|r| r.citizen_id == self.citizen)
            .is_some_and(|r| r.reputation_index < 0.0);
        if negative && !self.negative {
            raised
                .value
                .push(self.notifications.raise(Message::negative_reputation(), now));
        }
        self.negative = negative;

        for category in Category::ALL {
            let filter = ChartFilter {
                period: Period::Hour,
                category: CategoryFilter::Only(category),
                scope: StatsScope::Global,
                custom: None,
            };
            let signal = match aggregate(&self.ledger, &filter, &self.citizen, now) {
                Ok(chart) => chart.shortage,
                Err(e) => {
                    warn!(%category, error = %e, "shortage check failed");
                    None
                }
            };
            if let Some(signal) = signal {
                if let Some(n) = self.notifications.raise_shortage(signal.category, now) {
                    info!(
                        category = %signal.category,
                        ratio = signal.fulfillment_ratio,
                        "shortage detected"
                    );
                    raised.alerts.push(n.title.clone());
                    raised.value.push(n);
                }
            }
        }
    }
}

fn count_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// Actor task
// ---------------------------------------------------------------------------

type Reply<T> = oneshot::Sender<T>;

/// A request served by the actor.
#[derive(Debug)]
pub enum Command {
    /// Replace the ledger with a snapshot.
    Bootstrap {
        /// Decoded snapshot records.
        records: Vec<Record>,
        /// The store could not be reached.
        degraded: bool,
        /// Shortage headers raised.
        reply: Reply<Vec<String>>,
    },
    /// A new local demand.
    SubmitDemand {
        /// What the citizen asked for.
        draft: DemandDraft,
        /// The applied record or the rejection.
        reply: Reply<Result<Applied<Record>, LedgerError>>,
    },
    /// A local fulfillment.
    SubmitSupply {
        /// The record being supplied.
        id: RecordId,
        /// The applied record or the rejection.
        reply: Reply<Result<Applied<Record>, LedgerError>>,
    },
    /// A record from another peer.
    ApplyRemote {
        /// The decoded record.
        record: Box<Record>,
        /// The merge outcome or the rejection.
        reply: Reply<Result<Applied<Upsert>, LedgerError>>,
    },
    /// Build a chart.
    Chart {
        /// Selection.
        filter: ChartFilter,
        /// The chart.
        reply: Reply<Result<Chart, ChartError>>,
    },
    /// Current rankings.
    Rankings {
        /// Rankings, best first.
        reply: Reply<Vec<Ranking>>,
    },
    /// Visible notifications.
    Notifications {
        /// Notifications, oldest first.
        reply: Reply<Vec<Notification>>,
    },
    /// Unfulfilled records.
    Pending {
        /// Records, ascending by id.
        reply: Reply<Vec<Record>>,
    },
    /// Health summary.
    Status {
        /// The summary.
        reply: Reply<PeerStatus>,
    },
    /// Raise a notification.
    Notify {
        /// What to show.
        message: Message,
        /// The raised notification.
        reply: Reply<Notification>,
    },
    /// Drop a notification whose time is up.
    Expire {
        /// The notification.
        id: NotificationId,
    },
}

/// Cloneable handle to a running peer actor.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    tx: mpsc::Sender<Command>,
}

/// Start the actor for `state`. It runs until every handle is dropped.
pub fn spawn(state: PeerState, ttl: Duration) -> PeerHandle {
    let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
    let actor = Actor {
        state,
        ttl,
        rx,
        tx: tx.downgrade(),
    };
    tokio::spawn(actor.run());
    PeerHandle { tx }
}

struct Actor {
    state: PeerState,
    ttl: Duration,
    rx: mpsc::Receiver<Command>,
    tx: mpsc::WeakSender<Command>,
}

impl Actor {
    async fn run(mut self) {
        info!(citizen = %self.state.citizen, "peer actor started");
        while let Some(command) = self.rx.recv().await {
            self.handle(command);
        }
        info!(citizen = %self.state.citizen, "peer actor stopped");
    }

    fn handle(&mut self, command: Command) {
        let now = Utc::now();
        match command {
            Command::Bootstrap {
                records,
                degraded,
                reply,
            } => {
                let applied = self.state.bootstrap(records, degraded, now);
                self.schedule(&applied.value);
                let _ = reply.send(applied.alerts);
            }
            Command::SubmitDemand { draft, reply } => {
                let result = self.state.submit_demand(draft, now).map(|(record, applied)| {
                    self.schedule(&applied.value);
                    Applied {
                        value: record,
                        alerts: applied.alerts,
                    }
                });
                let _ = reply.send(result);
            }
            Command::SubmitSupply { id, reply } => {
                let result = self.state.submit_supply(id, now).map(|(record, applied)| {
                    self.schedule(&applied.value);
                    Applied {
                        value: record,
                        alerts: applied.alerts,
                    }
                });
                let _ = reply.send(result);
            }
            Command::ApplyRemote { record, reply } => {
                let result = self.state.apply_remote(*record, now).map(|(outcome, applied)| {
                    self.schedule(&applied.value);
                    Applied {
                        value: outcome,
                        alerts: applied.alerts,
                    }
                });
                let _ = reply.send(result);
            }
            Command::Chart { filter, reply } => {
                let _ = reply.send(self.state.chart(&filter, now));
            }
            Command::Rankings { reply } => {
                let _ = reply.send(self.state.rankings().to_vec());
            }
            Command::Notifications { reply } => {
                let _ = reply.send(self.state.notifications(now));
            }
            Command::Pending { reply } => {
                let _ = reply.send(self.state.pending());
            }
            Command::Status { reply } => {
                let _ = reply.send(self.state.status());
            }
            Command::Notify { message, reply } => {
                let notification = self.state.notify(message, now);
                self.schedule(std::slice::from_ref(&notification));
                let _ = reply.send(notification);
            }
            Command::Expire { id } => {
                if self.state.expire(id) {
                    debug!(id = %id, "notification expired");
                }
            }
        }
    }

    fn schedule(&self, raised: &[Notification]) {
        for notification in raised {
            let id = notification.id;
            let tx = self.tx.clone();
            let ttl = self.ttl;
            tokio::spawn(async move {
                tokio::time::sleep(ttl).await;
                if let Some(tx) = tx.upgrade() {
                    let _ = tx.send(Command::Expire { id }).await;
                }
            });
        }
    }
}

impl PeerHandle {
    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, ActorError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(make(reply)).await.map_err(|_closed| ActorError)?;
        rx.await.map_err(|_dropped| ActorError)
    }

    /// Load a bootstrap snapshot. Returns the shortage headers raised.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError`] if the actor has stopped.
    pub async fn bootstrap(
        &self,
        records: Vec<Record>,
        degraded: bool,
    ) -> Result<Vec<String>, ActorError> {
        self.request(|reply| Command::Bootstrap {
            records,
            degraded,
            reply,
        })
        .await
    }

    /// Apply a local demand.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Rejected`] or [`SubmitError::Actor`].
    pub async fn submit_demand(&self, draft: DemandDraft) -> Result<Applied<Record>, SubmitError> {
        Ok(self
            .request(|reply| Command::SubmitDemand { draft, reply })
            .await??)
    }

    /// Apply a local fulfillment.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Rejected`] or [`SubmitError::Actor`].
    pub async fn submit_supply(&self, id: RecordId) -> Result<Applied<Record>, SubmitError> {
        Ok(self
            .request(|reply| Command::SubmitSupply { id, reply })
            .await??)
    }

    /// Merge a remote record.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Rejected`] or [`IngestError::Actor`].
    pub async fn apply_remote(&self, record: Record) -> Result<Applied<Upsert>, IngestError> {
        Ok(self
            .request(|reply| Command::ApplyRemote {
                record: Box::new(record),
                reply,
            })
            .await??)
    }

    /// Build a chart for `filter` at the current time.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Chart`] or [`QueryError::Actor`].
    pub async fn chart(&self, filter: ChartFilter) -> Result<Chart, QueryError> {
        Ok(self.request(|reply| Command::Chart { filter, reply }).await??)
    }

    /// Current rankings, best first.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError`] if the actor has stopped.
    pub async fn rankings(&self) -> Result<Vec<Ranking>, ActorError> {
        self.request(|reply| Command::Rankings { reply }).await
    }

    /// Visible notifications, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError`] if the actor has stopped.
    pub async fn notifications(&self) -> Result<Vec<Notification>, ActorError> {
        self.request(|reply| Command::Notifications { reply }).await
    }

    /// Unfulfilled records, ascending by id.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError`] if the actor has stopped.
    pub async fn pending(&self) -> Result<Vec<Record>, ActorError> {
        self.request(|reply| Command::Pending { reply }).await
    }

    /// Health summary.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError`] if the actor has stopped.
    pub async fn status(&self) -> Result<PeerStatus, ActorError> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Raise a notification.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError`] if the actor has stopped.
    pub async fn notify(&self, message: Message) -> Result<Notification, ActorError> {
        self.request(|reply| Command::Notify { message, reply }).await
    }
}

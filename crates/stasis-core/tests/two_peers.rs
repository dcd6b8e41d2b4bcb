//! Multi-peer convergence over the in-memory store and the loopback hub.

#![allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use stasis_core::config::RetryConfig;
use stasis_core::{BootstrapOutcome, LoopbackHub, PeerRuntime, StasisConfig, Submission};
use stasis_db::MemoryStore;
use stasis_types::{Category, DemandDraft, Record, RecordId};

const ALPHA: &str = "QmPeerAlpha00000001";
const BRAVO: &str = "QmPeerBravo00000002";
const CHARLIE: &str = "QmPeerCharlie0000003";

async fn start(store: &MemoryStore, hub: &LoopbackHub, peer_id: &str) -> PeerRuntime {
    let config = StasisConfig {
        retry: RetryConfig {
            max_attempts: 2,
            initial_delay_ms: 1,
            max_delay_ms: 5,
        },
        ..StasisConfig::default()
    };
    PeerRuntime::start(
        &config,
        Arc::new(store.clone()),
        Arc::new(hub.channel(peer_id)),
    )
    .await
    .unwrap()
}

async fn wait_for_pending(peer: &PeerRuntime, what: &str, check: impl Fn(&[Record]) -> bool) {
    for _ in 0..400 {
        if check(&peer.peer().pending().await.unwrap()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

fn water() -> DemandDraft {
    DemandDraft {
        category: Category::Water,
        quantity: Decimal::new(20, 0),
        details: "litres".to_owned(),
    }
}

#[tokio::test]
async fn demand_and_supply_converge_across_peers() {
    let store = MemoryStore::new();
    let hub = LoopbackHub::new();
    let alpha = start(&store, &hub, ALPHA).await;
    let bravo = start(&store, &hub, BRAVO).await;
    assert_eq!(alpha.bootstrap_outcome(), BootstrapOutcome::Empty);
    assert_ne!(alpha.citizen(), bravo.citizen());

    let demand = alpha
        .ingestor()
        .submit(Submission::Demand(water()))
        .await
        .unwrap();
    assert_eq!(demand.id, RecordId::new(1));

    wait_for_pending(&bravo, "bravo to see the demand", |pending| {
        pending.iter().any(|r| r.id == demand.id)
    })
    .await;

    let supply = bravo
        .ingestor()
        .submit(Submission::Supply(demand.id))
        .await
        .unwrap();
    assert_eq!(supply.fulfilled_by.as_ref(), Some(bravo.citizen()));

    wait_for_pending(&alpha, "alpha to see the fulfillment", <[Record]>::is_empty).await;

    let ranks = alpha.peer().rankings().await.unwrap();
    assert_eq!(ranks.len(), 2);
    assert_eq!(&ranks[0].citizen_id, bravo.citizen());
    assert!(ranks[1].reputation_index < 0.0);

    // A latecomer bootstraps the same state from the store.
    let charlie = start(&store, &hub, CHARLIE).await;
    assert_eq!(charlie.bootstrap_outcome(), BootstrapOutcome::Loaded(1));
    assert!(charlie.peer().pending().await.unwrap().is_empty());
    assert_eq!(charlie.peer().rankings().await.unwrap(), ranks);

    let notes = bravo.peer().notifications().await.unwrap();
    assert!(notes.iter().any(|n| n.title == "Supply sent!"));

    alpha.shutdown().await;
    bravo.shutdown().await;
    charlie.shutdown().await;
}

#[tokio::test]
async fn peer_started_during_store_outage_catches_up() {
    let store = MemoryStore::new();
    let hub = LoopbackHub::new();

    store.set_available(false);
    let alpha = start(&store, &hub, ALPHA).await;
    assert_eq!(alpha.bootstrap_outcome(), BootstrapOutcome::Degraded);
    assert!(alpha.ingestor().is_degraded());

    store.set_available(true);
    let record = alpha
        .ingestor()
        .submit(Submission::Demand(water()))
        .await
        .unwrap();
    assert_eq!(record.id, RecordId::new(1));
    assert!(!alpha.ingestor().is_degraded());
    assert_eq!(store.len("supply-demand").await, 1);

    alpha.shutdown().await;
}

#[tokio::test]
async fn channel_outage_leaves_record_local_only() {
    let store = MemoryStore::new();
    let hub = LoopbackHub::new();
    let alpha = start(&store, &hub, ALPHA).await;
    let bravo = start(&store, &hub, BRAVO).await;

    hub.set_available(false);
    let err = alpha
        .ingestor()
        .submit(Submission::Demand(water()))
        .await
        .unwrap_err();
    assert!(matches!(err, stasis_core::SubmitError::NotDelivered { .. }));
    assert_eq!(alpha.peer().pending().await.unwrap().len(), 1);
    assert!(bravo.peer().pending().await.unwrap().is_empty());

    hub.set_available(true);
    alpha.shutdown().await;
    bravo.shutdown().await;
}

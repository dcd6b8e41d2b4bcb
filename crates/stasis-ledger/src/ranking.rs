//! Reputation ranking, recomputed in full from the ledger.
//!
//! For every citizen seen in the ledger:
//!
//! ```text
//! demand_ratio     = demands  / total records
//! supply_ratio     = supplies / total fulfilled records
//! reputation_index = (supply_ratio - demand_ratio) * (demands + supplies) / total records
//! ```
//!
//! Counting is done in integers and converted to `f64` once at the end, so
//! two passes over the same ledger are bit-for-bit identical.

use std::collections::HashMap;

use stasis_types::{CitizenId, Ranking};

use crate::Ledger;

#[derive(Debug)]
struct Tally {
    citizen_id: CitizenId,
    demands: u64,
    supplies: u64,
}

/// Recompute the ranking of every citizen in `ledger`.
///
/// Sorted by descending reputation. Ties keep first-encounter order: records
/// are walked by ascending id and within a record the requester is seen
/// before the fulfiller.
pub fn recompute(ledger: &Ledger) -> Vec<Ranking> {
    let mut tallies: Vec<Tally> = Vec::new();
    let mut slots: HashMap<&CitizenId, usize> = HashMap::new();
    let mut total_supply: u64 = 0;

    for record in ledger.iter() {
        let slot = slot_for(&mut tallies, &mut slots, &record.citizen_id);
        if let Some(t) = tallies.get_mut(slot) {
            t.demands = t.demands.saturating_add(1);
        }
        if let Some(by) = record.fulfilled_by.as_ref().filter(|_| record.fulfilled) {
            total_supply = total_supply.saturating_add(1);
            let slot = slot_for(&mut tallies, &mut slots, by);
            if let Some(t) = tallies.get_mut(slot) {
                t.supplies = t.supplies.saturating_add(1);
            }
        }
    }

    let total_demand = u64::try_from(ledger.len()).unwrap_or(u64::MAX);

    let mut rankings: Vec<Ranking> = tallies
        .into_iter()
        .map(|t| {
            let demand_ratio = share(t.demands, total_demand);
            let supply_ratio = share(t.supplies, total_supply);
            let activity = share(t.demands.saturating_add(t.supplies), total_demand);
            Ranking {
                citizen_id: t.citizen_id,
                demands: t.demands,
                supplies: t.supplies,
                demand_ratio,
                supply_ratio,
                reputation_index: (supply_ratio - demand_ratio) * activity,
            }
        })
        .collect();

    // `sort_by` is stable; equal reputations keep first-encounter order.
    rankings.sort_by(|a, b| b.reputation_index.total_cmp(&a.reputation_index));
    rankings
}

/// Position of `citizen` in the ranking, 0 being the best.
pub fn rank_of(rankings: &[Ranking], citizen: &CitizenId) -> Option<usize> {
    rankings.iter().position(|r| &r.citizen_id == citizen)
}

fn slot_for<'a>(
    tallies: &mut Vec<Tally>,
    slots: &mut HashMap<&'a CitizenId, usize>,
    citizen: &'a CitizenId,
) -> usize {
    *slots.entry(citizen).or_insert_with(|| {
        tallies.push(Tally {
            citizen_id: citizen.clone(),
            demands: 0,
            supplies: 0,
        });
        tallies.len().saturating_sub(1)
    })
}

#[allow(clippy::cast_precision_loss)]
fn share(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

//! The local replica of the shared demand/supply ledger.
//!
//! The [`Ledger`] maps record ids to [`Record`]s and keeps a
//! [`CategoryIndex`] in step with every mutation. It is owned by a single
//! mutation actor; nothing here is synchronized.
//!
//! # Merge rules
//!
//! | Existing | Incoming | Outcome |
//! |----------|----------|---------|
//! | absent | any valid | [`Upsert::Inserted`] |
//! | identical | same | [`Upsert::Unchanged`] |
//! | pending | fulfilled | [`Upsert::Fulfilled`] |
//! | pending | pending, different | [`Upsert::Replaced`] |
//! | fulfilled | different | [`LedgerError::AlreadyFulfilled`] |

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use stasis_types::{CitizenId, DemandDraft, Record, RecordId};

use crate::LedgerError;
use crate::index::CategoryIndex;

/// What an [`Ledger::upsert`] did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// The id was new.
    Inserted,
    /// A pending record became fulfilled.
    Fulfilled,
    /// A pending record was overwritten by a different pending version.
    Replaced,
    /// The incoming record matched the stored one exactly.
    Unchanged,
}

impl Upsert {
    /// Whether the ledger content changed.
    pub const fn changed(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Id-ordered map of records with a derived category index.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    records: BTreeMap<RecordId, Record>,
    index: CategoryIndex,
}

impl Ledger {
    /// Create a new empty ledger.
    pub const fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            index: CategoryIndex::new(),
        }
    }

    /// Build a ledger from a bootstrap snapshot.
    ///
    /// When an id appears more than once the later record wins. Records that
    /// fail validation are skipped. The category index is rebuilt by a full
    /// scan afterwards.
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut map = BTreeMap::new();
        for record in records {
            if let Err(e) = record.validate() {
                warn!(id = %record.id, error = %e, "skipping invalid snapshot record");
                continue;
            }
            map.insert(record.id, record);
        }
        let index = CategoryIndex::rebuild(map.values());
        Self {
            records: map,
            index,
        }
    }

    /// Return the number of records in the ledger.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Return whether the ledger has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up a record.
    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.get(&id)
    }

    /// All records, ascending by id.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Record> + '_ {
        self.records.values()
    }

    /// Records still awaiting a supplier, ascending by id.
    pub fn pending(&self) -> impl Iterator<Item = &Record> + '_ {
        self.records.values().filter(|r| r.is_pending())
    }

    /// The category index.
    pub const fn index(&self) -> &CategoryIndex {
        &self.index
    }

    /// Whether `citizen` has ever requested or supplied anything.
    pub fn knows_citizen(&self, citizen: &CitizenId) -> bool {
        self.records
            .values()
            .any(|r| &r.citizen_id == citizen || r.fulfilled_by.as_ref() == Some(citizen))
    }

    /// The id a new local record would receive: one past the highest id, or
    /// 1 on an empty ledger.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::IdSpaceExhausted`] if the highest id is
    /// `u64::MAX`.
    pub fn next_id(&self) -> Result<RecordId, LedgerError> {
        match self.records.last_key_value() {
            None => Ok(RecordId::FIRST),
            Some((id, _)) => id.next().ok_or(LedgerError::IdSpaceExhausted),
        }
    }

    /// Merge a record received from another peer (or re-applied locally).
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Invalid`] if the record breaks an invariant and
    /// [`LedgerError::AlreadyFulfilled`] if it would modify a terminal record.
    pub fn upsert(&mut self, record: Record) -> Result<Upsert, LedgerError> {
        record.validate()?;

        let outcome = match self.records.get(&record.id) {
            None => Upsert::Inserted,
            Some(existing) if existing == &record => return Ok(Upsert::Unchanged),
            Some(existing) if existing.fulfilled => {
                return Err(LedgerError::AlreadyFulfilled(record.id));
            }
            Some(existing) => {
                if existing.category != record.category {
                    self.index.remove(existing.category, existing.id);
                }
                if record.fulfilled {
                    Upsert::Fulfilled
                } else {
                    Upsert::Replaced
                }
            }
        };

        debug!(id = %record.id, category = %record.category, ?outcome, "ledger upsert");
        self.index.insert(record.category, record.id);
        self.records.insert(record.id, record);
        Ok(outcome)
    }

    /// Append a new pending demand from the local citizen.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if no id is available or the draft produces an
    /// invalid record.
    pub fn append_demand(
        &mut self,
        citizen: CitizenId,
        draft: DemandDraft,
        now: DateTime<Utc>,
    ) -> Result<Record, LedgerError> {
        let id = self.next_id()?;
        let record = Record::pending(
            id,
            citizen,
            draft.category,
            draft.quantity,
            draft.details,
            now,
        );
        self.upsert(record.clone())?;
        Ok(record)
    }

    /// Mark a pending record as supplied by `by`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] for an unknown id and
    /// [`LedgerError::AlreadyFulfilled`] for a terminal record.
    pub fn fulfill(
        &mut self,
        id: RecordId,
        by: CitizenId,
        now: DateTime<Utc>,
    ) -> Result<Record, LedgerError> {
        let existing = self.records.get(&id).ok_or(LedgerError::NotFound(id))?;
        let fulfilled = existing.fulfilled_by(by, now).map_err(|e| match e {
            stasis_types::RecordError::AlreadyFulfilled(id) => LedgerError::AlreadyFulfilled(id),
            other => LedgerError::Invalid(other),
        })?;
        self.upsert(fulfilled.clone())?;
        Ok(fulfilled)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use stasis_types::Category;

    use super::*;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap()
    }

    fn record(id: u64, category: Category) -> Record {
        Record::pending(
            RecordId::new(id),
            CitizenId::from("alice"),
            category,
            Decimal::ONE,
            String::new(),
            at(0),
        )
    }

    #[test]
    fn bootstrap_with_duplicates_keeps_later_and_counts_next_id() {
        let mut later_one = record(1, Category::Food);
        later_one.details = "second".to_owned();
        let snapshot = vec![
            record(3, Category::Water),
            record(1, Category::Water),
            record(4, Category::Water),
            later_one,
            record(5, Category::Water),
        ];
        let ledger = Ledger::from_records(snapshot);

        assert_eq!(ledger.len(), 4);
        assert_eq!(ledger.next_id().unwrap(), RecordId::new(6));
        let one = ledger.get(RecordId::new(1)).unwrap();
        assert_eq!(one.details, "second");
        assert_eq!(one.category, Category::Food);
        assert_eq!(ledger.index().count(Category::Water), 3);
        assert_eq!(ledger.index().count(Category::Food), 1);
    }

    #[test]
    fn empty_ledger_starts_at_one() {
        assert_eq!(Ledger::new().next_id().unwrap(), RecordId::FIRST);
    }

    #[test]
    fn exhausted_id_space_is_an_error() {
        let ledger = Ledger::from_records([record(u64::MAX, Category::Other)]);
        assert!(matches!(
            ledger.next_id(),
            Err(LedgerError::IdSpaceExhausted)
        ));
    }

    #[test]
    fn duplicate_remote_record_is_indexed_once() {
        let mut ledger = Ledger::new();
        assert_eq!(ledger.upsert(record(7, Category::Water)).unwrap(), Upsert::Inserted);
        assert_eq!(ledger.upsert(record(7, Category::Water)).unwrap(), Upsert::Unchanged);
        let ids: Vec<RecordId> = ledger.index().ids(Category::Water).collect();
        assert_eq!(ids, vec![RecordId::new(7)]);
    }

    #[test]
    fn pending_then_fulfilled_is_accepted() {
        let mut ledger = Ledger::new();
        ledger.upsert(record(2, Category::Food)).unwrap();
        let done = record(2, Category::Food)
            .fulfilled_by(CitizenId::from("bob"), at(5))
            .unwrap();
        assert_eq!(ledger.upsert(done).unwrap(), Upsert::Fulfilled);
        assert!(ledger.get(RecordId::new(2)).unwrap().fulfilled);
        assert_eq!(ledger.pending().count(), 0);
    }

    #[test]
    fn fulfilled_record_is_terminal() {
        let mut ledger = Ledger::new();
        let done = record(2, Category::Food)
            .fulfilled_by(CitizenId::from("bob"), at(5))
            .unwrap();
        ledger.upsert(done.clone()).unwrap();

        assert_eq!(ledger.upsert(done).unwrap(), Upsert::Unchanged);
        assert!(matches!(
            ledger.upsert(record(2, Category::Food)),
            Err(LedgerError::AlreadyFulfilled(_))
        ));
        let other = record(2, Category::Food)
            .fulfilled_by(CitizenId::from("carol"), at(6))
            .unwrap();
        assert!(matches!(
            ledger.upsert(other),
            Err(LedgerError::AlreadyFulfilled(_))
        ));
        assert_eq!(
            ledger.get(RecordId::new(2)).unwrap().fulfilled_by,
            Some(CitizenId::from("bob"))
        );
    }

    #[test]
    fn recategorised_pending_record_moves_in_index() {
        let mut ledger = Ledger::new();
        ledger.upsert(record(3, Category::Water)).unwrap();
        assert_eq!(ledger.upsert(record(3, Category::Housing)).unwrap(), Upsert::Replaced);
        assert!(!ledger.index().contains(Category::Water, RecordId::new(3)));
        assert!(ledger.index().contains(Category::Housing, RecordId::new(3)));
        assert_eq!(ledger.index().total(), 1);
    }

    #[test]
    fn invalid_record_is_rejected() {
        let mut ledger = Ledger::new();
        let mut bad = record(1, Category::Water);
        bad.fulfilled = true;
        assert!(matches!(ledger.upsert(bad), Err(LedgerError::Invalid(_))));
        assert!(ledger.is_empty());
    }

    #[test]
    fn append_and_fulfill_locally() {
        let mut ledger = Ledger::from_records([record(9, Category::Other)]);
        let draft = DemandDraft {
            category: Category::Water,
            quantity: Decimal::new(3, 0),
            details: "jugs".to_owned(),
        };
        let created = ledger
            .append_demand(CitizenId::from("alice"), draft, at(1))
            .unwrap();
        assert_eq!(created.id, RecordId::new(10));

        let done = ledger
            .fulfill(created.id, CitizenId::from("bob"), at(2))
            .unwrap();
        assert_eq!(done.fulfilled_at, Some(at(2)));
        assert!(matches!(
            ledger.fulfill(created.id, CitizenId::from("bob"), at(3)),
            Err(LedgerError::AlreadyFulfilled(_))
        ));
        assert!(matches!(
            ledger.fulfill(RecordId::new(99), CitizenId::from("bob"), at(3)),
            Err(LedgerError::NotFound(_))
        ));
    }

    #[test]
    fn knows_requesters_and_suppliers() {
        let mut ledger = Ledger::new();
        let done = record(1, Category::Water)
            .fulfilled_by(CitizenId::from("bob"), at(1))
            .unwrap();
        ledger.upsert(done).unwrap();
        assert!(ledger.knows_citizen(&CitizenId::from("alice")));
        assert!(ledger.knows_citizen(&CitizenId::from("bob")));
        assert!(!ledger.knows_citizen(&CitizenId::from("carol")));
    }
}

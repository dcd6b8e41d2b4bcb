//! Category index: category to the set of record ids filed under it.

use std::collections::{BTreeMap, BTreeSet};

use stasis_types::{Category, Record, RecordId};

/// Derived lookup from [`Category`] to record ids.
///
/// Set-backed, so inserting an id twice is a no-op. Rebuilt from scratch
/// after a bootstrap and maintained incrementally afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryIndex {
    by_category: BTreeMap<Category, BTreeSet<RecordId>>,
}

impl CategoryIndex {
    /// Create an empty index.
    pub const fn new() -> Self {
        Self {
            by_category: BTreeMap::new(),
        }
    }

    /// Build an index by scanning `records`.
    pub fn rebuild<'a>(records: impl IntoIterator<Item = &'a Record>) -> Self {
        let mut index = Self::new();
        for record in records {
            index.insert(record.category, record.id);
        }
        index
    }

    /// File `id` under `category`. Returns `false` if it was already there.
    pub fn insert(&mut self, category: Category, id: RecordId) -> bool {
        self.by_category.entry(category).or_default().insert(id)
    }

    /// Remove `id` from `category`.
    pub fn remove(&mut self, category: Category, id: RecordId) -> bool {
        let Some(ids) = self.by_category.get_mut(&category) else {
            return false;
        };
        let removed = ids.remove(&id);
        if ids.is_empty() {
            self.by_category.remove(&category);
        }
        removed
    }

    /// Ids filed under `category`, ascending.
    pub fn ids(&self, category: Category) -> impl Iterator<Item = RecordId> + '_ {
        self.by_category
            .get(&category)
            .into_iter()
            .flat_map(|ids| ids.iter().copied())
    }

    /// Number of ids filed under `category`.
    pub fn count(&self, category: Category) -> usize {
        self.by_category.get(&category).map_or(0, BTreeSet::len)
    }

    /// Whether `id` is filed under `category`.
    pub fn contains(&self, category: Category, id: RecordId) -> bool {
        self.by_category
            .get(&category)
            .is_some_and(|ids| ids.contains(&id))
    }

    /// Total number of filed ids across all categories.
    pub fn total(&self) -> usize {
        self.by_category.values().map(BTreeSet::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_idempotent() {
        let mut index = CategoryIndex::new();
        assert!(index.insert(Category::Water, RecordId::new(7)));
        assert!(!index.insert(Category::Water, RecordId::new(7)));
        assert_eq!(index.count(Category::Water), 1);
        assert_eq!(index.total(), 1);
    }

    #[test]
    fn remove_drops_empty_categories() {
        let mut index = CategoryIndex::new();
        index.insert(Category::Food, RecordId::new(1));
        assert!(index.remove(Category::Food, RecordId::new(1)));
        assert!(!index.remove(Category::Food, RecordId::new(1)));
        assert_eq!(index, CategoryIndex::new());
    }

    #[test]
    fn ids_are_ascending() {
        let mut index = CategoryIndex::new();
        for id in [5, 2, 9] {
            index.insert(Category::Other, RecordId::new(id));
        }
        let ids: Vec<u64> = index.ids(Category::Other).map(RecordId::get).collect();
        assert_eq!(ids, vec![2, 5, 9]);
        assert_eq!(index.ids(Category::Housing).count(), 0);
    }
}

/// Vector and review storage
///
/// The pipeline only talks to storage through these traits. Any backend
/// works as long as it provides:
/// - Read-your-writes for a single item or user
/// - Atomic compare-and-swap on `UserTasteVector::version`
///
/// The in-memory implementations here back the replay binary and the tests.
use crate::error::Result;
use crate::models::{ItemTruthVector, UserTasteVector};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use event_schema::{ItemMetadata, ReviewRecord};
use uuid::Uuid;

/// Storage of truth vectors and taste vectors
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn get_truth(&self, item_id: Uuid) -> Result<Option<ItemTruthVector>>;

    /// Replace an item's truth vector
    async fn put_truth(&self, truth: ItemTruthVector) -> Result<()>;

    /// Truth vectors for the given items, in input order, skipping items
    /// that have none
    async fn get_truths(&self, item_ids: &[Uuid]) -> Result<Vec<ItemTruthVector>>;

    async fn get_taste(&self, user_id: Uuid) -> Result<Option<UserTasteVector>>;

    /// Write `taste` only if the stored record still has version `expected`
    /// (`None` = no record yet)
    ///
    /// On success the stored record carries version `expected + 1` (or 1 for a
    /// new record). Returns `false` when another writer got there first.
    async fn compare_and_swap_taste(
        &self,
        expected: Option<u64>,
        taste: UserTasteVector,
    ) -> Result<bool>;
}

/// Read access to the review history and item metadata
///
/// Holds only reviews that passed `TastePipeline::validate_review`: tag names
/// and cuisine labels known to the registry, rating within bounds. A stored
/// review outside the registry would fail every later refresh of its item.
#[async_trait]
pub trait ReviewSource: Send + Sync {
    /// Every review of `item_id`
    async fn fetch_item_reviews(&self, item_id: Uuid) -> Result<Vec<ReviewRecord>>;

    async fn fetch_item_metadata(&self, item_id: Uuid) -> Result<Option<ItemMetadata>>;
}

#[derive(Default)]
pub struct InMemoryVectorStore {
    truths: DashMap<Uuid, ItemTruthVector>,
    tastes: DashMap<Uuid, UserTasteVector>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn truth_count(&self) -> usize {
        self.truths.len()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn get_truth(&self, item_id: Uuid) -> Result<Option<ItemTruthVector>> {
        Ok(self.truths.get(&item_id).map(|entry| entry.value().clone()))
    }

    async fn put_truth(&self, truth: ItemTruthVector) -> Result<()> {
        self.truths.insert(truth.item_id, truth);
        Ok(())
    }

    async fn get_truths(&self, item_ids: &[Uuid]) -> Result<Vec<ItemTruthVector>> {
        Ok(item_ids
            .iter()
            .filter_map(|id| self.truths.get(id).map(|entry| entry.value().clone()))
            .collect())
    }

    async fn get_taste(&self, user_id: Uuid) -> Result<Option<UserTasteVector>> {
        Ok(self.tastes.get(&user_id).map(|entry| entry.value().clone()))
    }

    async fn compare_and_swap_taste(
        &self,
        expected: Option<u64>,
        mut taste: UserTasteVector,
    ) -> Result<bool> {
        // The entry guard holds the shard lock for the whole check-and-write
        match (self.tastes.entry(taste.user_id), expected) {
            (Entry::Vacant(slot), None) => {
                taste.version = 1;
                slot.insert(taste);
                Ok(true)
            }
            (Entry::Occupied(mut slot), Some(version)) if slot.get().version == version => {
                taste.version = version + 1;
                slot.insert(taste);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct InMemoryReviewSource {
    reviews: DashMap<Uuid, Vec<ReviewRecord>>,
    metadata: DashMap<Uuid, ItemMetadata>,
}

impl InMemoryReviewSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a review; a review with an id already present replaces it
    pub fn add_review(&self, review: ReviewRecord) {
        let mut reviews = self.reviews.entry(review.item_id).or_default();
        match reviews.iter_mut().find(|existing| existing.id == review.id) {
            Some(existing) => *existing = review,
            None => reviews.push(review),
        }
    }

    pub fn set_metadata(&self, metadata: ItemMetadata) {
        self.metadata.insert(metadata.item_id, metadata);
    }
}

#[async_trait]
impl ReviewSource for InMemoryReviewSource {
    async fn fetch_item_reviews(&self, item_id: Uuid) -> Result<Vec<ReviewRecord>> {
        Ok(self
            .reviews
            .get(&item_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn fetch_item_metadata(&self, item_id: Uuid) -> Result<Option<ItemMetadata>> {
        Ok(self.metadata.get(&item_id).map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryVersion;
    use chrono::Utc;

    #[tokio::test]
    async fn test_cas_creates_then_bumps_version() {
        let store = InMemoryVectorStore::new();
        let user = Uuid::new_v4();
        let taste = UserTasteVector::new(user, RegistryVersion(1));

        assert!(store.compare_and_swap_taste(None, taste.clone()).await.unwrap());
        let stored = store.get_taste(user).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);

        assert!(store.compare_and_swap_taste(Some(1), stored.clone()).await.unwrap());
        assert_eq!(store.get_taste(user).await.unwrap().unwrap().version, 2);
    }

    #[tokio::test]
    async fn test_cas_rejects_stale_writer() {
        let store = InMemoryVectorStore::new();
        let user = Uuid::new_v4();
        let taste = UserTasteVector::new(user, RegistryVersion(1));

        assert!(store.compare_and_swap_taste(None, taste.clone()).await.unwrap());
        // second creator loses
        assert!(!store.compare_and_swap_taste(None, taste.clone()).await.unwrap());
        // stale version loses
        assert!(store.compare_and_swap_taste(Some(1), taste.clone()).await.unwrap());
        assert!(!store.compare_and_swap_taste(Some(1), taste).await.unwrap());
        assert_eq!(store.get_taste(user).await.unwrap().unwrap().version, 2);
    }

    #[tokio::test]
    async fn test_get_truths_skips_missing_and_keeps_order() {
        let store = InMemoryVectorStore::new();
        let a = ItemTruthVector::new(Uuid::new_v4(), RegistryVersion(1));
        let b = ItemTruthVector::new(Uuid::new_v4(), RegistryVersion(1));
        store.put_truth(a.clone()).await.unwrap();
        store.put_truth(b.clone()).await.unwrap();

        let found = store
            .get_truths(&[b.item_id, Uuid::new_v4(), a.item_id])
            .await
            .unwrap();

        assert_eq!(found, vec![b, a]);
        assert_eq!(store.truth_count(), 2);
    }

    #[tokio::test]
    async fn test_review_source_replaces_same_review_id() {
        let source = InMemoryReviewSource::new();
        let item = Uuid::new_v4();
        let review = ReviewRecord::new(item, Uuid::new_v4(), 4, Utc::now());
        source.add_review(review.clone());
        let mut edited = review.clone();
        edited.rating = 1;
        source.add_review(edited);

        let reviews = source.fetch_item_reviews(item).await.unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].rating, 1);
        assert!(source.fetch_item_reviews(Uuid::new_v4()).await.unwrap().is_empty());
    }
}

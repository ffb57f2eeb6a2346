use crate::error::{Result, TasteError};
use crate::registry::{Cuisine, DimensionRegistry, FeatureGroup, FeatureKey, RegistryVersion, TagKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

/// Aggregated, review-derived description of what an item is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemTruthVector {
    pub item_id: Uuid,
    pub registry_version: RegistryVersion,
    /// Tag confidence in [-1, 1]. Absent = nobody answered.
    pub tags: BTreeMap<TagKey, f64>,
    /// Relative cuisine frequency, non-negative
    pub cuisines: BTreeMap<Cuisine, f64>,
    pub avg_price: Option<f64>,
    pub avg_wait_time: Option<f64>,
    pub review_count: u32,
}

impl ItemTruthVector {
    pub fn new(item_id: Uuid, registry_version: RegistryVersion) -> Self {
        Self {
            item_id,
            registry_version,
            tags: BTreeMap::new(),
            cuisines: BTreeMap::new(),
            avg_price: None,
            avg_wait_time: None,
            review_count: 0,
        }
    }

    /// Scalar aggregate backing a binned group
    pub fn scalar(&self, group: FeatureGroup) -> Option<f64> {
        match group {
            FeatureGroup::Price => self.avg_price,
            FeatureGroup::Wait => self.avg_wait_time,
            FeatureGroup::Tags | FeatureGroup::Cuisine => None,
        }
    }

    pub fn validate(&self, registry: &DimensionRegistry) -> Result<()> {
        registry.ensure_version(self.registry_version)?;
        for tag in self.tags.keys() {
            registry.validate_key(&FeatureKey::Tag(*tag))?;
        }
        for cuisine in self.cuisines.keys() {
            registry.validate_key(&FeatureKey::Cuisine(*cuisine))?;
        }
        Ok(())
    }
}

/// Learned preference for one feature
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PreferenceEntry {
    /// Preference strength in [-1, 1]
    pub value: f64,
    /// Number of updates that touched this feature
    pub count: u32,
}

/// Per-user learned preference state
///
/// One mapping for every dimension: swipes and reviews share counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTasteVector {
    pub user_id: Uuid,
    pub registry_version: RegistryVersion,
    /// Record version for optimistic concurrency, bumped on every write
    pub version: u64,
    pub preferences: BTreeMap<FeatureKey, PreferenceEntry>,
}

impl UserTasteVector {
    pub fn new(user_id: Uuid, registry_version: RegistryVersion) -> Self {
        Self {
            user_id,
            registry_version,
            version: 0,
            preferences: BTreeMap::new(),
        }
    }

    pub fn entry(&self, key: &FeatureKey) -> PreferenceEntry {
        self.preferences.get(key).copied().unwrap_or_default()
    }

    pub fn value(&self, key: &FeatureKey) -> f64 {
        self.entry(key).value
    }

    pub fn count(&self, key: &FeatureKey) -> u32 {
        self.entry(key).count
    }

    /// Preference values belonging to one group, in key order
    pub fn group_values(&self, group: FeatureGroup) -> impl Iterator<Item = (FeatureKey, f64)> + '_ {
        self.preferences
            .iter()
            .filter(move |(key, _)| key.group() == group)
            .map(|(key, entry)| (*key, entry.value))
    }

    pub fn is_empty(&self) -> bool {
        self.preferences.is_empty()
    }

    pub fn validate(&self, registry: &DimensionRegistry) -> Result<()> {
        registry.ensure_version(self.registry_version)?;
        for key in self.preferences.keys() {
            registry.validate_key(key)?;
        }
        Ok(())
    }
}

/// Input to feed ranking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedRequest {
    pub user_id: Uuid,
    /// Bounded candidate list from the retrieval step
    pub candidates: Vec<Uuid>,
    pub limit: usize,
    /// Items the user already swiped or reviewed
    #[serde(default)]
    pub exclude: HashSet<Uuid>,
}

impl FeedRequest {
    pub fn new(user_id: Uuid, candidates: Vec<Uuid>, limit: usize) -> Self {
        Self {
            user_id,
            candidates,
            limit,
            exclude: HashSet::new(),
        }
    }

    pub fn with_exclusions(mut self, exclude: impl IntoIterator<Item = Uuid>) -> Self {
        self.exclude.extend(exclude);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(TasteError::InvalidEvent("feed limit must be positive".to_string()));
        }
        Ok(())
    }
}

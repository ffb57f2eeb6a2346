use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Answer to a yes/no attribute question on a review form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriState {
    Yes,
    No,
    #[default]
    Unspecified,
}

impl TriState {
    /// Signed opinion: yes = +1, no = -1, unspecified = no opinion
    pub fn opinion(&self) -> Option<f64> {
        match self {
            TriState::Yes => Some(1.0),
            TriState::No => Some(-1.0),
            TriState::Unspecified => None,
        }
    }
}

/// Stored review of a food item
///
/// `tags` is keyed by the attribute's wire name (e.g. `is_vegan`). Keys are
/// validated against the dimension registry by the consumer, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: Uuid,
    pub item_id: Uuid,
    pub user_id: Uuid,
    pub rating: u8,
    #[serde(default)]
    pub tags: BTreeMap<String, TriState>,
    /// Price paid, in minor currency units
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub waiting_time_minutes: Option<f64>,
    /// Cuisine label of the item's place at review time
    #[serde(default)]
    pub cuisine: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ReviewRecord {
    pub fn new(item_id: Uuid, user_id: Uuid, rating: u8, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            item_id,
            user_id,
            rating,
            tags: BTreeMap::new(),
            price: None,
            waiting_time_minutes: None,
            cuisine: None,
            created_at,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>, answer: TriState) -> Self {
        self.tags.insert(tag.into(), answer);
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_wait_minutes(mut self, minutes: f64) -> Self {
        self.waiting_time_minutes = Some(minutes);
        self
    }

    pub fn with_cuisine(mut self, cuisine: impl Into<String>) -> Self {
        self.cuisine = Some(cuisine.into());
        self
    }
}

/// Listing attributes of a food item, owned by the catalog
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub item_id: Uuid,
    /// Price on the listing, used when no review reports one
    #[serde(default)]
    pub listed_price: Option<f64>,
    #[serde(default)]
    pub place_cuisine: Option<String>,
}

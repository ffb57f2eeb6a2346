/// Match Scorer
///
/// Ranks candidate items for one user by comparing the user's taste vector
/// with each item's truth vector.
///
/// # Scoring
/// Cosine similarity per feature group, combined with fixed weights:
/// `0.50 * tags + 0.30 * cuisine + 0.10 * price + 0.10 * wait`.
/// Dietary tags outweigh every soft preference combined, so a candidate that
/// contradicts a strong tag preference cannot win on cuisine, price or wait.
///
/// # Ordering
/// Descending score, ties broken by ascending item id. The exploration
/// policy may then shuffle the head of large pools and replace slots with
/// random candidates; replaced slots keep their position.
use crate::error::Result;
use crate::models::{ItemTruthVector, UserTasteVector};
use crate::registry::{DimensionRegistry, FeatureGroup, FeatureKey};
use crate::services::binning::soft_bin;
use crate::services::exploration::ExplorationPolicy;
use crate::utils::cosine_similarity;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub const WEIGHT_TAGS: f64 = 0.50;
pub const WEIGHT_CUISINE: f64 = 0.30;
pub const WEIGHT_PRICE: f64 = 0.10;
pub const WEIGHT_WAIT: f64 = 0.10;

/// Per-group similarity behind a score
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub tags: f64,
    pub cuisine: f64,
    pub price: f64,
    pub wait: f64,
}

impl ScoreBreakdown {
    pub fn get(&self, group: FeatureGroup) -> f64 {
        match group {
            FeatureGroup::Tags => self.tags,
            FeatureGroup::Cuisine => self.cuisine,
            FeatureGroup::Price => self.price,
            FeatureGroup::Wait => self.wait,
        }
    }

    fn set(&mut self, group: FeatureGroup, value: f64) {
        match group {
            FeatureGroup::Tags => self.tags = value,
            FeatureGroup::Cuisine => self.cuisine = value,
            FeatureGroup::Price => self.price = value,
            FeatureGroup::Wait => self.wait = value,
        }
    }

    /// Weighted combination, in [-1, 1]
    pub fn total(&self) -> f64 {
        WEIGHT_TAGS * self.tags
            + WEIGHT_CUISINE * self.cuisine
            + WEIGHT_PRICE * self.price
            + WEIGHT_WAIT * self.wait
    }
}

/// How an entry got its slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    Ranked,
    Exploration,
}

/// One scored item in a feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub item_id: Uuid,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    /// Groups hidden from this item's score by the exploration policy
    pub dropped_groups: Vec<FeatureGroup>,
    pub source: EntrySource,
}

pub struct MatchScorer {
    registry: Arc<DimensionRegistry>,
    exploration: ExplorationPolicy,
}

impl MatchScorer {
    pub fn new(registry: Arc<DimensionRegistry>, exploration: ExplorationPolicy) -> Self {
        Self {
            registry,
            exploration,
        }
    }

    pub fn exploration(&self) -> &ExplorationPolicy {
        &self.exploration
    }

    /// Similarity breakdown of one item, with `dropped` groups forced to 0
    pub fn score_item(
        &self,
        taste: &UserTasteVector,
        truth: &ItemTruthVector,
        dropped: &[FeatureGroup],
    ) -> Result<ScoreBreakdown> {
        self.registry.ensure_version(taste.registry_version)?;
        truth.validate(&self.registry)?;

        let mut breakdown = ScoreBreakdown::default();
        for group in FeatureGroup::ALL {
            if dropped.contains(&group) {
                continue;
            }
            let user: BTreeMap<FeatureKey, f64> = taste.group_values(group).collect();
            for key in user.keys() {
                self.registry.validate_key(key)?;
            }
            let item = self.item_group_vector(truth, group);
            breakdown.set(group, cosine_similarity(&user, &item));
        }
        Ok(breakdown)
    }

    fn item_group_vector(&self, truth: &ItemTruthVector, group: FeatureGroup) -> BTreeMap<FeatureKey, f64> {
        match group {
            FeatureGroup::Tags => truth
                .tags
                .iter()
                .map(|(tag, value)| (FeatureKey::Tag(*tag), *value))
                .collect(),
            FeatureGroup::Cuisine => truth
                .cuisines
                .iter()
                .map(|(cuisine, value)| (FeatureKey::Cuisine(*cuisine), *value))
                .collect(),
            FeatureGroup::Price | FeatureGroup::Wait => {
                soft_bin(&self.registry, group, truth.scalar(group))
            }
        }
    }

    /// Deterministic ranking of every candidate, no exploration
    pub fn rank_all(
        &self,
        taste: &UserTasteVector,
        candidates: &[ItemTruthVector],
    ) -> Result<Vec<FeedEntry>> {
        let mut ranked = candidates
            .iter()
            .map(|truth| {
                let breakdown = self.score_item(taste, truth, &[])?;
                Ok(FeedEntry {
                    item_id: truth.item_id,
                    score: breakdown.total(),
                    breakdown,
                    dropped_groups: Vec::new(),
                    source: EntrySource::Ranked,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        sort_entries(&mut ranked);
        Ok(ranked)
    }

    /// Rank candidates and apply the exploration policy, returning at most
    /// `limit` entries
    pub fn rank<R: Rng>(
        &self,
        taste: &UserTasteVector,
        candidates: &[ItemTruthVector],
        limit: usize,
        rng: &mut R,
    ) -> Result<Vec<FeedEntry>> {
        if candidates.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        self.registry.ensure_version(taste.registry_version)?;

        // Draws happen in candidate order so a seed fixes every blind mask
        let mut ranked = Vec::with_capacity(candidates.len());
        let mut blinded = 0usize;
        for truth in candidates {
            let dropped = self.exploration.blind_groups(rng);
            if !dropped.is_empty() {
                blinded += 1;
            }
            let breakdown = self.score_item(taste, truth, &dropped)?;
            ranked.push(FeedEntry {
                item_id: truth.item_id,
                score: breakdown.total(),
                breakdown,
                dropped_groups: dropped,
                source: EntrySource::Ranked,
            });
        }
        sort_entries(&mut ranked);

        let shuffled = self.exploration.shuffle_head(&mut ranked, limit, rng);
        let mut feed: Vec<FeedEntry> = ranked.iter().take(limit).cloned().collect();

        let injected = self.inject_exploration(&mut feed, taste, candidates, rng)?;

        debug!(
            user_id = %taste.user_id,
            candidate_count = candidates.len(),
            returned = feed.len(),
            top_score = feed.first().map(|e| e.score),
            "Candidates ranked"
        );
        if blinded > 0 || shuffled || injected > 0 {
            info!(
                user_id = %taste.user_id,
                blinded_candidates = blinded,
                pool_shuffled = shuffled,
                injected = injected,
                "Exploration applied"
            );
        }

        Ok(feed)
    }

    fn inject_exploration<R: Rng>(
        &self,
        feed: &mut [FeedEntry],
        taste: &UserTasteVector,
        candidates: &[ItemTruthVector],
        rng: &mut R,
    ) -> Result<usize> {
        let selected: Vec<Uuid> = feed.iter().map(|e| e.item_id).collect();
        let pool: Vec<Uuid> = candidates.iter().map(|t| t.item_id).collect();
        let picks = self.exploration.injections(&selected, &pool, rng);
        if picks.is_empty() {
            return Ok(0);
        }

        let by_id: HashMap<Uuid, &ItemTruthVector> =
            candidates.iter().map(|t| (t.item_id, t)).collect();
        for (slot, item_id) in &picks {
            if let Some(truth) = by_id.get(item_id) {
                let breakdown = self.score_item(taste, truth, &[])?;
                feed[*slot] = FeedEntry {
                    item_id: *item_id,
                    score: breakdown.total(),
                    breakdown,
                    dropped_groups: Vec::new(),
                    source: EntrySource::Exploration,
                };
            }
        }
        Ok(picks.len())
    }
}

/// Descending score, ascending item id on ties
fn sort_entries(entries: &mut [FeedEntry]) {
    entries.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.item_id.cmp(&b.item_id))
    });
}

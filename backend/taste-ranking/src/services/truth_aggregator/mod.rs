// ============================================
// Truth Aggregator
// ============================================
//
// Recomputes an item's truth vector from its complete review history.
//
// - Tags: yes = +1, no = -1, averaged over reviews that answered.
//   A tag nobody answered stays absent (distinct from 0.0).
// - Cuisine: relative frequency of the labels reviews carry; the place
//   cuisine from item metadata counts once when no review has a label.
// - Scalars: mean of valid (finite, non-negative) values. Price falls back to
//   the listed price when no review reports one.
//
// Pure function of (reviews, metadata): reviews are folded in id order so
// the floating-point result is bit-identical across reruns and input order.

use crate::error::Result;
use crate::models::ItemTruthVector;
use crate::registry::{Cuisine, DimensionRegistry, TagKey};
use event_schema::{ItemMetadata, ReviewRecord};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

pub struct TruthAggregator {
    registry: Arc<DimensionRegistry>,
}

impl TruthAggregator {
    pub fn new(registry: Arc<DimensionRegistry>) -> Self {
        Self { registry }
    }

    /// Build the truth vector for `item_id`
    ///
    /// Returns `Ok(None)` when the item has no reviews: there is nothing to
    /// aggregate yet.
    pub fn aggregate(
        &self,
        item_id: Uuid,
        reviews: &[ReviewRecord],
        metadata: Option<&ItemMetadata>,
    ) -> Result<Option<ItemTruthVector>> {
        let mut ordered: Vec<&ReviewRecord> = reviews
            .iter()
            .filter(|review| {
                let belongs = review.item_id == item_id;
                if !belongs {
                    warn!(
                        item_id = %item_id,
                        review_id = %review.id,
                        other_item = %review.item_id,
                        "Skipping review for a different item"
                    );
                }
                belongs
            })
            .collect();

        if ordered.is_empty() {
            debug!(item_id = %item_id, "No reviews to aggregate");
            return Ok(None);
        }
        ordered.sort_by_key(|review| review.id);

        let mut truth = ItemTruthVector::new(item_id, self.registry.version());
        truth.tags = self.aggregate_tags(&ordered)?;
        truth.cuisines = self.aggregate_cuisines(&ordered, metadata)?;

        truth.avg_price = mean(ordered.iter().filter_map(|r| valid_scalar(r.price)))
            .or_else(|| metadata.and_then(|m| valid_scalar(m.listed_price)));
        truth.avg_wait_time = mean(ordered.iter().filter_map(|r| valid_scalar(r.waiting_time_minutes)));
        truth.review_count = ordered.len() as u32;

        debug!(
            item_id = %item_id,
            review_count = truth.review_count,
            tag_count = truth.tags.len(),
            cuisine_count = truth.cuisines.len(),
            avg_price = ?truth.avg_price,
            avg_wait_time = ?truth.avg_wait_time,
            "Truth vector aggregated"
        );

        Ok(Some(truth))
    }

    fn aggregate_tags(&self, reviews: &[&ReviewRecord]) -> Result<BTreeMap<TagKey, f64>> {
        // (sum of opinions, number of opinions)
        let mut totals: BTreeMap<TagKey, (f64, u32)> = BTreeMap::new();

        for review in reviews {
            for (name, answer) in &review.tags {
                let tag = self.registry.parse_tag(name)?;
                if let Some(opinion) = answer.opinion() {
                    let entry = totals.entry(tag).or_insert((0.0, 0));
                    entry.0 += opinion;
                    entry.1 += 1;
                }
            }
        }

        Ok(totals
            .into_iter()
            .map(|(tag, (sum, count))| (tag, sum / count as f64))
            .collect())
    }

    fn aggregate_cuisines(
        &self,
        reviews: &[&ReviewRecord],
        metadata: Option<&ItemMetadata>,
    ) -> Result<BTreeMap<Cuisine, f64>> {
        let mut labels: Vec<&str> = reviews
            .iter()
            .filter_map(|review| review.cuisine.as_deref())
            .collect();
        if labels.is_empty() {
            if let Some(place_cuisine) = metadata.and_then(|m| m.place_cuisine.as_deref()) {
                labels.push(place_cuisine);
            }
        }

        let mut counts: BTreeMap<Cuisine, u32> = BTreeMap::new();
        for label in labels {
            if let Some(cuisine) = self.registry.parse_cuisine(label)? {
                *counts.entry(cuisine).or_insert(0) += 1;
            }
        }

        let total: u32 = counts.values().sum();
        Ok(counts
            .into_iter()
            .map(|(cuisine, count)| (cuisine, count as f64 / total as f64))
            .collect())
    }
}

/// Finite, non-negative scalar; anything else is unspecified
fn valid_scalar(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v >= 0.0)
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0u32), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

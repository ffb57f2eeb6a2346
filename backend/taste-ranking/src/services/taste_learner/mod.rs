// ============================================
// Taste Learner
// ============================================
//
// Applies one bounded update to a user's taste vector per interaction.
//
// For each item feature with |truth| > min_signal_strength:
//   signal     = T * W_time * truth
//   multiplier = 1 + accel_max * exp(-accel_decay * count)
//   value     += learning_rate * multiplier * (signal - value)   (clamped)
//   count     += 1
//
// T (target):  swipe like +1.0, swipe dislike -0.8,
//              review above neutral +2.5, below -2.5, at neutral: no update
// W_time:      2^(-age_days / half_life), age measured when the update runs
//
// Price and wait-time are learned per bin (soft-smeared by default).

use crate::config::LearnerConfig;
use crate::error::{Result, TasteError};
use crate::models::{ItemTruthVector, UserTasteVector};
use crate::registry::{DimensionRegistry, FeatureGroup, FeatureKey};
use crate::services::binning::{self, BinEncoding};
use crate::utils::{clamp_unit, half_life_decay};
use chrono::{DateTime, Utc};
use event_schema::{InteractionEvent, InteractionPayload, MAX_RATING, MIN_RATING};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// What a single learning step did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Features above the strength threshold were updated
    Applied { features_updated: usize },
    /// Neutral rating: nothing to learn, vector untouched
    Neutral,
    /// Item has no truth vector yet: event dropped
    NoTruthVector,
}

impl UpdateOutcome {
    pub fn changed(&self) -> bool {
        matches!(self, UpdateOutcome::Applied { features_updated } if *features_updated > 0)
    }
}

pub struct TasteLearner {
    registry: Arc<DimensionRegistry>,
    config: LearnerConfig,
}

impl TasteLearner {
    pub fn new(registry: Arc<DimensionRegistry>, config: LearnerConfig) -> Self {
        Self { registry, config }
    }

    /// Target signal T for an interaction, `None` for a neutral review
    pub fn target_signal(&self, payload: &InteractionPayload) -> Result<Option<f64>> {
        match *payload {
            InteractionPayload::Swipe { liked: true } => Ok(Some(self.config.swipe_like_signal)),
            InteractionPayload::Swipe { liked: false } => {
                Ok(Some(self.config.swipe_dislike_signal))
            }
            InteractionPayload::Review { rating } => {
                if !(MIN_RATING..=MAX_RATING).contains(&rating) {
                    return Err(TasteError::InvalidEvent(format!(
                        "rating {} outside {}..={}",
                        rating, MIN_RATING, MAX_RATING
                    )));
                }
                let signal = match rating.cmp(&self.config.neutral_rating) {
                    std::cmp::Ordering::Greater => Some(self.config.review_positive_signal),
                    std::cmp::Ordering::Less => Some(self.config.review_negative_signal),
                    std::cmp::Ordering::Equal => None,
                };
                Ok(signal)
            }
        }
    }

    /// Recency weight of an event processed at `now`
    pub fn recency_weight(&self, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let age_days = (now - timestamp).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY;
        half_life_decay(age_days, self.config.recency_half_life_days)
    }

    /// Cold-start acceleration for a feature updated `count` times before
    pub fn cold_start_multiplier(&self, count: u32) -> f64 {
        1.0 + self.config.accel_max * (-self.config.accel_decay * count as f64).exp()
    }

    /// Flatten a truth vector into learnable features
    pub fn item_features(&self, truth: &ItemTruthVector) -> Result<BTreeMap<FeatureKey, f64>> {
        self.registry.ensure_version(truth.registry_version)?;

        let mut features = BTreeMap::new();
        for (tag, value) in &truth.tags {
            features.insert(FeatureKey::Tag(*tag), *value);
        }
        for (cuisine, value) in &truth.cuisines {
            features.insert(FeatureKey::Cuisine(*cuisine), *value);
        }

        let encoding = if self.config.one_hot_scalars {
            BinEncoding::OneHot
        } else {
            BinEncoding::Soft
        };
        for group in [FeatureGroup::Price, FeatureGroup::Wait] {
            features.extend(binning::encode(
                &self.registry,
                group,
                truth.scalar(group),
                encoding,
            ));
        }

        for key in features.keys() {
            self.registry.validate_key(key)?;
        }
        Ok(features)
    }

    /// Apply `event` to `taste`
    ///
    /// `truth` is the current truth vector of the event's item, if any. The
    /// caller owns persistence; this only mutates the in-memory record.
    pub fn apply(
        &self,
        taste: &mut UserTasteVector,
        event: &InteractionEvent,
        truth: Option<&ItemTruthVector>,
        now: DateTime<Utc>,
    ) -> Result<UpdateOutcome> {
        if taste.user_id != event.user_id {
            return Err(TasteError::InvalidEvent(format!(
                "event {} belongs to user {}, not {}",
                event.id, event.user_id, taste.user_id
            )));
        }
        self.registry.ensure_version(taste.registry_version)?;

        let Some(target) = self.target_signal(&event.payload)? else {
            debug!(event_id = %event.id, user_id = %event.user_id, "Neutral review, no update");
            return Ok(UpdateOutcome::Neutral);
        };

        let Some(truth) = truth else {
            warn!(
                event_id = %event.id,
                user_id = %event.user_id,
                item_id = %event.item_id,
                "No truth vector for item, dropping interaction"
            );
            return Ok(UpdateOutcome::NoTruthVector);
        };
        if truth.item_id != event.item_id {
            return Err(TasteError::InvalidEvent(format!(
                "event {} references item {}, truth vector is for {}",
                event.id, event.item_id, truth.item_id
            )));
        }

        let features = self.item_features(truth)?;
        let w_time = self.recency_weight(event.timestamp, now);

        let mut updated = 0;
        for (key, truth_value) in features {
            if truth_value.abs() <= self.config.min_signal_strength {
                continue;
            }

            let entry = taste.preferences.entry(key).or_default();
            let signal = target * w_time * truth_value;
            let multiplier = self.cold_start_multiplier(entry.count);

            entry.value = clamp_unit(
                entry.value + self.config.learning_rate * multiplier * (signal - entry.value),
            );
            entry.count += 1;
            updated += 1;
        }

        debug!(
            event_id = %event.id,
            user_id = %event.user_id,
            item_id = %event.item_id,
            kind = event.kind().as_str(),
            target = target,
            w_time = w_time,
            features_updated = updated,
            "Taste vector updated"
        );

        Ok(UpdateOutcome::Applied {
            features_updated: updated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PreferenceEntry;
    use crate::registry::{Cuisine, RegistryVersion, TagKey};
    use chrono::Duration;
    use uuid::Uuid;

    fn learner() -> TasteLearner {
        TasteLearner::new(Arc::new(DimensionRegistry::standard()), LearnerConfig::default())
    }

    fn vegan_item() -> ItemTruthVector {
        let mut truth = ItemTruthVector::new(Uuid::new_v4(), RegistryVersion(1));
        truth.tags.insert(TagKey::Vegan, 1.0);
        truth.tags.insert(TagKey::Spicy, 0.1);
        truth
    }

    #[test]
    fn test_cold_start_like_on_vegan_item() {
        let learner = learner();
        let truth = vegan_item();
        let user = Uuid::new_v4();
        let now = Utc::now();
        let mut taste = UserTasteVector::new(user, RegistryVersion(1));

        let event = InteractionEvent::swipe(user, truth.item_id, true, now);
        let outcome = learner.apply(&mut taste, &event, Some(&truth), now).unwrap();

        assert_eq!(outcome, UpdateOutcome::Applied { features_updated: 1 });
        let vegan = taste.entry(&FeatureKey::Tag(TagKey::Vegan));
        assert!((vegan.value - 0.525).abs() < 1e-9, "got {}", vegan.value);
        assert_eq!(vegan.count, 1);
        // weak item signal is not learned and not counted
        assert_eq!(taste.count(&FeatureKey::Tag(TagKey::Spicy)), 0);
    }

    #[test]
    fn test_neutral_review_is_noop() {
        let learner = learner();
        let truth = vegan_item();
        let user = Uuid::new_v4();
        let now = Utc::now();
        let mut taste = UserTasteVector::new(user, RegistryVersion(1));
        taste.preferences.insert(
            FeatureKey::Tag(TagKey::Vegan),
            PreferenceEntry {
                value: 0.3,
                count: 4,
            },
        );
        let before = taste.clone();

        let event = InteractionEvent::review(user, truth.item_id, 2, now);
        let outcome = learner.apply(&mut taste, &event, Some(&truth), now).unwrap();

        assert_eq!(outcome, UpdateOutcome::Neutral);
        assert!(!outcome.changed());
        assert_eq!(taste, before);
    }

    #[test]
    fn test_target_signals() {
        let learner = learner();
        let swipe = |liked| InteractionPayload::Swipe { liked };
        let review = |rating| InteractionPayload::Review { rating };

        assert_eq!(learner.target_signal(&swipe(true)).unwrap(), Some(1.0));
        assert_eq!(learner.target_signal(&swipe(false)).unwrap(), Some(-0.8));
        assert_eq!(learner.target_signal(&review(5)).unwrap(), Some(2.5));
        assert_eq!(learner.target_signal(&review(3)).unwrap(), Some(2.5));
        assert_eq!(learner.target_signal(&review(1)).unwrap(), Some(-2.5));
        assert_eq!(learner.target_signal(&review(2)).unwrap(), None);
        assert!(matches!(
            learner.target_signal(&review(0)),
            Err(TasteError::InvalidEvent(_))
        ));
        assert!(learner.target_signal(&review(6)).is_err());
    }

    #[test]
    fn test_cold_start_multiplier_decays_to_one() {
        let learner = learner();
        assert!((learner.cold_start_multiplier(0) - 3.5).abs() < 1e-12);
        assert!((learner.cold_start_multiplier(10) - 1.3383).abs() < 1e-3);

        let mut previous = learner.cold_start_multiplier(0);
        for count in 1..200 {
            let current = learner.cold_start_multiplier(count);
            assert!(current < previous || current - 1.0 < 1e-12);
            assert!(current >= 1.0);
            previous = current;
        }
        assert!((learner.cold_start_multiplier(200) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_recency_weight_uses_processing_time() {
        let learner = learner();
        let now = Utc::now();

        assert!((learner.recency_weight(now, now) - 1.0).abs() < 1e-12);
        assert!((learner.recency_weight(now - Duration::days(90), now) - 0.5).abs() < 1e-9);
        assert!((learner.recency_weight(now - Duration::days(180), now) - 0.25).abs() < 1e-9);
        assert_eq!(learner.recency_weight(now + Duration::days(3), now), 1.0);
    }

    #[test]
    fn test_old_event_moves_value_less() {
        let learner = learner();
        let truth = vegan_item();
        let user = Uuid::new_v4();
        let now = Utc::now();

        let mut fresh = UserTasteVector::new(user, RegistryVersion(1));
        let mut stale = fresh.clone();
        let fresh_event = InteractionEvent::swipe(user, truth.item_id, true, now);
        let stale_event = InteractionEvent::swipe(user, truth.item_id, true, now - Duration::days(90));

        learner.apply(&mut fresh, &fresh_event, Some(&truth), now).unwrap();
        learner.apply(&mut stale, &stale_event, Some(&truth), now).unwrap();

        let key = FeatureKey::Tag(TagKey::Vegan);
        assert!((stale.value(&key) - fresh.value(&key) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_dislike_of_non_vegan_item_is_evidence_for_vegan() {
        let learner = learner();
        let mut truth = ItemTruthVector::new(Uuid::new_v4(), RegistryVersion(1));
        truth.tags.insert(TagKey::Vegan, -1.0);
        let user = Uuid::new_v4();
        let now = Utc::now();
        let mut taste = UserTasteVector::new(user, RegistryVersion(1));

        let event = InteractionEvent::swipe(user, truth.item_id, false, now);
        learner.apply(&mut taste, &event, Some(&truth), now).unwrap();

        assert!(taste.value(&FeatureKey::Tag(TagKey::Vegan)) > 0.0);
    }

    #[test]
    fn test_values_stay_clamped_under_repeated_strong_reviews() {
        let learner = learner();
        let mut truth = vegan_item();
        truth.cuisines.insert(Cuisine::Thai, 1.0);
        truth.avg_price = Some(12000.0);
        let user = Uuid::new_v4();
        let now = Utc::now();
        let mut taste = UserTasteVector::new(user, RegistryVersion(1));

        for i in 0..60 {
            let rating = if i % 7 == 0 { 1 } else { 5 };
            let event = InteractionEvent::review(user, truth.item_id, rating, now);
            learner.apply(&mut taste, &event, Some(&truth), now).unwrap();
            for entry in taste.preferences.values() {
                assert!((-1.0..=1.0).contains(&entry.value));
            }
        }
        assert_eq!(taste.count(&FeatureKey::Cuisine(Cuisine::Thai)), 60);
    }

    #[test]
    fn test_scalars_learned_per_soft_bin() {
        let learner = learner();
        let mut truth = ItemTruthVector::new(Uuid::new_v4(), RegistryVersion(1));
        truth.avg_price = Some(10000.0);
        truth.avg_wait_time = Some(120.0);
        let user = Uuid::new_v4();
        let now = Utc::now();
        let mut taste = UserTasteVector::new(user, RegistryVersion(1));

        let event = InteractionEvent::swipe(user, truth.item_id, true, now);
        let outcome = learner.apply(&mut taste, &event, Some(&truth), now).unwrap();

        // r2 at 1.0, r1 and r3 at 0.25 (above the 0.2 threshold); wait is out of range
        assert_eq!(outcome, UpdateOutcome::Applied { features_updated: 3 });
        assert!(taste.value(&FeatureKey::PriceBin(2)) > taste.value(&FeatureKey::PriceBin(1)));
        assert_eq!(taste.count(&FeatureKey::PriceBin(3)), 1);
        assert!(taste.group_values(FeatureGroup::Wait).next().is_none());
    }

    #[test]
    fn test_one_hot_scalars_touch_single_bin() {
        let learner = TasteLearner::new(
            Arc::new(DimensionRegistry::standard()),
            LearnerConfig::default().with_one_hot_scalars(true),
        );
        let mut truth = ItemTruthVector::new(Uuid::new_v4(), RegistryVersion(1));
        truth.avg_wait_time = Some(15.0);
        let user = Uuid::new_v4();
        let now = Utc::now();
        let mut taste = UserTasteVector::new(user, RegistryVersion(1));

        let event = InteractionEvent::swipe(user, truth.item_id, true, now);
        learner.apply(&mut taste, &event, Some(&truth), now).unwrap();

        assert_eq!(taste.preferences.len(), 1);
        assert_eq!(taste.count(&FeatureKey::WaitBin(1)), 1);
    }

    #[test]
    fn test_missing_truth_is_dropped() {
        let learner = learner();
        let user = Uuid::new_v4();
        let now = Utc::now();
        let mut taste = UserTasteVector::new(user, RegistryVersion(1));

        let event = InteractionEvent::swipe(user, Uuid::new_v4(), true, now);
        let outcome = learner.apply(&mut taste, &event, None, now).unwrap();

        assert_eq!(outcome, UpdateOutcome::NoTruthVector);
        assert!(taste.is_empty());
    }

    #[test]
    fn test_registry_mismatch_is_fatal() {
        let learner = learner();
        let mut truth = vegan_item();
        truth.registry_version = RegistryVersion(2);
        let user = Uuid::new_v4();
        let now = Utc::now();
        let mut taste = UserTasteVector::new(user, RegistryVersion(1));

        let event = InteractionEvent::swipe(user, truth.item_id, true, now);
        let result = learner.apply(&mut taste, &event, Some(&truth), now);

        assert!(matches!(result, Err(TasteError::RegistryMismatch { .. })));
        assert!(taste.is_empty());
    }

    #[test]
    fn test_event_for_other_user_rejected() {
        let learner = learner();
        let truth = vegan_item();
        let now = Utc::now();
        let mut taste = UserTasteVector::new(Uuid::new_v4(), RegistryVersion(1));

        let event = InteractionEvent::swipe(Uuid::new_v4(), truth.item_id, true, now);
        assert!(matches!(
            learner.apply(&mut taste, &event, Some(&truth), now),
            Err(TasteError::InvalidEvent(_))
        ));
    }
}

// ============================================
// Exploration Policy
// ============================================
//
// Randomization layered on top of the deterministic match score to avoid
// filter-bubble lock-in:
// 1. Partial blindness: with probability y a candidate is scored with each
//    feature group independently dropped with probability z
// 2. Pool shuffle: for large pools the head (limit + extra) is shuffled
//    before truncation
// 3. Random injection: each ranked slot is replaced with probability x by a
//    uniformly random candidate not already in the feed
//
// Every draw goes through one caller-supplied RNG. With a fixed seed the
// feed is reproducible per user; with all probabilities at zero no draw
// happens.

use crate::config::ExplorationConfig;
use crate::error::Result;
use crate::registry::FeatureGroup;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

pub struct ExplorationPolicy {
    config: ExplorationConfig,
}

impl ExplorationPolicy {
    /// Fails with `TasteError::Configuration` for probabilities outside [0, 1]
    pub fn new(config: ExplorationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn disabled() -> Self {
        Self {
            config: ExplorationConfig::disabled(),
        }
    }

    /// RNG for one feed request of `user_id`: derived from the configured
    /// seed, entropy otherwise
    pub fn rng_for(&self, user_id: Uuid) -> StdRng {
        match self.config.seed {
            Some(seed) => {
                let (high, low) = user_id.as_u64_pair();
                StdRng::seed_from_u64(seed ^ high ^ low.rotate_left(32))
            }
            None => StdRng::from_entropy(),
        }
    }

    /// Groups hidden while scoring one candidate
    pub fn blind_groups<R: Rng>(&self, rng: &mut R) -> Vec<FeatureGroup> {
        if self.config.blind_probability <= 0.0 || !rng.gen_bool(self.config.blind_probability) {
            return Vec::new();
        }
        FeatureGroup::ALL
            .iter()
            .copied()
            .filter(|_| {
                self.config.group_drop_probability > 0.0
                    && rng.gen_bool(self.config.group_drop_probability)
            })
            .collect()
    }

    /// Shuffle the first `limit + pool_shuffle_extra` entries of a large pool
    ///
    /// Returns whether a shuffle happened.
    pub fn shuffle_head<T, R: Rng>(
        &self,
        ranked: &mut [T],
        limit: usize,
        rng: &mut R,
    ) -> bool {
        if !self.config.pool_shuffle || ranked.len() <= self.config.pool_shuffle_threshold {
            return false;
        }
        let head = (limit + self.config.pool_shuffle_extra).min(ranked.len());
        ranked[..head].shuffle(rng);
        true
    }

    /// Pick replacement ids for feed slots
    ///
    /// Returns `(slot, item_id)` pairs. Replacements never repeat and never
    /// duplicate an item already shown.
    pub fn injections<R: Rng>(
        &self,
        selected: &[Uuid],
        pool: &[Uuid],
        rng: &mut R,
    ) -> Vec<(usize, Uuid)> {
        if self.config.random_pick_probability <= 0.0 {
            return Vec::new();
        }

        let mut shown: Vec<Uuid> = selected.to_vec();
        let mut picks = Vec::new();
        for slot in 0..selected.len() {
            if !rng.gen_bool(self.config.random_pick_probability) {
                continue;
            }
            let available: Vec<Uuid> = pool
                .iter()
                .copied()
                .filter(|id| !shown.contains(id))
                .collect();
            if let Some(pick) = available.choose(rng) {
                shown.push(*pick);
                picks.push((slot, *pick));
            }
        }
        picks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TasteError;

    #[test]
    fn test_disabled_policy_never_draws() {
        let policy = ExplorationPolicy::disabled();
        let mut rng = StdRng::seed_from_u64(7);
        let reference = StdRng::seed_from_u64(7).gen::<u64>();

        assert!(policy.blind_groups(&mut rng).is_empty());
        let ids: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        assert!(policy.injections(&ids[..2], &ids, &mut rng).is_empty());
        let mut ranked: Vec<u32> = (0..500).collect();
        assert!(!policy.shuffle_head(&mut ranked, 10, &mut rng));

        // RNG state untouched
        assert_eq!(rng.gen::<u64>(), reference);
    }

    #[test]
    fn test_full_blindness_drops_every_group() {
        let policy = ExplorationPolicy::new(
            ExplorationConfig::disabled().with_probabilities(0.0, 1.0, 1.0),
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(policy.blind_groups(&mut rng), FeatureGroup::ALL.to_vec());
    }

    #[test]
    fn test_injections_are_unique_and_new() {
        let policy = ExplorationPolicy::new(
            ExplorationConfig::disabled().with_probabilities(1.0, 0.0, 0.0),
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let pool: Vec<Uuid> = (0..6).map(|_| Uuid::new_v4()).collect();
        let selected = &pool[..3];

        let picks = policy.injections(selected, &pool, &mut rng);

        // only three items outside the selection exist
        assert_eq!(picks.len(), 3);
        let mut ids: Vec<Uuid> = picks.iter().map(|(_, id)| *id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
        assert!(ids.iter().all(|id| !selected.contains(id)));
    }

    #[test]
    fn test_shuffle_only_for_large_pools() {
        let policy = ExplorationPolicy::new(ExplorationConfig::default().with_seed(9)).unwrap();
        let mut rng = policy.rng_for(Uuid::new_v4());

        let mut small: Vec<u32> = (0..100).collect();
        assert!(!policy.shuffle_head(&mut small, 10, &mut rng));
        assert_eq!(small, (0..100).collect::<Vec<_>>());

        let mut large: Vec<u32> = (0..101).collect();
        assert!(policy.shuffle_head(&mut large, 10, &mut rng));
        // only the head of limit + 20 moves
        assert_eq!(&large[30..], &(30..101).collect::<Vec<_>>()[..]);
        let mut head = large[..30].to_vec();
        head.sort();
        assert_eq!(head, (0..30).collect::<Vec<_>>());
    }

    #[test]
    fn test_seeded_rng_is_reproducible_per_user() {
        let policy = ExplorationPolicy::new(ExplorationConfig::default().with_seed(42)).unwrap();
        let user = Uuid::new_v4();
        let mut first = policy.rng_for(user);
        let mut second = policy.rng_for(user);
        let mut other = policy.rng_for(Uuid::new_v4());

        let a: Vec<u64> = (0..4).map(|_| first.gen()).collect();
        let b: Vec<u64> = (0..4).map(|_| second.gen()).collect();
        let c: Vec<u64> = (0..4).map(|_| other.gen()).collect();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_out_of_range_probabilities_rejected() {
        for config in [
            ExplorationConfig::default().with_probabilities(1.5, 0.0, 0.0),
            ExplorationConfig::default().with_probabilities(0.0, -0.1, 0.0),
            ExplorationConfig::default().with_probabilities(0.0, 0.5, f64::NAN),
        ] {
            assert!(matches!(
                ExplorationPolicy::new(config),
                Err(TasteError::Configuration(_))
            ));
        }
    }
}

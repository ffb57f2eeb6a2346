use crate::error::{Result, TasteError};
use serde::{Deserialize, Serialize};

/// Runtime configuration, read from `TASTE_*` environment variables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub learner: LearnerConfig,
    pub exploration: ExplorationConfig,
    pub pipeline: PipelineConfig,
}

/// Taste learner tunables
///
/// Env prefix: `TASTE_LEARNER_` (e.g. `TASTE_LEARNER_LEARNING_RATE`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    /// Step size of the delta rule
    pub learning_rate: f64,
    /// Extra multiplier granted to a feature with no history
    pub accel_max: f64,
    /// How fast the cold-start multiplier decays per update
    pub accel_decay: f64,
    pub recency_half_life_days: f64,
    /// Item signals with |value| at or below this are ignored
    pub min_signal_strength: f64,
    pub swipe_like_signal: f64,
    pub swipe_dislike_signal: f64,
    pub review_positive_signal: f64,
    pub review_negative_signal: f64,
    /// Ratings equal to this carry no signal
    pub neutral_rating: u8,
    /// Learn scalar bins one-hot instead of soft-smeared
    pub one_hot_scalars: bool,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.15,
            accel_max: 2.5,
            accel_decay: 0.2,
            recency_half_life_days: 90.0,
            min_signal_strength: 0.2,
            swipe_like_signal: 1.0,
            swipe_dislike_signal: -0.8,
            review_positive_signal: 2.5,
            review_negative_signal: -2.5,
            neutral_rating: 2,
            one_hot_scalars: false,
        }
    }
}

impl LearnerConfig {
    pub fn with_one_hot_scalars(mut self, one_hot: bool) -> Self {
        self.one_hot_scalars = one_hot;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(TasteError::Configuration(format!(
                "learning_rate must be in (0, 1], got {}",
                self.learning_rate
            )));
        }
        if self.accel_max < 0.0 || self.accel_decay <= 0.0 {
            return Err(TasteError::Configuration(
                "accel_max must be >= 0 and accel_decay > 0".to_string(),
            ));
        }
        if !(self.recency_half_life_days > 0.0) {
            return Err(TasteError::Configuration(format!(
                "recency_half_life_days must be positive, got {}",
                self.recency_half_life_days
            )));
        }
        if !(0.0..1.0).contains(&self.min_signal_strength) {
            return Err(TasteError::Configuration(format!(
                "min_signal_strength must be in [0, 1), got {}",
                self.min_signal_strength
            )));
        }
        if !(event_schema::MIN_RATING..=event_schema::MAX_RATING).contains(&self.neutral_rating) {
            return Err(TasteError::Configuration(format!(
                "neutral_rating must be a valid rating, got {}",
                self.neutral_rating
            )));
        }
        Ok(())
    }
}

/// Exploration policy tunables
///
/// Env prefix: `TASTE_EXPLORATION_`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorationConfig {
    /// Chance that a ranked slot is replaced by a random candidate
    pub random_pick_probability: f64,
    /// Chance that a candidate is scored with some groups hidden
    pub blind_probability: f64,
    /// Per-group drop chance for a blinded candidate
    pub group_drop_probability: f64,
    /// Shuffle the head of large candidate pools before truncation
    pub pool_shuffle: bool,
    pub pool_shuffle_threshold: usize,
    /// Head size beyond `limit` that takes part in the shuffle
    pub pool_shuffle_extra: usize,
    /// Fixed RNG seed for reproducible feeds
    ///
    /// Mixed with the requesting user's id, so repeated requests by one user
    /// replay the same draws while different users get different ones.
    pub seed: Option<u64>,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            random_pick_probability: 0.1,
            blind_probability: 0.1,
            group_drop_probability: 0.25,
            pool_shuffle: true,
            pool_shuffle_threshold: 100,
            pool_shuffle_extra: 20,
            seed: None,
        }
    }
}

impl ExplorationConfig {
    /// No randomization at all: ranking is the deterministic score order
    pub fn disabled() -> Self {
        Self {
            random_pick_probability: 0.0,
            blind_probability: 0.0,
            pool_shuffle: false,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_probabilities(mut self, random_pick: f64, blind: f64, group_drop: f64) -> Self {
        self.random_pick_probability = random_pick;
        self.blind_probability = blind;
        self.group_drop_probability = group_drop;
        self
    }

    pub fn is_active(&self) -> bool {
        self.random_pick_probability > 0.0 || self.blind_probability > 0.0 || self.pool_shuffle
    }

    pub fn validate(&self) -> Result<()> {
        for (name, p) in [
            ("random_pick_probability", self.random_pick_probability),
            ("blind_probability", self.blind_probability),
            ("group_drop_probability", self.group_drop_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(TasteError::Configuration(format!(
                    "{} must be in [0, 1], got {}",
                    name, p
                )));
            }
        }
        Ok(())
    }
}

/// Orchestration tunables
///
/// Env prefix: `TASTE_PIPELINE_`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Compare-and-swap attempts before a taste update gives up
    pub max_update_retries: u32,
    /// Items recomputed concurrently by a batch truth refresh
    pub refresh_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_update_retries: 8,
            refresh_concurrency: 8,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_update_retries == 0 || self.refresh_concurrency == 0 {
            return Err(TasteError::Configuration(
                "max_update_retries and refresh_concurrency must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            learner: envy::prefixed("TASTE_LEARNER_").from_env()?,
            exploration: envy::prefixed("TASTE_EXPLORATION_").from_env()?,
            pipeline: envy::prefixed("TASTE_PIPELINE_").from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.learner.validate()?;
        self.exploration.validate()?;
        self.pipeline.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_constants() {
        let config = Config::default();
        assert_eq!(config.learner.learning_rate, 0.15);
        assert_eq!(config.learner.swipe_dislike_signal, -0.8);
        assert_eq!(config.learner.neutral_rating, 2);
        assert_eq!(config.exploration.random_pick_probability, 0.1);
        assert_eq!(config.pipeline.max_update_retries, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_disabled_exploration_is_inactive() {
        let exploration = ExplorationConfig::disabled();
        assert!(!exploration.is_active());
        assert!(ExplorationConfig::default().is_active());
    }

    #[test]
    fn test_invalid_probability_rejected() {
        let exploration = ExplorationConfig::default().with_probabilities(1.5, 0.0, 0.0);
        assert!(matches!(
            exploration.validate(),
            Err(TasteError::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_learner_rejected() {
        let learner = LearnerConfig {
            recency_half_life_days: 0.0,
            ..LearnerConfig::default()
        };
        assert!(learner.validate().is_err());

        let learner = LearnerConfig {
            neutral_rating: 9,
            ..LearnerConfig::default()
        };
        assert!(learner.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars = vec![
            ("LEARNING_RATE".to_string(), "0.3".to_string()),
            ("ONE_HOT_SCALARS".to_string(), "true".to_string()),
        ];
        let learner: LearnerConfig = envy::from_iter(vars).unwrap();
        assert_eq!(learner.learning_rate, 0.3);
        assert!(learner.one_hot_scalars);
        assert_eq!(learner.accel_max, 2.5);

        let vars = vec![("SEED".to_string(), "42".to_string())];
        let exploration: ExplorationConfig = envy::from_iter(vars).unwrap();
        assert_eq!(exploration.seed, Some(42));
    }
}

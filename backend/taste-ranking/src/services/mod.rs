pub mod binning;
pub mod exploration;
pub mod match_scorer;
pub mod pipeline;
pub mod taste_learner;
pub mod truth_aggregator;

pub use exploration::ExplorationPolicy;
pub use match_scorer::{EntrySource, FeedEntry, MatchScorer, ScoreBreakdown};
pub use pipeline::TastePipeline;
pub use taste_learner::{TasteLearner, UpdateOutcome};
pub use truth_aggregator::TruthAggregator;

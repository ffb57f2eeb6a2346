// ============================================
// Replay Job
// ============================================
//
// Workflow:
// 1. Load item metadata into the review source
// 2. Walk reviews and interaction envelopes in timestamp order
//    (reviews first on ties): a review refreshes its item's truth vector and
//    teaches its author, an envelope teaches its user
// 3. Build every requested feed against the resulting state
//
// Failed events are logged and counted; they do not stop the replay.

use crate::config::Config;
use crate::error::Result;
use crate::models::FeedRequest;
use crate::services::match_scorer::FeedEntry;
use crate::services::pipeline::TastePipeline;
use crate::services::taste_learner::UpdateOutcome;
use crate::store::{InMemoryReviewSource, InMemoryVectorStore};
use chrono::{DateTime, Utc};
use event_schema::{EventEnvelope, InteractionEvent, ItemMetadata, ReviewRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Recorded input for one replay
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayFixture {
    /// Clock used for recency weighting; wall clock when absent
    #[serde(default)]
    pub now: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Vec<ItemMetadata>,
    #[serde(default)]
    pub reviews: Vec<ReviewRecord>,
    #[serde(default)]
    pub events: Vec<EventEnvelope<InteractionEvent>>,
    #[serde(default)]
    pub feeds: Vec<FeedRequest>,
}

impl ReplayFixture {
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayStats {
    pub reviews_applied: u32,
    pub interactions_applied: u32,
    pub neutral: u32,
    pub without_truth: u32,
    pub failed: u32,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedResult {
    pub user_id: Uuid,
    pub entries: Vec<FeedEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayReport {
    pub stats: ReplayStats,
    pub feeds: Vec<FeedResult>,
}

#[derive(Clone, Copy)]
enum Step<'a> {
    Review(&'a ReviewRecord),
    Interaction(&'a EventEnvelope<InteractionEvent>),
}

impl Step<'_> {
    fn sort_key(&self) -> (DateTime<Utc>, u8, Uuid) {
        match self {
            Step::Review(review) => (review.created_at, 0, review.id),
            Step::Interaction(envelope) => (envelope.data.timestamp, 1, envelope.data.id),
        }
    }
}

pub struct ReplayJob {
    pipeline: TastePipeline<InMemoryVectorStore, InMemoryReviewSource>,
    reviews: Arc<InMemoryReviewSource>,
}

impl ReplayJob {
    pub fn new(config: Config) -> Result<Self> {
        let reviews = Arc::new(InMemoryReviewSource::new());
        let pipeline =
            TastePipeline::new(config, Arc::new(InMemoryVectorStore::new()), reviews.clone())?;
        Ok(Self { pipeline, reviews })
    }

    pub fn pipeline(&self) -> &TastePipeline<InMemoryVectorStore, InMemoryReviewSource> {
        &self.pipeline
    }

    /// Store a review and learn from it; rejected reviews are never stored
    async fn replay_review(&self, review: &ReviewRecord, now: DateTime<Utc>) -> Result<UpdateOutcome> {
        self.pipeline.validate_review(review)?;
        self.reviews.add_review(review.clone());
        self.pipeline.record_review(review, now).await
    }

    pub async fn run(&self, fixture: &ReplayFixture) -> Result<ReplayReport> {
        let start_time = Instant::now();
        let now = fixture.now.unwrap_or_else(Utc::now);
        let mut stats = ReplayStats::default();

        info!(
            reviews = fixture.reviews.len(),
            events = fixture.events.len(),
            feeds = fixture.feeds.len(),
            "Starting replay"
        );

        for metadata in &fixture.metadata {
            self.reviews.set_metadata(metadata.clone());
        }

        let mut steps: Vec<Step<'_>> = fixture
            .reviews
            .iter()
            .map(Step::Review)
            .chain(fixture.events.iter().map(Step::Interaction))
            .collect();
        steps.sort_by_key(|step| step.sort_key());

        for step in steps {
            let result = match step {
                Step::Review(review) => self.replay_review(review, now).await,
                Step::Interaction(envelope) => self.pipeline.apply_envelope(envelope, now).await,
            };

            match result {
                Ok(UpdateOutcome::Applied { .. }) => match step {
                    Step::Review(_) => stats.reviews_applied += 1,
                    Step::Interaction(_) => stats.interactions_applied += 1,
                },
                Ok(UpdateOutcome::Neutral) => stats.neutral += 1,
                Ok(UpdateOutcome::NoTruthVector) => stats.without_truth += 1,
                Err(err) => {
                    let (kind, id) = match step {
                        Step::Review(review) => ("review", review.id),
                        Step::Interaction(envelope) => ("interaction", envelope.data.id),
                    };
                    warn!(kind = kind, id = %id, error = %err, "Replay step failed");
                    stats.failed += 1;
                }
            }
        }

        let mut feeds = Vec::with_capacity(fixture.feeds.len());
        for request in &fixture.feeds {
            let entries = self.pipeline.build_feed(request).await?;
            feeds.push(FeedResult {
                user_id: request.user_id,
                entries,
            });
        }

        stats.duration_ms = start_time.elapsed().as_millis() as u64;
        info!(
            reviews_applied = stats.reviews_applied,
            interactions_applied = stats.interactions_applied,
            neutral = stats.neutral,
            without_truth = stats.without_truth,
            failed = stats.failed,
            duration_ms = stats.duration_ms,
            "Replay completed"
        );

        Ok(ReplayReport { stats, feeds })
    }
}

// ============================================
// Taste Pipeline
// ============================================
//
// Wires aggregation, learning and scoring to storage:
//
//   review  -> refresh item truth -> learn from rating
//   swipe   -> learn from like/dislike against current truth
//   feed    -> load truths + taste -> rank with exploration
//
// Taste updates are read-modify-write under compare-and-swap on the record
// version, retried up to `max_update_retries` times. Concurrent events for
// one user therefore never lose an update.

use crate::config::{Config, PipelineConfig};
use crate::error::{Result, TasteError};
use crate::models::{FeedRequest, ItemTruthVector, UserTasteVector};
use crate::registry::DimensionRegistry;
use crate::services::exploration::ExplorationPolicy;
use crate::services::match_scorer::{FeedEntry, MatchScorer};
use crate::services::taste_learner::{TasteLearner, UpdateOutcome};
use crate::services::truth_aggregator::TruthAggregator;
use crate::store::{ReviewSource, VectorStore};
use chrono::{DateTime, Utc};
use event_schema::{EventEnvelope, InteractionEvent, ReviewRecord, MAX_RATING, MIN_RATING};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct TastePipeline<S, R> {
    store: Arc<S>,
    reviews: Arc<R>,
    registry: Arc<DimensionRegistry>,
    aggregator: TruthAggregator,
    learner: TasteLearner,
    scorer: MatchScorer,
    config: PipelineConfig,
}

impl<S, R> TastePipeline<S, R>
where
    S: VectorStore,
    R: ReviewSource,
{
    /// Pipeline over the standard registry
    pub fn new(config: Config, store: Arc<S>, reviews: Arc<R>) -> Result<Self> {
        Self::with_registry(config, Arc::new(DimensionRegistry::standard()), store, reviews)
    }

    pub fn with_registry(
        config: Config,
        registry: Arc<DimensionRegistry>,
        store: Arc<S>,
        reviews: Arc<R>,
    ) -> Result<Self> {
        config.validate()?;
        let exploration = ExplorationPolicy::new(config.exploration.clone())?;

        info!(
            registry_version = %registry.version(),
            exploration_active = config.exploration.is_active(),
            seeded = config.exploration.seed.is_some(),
            "Taste pipeline initialized"
        );

        Ok(Self {
            aggregator: TruthAggregator::new(registry.clone()),
            learner: TasteLearner::new(registry.clone(), config.learner),
            scorer: MatchScorer::new(registry.clone(), exploration),
            config: config.pipeline,
            registry,
            store,
            reviews,
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Recompute and persist one item's truth vector from its full review
    /// history
    ///
    /// Items without reviews keep whatever is stored and return `None`.
    pub async fn refresh_item_truth(&self, item_id: Uuid) -> Result<Option<ItemTruthVector>> {
        let reviews = self.reviews.fetch_item_reviews(item_id).await?;
        let metadata = self.reviews.fetch_item_metadata(item_id).await?;

        let Some(truth) = self.aggregator.aggregate(item_id, &reviews, metadata.as_ref())? else {
            return Ok(None);
        };
        self.store.put_truth(truth.clone()).await?;
        Ok(Some(truth))
    }

    /// Refresh many items concurrently; returns how many now have a truth
    /// vector
    pub async fn refresh_items(&self, item_ids: &[Uuid]) -> Result<usize> {
        let refreshed = stream::iter(item_ids.iter().copied())
            .map(|item_id| self.refresh_item_truth(item_id))
            .buffer_unordered(self.config.refresh_concurrency)
            .try_fold(0usize, |count, truth| async move {
                Ok(count + usize::from(truth.is_some()))
            })
            .await?;

        info!(
            requested = item_ids.len(),
            refreshed = refreshed,
            "Truth vectors refreshed"
        );
        Ok(refreshed)
    }

    /// Learn from one interaction
    pub async fn apply_interaction(
        &self,
        event: &InteractionEvent,
        now: DateTime<Utc>,
    ) -> Result<UpdateOutcome> {
        let truth = self.store.get_truth(event.item_id).await?;

        for attempt in 1..=self.config.max_update_retries {
            let current = self.store.get_taste(event.user_id).await?;
            let expected = current.as_ref().map(|taste| taste.version);
            let mut taste = current
                .unwrap_or_else(|| UserTasteVector::new(event.user_id, self.registry.version()));

            let outcome = self.learner.apply(&mut taste, event, truth.as_ref(), now)?;
            if !outcome.changed() {
                return Ok(outcome);
            }

            if self.store.compare_and_swap_taste(expected, taste).await? {
                return Ok(outcome);
            }
            debug!(
                user_id = %event.user_id,
                event_id = %event.id,
                attempt = attempt,
                "Taste vector changed concurrently, retrying"
            );
        }

        warn!(
            user_id = %event.user_id,
            event_id = %event.id,
            attempts = self.config.max_update_retries,
            "Giving up on taste update"
        );
        Err(TasteError::ConcurrentUpdate {
            user_id: event.user_id,
            attempts: self.config.max_update_retries,
        })
    }

    /// Learn from an interaction delivered in a versioned envelope
    pub async fn apply_envelope(
        &self,
        envelope: &EventEnvelope<InteractionEvent>,
        now: DateTime<Utc>,
    ) -> Result<UpdateOutcome> {
        if !envelope.is_compatible() {
            return Err(TasteError::InvalidEvent(format!(
                "envelope {} has unsupported schema version {}",
                envelope.event_id, envelope.schema_version
            )));
        }
        self.apply_interaction(&envelope.data, now).await
    }

    pub async fn record_swipe(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        liked: bool,
        timestamp: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<UpdateOutcome> {
        let event = InteractionEvent::swipe(user_id, item_id, liked, timestamp);
        self.apply_interaction(&event, now).await
    }

    /// Check a review against the rating bounds and this pipeline's registry
    ///
    /// Run before a review is stored: every refresh of the item re-reads the
    /// full history, so one stored review with an unknown tag or cuisine
    /// would fail them all.
    pub fn validate_review(&self, review: &ReviewRecord) -> Result<()> {
        if !(MIN_RATING..=MAX_RATING).contains(&review.rating) {
            return Err(TasteError::InvalidEvent(format!(
                "review {} has rating {} outside {}..={}",
                review.id, review.rating, MIN_RATING, MAX_RATING
            )));
        }
        for name in review.tags.keys() {
            self.registry.parse_tag(name)?;
        }
        if let Some(label) = review.cuisine.as_deref() {
            self.registry.parse_cuisine(label)?;
        }
        Ok(())
    }

    /// Fold a stored review into its item's truth vector, then learn from the
    /// rating
    ///
    /// `review` must already be visible through the review source and have
    /// passed [`validate_review`](Self::validate_review).
    pub async fn record_review(
        &self,
        review: &ReviewRecord,
        now: DateTime<Utc>,
    ) -> Result<UpdateOutcome> {
        self.validate_review(review)?;

        self.refresh_item_truth(review.item_id).await?;
        self.apply_interaction(&InteractionEvent::from_review(review), now)
            .await
    }

    /// Rank a request's candidates for its user
    pub async fn build_feed(&self, request: &FeedRequest) -> Result<Vec<FeedEntry>> {
        request.validate()?;

        let mut seen = HashSet::with_capacity(request.candidates.len());
        let candidates: Vec<Uuid> = request
            .candidates
            .iter()
            .copied()
            .filter(|id| !request.exclude.contains(id) && seen.insert(*id))
            .collect();

        let truths = self.store.get_truths(&candidates).await?;
        if truths.len() < candidates.len() {
            debug!(
                user_id = %request.user_id,
                missing = candidates.len() - truths.len(),
                "Skipping candidates without truth vectors"
            );
        }

        let taste = match self.store.get_taste(request.user_id).await? {
            Some(taste) => taste,
            None => {
                debug!(user_id = %request.user_id, "No taste vector yet, cold-start feed");
                UserTasteVector::new(request.user_id, self.registry.version())
            }
        };

        let mut rng = self.scorer.exploration().rng_for(request.user_id);
        self.scorer.rank(&taste, &truths, request.limit, &mut rng)
    }
}

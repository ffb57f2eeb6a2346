pub mod config;
pub mod error;
pub mod jobs;
pub mod models;
pub mod registry;
pub mod services;
pub mod store;
pub mod utils;

pub use config::Config;
pub use error::{Result, TasteError};
pub use models::{FeedRequest, ItemTruthVector, UserTasteVector};
pub use registry::{DimensionRegistry, FeatureGroup, FeatureKey, RegistryVersion};
pub use services::{FeedEntry, TastePipeline, UpdateOutcome};
pub use store::{InMemoryReviewSource, InMemoryVectorStore, ReviewSource, VectorStore};

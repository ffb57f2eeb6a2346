// ============================================
// Offline Jobs
// ============================================
//
// Replay: feeds a recorded fixture (reviews, interaction envelopes, feed
// requests) through an in-memory pipeline for offline debugging of learned
// tastes and rankings.
//
// Usage:
//   taste-ranking fixtures/sample_replay.json

pub mod replay;

pub use replay::{FeedResult, ReplayFixture, ReplayJob, ReplayReport, ReplayStats};

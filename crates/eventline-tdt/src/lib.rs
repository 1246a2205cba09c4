//! eventline-tdt: topic detection and tracking for the Eventline pipeline
//!
//! This crate provides:
//! - The nutrition store: a time-keyed record of term importance
//! - Feature-pivot burst detection over fixed checkpoints and over a
//!   sliding window
//! - Volume-based burst detection
//! - Temporal single-pass incremental clustering
//! - The timeline of topical nodes the consumers assemble
//!
//! The streaming consumers in `eventline-stream` wire these pieces
//! together.

pub mod clustering;
pub mod eld;
pub mod nutrition;
pub mod timeline;
pub mod zhao;

pub use clustering::{ClusterId, TemporalNoKMeans};
pub use eld::{Eld, EldError, EldResult, SlidingEld};
pub use nutrition::{MemoryNutritionStore, StoreError, StoreResult, TermNutrition};
pub use timeline::{
    DocumentNode, Node, NodeKind, NodePayload, Timeline, TimelineError, TimelineResult,
    TopicalClusterNode,
};
pub use zhao::{Zhao, DEFAULT_POST_RATE};

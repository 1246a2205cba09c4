//! Streaming consumers.
//!
//! A consumer owns the processing side of the pipeline: it drains the
//! shared queue, turns posts into documents and feeds the detection
//! machinery. Two consumers are provided:
//!
//! - [`EldConsumer`]: document-pivot clustering with a feature-pivot burst
//!   test per candidate cluster, producing a timeline of topical-cluster
//!   nodes.
//! - [`ZhaoConsumer`]: volume-based detection over a dynamic sliding
//!   window, producing a timeline of document nodes.
//!
//! Consumers stop cooperatively: clearing the handle from `stop_handle`
//! makes them finish the current batch and return their timeline.

mod eld;
mod zhao;

pub use eld::{EldConsumer, EldConsumerConfig};
pub use zhao::{ZhaoConsumer, ZhaoConsumerConfig};

use crate::queue::PostQueue;
use eventline_core::{Document, TermWeighting};
use eventline_nlp::{post, Tokenizer};
use eventline_tdt::{EldError, StoreError, TimelineError};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::time::{sleep, Duration};
use tracing::warn;

/// How long a consumer sleeps between queue polls.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Result type alias for consumer operations.
pub type ConsumerResult<T> = Result<T, ConsumerError>;

/// Errors that can terminate a consumer.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// A nutrition store range query failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Burst detection failed.
    #[error(transparent)]
    Eld(#[from] EldError),

    /// The timeline rejected an operation.
    #[error(transparent)]
    Timeline(#[from] TimelineError),
}

/// Waits until the queue has input.
///
/// Returns `false` when the consumer should stop: either the active flag
/// was cleared, or the queue stayed empty for `max_inactivity` seconds. A
/// negative `max_inactivity` waits forever.
pub(crate) async fn wait_for_input(
    queue: &PostQueue<Value>,
    active: &AtomicBool,
    max_inactivity: i64,
) -> bool {
    let mut inactive = Duration::ZERO;
    let budget = (max_inactivity >= 0).then(|| Duration::from_secs(max_inactivity as u64));

    while active.load(Ordering::Relaxed)
        && queue.is_empty()
        && budget.map_or(true, |budget| inactive < budget)
    {
        sleep(POLL_INTERVAL).await;
        inactive += POLL_INTERVAL;
    }

    if !active.load(Ordering::Relaxed) {
        return false;
    }

    if !queue.is_empty() {
        return true;
    }

    budget.map_or(true, |budget| inactive < budget)
}

/// Converts a post into a normalized document.
///
/// The document keeps the post's id, URL count and event timestamp as
/// attributes. Posts without a usable timestamp are dropped with a
/// warning.
pub(crate) fn document_from_post(
    post: &Value,
    tokenizer: &Tokenizer,
    scheme: &TermWeighting,
) -> Option<Document> {
    let timestamp = match post::timestamp(post) {
        Ok(timestamp) => timestamp,
        Err(e) => {
            warn!("Dropping post: {}", e);
            return None;
        }
    };

    let text = post::full_text(post);
    let tokens = tokenizer.tokenize(&text);

    let mut document = scheme.create(&text, &tokens);
    if let Some(id) = post::id(post) {
        document.set_attribute("id", id);
    }
    document.set_attribute("urls", post::url_count(post));
    document.set_attribute("timestamp", timestamp);
    document.normalize();

    Some(document)
}

/// Returns the newest event timestamp among the documents.
pub(crate) fn latest_timestamp(documents: &[Document]) -> Option<i64> {
    documents.iter().filter_map(Document::timestamp).max()
}

/// A cooperative stop flag shared with whoever supervises the consumer.
pub(crate) fn active_flag() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn wait_returns_true_when_queue_has_input() {
        let queue = PostQueue::new();
        queue.enqueue(json!({}));
        let active = AtomicBool::new(true);

        assert!(wait_for_input(&queue, &active, 1).await);
    }

    #[tokio::test]
    async fn wait_returns_false_when_inactive_too_long() {
        let queue = PostQueue::new();
        let active = AtomicBool::new(true);

        assert!(!wait_for_input(&queue, &active, 0).await);
    }

    #[tokio::test]
    async fn wait_returns_false_when_stopped() {
        let queue = PostQueue::new();
        let active = AtomicBool::new(false);

        assert!(!wait_for_input(&queue, &active, 10).await);
    }

    #[test]
    fn document_from_post_keeps_attributes() {
        let tokenizer = Tokenizer::default();
        let scheme = TermWeighting::Tf;
        let post = json!({
            "id_str": "42",
            "text": "what a goal tonight",
            "timestamp_ms": "1000",
            "entities": {"urls": [{"url": "https://example.com"}]}
        });

        let document = document_from_post(&post, &tokenizer, &scheme).unwrap();
        assert_eq!(document.timestamp(), Some(1));
        assert_eq!(document.id().and_then(|id| id.as_str()), Some("42"));
        assert_eq!(
            document.attribute("urls").and_then(|urls| urls.as_u64()),
            Some(1)
        );
        assert!((document.vector().norm() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn document_from_post_drops_missing_timestamp() {
        let tokenizer = Tokenizer::default();
        let scheme = TermWeighting::Tf;
        assert!(document_from_post(&json!({"text": "hi"}), &tokenizer, &scheme).is_none());
    }
}

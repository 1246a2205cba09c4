//! The volume-based consumer.
//!
//! Where the ELD consumer tracks individual terms, this consumer only
//! watches how many posts arrive per second. On every periodic wake-up it
//! drains the queue, records the per-second volume in a nutrition store
//! and asks the volume detector whether the recent stream spiked. On a
//! spike, the documents from the bursty half-window land on the timeline
//! as a new document node.
//!
//! Detections within the node expiry are considered the same topic; there
//! is no further tracking.

use crate::consumer::{active_flag, document_from_post, latest_timestamp, ConsumerResult};
use crate::queue::PostQueue;
use crate::summary::{LeadSummarizer, Summarizer};
use eventline_core::{Document, TermWeighting};
use eventline_nlp::{stopwords, Tokenizer, TokenizerConfig};
use eventline_tdt::{MemoryNutritionStore, NodeKind, NodePayload, Timeline, Zhao};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::info;

/// Only documents within this many seconds of the newest post can still
/// appear in a burst: the largest window is 60 seconds, split in half.
const DOCUMENT_RETENTION: i64 = 30;

/// Node expiry, in seconds: detections within it belong to one topic.
const NODE_EXPIRY: i64 = 90;

/// Character budget for summaries.
const SUMMARY_LENGTH: usize = 140;

/// How many of a node's documents reach the summariser.
const SUMMARY_DOCUMENTS: usize = 20;

/// Configuration for the [`ZhaoConsumer`].
#[derive(Debug, Clone)]
pub struct ZhaoConsumerConfig {
    /// Seconds between wake-ups.
    pub periodicity: i64,
    /// Minimum increase between half-window volumes to call a burst.
    pub post_rate: f64,
}

impl Default for ZhaoConsumerConfig {
    fn default() -> Self {
        Self {
            periodicity: 5,
            post_rate: eventline_tdt::DEFAULT_POST_RATE,
        }
    }
}

/// The volume-based streaming consumer.
pub struct ZhaoConsumer {
    queue: PostQueue<Value>,
    config: ZhaoConsumerConfig,
    scheme: TermWeighting,
    tokenizer: Tokenizer,
    tdt: Zhao,
    store: MemoryNutritionStore<u64>,
    documents: BTreeMap<i64, Vec<Document>>,
    summarizer: Box<dyn Summarizer>,
    active: Arc<AtomicBool>,
}

impl ZhaoConsumer {
    /// Creates a consumer over the given queue with the default
    /// configuration and the TF weighting scheme.
    pub fn new(queue: PostQueue<Value>) -> Self {
        Self::with_config(queue, ZhaoConsumerConfig::default(), TermWeighting::Tf)
    }

    /// Creates a consumer with an explicit configuration and weighting
    /// scheme.
    pub fn with_config(
        queue: PostQueue<Value>,
        config: ZhaoConsumerConfig,
        scheme: TermWeighting,
    ) -> Self {
        let tokenizer = Tokenizer::new(TokenizerConfig {
            stopwords: stopwords::english(),
            remove_unicode_entities: true,
            ..TokenizerConfig::default()
        });

        let tdt = Zhao::new(config.post_rate);

        Self {
            queue,
            config,
            scheme,
            tokenizer,
            tdt,
            store: MemoryNutritionStore::new(),
            documents: BTreeMap::new(),
            summarizer: Box::new(LeadSummarizer),
            active: active_flag(),
        }
    }

    /// Replaces the summariser invoked when a node closes.
    pub fn with_summarizer(mut self, summarizer: Box<dyn Summarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    /// Returns the flag that stops the consumer when cleared.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.active)
    }

    /// Runs the consumer until stopped or idle for longer than
    /// `max_inactivity` seconds, and returns the constructed timeline.
    ///
    /// Nodes are compared with a minimum similarity of 1, so every
    /// detection opens its own node unless it carries the same content.
    pub async fn run(&mut self, max_inactivity: i64) -> ConsumerResult<Timeline> {
        self.active.store(true, Ordering::Relaxed);

        let mut timeline = Timeline::new(NodeKind::Document, NODE_EXPIRY, 1.0)?;
        let mut inactive = 0i64;

        while self.active.load(Ordering::Relaxed) {
            sleep(Duration::from_secs(self.config.periodicity.max(1) as u64)).await;

            let posts = self.queue.dequeue_all();
            if posts.is_empty() {
                inactive += self.config.periodicity.max(1);
                if max_inactivity >= 0 && inactive >= max_inactivity {
                    break;
                }
                continue;
            }
            inactive = 0;

            let documents: Vec<Document> = posts
                .iter()
                .filter_map(|post| document_from_post(post, &self.tokenizer, &self.scheme))
                .collect();
            let Some(latest) = latest_timestamp(&documents) else {
                continue;
            };

            self.add_documents(documents);
            self.remove_documents_before(latest - DOCUMENT_RETENTION);
            self.record_volume(latest);

            if let Some((start, _)) = self.tdt.detect(&self.store, latest)? {
                timeline.add(latest, NodePayload::Documents(self.documents_since(start)))?;
            }

            self.summarize_expired(&mut timeline, latest);
        }

        self.active.store(false, Ordering::Relaxed);
        Ok(timeline)
    }

    /// Indexes documents by their event timestamp.
    fn add_documents(&mut self, documents: Vec<Document>) {
        for document in documents {
            let timestamp = document.timestamp().unwrap_or(0);
            self.documents.entry(timestamp).or_default().push(document);
        }
    }

    /// Drops indexed documents published before the timestamp.
    fn remove_documents_before(&mut self, until: i64) {
        self.documents = self.documents.split_off(&until);
    }

    /// Returns the indexed documents published at or after the timestamp,
    /// oldest first.
    fn documents_since(&self, since: i64) -> Vec<Document> {
        self.documents
            .range(since..)
            .flat_map(|(_, documents)| documents.iter().cloned())
            .collect()
    }

    /// Adds the indexed volume at each second to the nutrition store.
    ///
    /// Only recent seconds change, so the counts for each indexed second
    /// are recomputed from the index rather than accumulated.
    fn record_volume(&mut self, latest: i64) {
        let volumes: Vec<(i64, u64)> = self
            .documents
            .range(latest - DOCUMENT_RETENTION..)
            .map(|(timestamp, documents)| (*timestamp, documents.len() as u64))
            .collect();

        for (timestamp, volume) in volumes {
            self.store.add(timestamp, volume);
        }
    }

    /// Summarises expired nodes that were not summarised yet.
    ///
    /// Short documents summarise best, so only posts within the summary
    /// budget are considered, longest first.
    fn summarize_expired(&mut self, timeline: &mut Timeline, timestamp: i64) {
        let expiry = timeline.expiry();

        for node in timeline.nodes_mut() {
            if !node.expired(expiry, timestamp) || node.printed() {
                continue;
            }

            let mut candidates: Vec<&Document> = node
                .all_documents()
                .into_iter()
                .filter(|document| document.text().chars().count() <= SUMMARY_LENGTH)
                .collect();
            candidates.sort_by_key(|document| std::cmp::Reverse(document.text().chars().count()));
            candidates.truncate(SUMMARY_DOCUMENTS);

            let summary = self.summarizer.summarize(&candidates, SUMMARY_LENGTH, None);
            info!(created_at = node.created_at(), "Summary: {}", summary);
            node.set_printed();
        }
    }
}

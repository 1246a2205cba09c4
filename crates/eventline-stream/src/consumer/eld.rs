//! The ELD consumer: document-pivot clustering with a feature-pivot burst
//! test.
//!
//! Processing splits into two phases:
//!
//! 1. An optional understanding phase, run on pre-event discussion, which
//!    builds a TF-IDF scheme for the detection phase.
//! 2. The detection phase. Posts are filtered, converted to documents and
//!    buffered; every `time_window` seconds of event time the buffer
//!    becomes a checkpoint recording how important each term was. The same
//!    documents are clustered incrementally; clusters that look like real
//!    conversation (big enough, not redundant, not already bursty) are
//!    tested for breaking terms against the historic checkpoints, and
//!    bursty clusters land on the timeline together with their topic
//!    vector.
//!
//! Expired timeline nodes are summarised once and marked as printed.

use crate::consumer::{
    active_flag, document_from_post, latest_timestamp, wait_for_input, ConsumerResult,
};
use crate::queue::PostQueue;
use crate::scoring::rank_documents;
use crate::summary::{LeadSummarizer, Summarizer};
use eventline_core::{centroid, Document, TermWeighting, TfIdf, Vector};
use eventline_nlp::{post, stopwords, Cleaner, CleanerConfig, Tokenizer, TokenizerConfig};
use eventline_tdt::{
    ClusterId, Eld, MemoryNutritionStore, NodeKind, NodePayload, TemporalNoKMeans, TermNutrition,
    Timeline,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// How many overdue documents it takes before the consumer logs the skip.
const OVERDUE_LOG_THRESHOLD: usize = 10;

/// A cluster is bursty with more than this many breaking terms.
const BREAKING_TERMS: usize = 2;

/// A cluster is bursty when any term's burst exceeds this, regardless of
/// how many terms broke.
const BREAKING_BURST: f64 = 0.8;

/// Character budget for summaries.
const SUMMARY_LENGTH: usize = 280;

/// How many of a node's documents reach the summariser.
const SUMMARY_DOCUMENTS: usize = 20;

/// Configuration for the [`EldConsumer`].
#[derive(Debug, Clone)]
pub struct EldConsumerConfig {
    /// Checkpoint size in event-time seconds.
    pub time_window: i64,
    /// Cluster-attach similarity threshold.
    pub threshold: f64,
    /// Cluster freeze period in event-time seconds.
    pub freeze_period: i64,
    /// Minimum cluster size before a burst test.
    pub min_size: usize,
    /// Minimum seconds between burst tests of the same cluster.
    pub cooldown: i64,
    /// Maximum intra-similarity before a cluster is dismissed as copies of
    /// the same post.
    pub max_intra_similarity: f64,
    /// Historic checkpoints consulted by the burst test.
    pub sets: usize,
    /// Exclusive minimum burst for a term to count as breaking.
    pub min_burst: f64,
    /// Store `log10` of the nutrition instead of the raw magnitude, so a
    /// single dominant term does not make every other term look bursty.
    pub log_nutrition: bool,
    /// Timeline node expiry in seconds.
    pub expiry: i64,
    /// Timeline absorb threshold.
    pub min_similarity: f64,
}

impl Default for EldConsumerConfig {
    fn default() -> Self {
        Self {
            time_window: 30,
            threshold: 0.5,
            freeze_period: 20,
            min_size: 3,
            cooldown: 1,
            max_intra_similarity: 0.8,
            sets: 10,
            min_burst: 0.5,
            log_nutrition: false,
            expiry: 90,
            min_similarity: 0.6,
        }
    }
}

/// The ELD streaming consumer.
pub struct EldConsumer {
    queue: PostQueue<Value>,
    config: EldConsumerConfig,
    scheme: TermWeighting,
    tokenizer: Tokenizer,
    cleaner: Cleaner,
    clustering: TemporalNoKMeans,
    tdt: Eld,
    store: MemoryNutritionStore<TermNutrition>,
    buffer: VecDeque<Document>,
    summarizer: Box<dyn Summarizer>,
    active: Arc<AtomicBool>,
}

impl EldConsumer {
    /// Creates a consumer over the given queue with the default
    /// configuration and the TF weighting scheme.
    pub fn new(queue: PostQueue<Value>) -> Self {
        Self::with_config(queue, EldConsumerConfig::default(), TermWeighting::Tf)
    }

    /// Creates a consumer with an explicit configuration and weighting
    /// scheme.
    pub fn with_config(
        queue: PostQueue<Value>,
        config: EldConsumerConfig,
        scheme: TermWeighting,
    ) -> Self {
        let tokenizer = Tokenizer::new(TokenizerConfig {
            stopwords: stopwords::english(),
            normalize_words: true,
            character_normalization_count: 3,
            remove_unicode_entities: true,
            ..TokenizerConfig::default()
        });

        let cleaner = Cleaner::new(CleanerConfig {
            remove_alt_codes: true,
            complete_sentences: true,
            collapse_new_lines: true,
            collapse_whitespaces: true,
            remove_unicode_entities: true,
            remove_urls: true,
            remove_hashtags: true,
            split_hashtags: true,
            remove_retweet_prefix: true,
            ..CleanerConfig::default()
        });

        let clustering = TemporalNoKMeans::new(config.threshold, config.freeze_period, false);

        Self {
            queue,
            config,
            scheme,
            tokenizer,
            cleaner,
            clustering,
            tdt: Eld::default(),
            store: MemoryNutritionStore::new(),
            buffer: VecDeque::new(),
            summarizer: Box::new(LeadSummarizer),
            active: active_flag(),
        }
    }

    /// Replaces the summariser invoked when a node closes.
    pub fn with_summarizer(mut self, summarizer: Box<dyn Summarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    /// Replaces the weighting scheme, typically with the TF-IDF scheme the
    /// understanding phase produced.
    pub fn set_scheme(&mut self, scheme: TermWeighting) {
        self.scheme = scheme;
    }

    /// Returns the flag that stops the consumer when cleared.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.active)
    }

    /// Runs the understanding phase: builds a TF-IDF scheme from the
    /// pre-event discussion flowing through the queue.
    ///
    /// Stops after `max_inactivity` seconds without input.
    pub async fn understand(&mut self, max_inactivity: i64) -> ConsumerResult<TfIdf> {
        self.active.store(true, Ordering::Relaxed);
        let mut tfidf = TfIdf::new();

        while self.active.load(Ordering::Relaxed) {
            if !wait_for_input(&self.queue, &self.active, max_inactivity).await {
                break;
            }

            let posts = self.queue.dequeue_all();
            for post in &posts {
                if let Some(document) = document_from_post(post, &self.tokenizer, &self.scheme) {
                    let terms: Vec<String> = document.dimensions().keys().cloned().collect();
                    tfidf.add_document(&terms);
                }
            }
        }

        self.active.store(false, Ordering::Relaxed);
        info!("TF-IDF constructed with {} documents", tfidf.documents());
        Ok(tfidf)
    }

    /// Runs the detection phase until stopped or idle for longer than
    /// `max_inactivity` seconds, and returns the constructed timeline.
    pub async fn run(&mut self, max_inactivity: i64) -> ConsumerResult<Timeline> {
        self.active.store(true, Ordering::Relaxed);

        let mut timeline = Timeline::new(
            NodeKind::TopicalCluster,
            self.config.expiry,
            self.config.min_similarity,
        )?;
        let mut last_checkpoint: Option<i64> = None;

        while self.active.load(Ordering::Relaxed) {
            if !wait_for_input(&self.queue, &self.active, max_inactivity).await {
                break;
            }

            let posts = self.queue.dequeue_all();
            let posts: Vec<Value> = posts.into_iter().filter(validate_post).collect();
            let documents: Vec<Document> = posts
                .iter()
                .filter_map(|post| document_from_post(post, &self.tokenizer, &self.scheme))
                .collect();
            if documents.is_empty() {
                continue;
            }

            let latest = latest_timestamp(&documents).unwrap_or(0);
            self.buffer.extend(documents.iter().cloned());

            // The first batch anchors the checkpoint clock at its first
            // document.
            let anchor =
                *last_checkpoint.get_or_insert_with(|| documents[0].timestamp().unwrap_or(latest));
            let mut checkpoint = anchor;

            // A backlog can span several time windows; emitting one
            // checkpoint per window keeps them all the same length.
            while latest - checkpoint >= self.config.time_window {
                checkpoint += self.config.time_window;
                self.create_checkpoint(checkpoint)?;
                self.remove_old_checkpoints(checkpoint);
            }
            last_checkpoint = Some(checkpoint);

            // Late documents would re-open old windows; skip them.
            let (documents, overdue): (Vec<Document>, Vec<Document>) =
                documents.into_iter().partition(|document| {
                    latest - document.timestamp().unwrap_or(latest) < self.config.time_window
                });
            if overdue.len() > OVERDUE_LOG_THRESHOLD {
                warn!("Skipping {} overdue documents", overdue.len());
            }

            let updated = self.clustering.cluster(documents);
            let candidates = self.filter_clusters(&updated, latest);

            for id in candidates {
                let burst = self.detect_topics(id, latest)?;

                let max_burst = burst.values().cloned().fold(0.0f64, f64::max);
                if !burst.is_empty() && (burst.len() > BREAKING_TERMS || max_burst > BREAKING_BURST)
                {
                    let Some(cluster) = self.clustering.get_mut(id) else {
                        continue;
                    };
                    cluster.attributes_mut().bursty = true;
                    let cluster = cluster.clone();

                    let mut topic = Vector::from_dimensions(burst);
                    topic.normalize();

                    timeline.add(latest, NodePayload::TopicalCluster { cluster, topic })?;
                }
            }

            self.summarize_expired(&mut timeline, latest);
        }

        self.active.store(false, Ordering::Relaxed);
        Ok(timeline)
    }

    /// Turns the buffered documents published up to the timestamp into a
    /// checkpoint; later documents go back to the buffer.
    ///
    /// An empty window still gets a checkpoint, so that silence registers
    /// as every term's nutrition dropping.
    fn create_checkpoint(&mut self, timestamp: i64) -> ConsumerResult<()> {
        let mut buffered: Vec<Document> = self.buffer.drain(..).collect();
        buffered.sort_by_key(|document| document.timestamp().unwrap_or(0));

        let (window, later): (Vec<Document>, Vec<Document>) = buffered
            .into_iter()
            .partition(|document| document.timestamp().unwrap_or(0) <= timestamp);
        self.buffer.extend(later);

        if window.is_empty() {
            self.store.add(timestamp, TermNutrition::new());
            return Ok(());
        }

        let document =
            Document::concatenate(&window, |text| self.tokenizer.tokenize(text), &self.scheme);
        let nutrition = self.checkpoint_nutrition(&document);
        self.store.add(timestamp, nutrition);
        Ok(())
    }

    /// Builds checkpoint nutrition from a concatenated document: optional
    /// `log10` damping, then rescaling so the maximum is 1.
    fn checkpoint_nutrition(&self, document: &Document) -> TermNutrition {
        let magnitudes: TermNutrition = if self.config.log_nutrition {
            document
                .dimensions()
                .iter()
                .map(|(term, magnitude)| (term.clone(), magnitude.log10()))
                .collect()
        } else {
            document.dimensions().clone()
        };

        let max = magnitudes.values().cloned().fold(0.0f64, f64::max);
        if max == 0.0 {
            return TermNutrition::new();
        }

        magnitudes
            .into_iter()
            .map(|(term, magnitude)| (term, magnitude / max))
            .collect()
    }

    /// Evicts checkpoints too old for any future burst test.
    fn remove_old_checkpoints(&mut self, timestamp: i64) {
        let until = timestamp - self.config.time_window * self.config.sets as i64;
        if until > 0 {
            let old: Vec<i64> = self.store.until(until).keys().copied().collect();
            self.store.remove(&old);
        }
    }

    /// Picks the clusters worth burst-testing.
    fn filter_clusters(&self, ids: &[ClusterId], timestamp: i64) -> Vec<ClusterId> {
        ids.iter()
            .copied()
            .filter(|id| {
                let Some(cluster) = self.clustering.get(*id) else {
                    return false;
                };

                if cluster.size() < self.config.min_size {
                    return false;
                }
                if timestamp - cluster.attributes().last_checked.unwrap_or(0)
                    <= self.config.cooldown
                {
                    return false;
                }
                if cluster.attributes().bursty {
                    return false;
                }
                if cluster.intra_similarity() > self.config.max_intra_similarity {
                    return false;
                }

                // Heavily linked posts are planned content, and a wall of
                // replies is a conversation rather than a development.
                let size = cluster.size() as f64;
                let urls: u64 = cluster
                    .vectors()
                    .iter()
                    .filter_map(|document| document.attribute("urls").and_then(Value::as_u64))
                    .sum();
                if urls as f64 / size > 1.0 {
                    return false;
                }

                let replies = cluster
                    .vectors()
                    .iter()
                    .filter(|document| document.text().starts_with('@'))
                    .count();
                if replies as f64 / size > 0.5 {
                    return false;
                }

                true
            })
            .collect()
    }

    /// Burst-tests a cluster: builds a pseudo-checkpoint from its
    /// documents and compares it with the historic checkpoints.
    fn detect_topics(
        &mut self,
        id: ClusterId,
        timestamp: i64,
    ) -> ConsumerResult<TermNutrition> {
        let Some(cluster) = self.clustering.get_mut(id) else {
            return Ok(TermNutrition::new());
        };
        cluster.attributes_mut().last_checked = Some(timestamp);
        let documents: Vec<Document> = cluster.vectors().to_vec();

        let document =
            Document::concatenate(&documents, |text| self.tokenizer.tokenize(text), &self.scheme);
        let nutrition = self.checkpoint_nutrition(&document);

        let since = timestamp - self.config.time_window * self.config.sets as i64;
        let until = timestamp - self.config.time_window;
        let burst = self.tdt.detect(
            &self.store,
            &nutrition,
            Some(since),
            Some(until),
            self.config.min_burst,
        )?;
        Ok(burst)
    }

    /// Summarises the newest node once it expires.
    fn summarize_expired(&mut self, timeline: &mut Timeline, timestamp: i64) {
        let expiry = timeline.expiry();
        let Some(node) = timeline.last_node_mut() else {
            return;
        };

        if !node.expired(expiry, timestamp) || node.printed() {
            return;
        }

        let ranked = rank_documents(node.all_documents(), &self.tokenizer);
        let top: Vec<&Document> = ranked.into_iter().take(SUMMARY_DOCUMENTS).collect();
        let query = centroid(node.topics().iter());
        let summary = self
            .summarizer
            .summarize(&top, SUMMARY_LENGTH, Some(&query));

        info!(
            created_at = node.created_at(),
            "Summary: {}",
            self.cleaner.clean(&summary)
        );
        node.set_printed();
    }
}

/// The post filter: drops posts unlikely to carry original reporting.
///
/// A post survives when it is in English, has at most two hashtags and at
/// most one URL, and its author has favourited at least one post, has at
/// least one follower per thousand posts, and filled in their biography.
fn validate_post(post: &Value) -> bool {
    if post::language(post) != Some("en") {
        return false;
    }
    if post::hashtag_count(post) > 2 {
        return false;
    }
    if post::author_stat(post, "favourites_count") == 0 {
        return false;
    }

    let followers = post::author_stat(post, "followers_count");
    let statuses = post::author_stat(post, "statuses_count");
    if statuses == 0 || (followers as f64 / statuses as f64) < 1e-3 {
        return false;
    }

    if post::url_count(post) > 1 {
        return false;
    }

    match post::author_description(post) {
        Some(description) if !description.is_empty() => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_post(timestamp: i64, text: &str) -> Value {
        json!({
            "text": text,
            "lang": "en",
            "timestamp_ms": (timestamp * 1000).to_string(),
            "entities": {"hashtags": [], "urls": []},
            "user": {
                "favourites_count": 10,
                "followers_count": 100,
                "statuses_count": 1000,
                "description": "watching the match",
                "verified": false
            }
        })
    }

    #[test]
    fn validate_accepts_ordinary_posts() {
        assert!(validate_post(&valid_post(0, "what a goal")));
    }

    #[test]
    fn validate_rejects_foreign_language() {
        let mut post = valid_post(0, "quel but");
        post["lang"] = json!("fr");
        assert!(!validate_post(&post));
    }

    #[test]
    fn validate_rejects_hashtag_walls() {
        let mut post = valid_post(0, "#a #b #c");
        post["entities"]["hashtags"] =
            json!([{"text": "a"}, {"text": "b"}, {"text": "c"}]);
        assert!(!validate_post(&post));
    }

    #[test]
    fn validate_rejects_never_favourited_authors() {
        let mut post = valid_post(0, "goal");
        post["user"]["favourites_count"] = json!(0);
        assert!(!validate_post(&post));
    }

    #[test]
    fn validate_rejects_follower_starved_authors() {
        let mut post = valid_post(0, "goal");
        post["user"]["followers_count"] = json!(1);
        post["user"]["statuses_count"] = json!(10000);
        assert!(!validate_post(&post));
    }

    #[test]
    fn validate_rejects_link_spam() {
        let mut post = valid_post(0, "goal");
        post["entities"]["urls"] = json!([{"url": "a"}, {"url": "b"}]);
        assert!(!validate_post(&post));
    }

    #[test]
    fn validate_rejects_empty_biographies() {
        let mut post = valid_post(0, "goal");
        post["user"]["description"] = json!("");
        assert!(!validate_post(&post));
    }

    #[tokio::test]
    async fn understand_builds_tfidf_from_queue() {
        let queue = PostQueue::new();
        queue.enqueue(valid_post(0, "an early goal tonight"));
        queue.enqueue(valid_post(1, "the crowd sings loudly"));

        let mut consumer = EldConsumer::new(queue);
        let tfidf = consumer.understand(0).await.unwrap();

        assert_eq!(tfidf.documents(), 2);
        assert_eq!(tfidf.frequency("goal"), 1);
    }

    #[tokio::test]
    async fn checkpoints_are_max_normalized() {
        let queue = PostQueue::new();
        let mut consumer = EldConsumer::new(queue);

        for timestamp in [0, 5, 10] {
            let post = valid_post(timestamp, "goal goal crowd");
            let document =
                document_from_post(&post, &consumer.tokenizer, &consumer.scheme).unwrap();
            consumer.buffer.push_back(document);
        }

        consumer.create_checkpoint(30).unwrap();
        let checkpoint = consumer.store.get(30).unwrap();

        assert!((checkpoint["goal"] - 1.0).abs() < 1e-9);
        assert!(checkpoint["crowd"] < 1.0);
    }

    #[tokio::test]
    async fn empty_window_still_gets_a_checkpoint() {
        let queue = PostQueue::new();
        let mut consumer = EldConsumer::new(queue);

        consumer.create_checkpoint(30).unwrap();
        assert!(consumer.store.get(30).unwrap().is_empty());
    }

    #[tokio::test]
    async fn later_documents_go_back_to_the_buffer() {
        let queue = PostQueue::new();
        let mut consumer = EldConsumer::new(queue);

        for timestamp in [10, 40] {
            let post = valid_post(timestamp, "a goal");
            let document =
                document_from_post(&post, &consumer.tokenizer, &consumer.scheme).unwrap();
            consumer.buffer.push_back(document);
        }

        consumer.create_checkpoint(30).unwrap();

        assert_eq!(consumer.buffer.len(), 1);
        assert_eq!(consumer.buffer[0].timestamp(), Some(40));
    }

    #[tokio::test]
    async fn old_checkpoints_are_evicted() {
        let queue = PostQueue::new();
        let mut consumer = EldConsumer::with_config(
            queue,
            EldConsumerConfig {
                sets: 2,
                ..EldConsumerConfig::default()
            },
            TermWeighting::Tf,
        );

        for timestamp in [30, 60, 90, 120, 150] {
            consumer.store.add(timestamp, TermNutrition::new());
        }

        consumer.remove_old_checkpoints(150);

        // Everything before 150 - 30 * 2 = 90 goes.
        let kept: Vec<i64> = consumer.store.all().keys().copied().collect();
        assert_eq!(kept, vec![90, 120, 150]);
    }
}

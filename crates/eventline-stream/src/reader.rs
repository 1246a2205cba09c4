//! The simulated file reader.
//!
//! The reader replays a JSON-lines corpus as if the event were happening
//! now: a post published n seconds after the corpus started is enqueued n
//! seconds (scaled by the speed) after the replay started. High-volume
//! periods therefore flood the queue exactly as the live stream did.

use crate::queue::PostQueue;
use eventline_nlp::post;
use serde_json::Value;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Result type alias for reader operations.
pub type ReaderResult<T> = Result<T, ReaderError>;

/// Errors raised by the file reader.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// The replay speed is zero or negative.
    #[error("the speed must be positive; received {0}")]
    InvalidSpeed(f64),

    /// The number of seconds to skip is negative.
    #[error("the time to skip cannot be negative; received {0}")]
    InvalidSkip(i64),

    /// The corpus file could not be read.
    #[error("could not read corpus: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for the [`SimulatedFileReader`].
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Replay speed: 1 is real time, larger is faster.
    pub speed: f64,
    /// Event-time seconds to skip from the start of the corpus.
    pub skip_time: i64,
    /// Event-time seconds to read before stopping; negative is unbounded.
    pub max_time: i64,
    /// Skip retweets.
    pub skip_retweets: bool,
    /// Skip posts from unverified authors.
    pub skip_unverified: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            skip_time: 0,
            max_time: -1,
            skip_retweets: false,
            skip_unverified: false,
        }
    }
}

/// Replays a corpus file into a [`PostQueue`], preserving inter-post gaps.
pub struct SimulatedFileReader {
    queue: PostQueue<Value>,
    config: ReaderConfig,
    active: Arc<AtomicBool>,
}

impl SimulatedFileReader {
    /// Creates a reader feeding the given queue.
    pub fn new(queue: PostQueue<Value>, config: ReaderConfig) -> ReaderResult<Self> {
        if config.speed <= 0.0 {
            return Err(ReaderError::InvalidSpeed(config.speed));
        }
        if config.skip_time < 0 {
            return Err(ReaderError::InvalidSkip(config.skip_time));
        }

        Ok(Self {
            queue,
            config,
            active: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Returns the flag that interrupts the reader when cleared.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.active)
    }

    /// Reads the corpus and enqueues its posts, returning how many were
    /// enqueued.
    ///
    /// Malformed lines and posts without a timestamp are logged and
    /// skipped; they do not end the replay.
    pub async fn read(&self, path: &Path) -> ReaderResult<usize> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);

        // The corpus' first timestamp anchors skipping; the first post
        // after the skip anchors the replay clock.
        let mut corpus_start: Option<i64> = None;
        let mut replay_start: Option<i64> = None;

        let started = Instant::now();
        let mut enqueued = 0usize;
        let mut malformed = 0usize;

        for line in reader.lines() {
            if !self.active.load(Ordering::Relaxed) {
                debug!("Reader interrupted");
                break;
            }

            let line = line?;
            let post: Value = match serde_json::from_str(&line) {
                Ok(post) => post,
                Err(e) => {
                    malformed += 1;
                    warn!("Skipping malformed line: {}", e);
                    continue;
                }
            };

            let timestamp = match post::timestamp(&post) {
                Ok(timestamp) => timestamp,
                Err(e) => {
                    malformed += 1;
                    warn!("Skipping post: {}", e);
                    continue;
                }
            };

            let corpus_start = *corpus_start.get_or_insert(timestamp);
            if timestamp - corpus_start < self.config.skip_time {
                continue;
            }

            let replay_start = *replay_start.get_or_insert(timestamp);
            if self.config.max_time >= 0 && timestamp - replay_start >= self.config.max_time {
                break;
            }

            // Posts from the future wait until the replay catches up.
            let target = (timestamp - replay_start) as f64 / self.config.speed;
            let elapsed = started.elapsed().as_secs_f64();
            if target > elapsed {
                sleep(Duration::from_secs_f64(target - elapsed)).await;
            }

            if !self.active.load(Ordering::Relaxed) {
                debug!("Reader interrupted");
                break;
            }

            if self.valid(&post) {
                self.queue.enqueue(post);
                enqueued += 1;
            }
        }

        info!(
            "Replay finished: {} posts enqueued, {} lines skipped",
            enqueued, malformed
        );
        Ok(enqueued)
    }

    /// Checks whether a post should be enqueued at all.
    fn valid(&self, post: &Value) -> bool {
        if self.config.skip_retweets && post::is_retweet(post) {
            return false;
        }
        if self.config.skip_unverified && !post::is_verified(post) {
            return false;
        }
        true
    }
}

//! Feature-pivot burst detection.
//!
//! Burst measures how much a term's importance has risen or fallen since
//! recent checkpoints, on a scale a threshold makes sense for:
//!
//! - -1: the term lost all of its popularity,
//! - 0: the term's popularity has not changed, and
//! - 1: the term went from nothing to maximum popularity.
//!
//! The comparison is between a local context (the nutrition of a candidate
//! cluster) and the global context (historic checkpoints). For term `k`
//! with checkpoints ordered newest-first:
//!
//! ```text
//! burst(k) = sum_c (local[k] - checkpoint_c[k]) * decay(c) / coefficient
//! decay(c) = 1 / exp(c)^d
//! coefficient = sum_c decay(c)     (1 when there are no checkpoints)
//! ```
//!
//! The bounds only hold when each checkpoint's nutrition is rescaled so its
//! maximum is 1. The fixed-checkpoints [`Eld`] expects the caller to have
//! done that; the [`SlidingEld`] variant partitions a per-second store into
//! windows at query time and can normalize each window itself.

use crate::nutrition::{MemoryNutritionStore, StoreError, StoreResult, TermNutrition};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Result type alias for burst detection.
pub type EldResult<T> = Result<T, EldError>;

/// Errors raised when configuring or running burst detection.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EldError {
    /// The sliding window size is not positive.
    #[error("the window size must be positive; received {0}")]
    InvalidWindowSize(i64),

    /// The sliding window count is not positive.
    #[error("the number of windows must be positive; received {0}")]
    InvalidWindowCount(usize),

    /// A nutrition store range query failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The fixed-checkpoints burst detector.
///
/// The decay rate penalizes old checkpoints: the larger it is, the less
/// importance far-off checkpoints have.
#[derive(Debug, Clone, PartialEq)]
pub struct Eld {
    decay_rate: f64,
}

impl Default for Eld {
    fn default() -> Self {
        Self { decay_rate: 0.5 }
    }
}

impl Eld {
    /// Creates a detector with the given decay rate.
    pub fn new(decay_rate: f64) -> Self {
        Self { decay_rate }
    }

    /// Detects bursty terms by comparing local nutrition with historic
    /// checkpoints.
    ///
    /// Checkpoints are read from the store over `[since, until)`; an absent
    /// `since` means from the beginning, an absent `until` means up to the
    /// newest checkpoint. Only terms with burst strictly above `min_burst`
    /// are returned.
    ///
    /// When `min_burst` is negative, the terms of all checkpoints join the
    /// computation, so drops in popularity surface too.
    pub fn detect(
        &self,
        store: &MemoryNutritionStore<TermNutrition>,
        nutrition: &TermNutrition,
        since: Option<i64>,
        until: Option<i64>,
        min_burst: f64,
    ) -> StoreResult<HashMap<String, f64>> {
        let since = since.unwrap_or(i64::MIN);
        let historic = match until {
            Some(until) => store.between(since, until)?,
            None => store.since(since),
        };

        // Newest checkpoint first: decay gives it the most weight.
        let mut checkpoints: Vec<(i64, &TermNutrition)> = historic.into_iter().collect();
        checkpoints.sort_by(|a, b| b.0.cmp(&a.0));
        let checkpoints: Vec<&TermNutrition> =
            checkpoints.into_iter().map(|(_, nutrition)| nutrition).collect();

        Ok(self.burst(nutrition, &checkpoints, min_burst))
    }

    /// Computes the burst of the candidate terms against the checkpoints,
    /// ordered newest-first, and filters by the exclusive minimum burst.
    fn burst(
        &self,
        nutrition: &TermNutrition,
        checkpoints: &[&TermNutrition],
        min_burst: f64,
    ) -> HashMap<String, f64> {
        let terms = self.terms(nutrition, checkpoints, min_burst);
        let coefficient = self.coefficient(checkpoints.len());

        terms
            .into_iter()
            .map(|term| {
                let local = nutrition.get(&term).copied().unwrap_or(0.0);
                let numerator: f64 = checkpoints
                    .iter()
                    .enumerate()
                    .map(|(c, checkpoint)| {
                        let historic = checkpoint.get(&term).copied().unwrap_or(0.0);
                        (local - historic) * self.decay(c + 1)
                    })
                    .sum();
                (term, numerator / coefficient)
            })
            .filter(|(_, burst)| *burst > min_burst)
            .collect()
    }

    /// Picks the terms to compute burst for.
    ///
    /// Non-negative minimum burst restricts the candidates to local terms
    /// whose nutrition reaches it; a negative minimum considers every term
    /// seen locally or in any checkpoint.
    fn terms(
        &self,
        nutrition: &TermNutrition,
        checkpoints: &[&TermNutrition],
        min_burst: f64,
    ) -> HashSet<String> {
        if min_burst >= 0.0 {
            nutrition
                .iter()
                .filter(|(_, score)| **score >= min_burst)
                .map(|(term, _)| term.clone())
                .collect()
        } else {
            nutrition
                .keys()
                .chain(checkpoints.iter().flat_map(|checkpoint| checkpoint.keys()))
                .cloned()
                .collect()
        }
    }

    fn decay(&self, c: usize) -> f64 {
        1.0 / (c as f64).exp().powf(self.decay_rate)
    }

    fn coefficient(&self, checkpoints: usize) -> f64 {
        if checkpoints == 0 {
            1.0
        } else {
            (1..=checkpoints).map(|c| self.decay(c)).sum()
        }
    }
}

/// The sliding-window burst detector.
///
/// Instead of pre-built checkpoints, the store holds raw per-second term
/// sums; the detector partitions them into windows of `window_size` seconds
/// anchored at the query timestamp. With `normalized` set, each window is
/// rescaled so its maximum nutrition is 1, keeping burst in [-1, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct SlidingEld {
    eld: Eld,
    window_size: i64,
    windows: usize,
    normalized: bool,
}

impl SlidingEld {
    /// Creates a detector.
    ///
    /// The window size and window count must both be positive.
    pub fn new(
        decay_rate: f64,
        window_size: i64,
        windows: usize,
        normalized: bool,
    ) -> EldResult<Self> {
        if window_size < 1 {
            return Err(EldError::InvalidWindowSize(window_size));
        }
        if windows < 1 {
            return Err(EldError::InvalidWindowCount(windows));
        }

        Ok(Self {
            eld: Eld::new(decay_rate),
            window_size,
            windows,
            normalized,
        })
    }

    /// Detects bursty terms at the given timestamp.
    ///
    /// When no timestamp is given, the newest timestamp in the store is
    /// used. Returns an empty map when the store is empty or when every
    /// historic window is empty: without history, every term would look
    /// bursty.
    pub fn detect(
        &self,
        store: &MemoryNutritionStore<TermNutrition>,
        timestamp: Option<i64>,
        min_burst: f64,
    ) -> EldResult<HashMap<String, f64>> {
        let Some(latest) = store.latest() else {
            return Ok(HashMap::new());
        };
        let timestamp = timestamp.unwrap_or(latest);

        let (mut nutrition, mut historic) = self.partition(store, timestamp)?;

        if historic.values().all(|window| window.is_empty()) {
            return Ok(HashMap::new());
        }

        if self.normalized {
            nutrition = normalize(&nutrition);
            historic = historic
                .into_iter()
                .map(|(window, nutrition)| (window, normalize(&nutrition)))
                .collect();
        }

        let mut checkpoints: Vec<(i64, TermNutrition)> = historic.into_iter().collect();
        checkpoints.sort_by(|a, b| b.0.cmp(&a.0));
        let checkpoints: Vec<&TermNutrition> =
            checkpoints.iter().map(|(_, nutrition)| nutrition).collect();

        Ok(self.eld.burst(&nutrition, &checkpoints, min_burst))
    }

    /// Partitions the store into the current window and the historic
    /// windows preceding it.
    ///
    /// The current window covers `[timestamp - window_size + 1, timestamp]`;
    /// historic window `i` covers `[timestamp - window_size * (i + 1) + 1,
    /// timestamp - window_size * i]`, keyed by its inclusive end. Windows
    /// that would reach into negative time are skipped.
    fn partition(
        &self,
        store: &MemoryNutritionStore<TermNutrition>,
        timestamp: i64,
    ) -> StoreResult<(TermNutrition, HashMap<i64, TermNutrition>)> {
        let current = store.between(timestamp - self.window_size + 1, timestamp + 1)?;
        let nutrition = merge(current.values().copied());

        let mut historic = HashMap::new();
        for window in 1..self.windows {
            let window = window as i64;
            let since = (timestamp - self.window_size * (window + 1) + 1).max(0);
            let until = timestamp - self.window_size * window;
            if until > 0 {
                let data = store.between(since, until + 1)?;
                historic.insert(until, merge(data.values().copied()));
            }
        }

        Ok((nutrition, historic))
    }
}

/// Sums per-second nutrition into one window.
fn merge<'a, I>(windows: I) -> TermNutrition
where
    I: IntoIterator<Item = &'a TermNutrition>,
{
    let mut merged = TermNutrition::new();
    for window in windows {
        for (term, value) in window {
            *merged.entry(term.clone()).or_insert(0.0) += value;
        }
    }
    merged
}

/// Rescales a window so its maximum nutrition is 1.
///
/// Empty and all-zero windows come out empty.
fn normalize(window: &TermNutrition) -> TermNutrition {
    let max = window.values().cloned().fold(0.0f64, f64::max);
    if max == 0.0 {
        return TermNutrition::new();
    }

    window
        .iter()
        .map(|(term, value)| (term.clone(), value / max))
        .collect()
}

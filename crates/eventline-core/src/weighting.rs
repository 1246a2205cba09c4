//! Term-weighting schemes used to turn token lists into documents.
//!
//! Two schemes are supported:
//! - `Tf`: the weight of a term is its raw count in the document.
//! - `TfIdf`: the raw count scaled by `log10((N + 1) / (df + 1)) + 1`, where
//!   `N` is the number of documents behind the scheme and `df` the number of
//!   documents a term appeared in.
//!
//! A `TfIdf` scheme is built incrementally from a stream of token lists;
//! each document contributes to a term's document frequency once, no matter
//! how often the term repeats within it.

use crate::document::Document;
use crate::vector::Vector;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A term-weighting scheme.
#[derive(Debug, Clone, PartialEq)]
pub enum TermWeighting {
    /// Raw term counts.
    Tf,
    /// Term counts scaled by inverse document frequency.
    TfIdf(TfIdf),
}

impl Default for TermWeighting {
    fn default() -> Self {
        Self::Tf
    }
}

impl TermWeighting {
    /// Creates a weighted document from its text and tokens.
    pub fn create(&self, text: &str, tokens: &[String]) -> Document {
        let mut counts: HashMap<String, f64> = HashMap::new();
        for token in tokens {
            *counts.entry(token.clone()).or_insert(0.0) += 1.0;
        }

        if let Self::TfIdf(tfidf) = self {
            for (term, weight) in counts.iter_mut() {
                *weight *= tfidf.idf(term);
            }
        }

        Document::new(text, Vector::from_dimensions(counts))
    }

    /// Returns the scheme's name, as used in serialized output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tf => "TF",
            Self::TfIdf(_) => "TFIDF",
        }
    }
}

/// A TF-IDF scheme: a document count plus a per-term document-frequency
/// table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "TfIdfRepr", into = "TfIdfRepr")]
pub struct TfIdf {
    documents: u64,
    frequencies: HashMap<String, u64>,
}

/// Wire shape of a [`TfIdf`]: `{class, idf: {class, documents, idf}}`.
#[derive(Serialize, Deserialize)]
struct TfIdfRepr {
    class: String,
    idf: IdfRepr,
}

#[derive(Serialize, Deserialize)]
struct IdfRepr {
    class: String,
    documents: u64,
    idf: HashMap<String, u64>,
}

impl From<TfIdfRepr> for TfIdf {
    fn from(repr: TfIdfRepr) -> Self {
        Self {
            documents: repr.idf.documents,
            frequencies: repr.idf.idf,
        }
    }
}

impl From<TfIdf> for TfIdfRepr {
    fn from(tfidf: TfIdf) -> Self {
        Self {
            class: "TFIDF".to_string(),
            idf: IdfRepr {
                class: "IDF".to_string(),
                documents: tfidf.documents,
                idf: tfidf.frequencies,
            },
        }
    }
}

impl TfIdf {
    /// Creates an empty scheme.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a scheme from a document count and frequency table.
    pub fn from_frequencies(documents: u64, frequencies: HashMap<String, u64>) -> Self {
        Self {
            documents,
            frequencies,
        }
    }

    /// Returns the number of documents behind the scheme.
    pub fn documents(&self) -> u64 {
        self.documents
    }

    /// Returns a term's document frequency.
    pub fn frequency(&self, term: &str) -> u64 {
        self.frequencies.get(term).copied().unwrap_or(0)
    }

    /// Records one document's tokens.
    ///
    /// Each unique term counts once, regardless of how often it repeats.
    pub fn add_document(&mut self, tokens: &[String]) {
        self.documents += 1;

        let unique: HashSet<&String> = tokens.iter().collect();
        for term in unique {
            *self.frequencies.entry(term.clone()).or_insert(0) += 1;
        }
    }

    /// Computes the inverse document frequency of a term:
    /// `log10((N + 1) / (df + 1)) + 1`.
    pub fn idf(&self, term: &str) -> f64 {
        let n = self.documents as f64;
        let df = self.frequency(term) as f64;
        ((n + 1.0) / (df + 1.0)).log10() + 1.0
    }
}

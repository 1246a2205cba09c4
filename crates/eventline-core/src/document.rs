//! Documents: term vectors that remember the text they came from.

use crate::vector::Vector;
use crate::weighting::TermWeighting;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A [`Vector`] carrying the raw text it was weighted from.
///
/// Consumers stash bookkeeping in the attribute map: the post id, the event
/// timestamp, the URL count and the original post record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "DocumentRepr", into = "DocumentRepr")]
pub struct Document {
    text: String,
    vector: Vector,
}

/// Wire shape of a [`Document`]: `{class, dimensions, attributes, text}`.
#[derive(Serialize, Deserialize)]
struct DocumentRepr {
    class: String,
    dimensions: HashMap<String, f64>,
    #[serde(default)]
    attributes: HashMap<String, Value>,
    text: String,
}

impl From<DocumentRepr> for Document {
    fn from(repr: DocumentRepr) -> Self {
        let mut vector = Vector::from_dimensions(repr.dimensions);
        for (key, value) in repr.attributes {
            vector.set_attribute(key, value);
        }
        Self {
            text: repr.text,
            vector,
        }
    }
}

impl From<Document> for DocumentRepr {
    fn from(document: Document) -> Self {
        Self {
            class: "Document".to_string(),
            dimensions: document.vector.dimensions().clone(),
            attributes: document.vector.attributes().clone(),
            text: document.text,
        }
    }
}

impl Document {
    /// Creates a document from its text and a pre-weighted vector.
    pub fn new(text: impl Into<String>, vector: Vector) -> Self {
        Self {
            text: text.into(),
            vector,
        }
    }

    /// Returns the raw text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the underlying vector.
    pub fn vector(&self) -> &Vector {
        &self.vector
    }

    /// Returns the underlying vector mutably.
    pub fn vector_mut(&mut self) -> &mut Vector {
        &mut self.vector
    }

    /// Returns the dimension map.
    pub fn dimensions(&self) -> &HashMap<String, f64> {
        self.vector.dimensions()
    }

    /// Returns an attribute, if set.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.vector.attribute(key)
    }

    /// Sets an attribute.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.vector.set_attribute(key, value);
    }

    /// Returns the event timestamp attribute, if set.
    pub fn timestamp(&self) -> Option<i64> {
        self.vector.attribute("timestamp").and_then(Value::as_i64)
    }

    /// Returns the post id attribute, if set.
    pub fn id(&self) -> Option<&Value> {
        self.vector.attribute("id")
    }

    /// Scales the document's vector to unit norm.
    pub fn normalize(&mut self) {
        self.vector.normalize();
    }

    /// Combines documents into one synthetic document.
    ///
    /// The texts are joined, re-tokenized with the given function and
    /// re-weighted under the scheme; the result is normalized. The token
    /// multiset is the union of the inputs' tokens, with multiplicity.
    pub fn concatenate<F>(documents: &[Document], tokenize: F, scheme: &TermWeighting) -> Document
    where
        F: Fn(&str) -> Vec<String>,
    {
        let text = documents
            .iter()
            .map(Document::text)
            .collect::<Vec<_>>()
            .join(" ");
        let tokens = tokenize(&text);

        let mut document = scheme.create(&text, &tokens);
        document.normalize();
        document
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_lowercase).collect()
    }

    #[test]
    fn concatenate_counts_multiplicity() {
        let scheme = TermWeighting::Tf;
        let a = scheme.create("goal goal", &tokenize("goal goal"));
        let b = scheme.create("goal corner", &tokenize("goal corner"));

        let combined = Document::concatenate(&[a, b], tokenize, &scheme);

        // Three `goal` against one `corner`, normalized.
        let goal = combined.dimensions()["goal"];
        let corner = combined.dimensions()["corner"];
        assert!(goal > corner);
        assert!((combined.vector().norm() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn concatenate_empty_input() {
        let scheme = TermWeighting::Tf;
        let combined = Document::concatenate(&[], tokenize, &scheme);
        assert!(combined.dimensions().is_empty());
    }

    #[test]
    fn timestamp_attribute() {
        let mut document = Document::new("hello", Vector::new());
        assert_eq!(document.timestamp(), None);
        document.set_attribute("timestamp", 42);
        assert_eq!(document.timestamp(), Some(42));
    }

    #[test]
    fn serialization_round_trip() {
        let scheme = TermWeighting::Tf;
        let mut document = scheme.create("goal corner", &tokenize("goal corner"));
        document.set_attribute("id", "123");

        let json = serde_json::to_string(&document).unwrap();
        assert!(json.contains("\"class\":\"Document\""));

        let parsed: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, document);
    }
}

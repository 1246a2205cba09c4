//! Clusters of documents with a centroid-based notion of similarity.

use crate::document::Document;
use crate::vector::{self, Vector};
use serde::{Deserialize, Serialize};

/// Bookkeeping the clusterer and consumers attach to a cluster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterAttributes {
    /// Seconds of event time since the cluster last received a vector.
    #[serde(default)]
    pub age: i64,

    /// Event time of the last burst test, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<i64>,

    /// Whether the cluster has already been found bursty.
    #[serde(default)]
    pub bursty: bool,
}

/// An ordered collection of documents.
///
/// Documents are kept in assignment order; the most recently assigned is
/// last. The centroid is the component-wise mean of the documents' vectors
/// and is not normalized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "ClusterRepr", into = "ClusterRepr")]
pub struct Cluster {
    vectors: Vec<Document>,
    attributes: ClusterAttributes,
}

/// Wire shape of a [`Cluster`]: `{class, vectors, attributes}`.
#[derive(Serialize, Deserialize)]
struct ClusterRepr {
    class: String,
    vectors: Vec<Document>,
    #[serde(default)]
    attributes: ClusterAttributes,
}

impl From<ClusterRepr> for Cluster {
    fn from(repr: ClusterRepr) -> Self {
        Self {
            vectors: repr.vectors,
            attributes: repr.attributes,
        }
    }
}

impl From<Cluster> for ClusterRepr {
    fn from(cluster: Cluster) -> Self {
        Self {
            class: "Cluster".to_string(),
            vectors: cluster.vectors,
            attributes: cluster.attributes,
        }
    }
}

impl Cluster {
    /// Creates a cluster from an initial set of documents.
    pub fn new(vectors: Vec<Document>) -> Self {
        Self {
            vectors,
            attributes: ClusterAttributes::default(),
        }
    }

    /// Appends a document to the cluster.
    pub fn push(&mut self, document: Document) {
        self.vectors.push(document);
    }

    /// Returns the documents in assignment order.
    pub fn vectors(&self) -> &[Document] {
        &self.vectors
    }

    /// Returns the most recently assigned document.
    pub fn last(&self) -> Option<&Document> {
        self.vectors.last()
    }

    /// Returns the number of documents in the cluster.
    pub fn size(&self) -> usize {
        self.vectors.len()
    }

    /// Checks whether the cluster has no documents.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Returns the cluster's attributes.
    pub fn attributes(&self) -> &ClusterAttributes {
        &self.attributes
    }

    /// Returns the cluster's attributes mutably.
    pub fn attributes_mut(&mut self) -> &mut ClusterAttributes {
        &mut self.attributes
    }

    /// Computes the centroid: the component-wise mean of the documents'
    /// vectors, not normalized.
    pub fn centroid(&self) -> Vector {
        vector::centroid(self.vectors.iter().map(Document::vector))
    }

    /// Computes the cosine similarity between a vector and the cluster's
    /// normalized centroid.
    pub fn similarity(&self, other: &Vector) -> f64 {
        let centroid = self.centroid().normalized();
        vector::cosine(other, &centroid)
    }

    /// Computes the mean cosine similarity of the cluster's documents with
    /// its normalized centroid. A proxy for redundancy: near 1 means the
    /// cluster is mostly copies of the same text.
    pub fn intra_similarity(&self) -> f64 {
        if self.vectors.is_empty() {
            return 0.0;
        }

        let centroid = self.centroid().normalized();
        let total: f64 = self
            .vectors
            .iter()
            .map(|document| vector::cosine(document.vector(), &centroid))
            .sum();
        total / self.vectors.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weighting::TermWeighting;

    fn make_document(terms: &[(&str, f64)]) -> Document {
        let dimensions = terms.iter().map(|(t, w)| (t.to_string(), *w)).collect();
        Document::new("", Vector::from_dimensions(dimensions))
    }

    #[test]
    fn centroid_is_component_mean() {
        let cluster = Cluster::new(vec![
            make_document(&[("a", 1.0)]),
            make_document(&[("a", 3.0), ("b", 2.0)]),
        ]);

        let centroid = cluster.centroid();
        assert!((centroid.dimension("a") - 2.0).abs() < 1e-9);
        assert!((centroid.dimension("b") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn similarity_with_identical_direction() {
        let cluster = Cluster::new(vec![make_document(&[("a", 1.0)])]);
        let vector = Vector::from_dimensions([("a".to_string(), 5.0)].into());
        assert!((cluster.similarity(&vector) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn intra_similarity_identical_documents() {
        let cluster = Cluster::new(vec![
            make_document(&[("a", 1.0)]),
            make_document(&[("a", 1.0)]),
        ]);
        assert!((cluster.intra_similarity() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn intra_similarity_empty_cluster() {
        let cluster = Cluster::new(vec![]);
        assert_eq!(cluster.intra_similarity(), 0.0);
    }

    #[test]
    fn push_keeps_assignment_order() {
        let mut cluster = Cluster::new(vec![make_document(&[("a", 1.0)])]);
        let mut newer = make_document(&[("b", 1.0)]);
        newer.set_attribute("timestamp", 30);
        cluster.push(newer);

        assert_eq!(cluster.size(), 2);
        assert_eq!(cluster.last().and_then(Document::timestamp), Some(30));
    }

    #[test]
    fn serialization_round_trip() {
        let scheme = TermWeighting::Tf;
        let tokens = vec!["goal".to_string()];
        let mut cluster = Cluster::new(vec![scheme.create("goal", &tokens)]);
        cluster.attributes_mut().bursty = true;
        cluster.attributes_mut().last_checked = Some(60);

        let json = serde_json::to_string(&cluster).unwrap();
        assert!(json.contains("\"class\":\"Cluster\""));

        let parsed: Cluster = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, cluster);
    }
}

//! The timeline: a chronological list of nodes, each describing one
//! sub-event.
//!
//! A timeline holds nodes of a single kind, fixed at construction:
//!
//! - Document nodes store plain documents and compare incoming documents
//!   against the centroid of their own.
//! - Topical-cluster nodes store clusters alongside the topic vectors that
//!   made them bursty, and compare an incoming topic against each stored
//!   topic separately, which keeps fragmented sub-events together.
//!
//! New data is absorbed into the newest node that is similar enough and
//! recent enough; otherwise it opens a new node, so node creation times are
//! non-decreasing.

use eventline_core::{centroid, cosine, Cluster, Document, Vector};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for timeline operations.
pub type TimelineResult<T> = Result<T, TimelineError>;

/// Errors that can occur when building or extending a timeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimelineError {
    /// The expiry is negative.
    #[error("the expiry cannot be negative: received {0}")]
    NegativeExpiry(i64),

    /// The minimum similarity is outside [0, 1].
    #[error("the minimum similarity must be between 0 and 1; received {0}")]
    InvalidMinSimilarity(f64),

    /// The payload does not match the timeline's node kind.
    #[error("a {expected} timeline cannot store a {received} payload")]
    MismatchedPayload {
        expected: NodeKind,
        received: NodeKind,
    },
}

/// The kind of node a timeline stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Nodes holding plain documents.
    #[serde(rename = "DocumentNode")]
    Document,
    /// Nodes holding clusters and their topic vectors.
    #[serde(rename = "TopicalClusterNode")]
    TopicalCluster,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => write!(f, "DocumentNode"),
            Self::TopicalCluster => write!(f, "TopicalClusterNode"),
        }
    }
}

/// Data added to a timeline.
#[derive(Debug, Clone, PartialEq)]
pub enum NodePayload {
    /// Documents for a [`NodeKind::Document`] timeline.
    Documents(Vec<Document>),
    /// A bursty cluster and its topic for a [`NodeKind::TopicalCluster`]
    /// timeline.
    TopicalCluster { cluster: Cluster, topic: Vector },
}

impl NodePayload {
    fn kind(&self) -> NodeKind {
        match self {
            Self::Documents(_) => NodeKind::Document,
            Self::TopicalCluster { .. } => NodeKind::TopicalCluster,
        }
    }
}

/// A node holding plain documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentNode {
    created_at: i64,
    documents: Vec<Document>,
    #[serde(default)]
    printed: bool,
}

impl DocumentNode {
    /// Creates an empty node.
    pub fn new(created_at: i64) -> Self {
        Self {
            created_at,
            documents: Vec::new(),
            printed: false,
        }
    }

    /// Returns the node's documents.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Adds documents, skipping ones whose post id is already present.
    ///
    /// Documents without an id are always added.
    pub fn add(&mut self, documents: Vec<Document>) {
        for document in documents {
            let duplicate = document.id().is_some()
                && self
                    .documents
                    .iter()
                    .any(|existing| existing.id() == document.id());
            if !duplicate {
                self.documents.push(document);
            }
        }
    }

    /// Computes the similarity between this node's documents and the
    /// incoming ones: the cosine of the two normalized centroids.
    pub fn similarity(&self, documents: &[Document]) -> f64 {
        let own = centroid(self.documents.iter().map(Document::vector)).normalized();
        let incoming = centroid(documents.iter().map(Document::vector)).normalized();
        cosine(&own, &incoming)
    }
}

/// A node holding clusters and the topic vectors that made them bursty.
///
/// The two lists stay aligned: `topics[i]` describes `clusters[i]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicalClusterNode {
    created_at: i64,
    clusters: Vec<Cluster>,
    topics: Vec<Vector>,
    #[serde(default)]
    printed: bool,
}

impl TopicalClusterNode {
    /// Creates an empty node.
    pub fn new(created_at: i64) -> Self {
        Self {
            created_at,
            clusters: Vec::new(),
            topics: Vec::new(),
            printed: false,
        }
    }

    /// Returns the node's clusters.
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Returns the node's topic vectors.
    pub fn topics(&self) -> &[Vector] {
        &self.topics
    }

    /// Adds a cluster and its topic.
    pub fn add(&mut self, cluster: Cluster, topic: Vector) {
        self.clusters.push(cluster);
        self.topics.push(topic);
    }

    /// Computes the highest cosine similarity between the incoming topic
    /// and any topic already in the node. 0 when the node is empty.
    pub fn similarity(&self, topic: &Vector) -> f64 {
        self.topics
            .iter()
            .map(|own| cosine(topic, own))
            .fold(0.0, f64::max)
    }
}

/// A timeline node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class")]
pub enum Node {
    /// A node of documents.
    #[serde(rename = "DocumentNode")]
    Document(DocumentNode),
    /// A node of clusters and topics.
    #[serde(rename = "TopicalClusterNode")]
    TopicalCluster(TopicalClusterNode),
}

impl Node {
    fn empty(kind: NodeKind, created_at: i64) -> Self {
        match kind {
            NodeKind::Document => Self::Document(DocumentNode::new(created_at)),
            NodeKind::TopicalCluster => Self::TopicalCluster(TopicalClusterNode::new(created_at)),
        }
    }

    /// Returns the node's kind.
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Document(_) => NodeKind::Document,
            Self::TopicalCluster(_) => NodeKind::TopicalCluster,
        }
    }

    /// Returns when the node was created.
    pub fn created_at(&self) -> i64 {
        match self {
            Self::Document(node) => node.created_at,
            Self::TopicalCluster(node) => node.created_at,
        }
    }

    /// Checks whether the node was already summarised.
    pub fn printed(&self) -> bool {
        match self {
            Self::Document(node) => node.printed,
            Self::TopicalCluster(node) => node.printed,
        }
    }

    /// Marks the node as summarised.
    pub fn set_printed(&mut self) {
        match self {
            Self::Document(node) => node.printed = true,
            Self::TopicalCluster(node) => node.printed = true,
        }
    }

    /// Checks whether the node is old enough to be closed and summarised.
    pub fn expired(&self, expiry: i64, timestamp: i64) -> bool {
        timestamp - self.created_at() >= expiry
    }

    /// Returns every document in the node.
    ///
    /// For topical-cluster nodes that is all of the clusters' documents.
    pub fn all_documents(&self) -> Vec<&Document> {
        match self {
            Self::Document(node) => node.documents.iter().collect(),
            Self::TopicalCluster(node) => node
                .clusters
                .iter()
                .flat_map(|cluster| cluster.vectors().iter())
                .collect(),
        }
    }

    /// Returns the node's topic vectors. Empty for document nodes.
    pub fn topics(&self) -> &[Vector] {
        match self {
            Self::Document(_) => &[],
            Self::TopicalCluster(node) => &node.topics,
        }
    }

    fn similarity(&self, payload: &NodePayload) -> f64 {
        match (self, payload) {
            (Self::Document(node), NodePayload::Documents(documents)) => {
                node.similarity(documents)
            }
            (Self::TopicalCluster(node), NodePayload::TopicalCluster { topic, .. }) => {
                node.similarity(topic)
            }
            _ => 0.0,
        }
    }

    fn add(&mut self, payload: NodePayload) {
        match (self, payload) {
            (Self::Document(node), NodePayload::Documents(documents)) => node.add(documents),
            (Self::TopicalCluster(node), NodePayload::TopicalCluster { cluster, topic }) => {
                node.add(cluster, topic)
            }
            _ => {}
        }
    }
}

/// A chronological list of nodes of a single kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TimelineRepr", into = "TimelineRepr")]
pub struct Timeline {
    node_kind: NodeKind,
    expiry: i64,
    min_similarity: f64,
    max_time: Option<i64>,
    nodes: Vec<Node>,
}

/// Wire shape of a [`Timeline`].
#[derive(Serialize, Deserialize)]
struct TimelineRepr {
    class: String,
    node_type: NodeKind,
    expiry: i64,
    min_similarity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_time: Option<i64>,
    nodes: Vec<Node>,
}

impl TryFrom<TimelineRepr> for Timeline {
    type Error = TimelineError;

    fn try_from(repr: TimelineRepr) -> Result<Self, Self::Error> {
        let mut timeline = Timeline::new(repr.node_type, repr.expiry, repr.min_similarity)?;
        timeline.max_time = repr.max_time;
        timeline.nodes = repr.nodes;
        Ok(timeline)
    }
}

impl From<Timeline> for TimelineRepr {
    fn from(timeline: Timeline) -> Self {
        Self {
            class: "Timeline".to_string(),
            node_type: timeline.node_kind,
            expiry: timeline.expiry,
            min_similarity: timeline.min_similarity,
            max_time: timeline.max_time,
            nodes: timeline.nodes,
        }
    }
}

impl Timeline {
    /// Creates an empty timeline.
    ///
    /// `expiry` is how many seconds after its creation a node becomes
    /// eligible for summarisation; `min_similarity` is the threshold for
    /// absorbing data into an existing node rather than opening a new one.
    pub fn new(node_kind: NodeKind, expiry: i64, min_similarity: f64) -> TimelineResult<Self> {
        if expiry < 0 {
            return Err(TimelineError::NegativeExpiry(expiry));
        }
        if !(0.0..=1.0).contains(&min_similarity) {
            return Err(TimelineError::InvalidMinSimilarity(min_similarity));
        }

        Ok(Self {
            node_kind,
            expiry,
            min_similarity,
            max_time: None,
            nodes: Vec::new(),
        })
    }

    /// Caps how old a node may be, in seconds, and still absorb new data.
    pub fn with_max_time(mut self, max_time: i64) -> Self {
        self.max_time = Some(max_time);
        self
    }

    /// Returns the node kind.
    pub fn node_kind(&self) -> NodeKind {
        self.node_kind
    }

    /// Returns the expiry in seconds.
    pub fn expiry(&self) -> i64 {
        self.expiry
    }

    /// Returns the nodes, oldest first.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Returns the newest node mutably.
    pub fn last_node_mut(&mut self) -> Option<&mut Node> {
        self.nodes.last_mut()
    }

    /// Returns the nodes mutably, oldest first.
    ///
    /// Consumers use this to mark nodes as summarised.
    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.iter_mut()
    }

    /// Adds data at the given timestamp.
    ///
    /// Walks the nodes from the newest: a node older than `max_time`
    /// cannot absorb new data and ends the search; the first node whose
    /// similarity with the payload reaches the minimum absorbs it.
    /// Otherwise a new node is created at the timestamp.
    pub fn add(&mut self, timestamp: i64, payload: NodePayload) -> TimelineResult<()> {
        if payload.kind() != self.node_kind {
            return Err(TimelineError::MismatchedPayload {
                expected: self.node_kind,
                received: payload.kind(),
            });
        }

        let mut target = None;
        for (index, node) in self.nodes.iter().enumerate().rev() {
            if let Some(max_time) = self.max_time {
                if timestamp - node.created_at() > max_time {
                    break;
                }
            }

            if node.similarity(&payload) >= self.min_similarity {
                target = Some(index);
                break;
            }
        }

        match target {
            Some(index) => self.nodes[index].add(payload),
            None => {
                let mut node = Node::empty(self.node_kind, timestamp);
                node.add(payload);
                self.nodes.push(node);
            }
        }

        Ok(())
    }

    /// Checks whether a node has expired at the given timestamp.
    pub fn expired(&self, node: &Node, timestamp: i64) -> bool {
        node.expired(self.expiry, timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventline_core::TermWeighting;

    fn make_document(terms: &[(&str, f64)], id: &str) -> Document {
        let dimensions = terms.iter().map(|(t, w)| (t.to_string(), *w)).collect();
        let mut document = Document::new("", Vector::from_dimensions(dimensions));
        document.set_attribute("id", id);
        document
    }

    fn make_topic(terms: &[(&str, f64)]) -> Vector {
        let mut topic =
            Vector::from_dimensions(terms.iter().map(|(t, w)| (t.to_string(), *w)).collect());
        topic.normalize();
        topic
    }

    #[test]
    fn negative_expiry_rejected() {
        assert_eq!(
            Timeline::new(NodeKind::Document, -1, 0.5).unwrap_err(),
            TimelineError::NegativeExpiry(-1)
        );
    }

    #[test]
    fn out_of_range_similarity_rejected() {
        assert!(Timeline::new(NodeKind::Document, 60, 1.5).is_err());
    }

    #[test]
    fn mismatched_payload_rejected() {
        let mut timeline = Timeline::new(NodeKind::Document, 60, 0.5).unwrap();
        let payload = NodePayload::TopicalCluster {
            cluster: Cluster::new(vec![]),
            topic: make_topic(&[("goal", 1.0)]),
        };
        assert!(matches!(
            timeline.add(0, payload),
            Err(TimelineError::MismatchedPayload { .. })
        ));
    }

    #[test]
    fn similar_documents_absorbed_within_max_time() {
        let mut timeline = Timeline::new(NodeKind::Document, 60, 0.5)
            .unwrap()
            .with_max_time(600);

        timeline
            .add(0, NodePayload::Documents(vec![make_document(&[("pipe", 1.0)], "1")]))
            .unwrap();
        assert_eq!(timeline.nodes().len(), 1);

        // The node is past its expiry but within max_time, and identical
        // content means similarity 1: absorbed.
        timeline
            .add(61, NodePayload::Documents(vec![make_document(&[("pipe", 1.0)], "2")]))
            .unwrap();
        assert_eq!(timeline.nodes().len(), 1);

        // Too old to absorb anything, however similar.
        timeline
            .add(700, NodePayload::Documents(vec![make_document(&[("pipe", 1.0)], "3")]))
            .unwrap();
        assert_eq!(timeline.nodes().len(), 2);
    }

    #[test]
    fn dissimilar_documents_open_new_node() {
        let mut timeline = Timeline::new(NodeKind::Document, 60, 0.5).unwrap();
        timeline
            .add(0, NodePayload::Documents(vec![make_document(&[("goal", 1.0)], "1")]))
            .unwrap();
        timeline
            .add(1, NodePayload::Documents(vec![make_document(&[("corner", 1.0)], "2")]))
            .unwrap();

        assert_eq!(timeline.nodes().len(), 2);
    }

    #[test]
    fn node_created_at_is_non_decreasing() {
        let mut timeline = Timeline::new(NodeKind::Document, 60, 0.5).unwrap();
        timeline
            .add(10, NodePayload::Documents(vec![make_document(&[("a", 1.0)], "1")]))
            .unwrap();
        timeline
            .add(20, NodePayload::Documents(vec![make_document(&[("b", 1.0)], "2")]))
            .unwrap();
        timeline
            .add(30, NodePayload::Documents(vec![make_document(&[("c", 1.0)], "3")]))
            .unwrap();

        let created: Vec<i64> = timeline.nodes().iter().map(Node::created_at).collect();
        let mut sorted = created.clone();
        sorted.sort_unstable();
        assert_eq!(created, sorted);
    }

    #[test]
    fn document_node_deduplicates_by_id() {
        let mut node = DocumentNode::new(0);
        node.add(vec![
            make_document(&[("a", 1.0)], "1"),
            make_document(&[("a", 1.0)], "1"),
        ]);
        assert_eq!(node.documents().len(), 1);

        node.add(vec![make_document(&[("a", 1.0)], "2")]);
        assert_eq!(node.documents().len(), 2);
    }

    #[test]
    fn topical_node_similarity_is_max_over_topics() {
        let mut node = TopicalClusterNode::new(0);
        node.add(Cluster::new(vec![]), make_topic(&[("goal", 1.0)]));
        node.add(Cluster::new(vec![]), make_topic(&[("corner", 1.0)]));

        let similarity = node.similarity(&make_topic(&[("corner", 1.0)]));
        assert!((similarity - 1.0).abs() < 1e-9);

        let empty = TopicalClusterNode::new(0);
        assert_eq!(empty.similarity(&make_topic(&[("goal", 1.0)])), 0.0);
    }

    #[test]
    fn topical_node_lists_stay_aligned() {
        let scheme = TermWeighting::Tf;
        let tokens = vec!["goal".to_string()];
        let mut node = TopicalClusterNode::new(0);
        node.add(
            Cluster::new(vec![scheme.create("goal", &tokens)]),
            make_topic(&[("goal", 1.0)]),
        );

        assert_eq!(node.clusters().len(), node.topics().len());
    }

    #[test]
    fn expiry_threshold_is_inclusive() {
        let timeline = Timeline::new(NodeKind::Document, 60, 0.5).unwrap();
        let node = Node::empty(NodeKind::Document, 100);

        assert!(!timeline.expired(&node, 159));
        assert!(timeline.expired(&node, 160));
    }

    #[test]
    fn serialization_round_trip() {
        let mut timeline = Timeline::new(NodeKind::TopicalCluster, 90, 0.6).unwrap();
        let scheme = TermWeighting::Tf;
        let tokens = vec!["goal".to_string()];
        let mut document = scheme.create("goal", &tokens);
        document.set_attribute("timestamp", 10);

        timeline
            .add(
                10,
                NodePayload::TopicalCluster {
                    cluster: Cluster::new(vec![document]),
                    topic: make_topic(&[("goal", 1.0)]),
                },
            )
            .unwrap();

        let json = serde_json::to_string(&timeline).unwrap();
        assert!(json.contains("\"class\":\"Timeline\""));
        assert!(json.contains("\"node_type\":\"TopicalClusterNode\""));
        assert!(json.contains("\"class\":\"TopicalClusterNode\""));

        let parsed: Timeline = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, timeline);
    }
}

//! Temporal single-pass incremental clustering.
//!
//! Documents are read once, in event-time order, and attached to the most
//! similar active cluster when the similarity reaches a threshold;
//! otherwise they open a new cluster. Clusters that receive nothing for
//! longer than the freeze period (in event-time seconds, not vector count)
//! are retired and never receive documents again.

use eventline_core::{Cluster, Document};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Unique identifier for a cluster.
///
/// Ids stay valid across calls, so consumers can mark a cluster (last
/// burst test, burstiness) and find it again in a later batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(pub u64);

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cluster-{}", self.0)
    }
}

/// The temporal no-k-means clusterer.
///
/// State is two lists: the active clusters, which may still receive
/// documents, and the frozen ones, which may not. Frozen clusters are
/// dropped unless `store_frozen` is set, since consumers that care keep
/// their own copies.
#[derive(Debug, Clone)]
pub struct TemporalNoKMeans {
    threshold: f64,
    freeze_period: i64,
    store_frozen: bool,
    active: Vec<(ClusterId, Cluster)>,
    frozen: Vec<(ClusterId, Cluster)>,
    next_id: u64,
}

impl TemporalNoKMeans {
    /// Creates a clusterer.
    ///
    /// `threshold` is the minimum similarity between a document and a
    /// cluster's centroid for the document to join the cluster;
    /// `freeze_period` is the seconds of inactivity before a cluster is
    /// retired.
    pub fn new(threshold: f64, freeze_period: i64, store_frozen: bool) -> Self {
        Self {
            threshold,
            freeze_period,
            store_frozen,
            active: Vec::new(),
            frozen: Vec::new(),
            next_id: 0,
        }
    }

    /// Clusters the given documents, oldest first.
    ///
    /// Inactive clusters are frozen before each new timestamp is processed,
    /// so nothing can join them and reset their age. Returns the ids of the
    /// clusters that received documents during this call.
    pub fn cluster(&mut self, documents: Vec<Document>) -> Vec<ClusterId> {
        let mut documents = documents;
        documents.sort_by_key(|document| document.timestamp().unwrap_or(0));

        let mut updated: Vec<ClusterId> = Vec::new();
        let mut latest = i64::MIN;

        for document in documents {
            let timestamp = document.timestamp().unwrap_or(0);

            if timestamp > latest {
                self.freeze_inactive(timestamp);
                latest = timestamp;
            }

            match self.closest_cluster(&document) {
                Some((id, similarity)) if similarity >= self.threshold => {
                    if let Some((_, cluster)) =
                        self.active.iter_mut().find(|(active_id, _)| *active_id == id)
                    {
                        cluster.push(document);
                        cluster.attributes_mut().age = 0;
                    }
                    if !updated.contains(&id) {
                        updated.push(id);
                    }
                }
                _ => {
                    let id = ClusterId(self.next_id);
                    self.next_id += 1;
                    self.active.push((id, Cluster::new(vec![document])));
                    updated.push(id);
                }
            }
        }

        updated
    }

    /// Ages every active cluster against the given timestamp and retires
    /// the ones whose age exceeds the freeze period.
    ///
    /// A cluster's age is the time since its most recently assigned
    /// document.
    fn freeze_inactive(&mut self, timestamp: i64) {
        for (_, cluster) in &mut self.active {
            let last = cluster
                .last()
                .and_then(Document::timestamp)
                .unwrap_or(timestamp);
            cluster.attributes_mut().age = timestamp - last;
        }

        let freeze_period = self.freeze_period;
        let store_frozen = self.store_frozen;
        let frozen = &mut self.frozen;
        self.active.retain_mut(|(id, cluster)| {
            if cluster.attributes().age > freeze_period {
                debug!("Freezing {} after {}s of inactivity", id, cluster.attributes().age);
                if store_frozen {
                    frozen.push((*id, std::mem::take(cluster)));
                }
                false
            } else {
                true
            }
        });
    }

    /// Finds the active cluster most similar to the document.
    fn closest_cluster(&self, document: &Document) -> Option<(ClusterId, f64)> {
        self.active
            .iter()
            .map(|(id, cluster)| (*id, cluster.similarity(document.vector())))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// Returns a cluster by id, looking in the active clusters first.
    pub fn get(&self, id: ClusterId) -> Option<&Cluster> {
        self.active
            .iter()
            .chain(self.frozen.iter())
            .find(|(cluster_id, _)| *cluster_id == id)
            .map(|(_, cluster)| cluster)
    }

    /// Returns a cluster by id, mutably.
    pub fn get_mut(&mut self, id: ClusterId) -> Option<&mut Cluster> {
        self.active
            .iter_mut()
            .chain(self.frozen.iter_mut())
            .find(|(cluster_id, _)| *cluster_id == id)
            .map(|(_, cluster)| cluster)
    }

    /// Returns the active clusters.
    pub fn active(&self) -> impl Iterator<Item = (ClusterId, &Cluster)> {
        self.active.iter().map(|(id, cluster)| (*id, cluster))
    }

    /// Returns the frozen clusters. Empty unless `store_frozen` is set.
    pub fn frozen(&self) -> impl Iterator<Item = (ClusterId, &Cluster)> {
        self.frozen.iter().map(|(id, cluster)| (*id, cluster))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventline_core::Vector;

    fn make_document(terms: &[(&str, f64)], timestamp: i64) -> Document {
        let dimensions = terms.iter().map(|(t, w)| (t.to_string(), *w)).collect();
        let mut document = Document::new("", Vector::from_dimensions(dimensions));
        document.set_attribute("timestamp", timestamp);
        document
    }

    #[test]
    fn similar_documents_share_a_cluster() {
        let mut clusterer = TemporalNoKMeans::new(0.5, 60, true);
        let updated = clusterer.cluster(vec![
            make_document(&[("a", 1.0)], 0),
            make_document(&[("a", 1.0)], 10),
        ]);

        assert_eq!(updated.len(), 1);
        assert_eq!(clusterer.get(updated[0]).unwrap().size(), 2);
    }

    #[test]
    fn dissimilar_documents_open_new_clusters() {
        let mut clusterer = TemporalNoKMeans::new(0.5, 60, true);
        let updated = clusterer.cluster(vec![
            make_document(&[("a", 1.0)], 0),
            make_document(&[("b", 1.0)], 10),
        ]);

        assert_eq!(updated.len(), 2);
        assert_eq!(clusterer.active().count(), 2);
    }

    #[test]
    fn inactive_clusters_freeze() {
        let mut clusterer = TemporalNoKMeans::new(0.5, 60, true);
        clusterer.cluster(vec![
            make_document(&[("a", 1.0)], 0),
            make_document(&[("a", 1.0)], 30),
        ]);

        // At t=120 the cluster's age is 120 - 30 = 90 > 60, so it freezes
        // and the new document opens a second cluster.
        clusterer.cluster(vec![make_document(&[("a", 1.0)], 120)]);

        assert_eq!(clusterer.active().count(), 1);
        assert_eq!(clusterer.frozen().count(), 1);
        let (_, frozen) = clusterer.frozen().next().unwrap();
        assert_eq!(frozen.size(), 2);
    }

    #[test]
    fn frozen_clusters_discarded_without_store_frozen() {
        let mut clusterer = TemporalNoKMeans::new(0.5, 60, false);
        clusterer.cluster(vec![make_document(&[("a", 1.0)], 0)]);
        clusterer.cluster(vec![make_document(&[("b", 1.0)], 120)]);

        assert_eq!(clusterer.active().count(), 1);
        assert_eq!(clusterer.frozen().count(), 0);
    }

    #[test]
    fn appending_resets_age() {
        let mut clusterer = TemporalNoKMeans::new(0.5, 60, false);
        let updated = clusterer.cluster(vec![make_document(&[("a", 1.0)], 0)]);
        clusterer.cluster(vec![make_document(&[("a", 1.0)], 30)]);

        let cluster = clusterer.get(updated[0]).unwrap();
        assert_eq!(cluster.attributes().age, 0);
    }

    #[test]
    fn out_of_order_batch_is_sorted_by_event_time() {
        let mut clusterer = TemporalNoKMeans::new(0.5, 60, false);
        let updated = clusterer.cluster(vec![
            make_document(&[("a", 1.0)], 30),
            make_document(&[("a", 1.0)], 0),
        ]);

        assert_eq!(updated.len(), 1);
        let cluster = clusterer.get(updated[0]).unwrap();
        assert_eq!(cluster.last().and_then(Document::timestamp), Some(30));
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let mut clusterer = TemporalNoKMeans::new(0.5, 60, false);
        assert!(clusterer.cluster(vec![]).is_empty());
        assert_eq!(clusterer.active().count(), 0);
    }

    #[test]
    fn each_document_joins_at_most_one_cluster() {
        let mut clusterer = TemporalNoKMeans::new(0.0, 60, false);
        // Threshold 0 accepts everything, so both documents join the first
        // cluster rather than opening new ones.
        let updated = clusterer.cluster(vec![
            make_document(&[("a", 1.0)], 0),
            make_document(&[("b", 1.0)], 1),
            make_document(&[("c", 1.0)], 2),
        ]);

        assert_eq!(updated.len(), 1);
        assert_eq!(clusterer.get(updated[0]).unwrap().size(), 3);
    }
}

//! eventline-core: vector-space primitives for the Eventline TDT pipeline
//!
//! This crate provides:
//! - Sparse term vectors with L2 normalization and cosine similarity
//! - Documents: vectors that carry their raw text and attributes
//! - Clusters: ordered document collections with centroid-based similarity
//! - Term weighting: TF and TF-IDF document creation
//!
//! Everything here is plain data and arithmetic; the streaming machinery
//! lives in `eventline-stream` and the detection algorithms in
//! `eventline-tdt`.

pub mod cluster;
pub mod document;
pub mod vector;
pub mod weighting;

pub use cluster::{Cluster, ClusterAttributes};
pub use document::Document;
pub use vector::{centroid, cosine, Vector};
pub use weighting::{TermWeighting, TfIdf};

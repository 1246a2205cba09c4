//! Sparse term vectors and the arithmetic the pipeline builds on.
//!
//! Vectors map dimensions (terms) to weights. They stay sparse: a dimension
//! that is absent has weight zero. The module also provides the free
//! functions used across the pipeline:
//! - [`cosine`] for similarity between two vectors
//! - [`centroid`] for the component-wise mean of a set of vectors

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A sparse mapping from dimensions (terms) to weights.
///
/// Vectors also carry a free-form attribute map. Attributes are not part of
/// the vector space; they hold bookkeeping such as the event timestamp of
/// the post a vector was built from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "VectorRepr", into = "VectorRepr")]
pub struct Vector {
    dimensions: HashMap<String, f64>,
    attributes: HashMap<String, Value>,
}

/// Wire shape of a [`Vector`]: `{class, dimensions, attributes}`.
#[derive(Serialize, Deserialize)]
struct VectorRepr {
    class: String,
    dimensions: HashMap<String, f64>,
    #[serde(default)]
    attributes: HashMap<String, Value>,
}

impl From<VectorRepr> for Vector {
    fn from(repr: VectorRepr) -> Self {
        Self {
            dimensions: repr.dimensions,
            attributes: repr.attributes,
        }
    }
}

impl From<Vector> for VectorRepr {
    fn from(vector: Vector) -> Self {
        Self {
            class: "Vector".to_string(),
            dimensions: vector.dimensions,
            attributes: vector.attributes,
        }
    }
}

impl Vector {
    /// Creates an empty vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a vector from a dimension map.
    pub fn from_dimensions(dimensions: HashMap<String, f64>) -> Self {
        Self {
            dimensions,
            attributes: HashMap::new(),
        }
    }

    /// Returns the weight of a dimension, or 0 if it is absent.
    pub fn dimension(&self, term: &str) -> f64 {
        self.dimensions.get(term).copied().unwrap_or(0.0)
    }

    /// Sets the weight of a dimension. A weight of exactly 0 removes it.
    pub fn set_dimension(&mut self, term: impl Into<String>, weight: f64) {
        if weight == 0.0 {
            self.dimensions.remove(&term.into());
        } else {
            self.dimensions.insert(term.into(), weight);
        }
    }

    /// Returns the dimension map.
    pub fn dimensions(&self) -> &HashMap<String, f64> {
        &self.dimensions
    }

    /// Replaces the dimension map.
    pub fn set_dimensions(&mut self, dimensions: HashMap<String, f64>) {
        self.dimensions = dimensions;
    }

    /// Returns an attribute, if set.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Sets an attribute.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Returns the attribute map.
    pub fn attributes(&self) -> &HashMap<String, Value> {
        &self.attributes
    }

    /// Checks whether the vector has no dimensions.
    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// Computes the Euclidean (L2) norm of the vector.
    pub fn norm(&self) -> f64 {
        self.dimensions.values().map(|w| w * w).sum::<f64>().sqrt()
    }

    /// Scales the vector so its Euclidean norm is 1.
    ///
    /// A vector with norm 0 is left unchanged.
    pub fn normalize(&mut self) {
        let norm = self.norm();
        if norm == 0.0 {
            return;
        }

        for weight in self.dimensions.values_mut() {
            *weight /= norm;
        }
    }

    /// Returns a normalized copy of the vector.
    pub fn normalized(&self) -> Self {
        let mut copy = self.clone();
        copy.normalize();
        copy
    }

    /// Computes the dot product with another vector.
    ///
    /// Iterates over the smaller operand's dimensions so sparse vectors of
    /// very different sizes stay cheap to compare.
    pub fn dot(&self, other: &Vector) -> f64 {
        let (small, large) = if self.dimensions.len() <= other.dimensions.len() {
            (self, other)
        } else {
            (other, self)
        };

        small
            .dimensions
            .iter()
            .filter_map(|(term, weight)| large.dimensions.get(term).map(|w| weight * w))
            .sum()
    }
}

/// Computes the cosine similarity between two vectors.
///
/// Returns 0 when either vector has norm 0.
pub fn cosine(a: &Vector, b: &Vector) -> f64 {
    let norm_a = a.norm();
    let norm_b = b.norm();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    a.dot(b) / (norm_a * norm_b)
}

/// Computes the component-wise mean of the given vectors.
///
/// The centroid is not normalized. An empty input yields an empty vector.
pub fn centroid<'a, I>(vectors: I) -> Vector
where
    I: IntoIterator<Item = &'a Vector>,
{
    let mut sums: HashMap<String, f64> = HashMap::new();
    let mut count = 0usize;

    for vector in vectors {
        count += 1;
        for (term, weight) in &vector.dimensions {
            *sums.entry(term.clone()).or_insert(0.0) += weight;
        }
    }

    if count == 0 {
        return Vector::new();
    }

    let n = count as f64;
    sums.retain(|_, sum| *sum != 0.0);
    for sum in sums.values_mut() {
        *sum /= n;
    }

    Vector::from_dimensions(sums)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_vector(terms: &[(&str, f64)]) -> Vector {
        let dimensions = terms.iter().map(|(t, w)| (t.to_string(), *w)).collect();
        Vector::from_dimensions(dimensions)
    }

    #[test]
    fn dimension_absent_is_zero() {
        let vector = make_vector(&[("goal", 1.0)]);
        assert_eq!(vector.dimension("goal"), 1.0);
        assert_eq!(vector.dimension("corner"), 0.0);
    }

    #[test]
    fn set_dimension_zero_removes() {
        let mut vector = make_vector(&[("goal", 1.0)]);
        vector.set_dimension("goal", 0.0);
        assert!(vector.is_empty());
    }

    #[test]
    fn norm_basic() {
        let vector = make_vector(&[("a", 3.0), ("b", 4.0)]);
        assert!((vector.norm() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn normalize_unit_norm() {
        let mut vector = make_vector(&[("a", 3.0), ("b", 4.0)]);
        vector.normalize();
        assert!((vector.norm() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn normalize_zero_vector_unchanged() {
        let mut vector = Vector::new();
        vector.normalize();
        assert!(vector.is_empty());
    }

    #[test]
    fn normalize_idempotent() {
        let mut vector = make_vector(&[("a", 1.0), ("b", 2.0)]);
        vector.normalize();
        let once = vector.clone();
        vector.normalize();

        for (term, weight) in once.dimensions() {
            assert!((weight - vector.dimension(term)).abs() < 1e-12);
        }
    }

    #[test]
    fn cosine_identical_is_one() {
        let a = make_vector(&[("a", 1.0), ("b", 2.0)]);
        let b = make_vector(&[("a", 2.0), ("b", 4.0)]);
        assert!((cosine(&a, &b) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cosine_orthogonal_is_zero() {
        let a = make_vector(&[("a", 1.0)]);
        let b = make_vector(&[("b", 1.0)]);
        assert_eq!(cosine(&a, &b), 0.0);
    }

    #[test]
    fn cosine_zero_vector_is_zero() {
        let a = make_vector(&[("a", 1.0)]);
        let b = Vector::new();
        assert_eq!(cosine(&a, &b), 0.0);
    }

    #[test]
    fn cosine_bounded_for_non_negative_weights() {
        let a = make_vector(&[("a", 0.3), ("b", 0.9)]);
        let b = make_vector(&[("a", 0.7), ("c", 0.2)]);
        let sim = cosine(&a, &b);
        assert!((0.0..=1.0).contains(&sim));
    }

    #[test]
    fn centroid_mean_of_components() {
        let a = make_vector(&[("a", 1.0)]);
        let b = make_vector(&[("a", 3.0), ("b", 2.0)]);
        let c = centroid([&a, &b]);

        assert!((c.dimension("a") - 2.0).abs() < 1e-9);
        assert!((c.dimension("b") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn centroid_empty_input() {
        let c = centroid(std::iter::empty::<&Vector>());
        assert!(c.is_empty());
    }

    #[test]
    fn serialization_round_trip() {
        let mut vector = make_vector(&[("goal", 0.5)]);
        vector.set_attribute("timestamp", 10);

        let json = serde_json::to_string(&vector).unwrap();
        assert!(json.contains("\"class\":\"Vector\""));

        let parsed: Vector = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, vector);
    }
}

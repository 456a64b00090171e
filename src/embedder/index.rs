use std::cmp::Ordering;

use ndarray::{Array1, ArrayView1};

use super::types::EmbedderError;

/// A scored search hit
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub id: String,
    pub score: f32,
}

/// In-memory exact index scoring every stored vector by dot product
#[derive(Debug, Clone)]
pub struct EmbeddingIndex {
    dim: usize,
    ids: Vec<String>,
    vectors: Vec<Array1<f32>>,
}

impl EmbeddingIndex {
    pub fn new(dim: usize) -> Self {
        Self { dim, ids: Vec::new(), vectors: Vec::new() }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn add(&mut self, id: impl Into<String>, vector: ArrayView1<f32>) -> Result<(), EmbedderError> {
        if vector.len() != self.dim {
            return Err(EmbedderError::Dimension { expected: self.dim, actual: vector.len() });
        }
        self.ids.push(id.into());
        self.vectors.push(vector.to_owned());
        Ok(())
    }

    /// Top `k` ids by score, best first; equal scores keep insertion order
    pub fn search(&self, query: ArrayView1<f32>, k: usize) -> Result<Vec<SearchResult>, EmbedderError> {
        if query.len() != self.dim {
            return Err(EmbedderError::Dimension { expected: self.dim, actual: query.len() });
        }
        let mut scored: Vec<(usize, f32)> = self.vectors.iter()
            .enumerate()
            .map(|(i, v)| (i, v.dot(&query)))
            .collect();
        // Stable sort keeps insertion order among ties
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        Ok(scored.into_iter()
            .take(k)
            .map(|(i, score)| SearchResult { id: self.ids[i].clone(), score })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_search_orders_by_score() {
        let mut index = EmbeddingIndex::new(2);
        index.add("a", array![1.0f32, 0.0].view()).unwrap();
        index.add("b", array![0.0f32, 1.0].view()).unwrap();
        index.add("c", array![0.6f32, 0.8].view()).unwrap();

        let hits = index.search(array![0.0f32, 1.0].view(), 2).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut index = EmbeddingIndex::new(1);
        for id in ["x", "y", "z"] {
            index.add(id, array![1.0f32].view()).unwrap();
        }
        let hits = index.search(array![1.0f32].view(), 10).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_dimension_checks() {
        let mut index = EmbeddingIndex::new(3);
        assert!(index.add("a", array![1.0f32].view()).is_err());
        assert!(index.search(array![1.0f32, 2.0].view(), 1).is_err());
        assert!(index.search(array![1.0f32, 2.0, 3.0].view(), 1).unwrap().is_empty());
    }
}

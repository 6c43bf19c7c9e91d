//! Result composition, clustering, sort and limit.

use crate::query_node::DocumentId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredDocument {
    pub doc_id: DocumentId,
    pub score: f64,
    pub tf: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    ScoreDesc,
    ScoreAsc,
    RowIdAsc,
    RowIdDesc,
}

/// A score modifier applied during delayed sort.
pub trait ScoreModifier {
    fn modify(&self, doc: &ScoredDocument) -> f64;
}

/// A dense `(docID, score, optional TF)` sequence, composed from one or more
/// sub-indices and carried through clustering/sort/limit.
pub struct SearchResult {
    documents: Vec<ScoredDocument>,
}

impl SearchResult {
    pub fn new(documents: Vec<ScoredDocument>) -> Self {
        Self { documents }
    }

    pub fn documents(&self) -> &[ScoredDocument] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Rewrites every `docID` to its stable row-id, dropping documents the
    /// row-id map no longer knows about (deleted between retrieval and
    /// composition).
    pub fn compose_row_ids(&mut self, row_ids: &crate::index::RowIdVectorFile) {
        self.documents.retain_mut(|doc| match row_ids.row_id(doc.doc_id) {
            Some(row_id) => {
                doc.doc_id = row_id as DocumentId;
                true
            }
            None => false,
        });
    }

    pub fn sort(&mut self, order: SortOrder) {
        match order {
            SortOrder::ScoreDesc => self
                .documents
                .sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal)),
            SortOrder::ScoreAsc => self
                .documents
                .sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal)),
            SortOrder::RowIdAsc => self.documents.sort_by_key(|d| d.doc_id),
            SortOrder::RowIdDesc => self.documents.sort_by_key(|d| std::cmp::Reverse(d.doc_id)),
        }
    }

    pub fn limit(&mut self, n: usize) {
        self.documents.truncate(n);
    }

    /// Applies a user-supplied score modifier to every document. The limit
    /// is suppressed until after this runs, then the caller sorts and
    /// limits.
    pub fn apply_modifier(&mut self, modifier: &dyn ScoreModifier) {
        for doc in &mut self.documents {
            doc.score = modifier.modify(doc);
        }
    }

    /// Groups documents into similarity clusters, representative-first,
    /// members kept in their existing relative order. Two documents join
    /// the same cluster when their score
    /// gap is within `clustered_limit`, compared against the running
    /// representative — the highest scorer seen so far in the (already
    /// score-sorted) input.
    pub fn cluster(self, clustered_limit: f64) -> Vec<Cluster> {
        let mut clusters: Vec<Cluster> = Vec::new();
        for doc in self.documents {
            match clusters
                .last_mut()
                .filter(|c| (c.representative.score - doc.score).abs() <= clustered_limit)
            {
                Some(c) => c.members.push(doc),
                None => clusters.push(Cluster {
                    representative: doc,
                    members: vec![doc],
                }),
            }
        }
        clusters
    }

    /// Only the clusters needed to satisfy `pos` results, computed lazily
    /// from an already score-sorted, unclustered input.
    pub fn cluster_up_to(self, clustered_limit: f64, pos: usize) -> Vec<Cluster> {
        let mut clusters: Vec<Cluster> = Vec::new();
        let mut produced = 0usize;
        for doc in self.documents {
            if produced >= pos && !clusters.is_empty() {
                break;
            }
            match clusters
                .last_mut()
                .filter(|c| (c.representative.score - doc.score).abs() <= clustered_limit)
            {
                Some(c) => c.members.push(doc),
                None => clusters.push(Cluster {
                    representative: doc,
                    members: vec![doc],
                }),
            }
            produced += 1;
        }
        clusters
    }
}

#[derive(Debug, Clone)]
pub struct Cluster {
    pub representative: ScoredDocument,
    pub members: Vec<ScoredDocument>,
}

/// Runs the composition pipeline: when both delayed-sort (a score modifier)
/// and clustering are requested, run cluster → modify → sort → limit,
/// never producing an empty result.
pub fn compose(
    mut result: SearchResult,
    modifier: Option<&dyn ScoreModifier>,
    clustered_limit: Option<f64>,
    order: SortOrder,
    limit: Option<usize>,
) -> Vec<ScoredDocument> {
    let documents = if let (Some(limit_threshold), Some(modifier)) = (clustered_limit, modifier) {
        let clusters = result.cluster(limit_threshold);
        let mut flat: Vec<ScoredDocument> = clusters.into_iter().flat_map(|c| c.members).collect();
        for doc in &mut flat {
            doc.score = modifier.modify(doc);
        }
        let mut result = SearchResult::new(flat);
        result.sort(order);
        if let Some(n) = limit {
            result.limit(n);
        }
        result.documents
    } else {
        if let Some(modifier) = modifier {
            result.apply_modifier(modifier);
        }
        result.sort(order);
        if let Some(n) = limit {
            result.limit(n);
        }
        result.documents
    };
    documents
}

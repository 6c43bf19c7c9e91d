//! Ranking engine: walks the query DAG by lower-bound, combining each leaf's
//! `first_step`/`second_step` into a total document score.

use tracing::instrument;

use crate::calculator::ScoreCalculator;
use crate::index::DocumentSource;
use crate::query::Query;
use crate::query_node::DocumentId;
use crate::result::{ScoredDocument, SearchResult};

/// Runs `query` to completion against `source`, scoring every matching
/// document and collecting them into a [`SearchResult`]: advance by
/// lower-bound, call `first_step` on the node the cursor landed on, which
/// already folds in each leaf's own `ScoreCalculator::second_step` IDF
/// weight (precomputed once at `LeafTerm` construction — see
/// `query_node.rs`).
#[instrument(skip(query, source))]
pub fn rank<S: DocumentSource>(query: &mut Query, source: &S) -> SearchResult {
    let mut docs = Vec::new();
    let mut cursor: DocumentId = 0;

    loop {
        if source.is_cancelled() {
            break;
        }
        let Some(doc) = query.root.lower_bound(cursor) else {
            break;
        };
        let score = query.root.first_step();
        docs.push(ScoredDocument {
            doc_id: doc,
            score,
            tf: if query.retrieve_tf { query.root.get_tf() } else { 0 },
        });
        cursor = doc + 1;
    }

    SearchResult::new(docs)
}

/// Extended-first-step pass: scores a pre-fetched buffer of `(docID, tf)`
/// pairs directly against `calculator`, bypassing the `QueryNode` lower_bound
/// walk entirely. Used when the caller already has doc-ids and term
/// frequencies staged in one place (for example, a rough-pointer probe that
/// buffered candidates before the real node ran) rather than a live postings
/// cursor to step through.
///
/// Prefers the calculator's own `search_document_length` over the single
/// collection-wide average when the calculator provides one, and its
/// `get_total_term_frequency` over plain document frequency for the IDF
/// factor when the calculator reports a nonzero total.
pub fn first_step_ex(
    calculator: &dyn ScoreCalculator,
    buffer: &[(DocumentId, u32)],
    avg_doc_len: f64,
    total_documents: u32,
) -> Vec<ScoredDocument> {
    let ttf = calculator.get_total_term_frequency();
    let df = if ttf > 0 { ttf } else { buffer.len() as u32 };
    let idf = calculator.second_step(df, total_documents);

    buffer
        .iter()
        .map(|&(doc_id, tf)| {
            let doc_len = calculator.search_document_length(doc_id).unwrap_or(avg_doc_len as u32);
            ScoredDocument {
                doc_id,
                score: calculator.first_step(tf, doc_len, avg_doc_len) * idf,
                tf,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::TfIdf;
    use crate::query_node::{LeafTerm, OperatorAnd, QueryNode, TermPostings};

    struct Fixed {
        total: u32,
    }

    impl DocumentSource for Fixed {
        fn document_length(&self, _doc_id: DocumentId) -> Option<u32> {
            Some(10)
        }
        fn average_document_length(&self) -> f64 {
            10.0
        }
        fn total_documents(&self) -> u32 {
            self.total
        }
        fn is_cancelled(&self) -> bool {
            false
        }
    }

    struct VecPostings(Vec<(DocumentId, u32)>, usize);
    impl TermPostings for VecPostings {
        fn next_geq(&mut self, doc: DocumentId) -> Option<(DocumentId, u32)> {
            while self.1 < self.0.len() && self.0[self.1].0 < doc {
                self.1 += 1;
            }
            self.0.get(self.1).copied()
        }
        fn estimated_df(&self) -> u32 {
            self.0.len() as u32
        }
    }

    #[test]
    fn rank_collects_every_matching_document_in_order() {
        let leaf: Box<dyn QueryNode> = Box::new(LeafTerm::new(
            Box::new(VecPostings(vec![(1, 2), (3, 5), (7, 1)], 0)),
            Box::new(TfIdf::default()),
            10.0,
            100,
        ));
        let mut query = Query::new(leaf);
        let source = Fixed { total: 100 };

        let result = rank(&mut query, &source);
        let ids: Vec<_> = result.documents().iter().map(|d| d.doc_id).collect();
        assert_eq!(ids, vec![1, 3, 7]);
    }

    #[test]
    fn rank_respects_and_intersection() {
        let left: Box<dyn QueryNode> = Box::new(LeafTerm::new(
            Box::new(VecPostings(vec![(1, 1), (2, 1), (3, 1)], 0)),
            Box::new(TfIdf::default()),
            10.0,
            100,
        ));
        let right: Box<dyn QueryNode> = Box::new(LeafTerm::new(
            Box::new(VecPostings(vec![(2, 1), (3, 1)], 0)),
            Box::new(TfIdf::default()),
            10.0,
            100,
        ));
        let and: Box<dyn QueryNode> = Box::new(OperatorAnd {
            children: vec![left, right],
        });
        let mut query = Query::new(and);
        let source = Fixed { total: 100 };

        let result = rank(&mut query, &source);
        let ids: Vec<_> = result.documents().iter().map(|d| d.doc_id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    struct ExtendedCalculator;
    impl ScoreCalculator for ExtendedCalculator {
        fn name(&self) -> &'static str {
            "ExtendedCalculator"
        }
        fn first_step(&self, tf: u32, doc_len: u32, avg_doc_len: f64) -> f64 {
            tf as f64 / (doc_len as f64 / avg_doc_len)
        }
        fn second_step(&self, df: u32, total_documents: u32) -> f64 {
            (total_documents as f64 / df as f64).ln()
        }
        fn describe(&self) -> String {
            "ExtendedCalculator".to_string()
        }
        fn get_total_term_frequency(&self) -> u32 {
            50
        }
        fn search_document_length(&self, doc: DocumentId) -> Option<u32> {
            Some(5 + doc)
        }
    }

    #[test]
    fn first_step_ex_uses_the_calculators_own_length_and_total_term_frequency() {
        let calculator = ExtendedCalculator;
        let buffer = vec![(1, 3), (2, 3)];
        let scored = first_step_ex(&calculator, &buffer, 10.0, 100);

        assert_eq!(scored.len(), 2);
        // search_document_length(1) = 6 < search_document_length(2) = 7, so
        // doc 1 gets the higher per-document score under the same tf.
        assert!(scored[0].score > scored[1].score);
    }
}

//! End-to-end scenarios and cross-cutting properties for the ranking
//! search core.

use fts_inverted::query_node::{DocumentId, LeafTerm, OperatorAnd, OperatorAndNot, OperatorOr, QueryNode, TermPostings};
use fts_inverted::{rank, Query, SortOrder};
use fts_inverted::calculator::{OkapiTfIdf, TfIdf};
use fts_inverted::index::DocumentSource;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

struct VecPostings {
    docs: Vec<(DocumentId, u32)>,
    cursor: usize,
}

impl VecPostings {
    fn new(docs: Vec<(DocumentId, u32)>) -> Self {
        Self { docs, cursor: 0 }
    }
}

impl TermPostings for VecPostings {
    fn next_geq(&mut self, doc: DocumentId) -> Option<(DocumentId, u32)> {
        while self.cursor < self.docs.len() && self.docs[self.cursor].0 < doc {
            self.cursor += 1;
        }
        self.docs.get(self.cursor).copied()
    }

    fn estimated_df(&self) -> u32 {
        self.docs.len() as u32
    }
}

struct FixedSource {
    avg_len: f64,
    total: u32,
}

impl DocumentSource for FixedSource {
    fn document_length(&self, _doc_id: DocumentId) -> Option<u32> {
        Some(self.avg_len as u32)
    }
    fn average_document_length(&self) -> f64 {
        self.avg_len
    }
    fn total_documents(&self) -> u32 {
        self.total
    }
    fn is_cancelled(&self) -> bool {
        false
    }
}

fn leaf(docs: Vec<(DocumentId, u32)>) -> Box<dyn QueryNode> {
    Box::new(LeafTerm::new(Box::new(VecPostings::new(docs)), Box::new(TfIdf::default()), 10.0, 3))
}

/// `(foo & bar) - baz` over docs `{1:"foo bar baz", 2:"foo bar", 3:"foo"}` →
/// result `{2}`.
#[test]
fn scenario_5_and_andnot_over_docs() {
    init_tracing();

    let foo = leaf(vec![(1, 1), (2, 1), (3, 1)]);
    let bar = leaf(vec![(1, 1), (2, 1)]);
    let baz = leaf(vec![(1, 1)]);

    let and: Box<dyn QueryNode> = Box::new(OperatorAnd { children: vec![foo, bar] });
    let mut root: Box<dyn QueryNode> = Box::new(OperatorAndNot { left: and, right: baz });

    let mut matched = Vec::new();
    let mut cursor = 0;
    while let Some(doc) = root.lower_bound(cursor) {
        matched.push(doc);
        cursor = doc + 1;
    }

    assert_eq!(matched, vec![2]);
}

/// Ranking query `foo bar` with `OkapiTfIdf:0.2:1:1`, avgLen = 10, N = 3,
/// `foo.df = 3, bar.df = 2` → docs with both terms rank above docs with
/// only one; ties broken by docID ascending.
#[test]
fn scenario_6_okapi_tfidf_ranks_both_term_docs_first() {
    init_tracing();

    let avg_len = 10.0;
    let foo_postings = VecPostings::new(vec![(1, 2), (2, 3), (3, 1)]);
    let bar_postings = VecPostings::new(vec![(1, 1), (3, 2)]);

    let calc = || Box::new(OkapiTfIdf { k: 1.0, x: 0.2, y: 1, ..OkapiTfIdf::default() });

    let foo: Box<dyn QueryNode> = Box::new(LeafTerm::new(Box::new(foo_postings), calc(), avg_len, 3));
    let bar: Box<dyn QueryNode> = Box::new(LeafTerm::new(Box::new(bar_postings), calc(), avg_len, 3));
    let or = OperatorOr::new(vec![foo, bar]);

    let mut query = Query::new(Box::new(or));
    let source = FixedSource { avg_len, total: 3 };

    let result = rank(&mut query, &source);
    let mut docs = result.documents().to_vec();
    docs.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap().then(a.doc_id.cmp(&b.doc_id)));

    // doc 1 and doc 3 both have foo and bar; doc 2 has only foo.
    let ids: Vec<_> = docs.iter().map(|d| d.doc_id).collect();
    assert!(ids.iter().position(|&d| d == 2).unwrap() > ids.iter().position(|&d| d == 1).unwrap());
    assert!(ids.iter().position(|&d| d == 2).unwrap() > ids.iter().position(|&d| d == 3).unwrap());
}

#[test]
fn andnot_property_excludes_right_hand_matches() {
    let left = leaf(vec![(1, 1), (2, 1), (3, 1)]);
    let right = leaf(vec![(2, 1)]);
    let mut node: Box<dyn QueryNode> = Box::new(OperatorAndNot { left, right });

    let mut matched = Vec::new();
    let mut cursor = 0;
    while let Some(doc) = node.lower_bound(cursor) {
        matched.push(doc);
        cursor = doc + 1;
    }
    assert_eq!(matched, vec![1, 3]);
}

#[test]
fn sort_order_round_trips_score_desc_and_asc() {
    use fts_inverted::{SearchResult, ScoredDocument};

    let docs = vec![
        ScoredDocument { doc_id: 1, score: 0.4, tf: 0 },
        ScoredDocument { doc_id: 2, score: 0.9, tf: 0 },
    ];
    let mut result = SearchResult::new(docs);
    result.sort(SortOrder::ScoreDesc);
    assert_eq!(result.documents()[0].doc_id, 2);
    result.sort(SortOrder::ScoreAsc);
    assert_eq!(result.documents()[0].doc_id, 1);
}

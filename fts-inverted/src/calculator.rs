//! Ranking score calculators and descriptor parsing.
//!
//! Each calculator splits scoring into `first_step` (per-document, uses `tf`
//! and document length) and `second_step` (per-term, uses `df` and the
//! total document count).

use crate::error::{Error, Result};
use crate::query_node::DocumentId;

/// A pluggable scoring formula. Implementors may live outside this crate —
/// callers can register their own calculator rather than being limited to
/// the built-in family.
pub trait ScoreCalculator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Per-document term contribution. `avg_doc_len` is the collection's
    /// average document length for calculators that length-normalize.
    fn first_step(&self, tf: u32, doc_len: u32, avg_doc_len: f64) -> f64;

    /// Per-term IDF-style contribution, combined with `first_step` by
    /// straight multiplication in the ranking engine.
    fn second_step(&self, df: u32, total_documents: u32) -> f64;

    /// Canonical `"Name:p1:p2:..."` form, used to persist and to reconstruct
    /// a calculator without knowing its concrete type.
    fn describe(&self) -> String;

    /// Total term frequency across the whole collection, an alternate
    /// `second_step` input some extended-first-step formulas prefer over
    /// document frequency. `0` for calculators that don't use it.
    fn get_total_term_frequency(&self) -> u32 {
        0
    }

    /// Document length at `doc`, when the calculator wants to look it up
    /// itself rather than rely on a single collection-wide
    /// `avg_doc_len` passed in from outside. `None` for calculators that
    /// don't need a per-document lookup.
    fn search_document_length(&self, _doc: DocumentId) -> Option<u32> {
        None
    }
}

/// `k1 + k2 * tf`, no length normalization; `secondStep` is a plain
/// Robertson-style `log(N/df)` IDF. The default calculator.
#[derive(Debug, Clone, Copy)]
pub struct TfIdf {
    pub k1: f64,
    pub k2: f64,
}

impl Default for TfIdf {
    fn default() -> Self {
        Self { k1: 0.0, k2: 1.0 }
    }
}

impl ScoreCalculator for TfIdf {
    fn name(&self) -> &'static str {
        "TfIdf"
    }

    fn first_step(&self, tf: u32, _doc_len: u32, _avg_doc_len: f64) -> f64 {
        self.k1 + self.k2 * tf as f64
    }

    fn second_step(&self, df: u32, total_documents: u32) -> f64 {
        if df == 0 || total_documents == 0 {
            return 0.0;
        }
        (total_documents as f64 / df as f64).ln()
    }

    fn describe(&self) -> String {
        format!("TfIdf:{}:{}", self.k1, self.k2)
    }
}

/// `tf / (k + tf)` (spec's saturating TF calculator).
#[derive(Debug, Clone, Copy)]
pub struct OkapiTf {
    pub k: f64,
}

impl Default for OkapiTf {
    fn default() -> Self {
        Self { k: 1.0 }
    }
}

impl ScoreCalculator for OkapiTf {
    fn name(&self) -> &'static str {
        "OkapiTf"
    }

    fn first_step(&self, tf: u32, _doc_len: u32, _avg_doc_len: f64) -> f64 {
        tf as f64 / (self.k + tf as f64)
    }

    fn second_step(&self, _df: u32, _total_documents: u32) -> f64 {
        1.0
    }

    fn describe(&self) -> String {
        format!("OkapiTf:{}", self.k)
    }
}

/// `tf / (k * ((1 - lambda) + lambda * doc_len / avg_doc_len))` — OkapiTf
/// with BM25-style document-length normalization.
#[derive(Debug, Clone, Copy)]
pub struct NormalizedOkapiTf {
    pub k: f64,
    pub lambda: f64,
}

impl Default for NormalizedOkapiTf {
    fn default() -> Self {
        Self { k: 1.0, lambda: 0.25 }
    }
}

impl ScoreCalculator for NormalizedOkapiTf {
    fn name(&self) -> &'static str {
        "NormalizedOkapiTf"
    }

    fn first_step(&self, tf: u32, doc_len: u32, avg_doc_len: f64) -> f64 {
        if avg_doc_len == 0.0 || self.lambda == 0.0 {
            return tf as f64 / (self.k + tf as f64);
        }
        let norm = (1.0 - self.lambda) + self.lambda * (doc_len as f64 / avg_doc_len);
        tf as f64 / (self.k * norm + tf as f64)
    }

    fn second_step(&self, _df: u32, _total_documents: u32) -> f64 {
        1.0
    }

    fn describe(&self) -> String {
        format!("NormalizedOkapiTf:{}:{}", self.k, self.lambda)
    }
}

/// The `y`-selected family of `secondStep` formulas: `y` selects among
/// several published IDF variants (Ogawa, Robertson, Harper/Croft).
#[derive(Debug, Clone, Copy)]
pub struct OkapiTfIdf {
    pub k: f64,
    pub x: f64,
    pub y: i32,
    pub q: f64,
    pub a: f64,
    pub s: f64,
}

impl Default for OkapiTfIdf {
    fn default() -> Self {
        Self {
            k: 1.0,
            x: 0.2,
            y: 1,
            q: 0.0,
            a: 0.0,
            s: 1.0,
        }
    }
}

impl ScoreCalculator for OkapiTfIdf {
    fn name(&self) -> &'static str {
        "OkapiTfIdf"
    }

    fn first_step(&self, tf: u32, _doc_len: u32, _avg_doc_len: f64) -> f64 {
        tf as f64 / (self.k + tf as f64)
    }

    fn second_step(&self, df: u32, total_documents: u32) -> f64 {
        let (n, df) = (total_documents as f64, df as f64);
        if df == 0.0 || n == 0.0 {
            return 0.0;
        }
        match self.y {
            1 => {
                if self.x == 0.0 {
                    return 1.0;
                }
                (1.0 + self.x * n / df).ln() / (1.0 + self.x * n).ln()
            }
            4 => (1.0 + self.x / (1.0 - self.x) * n / df).ln(),
            6 => {
                ((self.x * n + df) / (self.q * n + df)).ln() / ((self.x * n + 1.0) / (self.q * n + 1.0)).ln()
            }
            7 => ((self.x * n + df) / (self.q * n + df)).ln(),
            0 => (self.x + (n / df).ln()) / (self.x + n.ln()),
            3 => (self.x / (1.0 - self.x) * n / df).ln(),
            2 => (self.x + ((n - df) / df).ln()) / (self.x + (n - 1.0).ln()),
            5 => (self.x / (1.0 - self.x) * (n - df) / df).ln(),
            8 => {
                let t = df / (n - df);
                if self.x == 1.0 {
                    return 0.0;
                }
                (((self.x + (1.0 + self.a) * t) / (1.0 - self.x)) / ((self.q + t) / (1.0 - self.q))).ln()
            }
            9 => {
                let tmp1 = n / df;
                let tmp2 = tmp1.powf(self.s);
                (((self.x + (1.0 + self.a) / (1.0 - tmp2)) / (1.0 - self.x)) / (self.q + 1.0 / (tmp1 - 1.0)) * (1.0 - self.q)).ln()
            }
            _ => 0.0,
        }
    }

    fn describe(&self) -> String {
        let mut s = format!("OkapiTfIdf:{}:{}:{}", self.k, self.x, self.y);
        if self.y >= 6 {
            s.push_str(&format!(":{}", self.q));
        }
        if self.y >= 8 {
            s.push_str(&format!(":{}", self.a));
        }
        if self.y >= 9 {
            s.push_str(&format!(":{}", self.s));
        }
        s
    }
}

fn parse_param(parts: &[&str], index: usize) -> Result<Option<f64>> {
    match parts.get(index) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<f64>()
            .map(Some)
            .map_err(|_| Error::InvalidCalculatorParameter(raw.to_string())),
    }
}

/// Parses the `"Name:p1:p2:..."` descriptor form, e.g.
/// `"OkapiTfIdf:0.2:1:1"`.
pub fn parse_descriptor(descriptor: &str) -> Result<Box<dyn ScoreCalculator>> {
    let mut parts = descriptor.split(':');
    let name = parts.next().unwrap_or("");
    let rest: Vec<&str> = parts.collect();

    match name {
        "TfIdf" => {
            let mut c = TfIdf::default();
            if let Some(k1) = parse_param(&rest, 0)? {
                c.k1 = k1;
            }
            if let Some(k2) = parse_param(&rest, 1)? {
                c.k2 = k2;
            }
            Ok(Box::new(c))
        }
        "OkapiTf" => {
            let mut c = OkapiTf::default();
            if let Some(k) = parse_param(&rest, 0)? {
                c.k = k;
            }
            Ok(Box::new(c))
        }
        "NormalizedOkapiTf" => {
            let mut c = NormalizedOkapiTf::default();
            if let Some(k) = parse_param(&rest, 0)? {
                c.k = k;
            }
            if let Some(lambda) = parse_param(&rest, 1)? {
                c.lambda = lambda;
            }
            Ok(Box::new(c))
        }
        "OkapiTfIdf" => {
            let mut c = OkapiTfIdf::default();
            if let Some(k) = parse_param(&rest, 0)? {
                c.k = k;
            }
            if let Some(x) = parse_param(&rest, 1)? {
                c.x = x;
            }
            if let Some(y) = parse_param(&rest, 2)? {
                c.y = y as i32;
            }
            if let Some(q) = parse_param(&rest, 3)? {
                c.q = q;
            }
            if let Some(a) = parse_param(&rest, 4)? {
                c.a = a;
            }
            if let Some(s) = parse_param(&rest, 5)? {
                c.s = s;
            }
            Ok(Box::new(c))
        }
        other => Err(Error::InvalidCalculator(other.to_string())),
    }
}

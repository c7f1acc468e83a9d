//! Sorted Sets over a Document Store
//!
//! Redis-style sorted-set semantics (rank windows, score and lex ranges,
//! ranks, increments, bulk iteration) emulated with nothing but the generic
//! find/count/upsert/delete/cursor surface of a [`DocumentStore`].
//!
//! Every entry is a `(key, member, score)` document; `(key, member)` is
//! unique. Order within a set is score ascending, ties broken by member in
//! codepoint order.
//!
//! ## Components
//!
//! - `window`: rank-range resolver (negative ranks, flipped reads)
//! - `range`: by-rank and by-score reads
//! - `lex`: bound tokens, by-lex reads, lex count, remove by lex
//! - `lookup`: score, membership, rank, cardinality, batched variants
//! - `incr`: increment-and-insert with duplicate-key retry
//! - `process`: paced, batch-bounded cursor iteration
//!
//! ## Usage
//!
//! ```rust,ignore
//! let engine = SortedSetEngine::new(InMemoryDocumentStore::new());
//! engine.increment_by("leaders", "alice", 10.0).await?;
//! let top = engine.rev_range_with_scores("leaders", 0, 9).await?;
//! ```

pub mod dst;
pub mod error;
pub mod incr;
pub mod lex;
pub mod lookup;
pub mod member;
pub mod process;
pub mod range;
pub mod window;

pub use dst::{
    run_engine_dst_batch, summarize_batch, EngineDSTConfig, EngineDSTResult,
    SortedSetEngineDSTHarness,
};
pub use error::{BoxError, ZsetError, ZsetResult};
pub use lex::LexPage;
pub use member::ToMember;
pub use process::{ProcessOptions, ProcessStats};
pub use window::{RankWindow, ResolvedWindow, WindowPlan};

use crate::config::EngineConfig;
use crate::store::{Document, DocumentStore, ScorePredicate, StoreError};
use std::ops::Bound;

/// One or more set identifiers. Empty identifiers are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SetKeys(Vec<String>);

impl SetKeys {
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        SetKeys(
            keys.into_iter()
                .map(Into::into)
                .filter(|k: &String| !k.is_empty())
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<&str> for SetKeys {
    fn from(key: &str) -> Self {
        SetKeys::new([key])
    }
}

impl From<String> for SetKeys {
    fn from(key: String) -> Self {
        SetKeys::new([key])
    }
}

impl From<&String> for SetKeys {
    fn from(key: &String) -> Self {
        SetKeys::new([key.as_str()])
    }
}

impl From<Vec<String>> for SetKeys {
    fn from(keys: Vec<String>) -> Self {
        SetKeys::new(keys)
    }
}

impl From<Vec<&str>> for SetKeys {
    fn from(keys: Vec<&str>) -> Self {
        SetKeys::new(keys)
    }
}

impl From<&[String]> for SetKeys {
    fn from(keys: &[String]) -> Self {
        SetKeys::new(keys.iter().map(String::as_str))
    }
}

impl From<&[&str]> for SetKeys {
    fn from(keys: &[&str]) -> Self {
        SetKeys::new(keys.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for SetKeys {
    fn from(keys: [&str; N]) -> Self {
        SetKeys::new(keys)
    }
}

/// Member paired with its score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember {
    pub member: String,
    pub score: f64,
}

impl ScoredMember {
    pub fn new(member: impl Into<String>, score: f64) -> Self {
        ScoredMember {
            member: member.into(),
            score,
        }
    }

    pub(crate) fn from_document(doc: Document) -> Result<Self, StoreError> {
        match doc.score {
            Some(score) => Ok(ScoredMember {
                member: doc.value,
                score,
            }),
            None => Err(StoreError::Malformed(format!(
                "score missing for member {:?}",
                doc.value
            ))),
        }
    }
}

/// Entry handed to a `process_all` sink. `score` is set only when scores
/// were requested.
#[derive(Debug, Clone, PartialEq)]
pub struct SetItem {
    pub member: String,
    pub score: Option<f64>,
}

impl From<Document> for SetItem {
    fn from(doc: Document) -> Self {
        SetItem {
            member: doc.value,
            score: doc.score,
        }
    }
}

/// Inclusive score bounds. Infinite bounds are open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreRange {
    pub min: f64,
    pub max: f64,
}

impl Default for ScoreRange {
    fn default() -> Self {
        ScoreRange::ALL
    }
}

impl ScoreRange {
    pub const ALL: ScoreRange = ScoreRange {
        min: f64::NEG_INFINITY,
        max: f64::INFINITY,
    };

    pub fn new(min: f64, max: f64) -> Self {
        ScoreRange { min, max }
    }

    pub fn at_least(min: f64) -> Self {
        ScoreRange { min, ..Self::ALL }
    }

    pub fn at_most(max: f64) -> Self {
        ScoreRange { max, ..Self::ALL }
    }

    /// Equal bounds collapse to an exact match
    pub(crate) fn predicate(&self) -> ScorePredicate {
        if self.min == self.max {
            return ScorePredicate::Eq(self.min);
        }
        let min = if self.min == f64::NEG_INFINITY {
            Bound::Unbounded
        } else {
            Bound::Included(self.min)
        };
        let max = if self.max == f64::INFINITY {
            Bound::Unbounded
        } else {
            Bound::Included(self.max)
        };
        match (min, max) {
            (Bound::Unbounded, Bound::Unbounded) => ScorePredicate::Any,
            (min, max) => ScorePredicate::Range { min, max },
        }
    }
}

/// Sorted-set engine over a document store
#[derive(Debug, Clone)]
pub struct SortedSetEngine<S> {
    store: S,
    config: EngineConfig,
}

impl<S: DocumentStore> SortedSetEngine<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: S, config: EngineConfig) -> Self {
        SortedSetEngine { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_keys_drop_empty() {
        assert!(SetKeys::from("").is_empty());
        assert_eq!(SetKeys::from(["a", "", "b"]).as_slice(), ["a", "b"]);
        assert_eq!(SetKeys::from(vec!["x".to_string()]).len(), 1);
    }

    #[test]
    fn test_score_range_predicate() {
        assert_eq!(ScoreRange::ALL.predicate(), ScorePredicate::Any);
        assert_eq!(ScoreRange::new(3.0, 3.0).predicate(), ScorePredicate::Eq(3.0));
        assert_eq!(
            ScoreRange::at_least(1.0).predicate(),
            ScorePredicate::Range {
                min: Bound::Included(1.0),
                max: Bound::Unbounded,
            }
        );
        assert!(ScoreRange::new(1.0, 2.0).predicate().matches(2.0));
        assert!(!ScoreRange::new(1.0, 2.0).predicate().matches(2.5));
    }

    #[test]
    fn test_scored_member_requires_score() {
        let doc = Document {
            key: None,
            value: "a".into(),
            score: None,
        };
        assert!(matches!(
            ScoredMember::from_document(doc),
            Err(StoreError::Malformed(_))
        ));
    }
}

//! Typed filter builder
//!
//! A `Filter` is a conjunction of one predicate per entry field. A `Query`
//! is either a single filter or a disjunction of filters (`AnyOf`), which is
//! all the rank computation needs from a `$or`.

use std::cmp::Ordering;
use std::ops::Bound;

/// Predicate over the set identifier
#[derive(Debug, Clone, PartialEq)]
pub enum KeyPredicate {
    Eq(String),
    In(Vec<String>),
}

impl KeyPredicate {
    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyPredicate::Eq(k) => k == key,
            KeyPredicate::In(keys) => keys.iter().any(|k| k == key),
        }
    }
}

/// Predicate over the score
#[derive(Debug, Clone, PartialEq)]
pub enum ScorePredicate {
    Any,
    Eq(f64),
    Range { min: Bound<f64>, max: Bound<f64> },
}

impl ScorePredicate {
    pub fn matches(&self, score: f64) -> bool {
        match self {
            ScorePredicate::Any => true,
            ScorePredicate::Eq(s) => score == *s,
            ScorePredicate::Range { min, max } => {
                above(min, &score, |a, b| a.partial_cmp(b))
                    && below(max, &score, |a, b| a.partial_cmp(b))
            }
        }
    }
}

/// Predicate over the member string (codepoint order)
#[derive(Debug, Clone, PartialEq)]
pub enum ValuePredicate {
    Any,
    Eq(String),
    In(Vec<String>),
    Range { min: Bound<String>, max: Bound<String> },
}

impl ValuePredicate {
    pub fn matches(&self, value: &str) -> bool {
        match self {
            ValuePredicate::Any => true,
            ValuePredicate::Eq(v) => v == value,
            ValuePredicate::In(values) => values.iter().any(|v| v == value),
            ValuePredicate::Range { min, max } => {
                let cmp = |bound: &String, v: &&str| Some(bound.as_str().cmp(*v));
                above(min, &value, cmp) && below(max, &value, cmp)
            }
        }
    }
}

fn above<B, V>(bound: &Bound<B>, value: &V, cmp: impl Fn(&B, &V) -> Option<Ordering>) -> bool {
    match bound {
        Bound::Unbounded => true,
        Bound::Included(b) => matches!(cmp(b, value), Some(Ordering::Less | Ordering::Equal)),
        Bound::Excluded(b) => matches!(cmp(b, value), Some(Ordering::Less)),
    }
}

fn below<B, V>(bound: &Bound<B>, value: &V, cmp: impl Fn(&B, &V) -> Option<Ordering>) -> bool {
    match bound {
        Bound::Unbounded => true,
        Bound::Included(b) => matches!(cmp(b, value), Some(Ordering::Greater | Ordering::Equal)),
        Bound::Excluded(b) => matches!(cmp(b, value), Some(Ordering::Greater)),
    }
}

/// Conjunction of per-field predicates
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub key: KeyPredicate,
    pub score: ScorePredicate,
    pub value: ValuePredicate,
}

impl Filter {
    /// Entries of one set
    pub fn key(key: impl Into<String>) -> Self {
        Filter {
            key: KeyPredicate::Eq(key.into()),
            score: ScorePredicate::Any,
            value: ValuePredicate::Any,
        }
    }

    /// Entries of any of the given sets. A single key collapses to `Eq`.
    pub fn keys(mut keys: Vec<String>) -> Self {
        let key = if keys.len() == 1 {
            KeyPredicate::Eq(keys.swap_remove(0))
        } else {
            KeyPredicate::In(keys)
        };
        Filter {
            key,
            score: ScorePredicate::Any,
            value: ValuePredicate::Any,
        }
    }

    pub fn score(mut self, predicate: ScorePredicate) -> Self {
        self.score = predicate;
        self
    }

    pub fn score_eq(self, score: f64) -> Self {
        self.score(ScorePredicate::Eq(score))
    }

    pub fn score_range(self, min: Bound<f64>, max: Bound<f64>) -> Self {
        self.score(ScorePredicate::Range { min, max })
    }

    pub fn value(mut self, predicate: ValuePredicate) -> Self {
        self.value = predicate;
        self
    }

    pub fn value_eq(self, value: impl Into<String>) -> Self {
        self.value(ValuePredicate::Eq(value.into()))
    }

    pub fn value_in(self, values: Vec<String>) -> Self {
        self.value(ValuePredicate::In(values))
    }

    pub fn value_range(self, min: Bound<String>, max: Bound<String>) -> Self {
        self.value(ValuePredicate::Range { min, max })
    }

    pub fn matches(&self, key: &str, value: &str, score: f64) -> bool {
        self.key.matches(key) && self.value.matches(value) && self.score.matches(score)
    }
}

/// What a store operation selects
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Filter(Filter),
    /// Entries matching at least one filter (each entry counted once)
    AnyOf(Vec<Filter>),
}

impl Query {
    pub fn matches(&self, key: &str, value: &str, score: f64) -> bool {
        match self {
            Query::Filter(f) => f.matches(key, value, score),
            Query::AnyOf(filters) => filters.iter().any(|f| f.matches(key, value, score)),
        }
    }
}

impl From<Filter> for Query {
    fn from(filter: Filter) -> Self {
        Query::Filter(filter)
    }
}

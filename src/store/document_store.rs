//! Document Store Abstraction
//!
//! The sorted-set layer talks to its backing store only through this trait,
//! mirroring the generic query surface a document database offers:
//! filter + sort + skip + limit, count, an upserting find-and-increment,
//! delete-many, and a forward cursor.
//!
//! Implementations:
//! - `InMemoryDocumentStore`: For unit tests and DST
//! - `SimulatedDocumentStore`: Fault-injecting wrapper for DST

use super::filter::Query;
use std::future::Future;
use std::pin::Pin;

/// Projected view of a stored entry.
///
/// `value` is always present; `key` and `score` are `None` when the
/// projection excluded them.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub key: Option<String>,
    pub value: String,
    pub score: Option<f64>,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn reversed(self) -> Self {
        match self {
            Direction::Ascending => Direction::Descending,
            Direction::Descending => Direction::Ascending,
        }
    }
}

/// Field to sort on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    /// Score, ties broken by value in the same direction
    Score,
    /// Value only (lexicographic queries)
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub field: SortField,
    pub direction: Direction,
}

impl Sort {
    pub fn by_score(direction: Direction) -> Self {
        Sort {
            field: SortField::Score,
            direction,
        }
    }

    pub fn by_value(direction: Direction) -> Self {
        Sort {
            field: SortField::Value,
            direction,
        }
    }
}

/// Which optional fields come back. Storage-internal ids never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Projection {
    pub key: bool,
    pub score: bool,
}

impl Projection {
    pub const VALUE: Projection = Projection {
        key: false,
        score: false,
    };
    pub const VALUE_SCORE: Projection = Projection {
        key: false,
        score: true,
    };
    pub const KEY_VALUE: Projection = Projection {
        key: true,
        score: false,
    };
    pub const ALL: Projection = Projection {
        key: true,
        score: true,
    };
}

/// Options for `DocumentStore::find`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FindOptions {
    pub sort: Option<Sort>,
    pub skip: u64,
    /// `None` = unlimited. There is no zero-means-unlimited convention here.
    pub limit: Option<u64>,
    pub projection: Projection,
}

impl FindOptions {
    pub fn new(projection: Projection) -> Self {
        FindOptions {
            projection,
            ..Default::default()
        }
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }
}

/// Options for `DocumentStore::open_cursor`
#[derive(Debug, Clone, PartialEq)]
pub struct CursorOptions {
    pub sort: Option<Sort>,
    pub projection: Projection,
    /// Documents fetched per round trip
    pub batch_size: usize,
}

/// Error type for document store operations
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Unique (key, value) constraint violated by a concurrent insert
    DuplicateKey(String),
    /// Store unreachable or operation timed out
    Unavailable(String),
    /// Cursor used after close
    CursorClosed,
    /// Store returned a document that does not match the requested projection
    Malformed(String),
    /// Other errors
    Other(String),
}

impl StoreError {
    /// The race-on-first-insert class that an upsert may report
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, StoreError::DuplicateKey(_))
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::DuplicateKey(id) => write!(f, "Duplicate key error: {}", id),
            StoreError::Unavailable(msg) => write!(f, "Store unavailable: {}", msg),
            StoreError::CursorClosed => write!(f, "Cursor already closed"),
            StoreError::Malformed(msg) => write!(f, "Malformed document: {}", msg),
            StoreError::Other(msg) => write!(f, "Store error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Boxed future returned by store operations
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Document store abstraction trait
///
/// Follows the boxed-future shape of the object store trait so the same
/// store can be swapped for a simulated one in DST.
pub trait DocumentStore: Send + Sync + 'static {
    /// Filter, sort, skip, limit, project
    fn find<'a>(
        &'a self,
        query: &'a Query,
        options: &'a FindOptions,
    ) -> StoreFuture<'a, Vec<Document>>;

    /// Number of entries matching the query
    fn count<'a>(&'a self, query: &'a Query) -> StoreFuture<'a, u64>;

    /// Add `delta` to the score of `(key, value)`, inserting it with
    /// `score = delta` when absent. Returns the updated document with key
    /// and score projected.
    ///
    /// The absent path is not atomic with a concurrent insert of the same
    /// pair; the loser fails with `StoreError::DuplicateKey`.
    fn find_one_and_increment<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        delta: f64,
    ) -> StoreFuture<'a, Document>;

    /// Delete every matching entry. Returns the number deleted.
    fn delete_many<'a>(&'a self, query: &'a Query) -> StoreFuture<'a, u64>;

    /// Open a forward-only cursor
    fn open_cursor<'a>(
        &'a self,
        query: &'a Query,
        options: &'a CursorOptions,
    ) -> StoreFuture<'a, Box<dyn DocumentCursor>>;
}

/// Forward-only cursor over query results
pub trait DocumentCursor: Send {
    /// Next document, or `None` once the results are exhausted
    fn next(&mut self) -> StoreFuture<'_, Option<Document>>;

    /// Release server-side resources. Idempotent.
    fn close(&mut self) -> StoreFuture<'_, ()>;
}

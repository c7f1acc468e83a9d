//! In-memory document store for unit tests and deterministic simulation
//!
//! Entries live in one shared collection keyed by `(key, value)`, which is
//! the uniqueness constraint of a sorted set. The handle is cheap to clone;
//! clones share the same collection.
//!
//! `find_one_and_increment` reproduces the upsert race of real document
//! stores: the update path is atomic, but the insert path is a second round
//! trip, so two writers creating the same pair concurrently both miss the
//! lookup and the slower one fails with `StoreError::DuplicateKey`.

use super::document_store::{
    CursorOptions, Direction, Document, DocumentCursor, DocumentStore, FindOptions, Projection,
    Sort, SortField, StoreError, StoreFuture,
};
use super::filter::Query;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Collection {
    entries: BTreeMap<(String, String), f64>,
}

impl Collection {
    fn select(
        &self,
        query: &Query,
        sort: Option<Sort>,
        skip: u64,
        limit: Option<u64>,
        projection: Projection,
    ) -> Vec<Document> {
        let mut matched: Vec<(&str, &str, f64)> = self
            .entries
            .iter()
            .filter(|((key, value), score)| query.matches(key, value, **score))
            .map(|((key, value), score)| (key.as_str(), value.as_str(), *score))
            .collect();

        if let Some(sort) = sort {
            matched.sort_by(|a, b| compare(sort, a, b));
        }

        let skip = usize::try_from(skip).unwrap_or(usize::MAX);
        let limit = limit.map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));

        matched
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|(key, value, score)| Document {
                key: projection.key.then(|| key.to_string()),
                value: value.to_string(),
                score: projection.score.then_some(score),
            })
            .collect()
    }
}

/// Compound index order: `(score, value, key)` or `(value, key)`
fn compare(sort: Sort, a: &(&str, &str, f64), b: &(&str, &str, f64)) -> Ordering {
    let ordering = match sort.field {
        SortField::Score => a
            .2
            .partial_cmp(&b.2)
            .unwrap_or_else(|| a.2.total_cmp(&b.2))
            .then_with(|| a.1.cmp(b.1)),
        SortField::Value => a.1.cmp(b.1),
    }
    .then_with(|| a.0.cmp(b.0));

    match sort.direction {
        Direction::Ascending => ordering,
        Direction::Descending => ordering.reverse(),
    }
}

#[derive(Debug, Default)]
struct Counters {
    open_cursors: AtomicUsize,
    duplicate_key_errors: AtomicU64,
}

/// In-memory document store
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentStore {
    collection: Arc<RwLock<Collection>>,
    counters: Arc<Counters>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an entry. Returns true if the pair was new.
    ///
    /// Stands in for the add/union collaborators that produce entries.
    pub fn insert(&self, key: &str, value: &str, score: f64) -> bool {
        self.collection
            .write()
            .entries
            .insert((key.to_string(), value.to_string()), score)
            .is_none()
    }

    /// Number of entries across all sets
    pub fn len(&self) -> usize {
        self.collection.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collection.read().entries.is_empty()
    }

    /// Cursors opened and not yet closed or dropped
    pub fn open_cursors(&self) -> usize {
        self.counters.open_cursors.load(AtomicOrdering::SeqCst)
    }

    /// Upserts that lost an insert race
    pub fn duplicate_key_errors(&self) -> u64 {
        self.counters.duplicate_key_errors.load(AtomicOrdering::SeqCst)
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn find<'a>(
        &'a self,
        query: &'a Query,
        options: &'a FindOptions,
    ) -> StoreFuture<'a, Vec<Document>> {
        Box::pin(async move {
            Ok(self.collection.read().select(
                query,
                options.sort,
                options.skip,
                options.limit,
                options.projection,
            ))
        })
    }

    fn count<'a>(&'a self, query: &'a Query) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            let collection = self.collection.read();
            let count = collection
                .entries
                .iter()
                .filter(|((key, value), score)| query.matches(key, value, **score))
                .count();
            Ok(count as u64)
        })
    }

    fn find_one_and_increment<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        delta: f64,
    ) -> StoreFuture<'a, Document> {
        Box::pin(async move {
            let id = (key.to_string(), value.to_string());

            {
                let mut collection = self.collection.write();
                if let Some(score) = collection.entries.get_mut(&id) {
                    *score += delta;
                    let updated = *score;
                    return Ok(Document {
                        key: Some(id.0),
                        value: id.1,
                        score: Some(updated),
                    });
                }
            }

            // Not found: the insert is a separate round trip
            tokio::task::yield_now().await;

            let mut collection = self.collection.write();
            match collection.entries.entry(id) {
                Entry::Occupied(entry) => {
                    self.counters
                        .duplicate_key_errors
                        .fetch_add(1, AtomicOrdering::SeqCst);
                    let (key, value) = entry.key();
                    Err(StoreError::DuplicateKey(format!("{}/{}", key, value)))
                }
                Entry::Vacant(entry) => {
                    let (key, value) = entry.key().clone();
                    entry.insert(delta);
                    Ok(Document {
                        key: Some(key),
                        value,
                        score: Some(delta),
                    })
                }
            }
        })
    }

    fn delete_many<'a>(&'a self, query: &'a Query) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            let mut collection = self.collection.write();
            let before = collection.entries.len();
            collection
                .entries
                .retain(|(key, value), score| !query.matches(key, value, *score));
            Ok((before - collection.entries.len()) as u64)
        })
    }

    fn open_cursor<'a>(
        &'a self,
        query: &'a Query,
        options: &'a CursorOptions,
    ) -> StoreFuture<'a, Box<dyn DocumentCursor>> {
        Box::pin(async move {
            self.counters.open_cursors.fetch_add(1, AtomicOrdering::SeqCst);
            let cursor = InMemoryCursor {
                collection: Arc::clone(&self.collection),
                counters: Arc::clone(&self.counters),
                query: query.clone(),
                sort: options.sort,
                projection: options.projection,
                batch_size: options.batch_size.max(1),
                position: 0,
                buffer: VecDeque::new(),
                exhausted: false,
                closed: false,
            };
            Ok(Box::new(cursor) as Box<dyn DocumentCursor>)
        })
    }
}

/// Cursor that pages through the collection `batch_size` documents at a time
pub struct InMemoryCursor {
    collection: Arc<RwLock<Collection>>,
    counters: Arc<Counters>,
    query: Query,
    sort: Option<Sort>,
    projection: Projection,
    batch_size: usize,
    position: u64,
    buffer: VecDeque<Document>,
    exhausted: bool,
    closed: bool,
}

impl InMemoryCursor {
    fn fetch_batch(&mut self) {
        let batch = self.collection.read().select(
            &self.query,
            self.sort,
            self.position,
            Some(self.batch_size as u64),
            self.projection,
        );
        if batch.len() < self.batch_size {
            self.exhausted = true;
        }
        self.position += batch.len() as u64;
        self.buffer.extend(batch);
    }

    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            self.buffer.clear();
            self.counters.open_cursors.fetch_sub(1, AtomicOrdering::SeqCst);
        }
    }
}

impl DocumentCursor for InMemoryCursor {
    fn next(&mut self) -> StoreFuture<'_, Option<Document>> {
        Box::pin(async move {
            if self.closed {
                return Err(StoreError::CursorClosed);
            }
            if self.buffer.is_empty() && !self.exhausted {
                self.fetch_batch();
            }
            Ok(self.buffer.pop_front())
        })
    }

    fn close(&mut self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.release();
            Ok(())
        })
    }
}

impl Drop for InMemoryCursor {
    fn drop(&mut self) {
        self.release();
    }
}

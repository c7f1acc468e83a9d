//! Bulk Cursor Processor
//!
//! Streams every entry of a set, score ascending, to a caller-supplied sink
//! in batches of at most `batch_size`, optionally pausing between batches so
//! neither the sink nor the store is flooded.
//!
//! ## State machine
//!
//! ```text
//!            ┌──────────── batch not full ───────────┐
//!            v                                       │
//!        Fetching ── element ──> Buffering ──────────┘
//!         │    │                     │ batch full
//!   end,  │    │ end, batch          v
//!   empty │    └── non-empty ──> Flushing ──> Pausing ──> Fetching
//!         v                          │ after end
//!        Done <──────────────────────┘
//! ```
//!
//! Any cursor or sink error ends the run. The cursor is closed on every
//! exit path.

use super::{BoxError, SetItem, SortedSetEngine, ZsetError, ZsetResult};
use crate::config::ProcessConfig;
use crate::store::{
    CursorOptions, Direction, DocumentCursor, DocumentStore, Filter, Projection, Query, Sort,
};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Options for [`SortedSetEngine::process_all`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOptions {
    /// Maximum items per sink call. Also the cursor's fetch size.
    pub batch_size: usize,
    /// Include scores in the items handed to the sink
    pub with_scores: bool,
    /// Pause between batches. Zero disables pacing.
    pub interval: Duration,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        ProcessOptions::from(&ProcessConfig::default())
    }
}

impl From<&ProcessConfig> for ProcessOptions {
    fn from(config: &ProcessConfig) -> Self {
        ProcessOptions {
            batch_size: config.batch_size,
            with_scores: config.with_scores,
            interval: config.interval,
        }
    }
}

impl ProcessOptions {
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_scores(mut self, with_scores: bool) -> Self {
        self.with_scores = with_scores;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Summary of a completed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessStats {
    /// Sink invocations
    pub batches: u64,
    /// Items delivered across all batches
    pub items: u64,
}

/// Upper bound on the per-batch preallocation; larger batches grow on demand
const MAX_BATCH_PREALLOC: usize = 1024;

enum State {
    Fetching,
    Buffering(SetItem),
    Flushing { exhausted: bool },
    Pausing,
    Done,
}

async fn drive<F, Fut, E>(
    cursor: &mut dyn DocumentCursor,
    sink: &mut F,
    options: &ProcessOptions,
) -> ZsetResult<ProcessStats>
where
    F: FnMut(Vec<SetItem>) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Into<BoxError>,
{
    let capacity = options.batch_size.min(MAX_BATCH_PREALLOC);
    let mut batch: Vec<SetItem> = Vec::with_capacity(capacity);
    let mut stats = ProcessStats::default();
    let mut state = State::Fetching;

    loop {
        state = match state {
            State::Fetching => match cursor.next().await? {
                Some(doc) => State::Buffering(SetItem::from(doc)),
                None if batch.is_empty() => State::Done,
                None => State::Flushing { exhausted: true },
            },
            State::Buffering(item) => {
                batch.push(item);
                if batch.len() >= options.batch_size {
                    State::Flushing { exhausted: false }
                } else {
                    State::Fetching
                }
            }
            State::Flushing { exhausted } => {
                let items = std::mem::replace(&mut batch, Vec::with_capacity(capacity));
                let len = items.len() as u64;
                sink(items).await.map_err(|e| ZsetError::Sink(e.into()))?;
                stats.batches += 1;
                stats.items += len;
                debug!("flushed batch {} ({} items)", stats.batches, len);
                if exhausted {
                    State::Done
                } else {
                    State::Pausing
                }
            }
            State::Pausing => {
                if !options.interval.is_zero() {
                    tokio::time::sleep(options.interval).await;
                }
                State::Fetching
            }
            State::Done => return Ok(stats),
        };
    }
}

impl<S: DocumentStore> SortedSetEngine<S> {
    /// Hand every entry of `key` to `sink`, score ascending, in batches.
    ///
    /// Returns once the cursor is exhausted and the final partial batch has
    /// been flushed. A failing sink ends the run with [`ZsetError::Sink`].
    pub async fn process_all<F, Fut, E>(
        &self,
        key: &str,
        mut sink: F,
        options: ProcessOptions,
    ) -> ZsetResult<ProcessStats>
    where
        F: FnMut(Vec<SetItem>) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Into<BoxError>,
    {
        if options.batch_size == 0 {
            return Err(ZsetError::invalid("process_all batch_size must be > 0"));
        }
        if key.is_empty() {
            return Ok(ProcessStats::default());
        }

        let query = Query::from(Filter::key(key));
        let cursor_options = CursorOptions {
            sort: Some(Sort::by_score(Direction::Ascending)),
            projection: if options.with_scores {
                Projection::VALUE_SCORE
            } else {
                Projection::VALUE
            },
            batch_size: options.batch_size,
        };
        let mut cursor = self.store.open_cursor(&query, &cursor_options).await?;

        let result = drive(&mut *cursor, &mut sink, &options).await;
        let closed = cursor.close().await;

        match (result, closed) {
            (Ok(stats), Ok(())) => {
                info!(
                    "processed {}: {} items in {} batches",
                    key, stats.items, stats.batches
                );
                Ok(stats)
            }
            (Ok(_), Err(e)) => {
                error!("processed {} but failed to close cursor: {}", key, e);
                Err(e.into())
            }
            (Err(e), Ok(())) => {
                error!("processing {} failed: {}", key, e);
                Err(e)
            }
            (Err(e), Err(close_err)) => {
                error!("processing {} failed: {}", key, e);
                warn!("failed to close cursor for {}: {}", key, close_err);
                Err(e)
            }
        }
    }

    /// [`Self::process_all`] with the engine's configured defaults
    pub async fn process_all_default<F, Fut, E>(&self, key: &str, sink: F) -> ZsetResult<ProcessStats>
    where
        F: FnMut(Vec<SetItem>) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Into<BoxError>,
    {
        let options = ProcessOptions::from(&self.config.process);
        self.process_all(key, sink, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryDocumentStore;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn engine_with(n: usize) -> SortedSetEngine<InMemoryDocumentStore> {
        let store = InMemoryDocumentStore::new();
        for i in 0..n {
            store.insert("z", &format!("m{:03}", i), i as f64);
        }
        SortedSetEngine::new(store)
    }

    #[tokio::test]
    async fn test_batches_and_order() {
        let engine = engine_with(25);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink_seen = seen.clone();
        let stats = engine
            .process_all(
                "z",
                move |batch: Vec<SetItem>| {
                    let seen = sink_seen.clone();
                    async move {
                        seen.lock().push(batch);
                        Ok::<(), BoxError>(())
                    }
                },
                ProcessOptions::default().batch_size(10),
            )
            .await
            .unwrap();

        assert_eq!(stats, ProcessStats { batches: 3, items: 25 });
        let batches = seen.lock();
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![10, 10, 5]);
        let members: Vec<&str> = batches.iter().flatten().map(|i| i.member.as_str()).collect();
        let expected: Vec<String> = (0..25).map(|i| format!("m{:03}", i)).collect();
        assert_eq!(members, expected);
        assert!(batches.iter().flatten().all(|i| i.score.is_none()));
        assert_eq!(engine.store().open_cursors(), 0);
    }

    #[tokio::test]
    async fn test_with_scores() {
        let engine = engine_with(3);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        engine
            .process_all(
                "z",
                move |batch: Vec<SetItem>| {
                    let seen = sink_seen.clone();
                    async move {
                        seen.lock().extend(batch);
                        Ok::<(), BoxError>(())
                    }
                },
                ProcessOptions::default().with_scores(true),
            )
            .await
            .unwrap();
        let scores: Vec<Option<f64>> = seen.lock().iter().map(|i| i.score).collect();
        assert_eq!(scores, vec![Some(0.0), Some(1.0), Some(2.0)]);
    }

    #[tokio::test]
    async fn test_empty_set_never_calls_sink() {
        let engine = engine_with(0);
        let stats = engine
            .process_all(
                "z",
                |_batch: Vec<SetItem>| async { Err::<(), BoxError>("sink must not run".into()) },
                ProcessOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(stats, ProcessStats::default());
        assert_eq!(engine.store().open_cursors(), 0);
    }

    #[tokio::test]
    async fn test_exact_multiple_of_batch_size() {
        let engine = engine_with(20);
        let stats = engine
            .process_all(
                "z",
                |_batch: Vec<SetItem>| async { Ok::<(), BoxError>(()) },
                ProcessOptions::default().batch_size(10),
            )
            .await
            .unwrap();
        assert_eq!(stats, ProcessStats { batches: 2, items: 20 });
    }

    #[tokio::test]
    async fn test_sink_failure_stops_and_releases_cursor() {
        let engine = engine_with(30);
        let calls = Arc::new(Mutex::new(0u32));
        let sink_calls = calls.clone();

        let result = engine
            .process_all(
                "z",
                move |_batch: Vec<SetItem>| {
                    let calls = sink_calls.clone();
                    async move {
                        *calls.lock() += 1;
                        Err::<(), _>(std::io::Error::new(std::io::ErrorKind::Other, "downstream full"))
                    }
                },
                ProcessOptions::default().batch_size(10),
            )
            .await;

        assert!(matches!(result, Err(ZsetError::Sink(_))));
        assert_eq!(*calls.lock(), 1);
        assert_eq!(engine.store().open_cursors(), 0);
    }

    #[tokio::test]
    async fn test_invalid_options() {
        let engine = engine_with(1);
        let sink = |_batch: Vec<SetItem>| async { Ok::<(), BoxError>(()) };
        assert!(matches!(
            engine.process_all("z", sink, ProcessOptions::default().batch_size(0)).await,
            Err(ZsetError::InvalidArgument(_))
        ));
        assert_eq!(
            engine.process_all("", sink, ProcessOptions::default()).await.unwrap(),
            ProcessStats::default()
        );
    }

    #[tokio::test]
    async fn test_huge_batch_size_is_one_batch() {
        let engine = engine_with(3);
        let sizes = Arc::new(Mutex::new(Vec::new()));
        let sink_sizes = sizes.clone();

        let stats = engine
            .process_all(
                "z",
                move |batch: Vec<SetItem>| {
                    let sizes = sink_sizes.clone();
                    async move {
                        sizes.lock().push(batch.len());
                        Ok::<(), BoxError>(())
                    }
                },
                ProcessOptions::default().batch_size(usize::MAX),
            )
            .await
            .unwrap();

        assert_eq!(stats, ProcessStats { batches: 1, items: 3 });
        assert_eq!(*sizes.lock(), vec![3]);
        assert_eq!(engine.store().open_cursors(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_paces_batches() {
        let engine = engine_with(30);
        let started = tokio::time::Instant::now();
        engine
            .process_all(
                "z",
                |_batch: Vec<SetItem>| async { Ok::<(), BoxError>(()) },
                ProcessOptions::default()
                    .batch_size(10)
                    .interval(Duration::from_millis(100)),
            )
            .await
            .unwrap();
        // a pause follows each full batch
        assert!(started.elapsed() >= Duration::from_millis(300));
    }
}

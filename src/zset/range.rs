//! By-rank and by-score reads
//!
//! Both go through one resolver: a score filter over one or more sets, a
//! [`RankWindow`], and a sort direction. By-score reads translate their
//! offset/count pagination into a rank window first.

use super::window::{RankWindow, ResolvedWindow, WindowPlan};
use super::{ScoreRange, ScoredMember, SetKeys, SortedSetEngine, ZsetResult};
use crate::store::{
    Direction, Document, DocumentStore, Filter, FindOptions, Projection, Query, Sort, StoreError,
};
use tracing::trace;

/// Rank window for an offset/count page. `None` means nothing to read.
///
/// A negative count reads to the end of the range.
fn score_page(start: u64, count: i64) -> Option<RankWindow> {
    let start = i64::try_from(start).unwrap_or(i64::MAX);
    match count {
        0 => None,
        c if c < 0 => Some(RankWindow::new(start, -1)),
        c => Some(RankWindow::new(start, start.saturating_add(c - 1))),
    }
}

impl<S: DocumentStore> SortedSetEngine<S> {
    /// Fetch the documents in `window` of the merged score order of `keys`,
    /// restricted to `scores`.
    async fn fetch_window(
        &self,
        keys: SetKeys,
        window: RankWindow,
        scores: ScoreRange,
        direction: Direction,
        projection: Projection,
    ) -> ZsetResult<Vec<Document>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let query = Query::from(Filter::keys(keys.into_vec()).score(scores.predicate()));

        let resolved: Option<ResolvedWindow> = match window.resolve() {
            WindowPlan::Empty => None,
            WindowPlan::Window(w) => Some(w),
            WindowPlan::NeedsCardinality => {
                let len = self.store.count(&query).await?;
                match window.absolute(len) {
                    WindowPlan::Window(w) => Some(w),
                    _ => None,
                }
            }
        };
        let Some(resolved) = resolved else {
            trace!("rank window [{}, {}] is empty", window.start, window.stop);
            return Ok(Vec::new());
        };

        let direction = if resolved.flip {
            direction.reversed()
        } else {
            direction
        };
        let options = FindOptions::new(projection)
            .sort(Sort::by_score(direction))
            .skip(resolved.skip)
            .limit(resolved.limit);

        let docs = self.store.find(&query, &options).await?;
        Ok(resolved.finish(docs))
    }

    async fn members_in_window(
        &self,
        keys: SetKeys,
        window: RankWindow,
        scores: ScoreRange,
        direction: Direction,
    ) -> ZsetResult<Vec<String>> {
        let docs = self
            .fetch_window(keys, window, scores, direction, Projection::VALUE)
            .await?;
        Ok(docs.into_iter().map(|d| d.value).collect())
    }

    async fn scored_in_window(
        &self,
        keys: SetKeys,
        window: RankWindow,
        scores: ScoreRange,
        direction: Direction,
    ) -> ZsetResult<Vec<ScoredMember>> {
        let docs = self
            .fetch_window(keys, window, scores, direction, Projection::VALUE_SCORE)
            .await?;
        let members = docs
            .into_iter()
            .map(ScoredMember::from_document)
            .collect::<Result<Vec<_>, StoreError>>()?;
        Ok(members)
    }

    /// Members ranked `start..=stop` ascending. Several keys read as one
    /// merged order.
    pub async fn range(
        &self,
        keys: impl Into<SetKeys>,
        start: i64,
        stop: i64,
    ) -> ZsetResult<Vec<String>> {
        self.members_in_window(
            keys.into(),
            RankWindow::new(start, stop),
            ScoreRange::ALL,
            Direction::Ascending,
        )
        .await
    }

    /// Members ranked `start..=stop` descending
    pub async fn rev_range(
        &self,
        keys: impl Into<SetKeys>,
        start: i64,
        stop: i64,
    ) -> ZsetResult<Vec<String>> {
        self.members_in_window(
            keys.into(),
            RankWindow::new(start, stop),
            ScoreRange::ALL,
            Direction::Descending,
        )
        .await
    }

    pub async fn range_with_scores(
        &self,
        keys: impl Into<SetKeys>,
        start: i64,
        stop: i64,
    ) -> ZsetResult<Vec<ScoredMember>> {
        self.scored_in_window(
            keys.into(),
            RankWindow::new(start, stop),
            ScoreRange::ALL,
            Direction::Ascending,
        )
        .await
    }

    pub async fn rev_range_with_scores(
        &self,
        keys: impl Into<SetKeys>,
        start: i64,
        stop: i64,
    ) -> ZsetResult<Vec<ScoredMember>> {
        self.scored_in_window(
            keys.into(),
            RankWindow::new(start, stop),
            ScoreRange::ALL,
            Direction::Descending,
        )
        .await
    }

    /// Up to `count` members with `min <= score <= max`, skipping the first
    /// `start`. A negative `count` reads to the end.
    pub async fn range_by_score(
        &self,
        keys: impl Into<SetKeys>,
        start: u64,
        count: i64,
        min: f64,
        max: f64,
    ) -> ZsetResult<Vec<String>> {
        let Some(window) = score_page(start, count) else {
            return Ok(Vec::new());
        };
        self.members_in_window(
            keys.into(),
            window,
            ScoreRange::new(min, max),
            Direction::Ascending,
        )
        .await
    }

    /// Descending by-score read. Bounds are given high first.
    pub async fn rev_range_by_score(
        &self,
        keys: impl Into<SetKeys>,
        start: u64,
        count: i64,
        max: f64,
        min: f64,
    ) -> ZsetResult<Vec<String>> {
        let Some(window) = score_page(start, count) else {
            return Ok(Vec::new());
        };
        self.members_in_window(
            keys.into(),
            window,
            ScoreRange::new(min, max),
            Direction::Descending,
        )
        .await
    }

    pub async fn range_by_score_with_scores(
        &self,
        keys: impl Into<SetKeys>,
        start: u64,
        count: i64,
        min: f64,
        max: f64,
    ) -> ZsetResult<Vec<ScoredMember>> {
        let Some(window) = score_page(start, count) else {
            return Ok(Vec::new());
        };
        self.scored_in_window(
            keys.into(),
            window,
            ScoreRange::new(min, max),
            Direction::Ascending,
        )
        .await
    }

    pub async fn rev_range_by_score_with_scores(
        &self,
        keys: impl Into<SetKeys>,
        start: u64,
        count: i64,
        max: f64,
        min: f64,
    ) -> ZsetResult<Vec<ScoredMember>> {
        let Some(window) = score_page(start, count) else {
            return Ok(Vec::new());
        };
        self.scored_in_window(
            keys.into(),
            window,
            ScoreRange::new(min, max),
            Direction::Descending,
        )
        .await
    }

    /// Number of members of `key` within `range`
    pub async fn count(&self, key: &str, range: ScoreRange) -> ZsetResult<u64> {
        if key.is_empty() {
            return Ok(0);
        }
        let query = Query::from(Filter::key(key).score(range.predicate()));
        Ok(self.store.count(&query).await?)
    }
}

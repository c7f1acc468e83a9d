//! Rank-Range Resolver
//!
//! Turns an inclusive `[start, stop]` rank window (negative ranks count from
//! the end, `-1` is the last element) into a skip/limit read against the
//! store's score order. The store cannot index from the end, so windows
//! anchored at the end are read against the flipped order and the result is
//! reversed afterwards.
//!
//! Pure: no I/O. `range.rs` executes the plan.

/// Inclusive rank window as the caller passed it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankWindow {
    pub start: i64,
    pub stop: i64,
}

/// Concrete read against the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedWindow {
    /// Entries to skip in the (possibly flipped) sort order
    pub skip: u64,
    /// `None` = read to the end
    pub limit: Option<u64>,
    /// Read with the sort direction flipped, then reverse the result
    pub flip: bool,
    /// Entries to drop from the tail of the fetched page
    pub trim_tail: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPlan {
    /// Provably empty; do not query the store
    Empty,
    Window(ResolvedWindow),
    /// Negative start with non-negative stop: resolve with
    /// [`RankWindow::absolute`] once the cardinality is known
    NeedsCardinality,
}

impl ResolvedWindow {
    fn forward(skip: u64, limit: Option<u64>) -> Self {
        ResolvedWindow {
            skip,
            limit,
            flip: false,
            trim_tail: 0,
        }
    }

    fn flipped(skip: u64, limit: Option<u64>) -> Self {
        ResolvedWindow {
            skip,
            limit,
            flip: true,
            trim_tail: 0,
        }
    }

    /// Post-process a fetched page: trim the tail, then undo the flip.
    pub fn finish<T>(&self, mut items: Vec<T>) -> Vec<T> {
        if self.trim_tail > 0 {
            let trim = usize::try_from(self.trim_tail).unwrap_or(usize::MAX);
            items.truncate(items.len().saturating_sub(trim));
        }
        if self.flip {
            items.reverse();
        }
        items
    }
}

/// `|n + 1|` for `n <= -1`: how many entries sit after rank `n` counted from the end
fn from_end(n: i64) -> u64 {
    debug_assert!(n < 0);
    (n + 1).unsigned_abs()
}

impl RankWindow {
    pub fn new(start: i64, stop: i64) -> Self {
        RankWindow { start, stop }
    }

    /// The whole set
    pub fn all() -> Self {
        RankWindow { start: 0, stop: -1 }
    }

    /// Plan the read without knowing the set's cardinality.
    pub fn resolve(&self) -> WindowPlan {
        let RankWindow { start, stop } = *self;

        if start < 0 && start > stop {
            return WindowPlan::Empty;
        }

        match (start, stop) {
            (0, -1) => WindowPlan::Window(ResolvedWindow::forward(0, None)),
            // all but the last |stop + 1|
            (0, stop) if stop < -1 => {
                WindowPlan::Window(ResolvedWindow::flipped(from_end(stop), None))
            }
            (start, stop) if start < 0 && stop < 0 => {
                let limit = (stop - start).unsigned_abs() + 1;
                WindowPlan::Window(ResolvedWindow::flipped(from_end(stop), Some(limit)))
            }
            (start, _) if start < 0 => WindowPlan::NeedsCardinality,
            (start, stop) if stop >= 0 => {
                if stop < start {
                    WindowPlan::Empty
                } else {
                    let limit = (stop - start).unsigned_abs() + 1;
                    WindowPlan::Window(ResolvedWindow::forward(start.unsigned_abs(), Some(limit)))
                }
            }
            (start, -1) => WindowPlan::Window(ResolvedWindow::forward(start.unsigned_abs(), None)),
            (start, stop) => WindowPlan::Window(ResolvedWindow {
                trim_tail: from_end(stop),
                ..ResolvedWindow::forward(start.unsigned_abs(), None)
            }),
        }
    }

    /// Plan the read against a set of `len` entries, normalizing negative
    /// ranks the way a native sorted set does.
    pub fn absolute(&self, len: u64) -> WindowPlan {
        let len = i64::try_from(len).unwrap_or(i64::MAX);
        let start = if self.start < 0 {
            len.saturating_add(self.start).max(0)
        } else {
            self.start
        };
        let stop = if self.stop < 0 {
            len.saturating_add(self.stop)
        } else {
            self.stop.min(len - 1)
        };

        if start > stop || start >= len {
            return WindowPlan::Empty;
        }
        let limit = (stop - start).unsigned_abs() + 1;
        WindowPlan::Window(ResolvedWindow::forward(start.unsigned_abs(), Some(limit)))
    }
}

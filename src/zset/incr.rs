//! Increment-and-insert
//!
//! The store's upsert is atomic once the entry exists, but two writers
//! creating the same `(key, member)` for the first time can both take the
//! insert path; the loser fails with a duplicate-key error. That conflict is
//! retried here, as many times as it takes, yielding to the scheduler
//! between attempts. Every other store error surfaces immediately.

use super::member::ToMember;
use super::{SortedSetEngine, ZsetError, ZsetResult};
use crate::store::{DocumentStore, StoreError};
use tracing::{debug, warn};

impl<S: DocumentStore> SortedSetEngine<S> {
    /// Add `delta` to the score of `member` in `key`, creating it with
    /// `score = delta` if absent. Returns the new score.
    pub async fn increment_by<M: ToMember + ?Sized>(
        &self,
        key: &str,
        member: &M,
        delta: f64,
    ) -> ZsetResult<f64> {
        if key.is_empty() {
            return Err(ZsetError::invalid("increment_by requires a set key"));
        }
        if delta.is_nan() {
            return Err(ZsetError::invalid("increment is not a number"));
        }

        let member = member.to_member();
        let warn_after = self.config.increment.warn_after_retries;
        let mut conflicts: u32 = 0;

        loop {
            match self.store.find_one_and_increment(key, &member, delta).await {
                Ok(doc) => {
                    if conflicts > 0 {
                        debug!(
                            "increment of {}/{} settled after {} duplicate-key retries",
                            key, member, conflicts
                        );
                    }
                    return doc.score.ok_or_else(|| {
                        ZsetError::Store(StoreError::Malformed(format!(
                            "upsert of {}/{} returned no score",
                            key, member
                        )))
                    });
                }
                Err(e) if e.is_duplicate_key() => {
                    conflicts = conflicts.saturating_add(1);
                    if warn_after > 0 && conflicts % warn_after == 0 {
                        warn!(
                            "increment of {}/{} still contended after {} retries",
                            key, member, conflicts
                        );
                    } else {
                        debug!("duplicate key on upsert of {}/{}, retrying", key, member);
                    }
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

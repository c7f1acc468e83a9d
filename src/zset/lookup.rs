//! Point lookups: score, membership, rank, cardinality
//!
//! Absence is never an error. A missing member has no score (`None`), is not
//! a member (`false`) and has no rank (`None`).
//!
//! Rank is computed by counting, not by fetching: the number of entries that
//! sort before the member is
//!
//! ```text
//! count(score < s)  +  count(score == s && member < m)
//! ```
//!
//! issued as one disjunctive count. The second clause is what makes ties on
//! score come out in member order.

use super::member::{to_members, ToMember};
use super::{SetKeys, SortedSetEngine, ZsetResult};
use crate::store::{
    Direction, DocumentStore, Filter, FindOptions, Projection, Query, ScorePredicate,
    ValuePredicate,
};
use ahash::{AHashMap, AHashSet};
use futures::future::try_join_all;
use std::ops::Bound;

/// Non-empty keys only, for `In` filters
fn present_keys<K: AsRef<str>>(keys: &[K]) -> Vec<String> {
    keys.iter()
        .map(|k| k.as_ref())
        .filter(|k: &&str| !k.is_empty())
        .map(str::to_string)
        .collect()
}

fn key_str<K: AsRef<str>>(key: &K) -> &str {
    key.as_ref()
}

impl<S: DocumentStore> SortedSetEngine<S> {
    /// Score of `member` in `key`
    pub async fn score<M: ToMember + ?Sized>(&self, key: &str, member: &M) -> ZsetResult<Option<f64>> {
        if key.is_empty() {
            return Ok(None);
        }
        let query = Query::from(Filter::key(key).value_eq(member.to_member()));
        let options = FindOptions::new(Projection::VALUE_SCORE).limit(Some(1));
        let docs = self.store.find(&query, &options).await?;
        Ok(docs.into_iter().next().and_then(|d| d.score))
    }

    /// Scores of many members of one set, in input order
    pub async fn scores<M: ToMember>(&self, key: &str, members: &[M]) -> ZsetResult<Vec<Option<f64>>> {
        if key.is_empty() || members.is_empty() {
            return Ok(vec![None; members.len()]);
        }
        let members = to_members(members);
        let query = Query::from(Filter::key(key).value_in(members.clone()));
        let docs = self
            .store
            .find(&query, &FindOptions::new(Projection::VALUE_SCORE))
            .await?;

        let by_member: AHashMap<String, f64> = docs
            .into_iter()
            .filter_map(|d| d.score.map(|s| (d.value, s)))
            .collect();
        Ok(members.iter().map(|m| by_member.get(m).copied()).collect())
    }

    /// Score of one member in each of several sets, in key order
    pub async fn sets_score<K, M>(&self, keys: &[K], member: &M) -> ZsetResult<Vec<Option<f64>>>
    where
        K: AsRef<str>,
        M: ToMember + ?Sized,
    {
        let present = present_keys(keys);
        if present.is_empty() {
            return Ok(vec![None; keys.len()]);
        }
        let query = Query::from(Filter::keys(present).value_eq(member.to_member()));
        let docs = self.store.find(&query, &FindOptions::new(Projection::ALL)).await?;

        let by_key: AHashMap<String, f64> = docs
            .into_iter()
            .filter_map(|d| Some((d.key?, d.score?)))
            .collect();
        Ok(keys
            .iter()
            .map(|k| by_key.get(key_str(k)).copied())
            .collect())
    }

    pub async fn is_member<M: ToMember + ?Sized>(&self, key: &str, member: &M) -> ZsetResult<bool> {
        if key.is_empty() {
            return Ok(false);
        }
        let query = Query::from(Filter::key(key).value_eq(member.to_member()));
        Ok(self.store.count(&query).await? > 0)
    }

    /// Membership of many members in one set, in input order
    pub async fn is_members<M: ToMember>(&self, key: &str, members: &[M]) -> ZsetResult<Vec<bool>> {
        if key.is_empty() || members.is_empty() {
            return Ok(vec![false; members.len()]);
        }
        let members = to_members(members);
        let query = Query::from(Filter::key(key).value_in(members.clone()));
        let docs = self.store.find(&query, &FindOptions::new(Projection::VALUE)).await?;

        let found: AHashSet<String> = docs.into_iter().map(|d| d.value).collect();
        Ok(members.iter().map(|m| found.contains(m)).collect())
    }

    /// Membership of one member in each of several sets, in key order
    pub async fn is_member_of_sets<K, M>(&self, keys: &[K], member: &M) -> ZsetResult<Vec<bool>>
    where
        K: AsRef<str>,
        M: ToMember + ?Sized,
    {
        let present = present_keys(keys);
        if present.is_empty() {
            return Ok(vec![false; keys.len()]);
        }
        let query = Query::from(Filter::keys(present).value_eq(member.to_member()));
        let docs = self
            .store
            .find(&query, &FindOptions::new(Projection::KEY_VALUE))
            .await?;

        let found: AHashSet<String> = docs.into_iter().filter_map(|d| d.key).collect();
        Ok(keys.iter().map(|k| found.contains(key_str(k))).collect())
    }

    async fn rank_in(&self, key: &str, member: &str, direction: Direction) -> ZsetResult<Option<u64>> {
        let Some(score) = self.score(key, member).await? else {
            return Ok(None);
        };

        let (score_before, value_before) = match direction {
            Direction::Ascending => (
                ScorePredicate::Range {
                    min: Bound::Unbounded,
                    max: Bound::Excluded(score),
                },
                ValuePredicate::Range {
                    min: Bound::Unbounded,
                    max: Bound::Excluded(member.to_string()),
                },
            ),
            Direction::Descending => (
                ScorePredicate::Range {
                    min: Bound::Excluded(score),
                    max: Bound::Unbounded,
                },
                ValuePredicate::Range {
                    min: Bound::Excluded(member.to_string()),
                    max: Bound::Unbounded,
                },
            ),
        };

        let query = Query::AnyOf(vec![
            Filter::key(key).score(score_before),
            Filter::key(key).score_eq(score).value(value_before),
        ]);
        Ok(Some(self.store.count(&query).await?))
    }

    /// Zero-based ascending rank of `member` in `key`
    pub async fn rank<M: ToMember + ?Sized>(&self, key: &str, member: &M) -> ZsetResult<Option<u64>> {
        self.rank_in(key, &member.to_member(), Direction::Ascending).await
    }

    /// Zero-based descending rank of `member` in `key`
    pub async fn rev_rank<M: ToMember + ?Sized>(&self, key: &str, member: &M) -> ZsetResult<Option<u64>> {
        self.rank_in(key, &member.to_member(), Direction::Descending).await
    }

    async fn paired_ranks<K, M>(
        &self,
        keys: &[K],
        members: &[M],
        direction: Direction,
    ) -> ZsetResult<Vec<Option<u64>>>
    where
        K: AsRef<str>,
        M: ToMember,
    {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let lookups = members.iter().enumerate().map(|(i, member)| {
            let key = keys.get(i).map_or("", AsRef::as_ref);
            let member = member.to_member().into_owned();
            async move { self.rank_in(key, &member, direction).await }
        });
        try_join_all(lookups).await
    }

    /// Rank of `members[i]` in `keys[i]`, pairwise. Lookups run concurrently;
    /// results come back in input order.
    pub async fn sets_ranks<K: AsRef<str>, M: ToMember>(
        &self,
        keys: &[K],
        members: &[M],
    ) -> ZsetResult<Vec<Option<u64>>> {
        self.paired_ranks(keys, members, Direction::Ascending).await
    }

    pub async fn sets_rev_ranks<K: AsRef<str>, M: ToMember>(
        &self,
        keys: &[K],
        members: &[M],
    ) -> ZsetResult<Vec<Option<u64>>> {
        self.paired_ranks(keys, members, Direction::Descending).await
    }

    async fn ranks_by_fetch<M: ToMember>(
        &self,
        key: &str,
        members: &[M],
        direction: Direction,
    ) -> ZsetResult<Vec<Option<u64>>> {
        let ordered = match direction {
            Direction::Ascending => self.range(key, 0, -1).await?,
            Direction::Descending => self.rev_range(key, 0, -1).await?,
        };
        let positions: AHashMap<&str, u64> = ordered
            .iter()
            .zip(0u64..)
            .map(|(m, i)| (m.as_str(), i))
            .collect();
        Ok(members
            .iter()
            .map(|m| positions.get(&*m.to_member()).copied())
            .collect())
    }

    /// Ranks of many members of one set from a single full-set fetch.
    /// Cheaper than [`Self::rank`] per member once `members` is a sizable
    /// fraction of the set.
    pub async fn ranks<M: ToMember>(&self, key: &str, members: &[M]) -> ZsetResult<Vec<Option<u64>>> {
        self.ranks_by_fetch(key, members, Direction::Ascending).await
    }

    pub async fn rev_ranks<M: ToMember>(&self, key: &str, members: &[M]) -> ZsetResult<Vec<Option<u64>>> {
        self.ranks_by_fetch(key, members, Direction::Descending).await
    }

    /// Number of members in `key`
    pub async fn card(&self, key: &str) -> ZsetResult<u64> {
        if key.is_empty() {
            return Ok(0);
        }
        Ok(self.store.count(&Query::from(Filter::key(key))).await?)
    }

    /// Cardinality of each set, in key order. Counts run concurrently.
    pub async fn sets_card<K: AsRef<str>>(&self, keys: &[K]) -> ZsetResult<Vec<u64>> {
        try_join_all(keys.iter().map(|k| self.card(k.as_ref()))).await
    }

    /// Entries across all of `keys`, as one count. A member present in two
    /// of the sets counts twice.
    pub async fn sets_card_sum(&self, keys: impl Into<SetKeys>) -> ZsetResult<u64> {
        let keys = keys.into();
        if keys.is_empty() {
            return Ok(0);
        }
        let query = Query::from(Filter::keys(keys.into_vec()));
        Ok(self.store.count(&query).await?)
    }

    /// Every member of each set, ascending by score, from one query.
    pub async fn sets_members<K: AsRef<str>>(&self, keys: &[K]) -> ZsetResult<Vec<Vec<String>>> {
        let present = present_keys(keys);
        if present.is_empty() {
            return Ok(vec![Vec::new(); keys.len()]);
        }
        let query = Query::from(Filter::keys(present));
        let options = FindOptions::new(Projection::KEY_VALUE)
            .sort(crate::store::Sort::by_score(Direction::Ascending));
        let docs = self.store.find(&query, &options).await?;

        let mut by_key: AHashMap<String, Vec<String>> = AHashMap::new();
        for doc in docs {
            if let Some(key) = doc.key {
                by_key.entry(key).or_default().push(doc.value);
            }
        }
        Ok(keys
            .iter()
            .map(|k| by_key.get(key_str(k)).cloned().unwrap_or_default())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::simulation::SimulatedRng;
    use crate::store::{InMemoryDocumentStore, SimulatedDocumentStore, SimulatedStoreConfig};

    fn engine() -> SortedSetEngine<InMemoryDocumentStore> {
        let store = InMemoryDocumentStore::new();
        store.insert("z", "a", 1.0);
        store.insert("z", "b", 2.0);
        store.insert("z", "c", 2.0);
        store.insert("z", "d", 3.0);
        store.insert("y", "a", 10.0);
        store.insert("n", "5", 1.5);
        SortedSetEngine::new(store)
    }

    #[tokio::test]
    async fn test_score() {
        let engine = engine();
        assert_eq!(engine.score("z", "b").await.unwrap(), Some(2.0));
        assert_eq!(engine.score("z", "missing").await.unwrap(), None);
        assert_eq!(engine.score("", "a").await.unwrap(), None);
        // numeric members are canonicalized
        assert_eq!(engine.score("n", &5).await.unwrap(), Some(1.5));
        assert_eq!(engine.score("n", &5.0).await.unwrap(), Some(1.5));
    }

    #[tokio::test]
    async fn test_scores_preserve_order() {
        let engine = engine();
        assert_eq!(
            engine.scores("z", &["d", "x", "a"]).await.unwrap(),
            vec![Some(3.0), None, Some(1.0)]
        );
        assert!(engine.scores::<&str>("z", &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sets_score() {
        let engine = engine();
        assert_eq!(
            engine.sets_score(&["y", "nope", "z", ""], "a").await.unwrap(),
            vec![Some(10.0), None, Some(1.0), None]
        );
    }

    #[tokio::test]
    async fn test_membership() {
        let engine = engine();
        assert!(engine.is_member("z", "a").await.unwrap());
        assert!(!engine.is_member("z", "q").await.unwrap());
        assert_eq!(
            engine.is_members("z", &["q", "c", "a"]).await.unwrap(),
            vec![false, true, true]
        );
        assert_eq!(
            engine.is_member_of_sets(&["z", "n", "y"], "a").await.unwrap(),
            vec![true, false, true]
        );
    }

    #[tokio::test]
    async fn test_rank_breaks_ties_by_member() {
        let engine = engine();
        assert_eq!(engine.rank("z", "a").await.unwrap(), Some(0));
        assert_eq!(engine.rank("z", "b").await.unwrap(), Some(1));
        assert_eq!(engine.rank("z", "c").await.unwrap(), Some(2));
        assert_eq!(engine.rank("z", "d").await.unwrap(), Some(3));
        assert_eq!(engine.rev_rank("z", "d").await.unwrap(), Some(0));
        assert_eq!(engine.rev_rank("z", "c").await.unwrap(), Some(1));
        assert_eq!(engine.rev_rank("z", "b").await.unwrap(), Some(2));
        assert_eq!(engine.rank("z", "missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_paired_ranks() {
        let engine = engine();
        assert_eq!(
            engine.sets_ranks(&["z", "y", "z"], &["c", "a", "q"]).await.unwrap(),
            vec![Some(2), Some(0), None]
        );
        // keys shorter than members: unpaired positions have no rank
        assert_eq!(
            engine.sets_rev_ranks(&["z"], &["a", "a"]).await.unwrap(),
            vec![Some(3), None]
        );
    }

    #[tokio::test]
    async fn test_ranks_by_fetch_match_counted_ranks() {
        let engine = engine();
        let members = ["d", "a", "zz", "c"];
        let fetched = engine.ranks("z", &members).await.unwrap();
        assert_eq!(fetched, vec![Some(3), Some(0), None, Some(2)]);
        for (member, rank) in members.iter().zip(&fetched) {
            assert_eq!(engine.rank("z", *member).await.unwrap(), *rank);
        }
        assert_eq!(
            engine.rev_ranks("z", &["d", "a"]).await.unwrap(),
            vec![Some(0), Some(3)]
        );
    }

    #[tokio::test]
    async fn test_cardinality() {
        let engine = engine();
        assert_eq!(engine.card("z").await.unwrap(), 4);
        assert_eq!(engine.card("missing").await.unwrap(), 0);
        assert_eq!(engine.sets_card(&["y", "z", "q"]).await.unwrap(), vec![1, 4, 0]);
        // "a" is in both z and y and counts twice
        assert_eq!(engine.sets_card_sum(["z", "y"]).await.unwrap(), 5);
        assert_eq!(engine.sets_card_sum(Vec::<String>::new()).await.unwrap(), 0);
    }

    /// Six sets of sizes 5, 1, 4, 2, 6, 3 behind a store that delays every
    /// call by a random amount, so concurrent lookups finish out of order.
    fn slow_engine(
        seed: u64,
    ) -> SortedSetEngine<SimulatedDocumentStore<InMemoryDocumentStore, SimulatedRng>> {
        let inner = InMemoryDocumentStore::new();
        for (i, size) in [5, 1, 4, 2, 6, 3].into_iter().enumerate() {
            for j in 0..size {
                inner.insert(&format!("k{}", i), &format!("m{}", j), j as f64);
            }
        }
        let store = SimulatedDocumentStore::new(
            inner,
            SimulatedRng::new(seed),
            SimulatedStoreConfig {
                latency_prob: 1.0,
                latency_range_us: (1, 50_000),
                ..SimulatedStoreConfig::no_faults()
            },
        );
        SortedSetEngine::new(store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_batches_keep_input_order() {
        let keys = ["k0", "k1", "k2", "k3", "k4", "k5"];
        let members = ["m4", "m0", "m2", "m9", "m5", "m1"];

        for seed in 0..10 {
            let engine = slow_engine(seed);

            assert_eq!(
                engine.sets_card(&keys).await.unwrap(),
                vec![5, 1, 4, 2, 6, 3],
                "seed {}",
                seed
            );
            assert_eq!(
                engine.sets_ranks(&keys, &members).await.unwrap(),
                vec![Some(4), Some(0), Some(2), None, Some(5), Some(1)],
                "seed {}",
                seed
            );
            assert_eq!(
                engine.sets_rev_ranks(&keys, &members).await.unwrap(),
                vec![Some(0), Some(0), Some(1), None, Some(0), Some(1)],
                "seed {}",
                seed
            );
            assert!(engine.store().stats().delays > 0);
        }
    }

    #[tokio::test]
    async fn test_sets_members() {
        let engine = engine();
        assert_eq!(
            engine.sets_members(&["y", "missing", "z"]).await.unwrap(),
            vec![
                vec!["a".to_string()],
                Vec::new(),
                vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()],
            ]
        );
    }
}

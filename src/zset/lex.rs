//! Lexicographic ranges
//!
//! Bound tokens follow the ZRANGEBYLEX convention:
//!
//! | Token | Meaning |
//! |---|---|
//! | `-` (as min) | unbounded below |
//! | `+` (as max) | unbounded above |
//! | `[x` | `x`, inclusive |
//! | `(x` | `x`, exclusive |
//! | `x` | `x`, inclusive |
//!
//! Lex reads ignore score entirely: the filter is on the member string and
//! the sort is by member.

use super::{SortedSetEngine, ZsetError, ZsetResult};
use crate::store::{Direction, DocumentStore, Filter, FindOptions, Projection, Query, Sort};
use std::ops::Bound;
use tracing::debug;

/// Offset/count pagination for lex reads. `count: None` reads to the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LexPage {
    pub start: u64,
    pub count: Option<u64>,
}

impl LexPage {
    pub fn new(start: u64, count: Option<u64>) -> Self {
        LexPage { start, count }
    }

    /// Every matching member
    pub fn all() -> Self {
        LexPage::default()
    }
}

fn parse_bound(token: &str, unbounded: &str) -> ZsetResult<Bound<String>> {
    if token.is_empty() {
        return Err(ZsetError::invalid("empty lex bound"));
    }
    if token == unbounded {
        return Ok(Bound::Unbounded);
    }
    Ok(if let Some(rest) = token.strip_prefix('(') {
        Bound::Excluded(rest.to_string())
    } else if let Some(rest) = token.strip_prefix('[') {
        Bound::Included(rest.to_string())
    } else {
        Bound::Included(token.to_string())
    })
}

/// Parse a lower bound token (`-` is unbounded)
pub fn parse_min(token: &str) -> ZsetResult<Bound<String>> {
    parse_bound(token, "-")
}

/// Parse an upper bound token (`+` is unbounded)
pub fn parse_max(token: &str) -> ZsetResult<Bound<String>> {
    parse_bound(token, "+")
}

fn lex_query(key: &str, min: &str, max: &str) -> ZsetResult<Query> {
    let filter = Filter::key(key).value_range(parse_min(min)?, parse_max(max)?);
    Ok(Query::from(filter))
}

impl<S: DocumentStore> SortedSetEngine<S> {
    async fn lex_page(
        &self,
        key: &str,
        min: &str,
        max: &str,
        direction: Direction,
        page: LexPage,
    ) -> ZsetResult<Vec<String>> {
        let query = lex_query(key, min, max)?;
        if key.is_empty() || page.count == Some(0) {
            return Ok(Vec::new());
        }

        let options = FindOptions::new(Projection::VALUE)
            .sort(Sort::by_value(direction))
            .skip(page.start)
            .limit(page.count);
        let docs = self.store.find(&query, &options).await?;
        Ok(docs.into_iter().map(|d| d.value).collect())
    }

    /// Members of `key` between `min` and `max` in ascending member order
    pub async fn range_by_lex(
        &self,
        key: &str,
        min: &str,
        max: &str,
        page: LexPage,
    ) -> ZsetResult<Vec<String>> {
        self.lex_page(key, min, max, Direction::Ascending, page).await
    }

    /// Descending lex read. Bounds are given high first.
    pub async fn rev_range_by_lex(
        &self,
        key: &str,
        max: &str,
        min: &str,
        page: LexPage,
    ) -> ZsetResult<Vec<String>> {
        self.lex_page(key, min, max, Direction::Descending, page).await
    }

    /// Number of members of `key` between `min` and `max`
    pub async fn lex_count(&self, key: &str, min: &str, max: &str) -> ZsetResult<u64> {
        let query = lex_query(key, min, max)?;
        if key.is_empty() {
            return Ok(0);
        }
        Ok(self.store.count(&query).await?)
    }

    /// Delete every member of `key` between `min` and `max`. Returns the
    /// number deleted.
    pub async fn remove_range_by_lex(&self, key: &str, min: &str, max: &str) -> ZsetResult<u64> {
        if key.is_empty() {
            return Err(ZsetError::invalid("remove_range_by_lex requires a set key"));
        }
        let query = lex_query(key, min, max)?;
        let removed = self.store.delete_many(&query).await?;
        debug!("removed {} members of {} in lex range {}..{}", removed, key, min, max);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryDocumentStore;

    fn abcde() -> SortedSetEngine<InMemoryDocumentStore> {
        let store = InMemoryDocumentStore::new();
        for value in ["a", "b", "c", "d", "e"] {
            store.insert("z", value, 0.0);
        }
        store.insert("other", "b", 0.0);
        SortedSetEngine::new(store)
    }

    #[test]
    fn test_parse_bounds() {
        assert_eq!(parse_min("-").unwrap(), Bound::Unbounded);
        assert_eq!(parse_max("+").unwrap(), Bound::Unbounded);
        assert_eq!(parse_min("(b").unwrap(), Bound::Excluded("b".to_string()));
        assert_eq!(parse_max("[b").unwrap(), Bound::Included("b".to_string()));
        assert_eq!(parse_max("b").unwrap(), Bound::Included("b".to_string()));
        // "+" is only special as an upper bound
        assert_eq!(parse_min("+").unwrap(), Bound::Included("+".to_string()));
        assert_eq!(parse_min("[").unwrap(), Bound::Included(String::new()));
        assert!(matches!(parse_min(""), Err(ZsetError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_range_by_lex_bounds() {
        let engine = abcde();
        assert_eq!(engine.range_by_lex("z", "-", "(b", LexPage::all()).await.unwrap(), ["a"]);
        assert_eq!(
            engine.range_by_lex("z", "[b", "+", LexPage::all()).await.unwrap(),
            ["b", "c", "d", "e"]
        );
        assert_eq!(engine.range_by_lex("z", "(a", "[c", LexPage::all()).await.unwrap(), ["b", "c"]);
        assert_eq!(engine.range_by_lex("z", "b", "c", LexPage::all()).await.unwrap(), ["b", "c"]);
    }

    #[tokio::test]
    async fn test_lex_ignores_score() {
        let store = InMemoryDocumentStore::new();
        store.insert("z", "a", 9.0);
        store.insert("z", "b", 1.0);
        store.insert("z", "c", 5.0);
        let engine = SortedSetEngine::new(store);
        assert_eq!(engine.range_by_lex("z", "-", "+", LexPage::all()).await.unwrap(), ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_lex_pagination() {
        let engine = abcde();
        assert_eq!(
            engine.range_by_lex("z", "-", "+", LexPage::new(1, Some(2))).await.unwrap(),
            ["b", "c"]
        );
        assert_eq!(
            engine.range_by_lex("z", "-", "+", LexPage::new(3, None)).await.unwrap(),
            ["d", "e"]
        );
        assert!(engine
            .range_by_lex("z", "-", "+", LexPage::new(0, Some(0)))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_rev_range_by_lex() {
        let engine = abcde();
        assert_eq!(
            engine.rev_range_by_lex("z", "[d", "(a", LexPage::all()).await.unwrap(),
            ["d", "c", "b"]
        );
        assert_eq!(
            engine.rev_range_by_lex("z", "+", "-", LexPage::new(0, Some(2))).await.unwrap(),
            ["e", "d"]
        );
    }

    #[tokio::test]
    async fn test_lex_count() {
        let engine = abcde();
        assert_eq!(engine.lex_count("z", "-", "+").await.unwrap(), 5);
        assert_eq!(engine.lex_count("z", "[b", "(d").await.unwrap(), 2);
        assert_eq!(engine.lex_count("", "-", "+").await.unwrap(), 0);
        assert!(engine.lex_count("z", "", "+").await.is_err());
    }

    #[tokio::test]
    async fn test_remove_range_by_lex() {
        let engine = abcde();
        assert_eq!(engine.remove_range_by_lex("z", "[b", "[d").await.unwrap(), 3);
        assert_eq!(engine.range("z", 0, -1).await.unwrap(), ["a", "e"]);
        // other sets untouched
        assert_eq!(engine.range("other", 0, -1).await.unwrap(), ["b"]);

        assert!(matches!(
            engine.remove_range_by_lex("", "-", "+").await,
            Err(ZsetError::InvalidArgument(_))
        ));
        assert!(matches!(
            engine.remove_range_by_lex("z", "-", "").await,
            Err(ZsetError::InvalidArgument(_))
        ));
    }
}

//! Sorted-Set Engine Property Tests
//!
//! Ordering, window, rank and round-trip properties of the engine over the
//! in-memory store, checked across seeded random sets.

use docstore_zset::io::simulation::SimulatedRng;
use docstore_zset::io::Rng;
use docstore_zset::{InMemoryDocumentStore, LexPage, ScoreRange, SortedSetEngine};

type Engine = SortedSetEngine<InMemoryDocumentStore>;

/// Random set with plenty of score ties; returns the expected order.
fn random_set(seed: u64, size: usize) -> (Engine, Vec<(String, f64)>) {
    let mut rng = SimulatedRng::new(seed);
    let store = InMemoryDocumentStore::new();
    let mut entries = Vec::with_capacity(size);
    for i in 0..size {
        let member = format!("m{:03}", rng.gen_range(0, 1000) * 1000 + i as u64);
        let score = rng.gen_range(0, 10) as f64 / 2.0;
        store.insert("z", &member, score);
        entries.push((member, score));
    }
    entries.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    (SortedSetEngine::new(store), entries)
}

fn members(entries: &[(String, f64)]) -> Vec<String> {
    entries.iter().map(|(m, _)| m.clone()).collect()
}

// =============================================================================
// Ordering
// =============================================================================

#[tokio::test]
async fn test_full_range_is_score_then_member_order() {
    for seed in 0..20 {
        let (engine, expected) = random_set(seed, 40);
        let full = engine.range("z", 0, -1).await.unwrap();
        assert_eq!(full, members(&expected), "seed {}", seed);

        let mut rev = engine.rev_range("z", 0, -1).await.unwrap();
        rev.reverse();
        assert_eq!(rev, full, "seed {}: rev_range must be the exact reverse", seed);
    }
}

#[tokio::test]
async fn test_range_by_score_is_filtered_range() {
    for seed in 0..20 {
        let (engine, expected) = random_set(seed, 40);
        for (min, max) in [(0.0, 4.5), (1.0, 2.0), (2.5, 2.5), (3.0, 1.0)] {
            let got = engine.range_by_score("z", 0, -1, min, max).await.unwrap();
            let want: Vec<String> = expected
                .iter()
                .filter(|(_, s)| *s >= min && *s <= max)
                .map(|(m, _)| m.clone())
                .collect();
            assert_eq!(got, want, "seed {} range [{}, {}]", seed, min, max);
        }
    }
}

// =============================================================================
// Windows
// =============================================================================

#[tokio::test]
async fn test_negative_rank_window() {
    let store = InMemoryDocumentStore::new();
    for (i, m) in ["a", "b", "c", "d", "e"].iter().enumerate() {
        store.insert("z", m, i as f64);
    }
    let engine = SortedSetEngine::new(store);

    // all but the last
    assert_eq!(engine.range("z", 0, -2).await.unwrap(), ["a", "b", "c", "d"]);
    assert_eq!(engine.rev_range("z", 0, -2).await.unwrap(), ["e", "d", "c", "b"]);
    assert_eq!(engine.range("z", -3, -1).await.unwrap(), ["c", "d", "e"]);
    assert!(engine.range("z", 5, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_every_window_is_a_native_slice() {
    let (engine, expected) = random_set(77, 12);
    let all = members(&expected);
    let len = all.len() as i64;

    for start in -15..15i64 {
        for stop in -15..15i64 {
            let s = if start < 0 { (len + start).max(0) } else { start };
            let e = if stop < 0 { len + stop } else { stop.min(len - 1) };
            let want: Vec<String> = if s > e || s >= len {
                Vec::new()
            } else {
                all[s as usize..=e as usize].to_vec()
            };
            let got = engine.range("z", start, stop).await.unwrap();
            assert_eq!(got, want, "window [{}, {}]", start, stop);
        }
    }
}

// =============================================================================
// Lookups
// =============================================================================

#[tokio::test]
async fn test_rank_matches_position() {
    for seed in 0..10 {
        let (engine, expected) = random_set(seed, 30);
        let len = expected.len() as u64;
        for (position, (member, _)) in expected.iter().enumerate() {
            assert_eq!(
                engine.rank("z", member.as_str()).await.unwrap(),
                Some(position as u64),
                "seed {} member {}",
                seed,
                member
            );
            assert_eq!(
                engine.rev_rank("z", member.as_str()).await.unwrap(),
                Some(len - 1 - position as u64)
            );
        }
        let fetched = engine.ranks("z", &members(&expected)).await.unwrap();
        assert_eq!(fetched, (0..len).map(Some).collect::<Vec<_>>());
    }
}

#[tokio::test]
async fn test_score_lookup_is_idempotent() {
    let (engine, expected) = random_set(3, 10);
    let (member, score) = &expected[4];
    let first = engine.score("z", member.as_str()).await.unwrap();
    let second = engine.score("z", member.as_str()).await.unwrap();
    assert_eq!(first, Some(*score));
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_increment_round_trip() {
    let (engine, expected) = random_set(5, 10);
    let (member, original) = &expected[2];

    engine.increment_by("z", member.as_str(), 5.0).await.unwrap();
    let restored = engine.increment_by("z", member.as_str(), -5.0).await.unwrap();
    assert!((restored - original).abs() < 1e-9);
    assert_eq!(engine.card("z").await.unwrap(), 10);
}

#[tokio::test]
async fn test_lex_boundaries() {
    let store = InMemoryDocumentStore::new();
    for m in ["a", "b", "c"] {
        store.insert("z", m, 0.0);
    }
    let engine = SortedSetEngine::new(store);

    assert_eq!(engine.range_by_lex("z", "-", "(b", LexPage::all()).await.unwrap(), ["a"]);
    assert_eq!(engine.range_by_lex("z", "[b", "+", LexPage::all()).await.unwrap(), ["b", "c"]);
    assert_eq!(engine.lex_count("z", "(a", "+").await.unwrap(), 2);
}

#[tokio::test]
async fn test_absent_is_not_an_error() {
    let engine = SortedSetEngine::new(InMemoryDocumentStore::new());
    assert_eq!(engine.score("nope", "x").await.unwrap(), None);
    assert_eq!(engine.rank("nope", "x").await.unwrap(), None);
    assert!(!engine.is_member("nope", "x").await.unwrap());
    assert_eq!(engine.card("nope").await.unwrap(), 0);
    assert_eq!(engine.count("nope", ScoreRange::ALL).await.unwrap(), 0);
    assert!(engine.range("nope", 0, -1).await.unwrap().is_empty());
    assert_eq!(engine.sets_members(&["nope"]).await.unwrap(), vec![Vec::<String>::new()]);
}

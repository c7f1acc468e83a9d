//! Fault identifiers
//!
//! Stable string ids so stats and per-fault multipliers can refer to them.

pub mod document_store {
    /// `find` fails before touching data
    pub const FIND_FAIL: &str = "document_store.find_fail";
    /// `count` fails before touching data
    pub const COUNT_FAIL: &str = "document_store.count_fail";
    /// upsert fails with a non-retryable error
    pub const UPSERT_FAIL: &str = "document_store.upsert_fail";
    /// upsert reports a duplicate key although no insert raced it
    pub const SPURIOUS_DUPLICATE_KEY: &str = "document_store.spurious_duplicate_key";
    /// `delete_many` fails before deleting anything
    pub const DELETE_FAIL: &str = "document_store.delete_fail";
    /// cursor `next` fails mid-iteration
    pub const CURSOR_FAIL: &str = "document_store.cursor_fail";
    /// operation is delayed before reaching the store
    pub const LATENCY: &str = "document_store.latency";
}

/// Every fault id, for iteration in reports
pub const ALL_FAULTS: &[&str] = &[
    document_store::FIND_FAIL,
    document_store::COUNT_FAIL,
    document_store::UPSERT_FAIL,
    document_store::SPURIOUS_DUPLICATE_KEY,
    document_store::DELETE_FAIL,
    document_store::CURSOR_FAIL,
    document_store::LATENCY,
];

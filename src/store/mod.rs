//! Backing Document Store
//!
//! The sorted-set engine never sees storage internals. It builds a typed
//! [`Query`] plus [`FindOptions`]/[`CursorOptions`] and hands them to a
//! [`DocumentStore`].
//!
//! ## Architecture
//!
//! ```text
//! SortedSetEngine → Query + FindOptions → DocumentStore
//!                                            ├─ InMemoryDocumentStore
//!                                            └─ SimulatedDocumentStore (faults)
//! ```

pub mod document_store;
pub mod filter;
pub mod memory;
pub mod simulated;

pub use document_store::{
    CursorOptions, Direction, Document, DocumentCursor, DocumentStore, FindOptions, Projection,
    Sort, SortField, StoreError, StoreFuture,
};
pub use filter::{Filter, KeyPredicate, Query, ScorePredicate, ValuePredicate};
pub use memory::InMemoryDocumentStore;
pub use simulated::{SimulatedDocumentStore, SimulatedStoreConfig, SimulatedStoreStats};

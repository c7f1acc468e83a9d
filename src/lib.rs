pub mod io;
pub mod buggify;
pub mod config;
pub mod store;
pub mod zset;

pub use config::{ConfigError, EngineConfig};
pub use store::{DocumentStore, InMemoryDocumentStore, SimulatedDocumentStore, StoreError};
pub use zset::{
    LexPage, ProcessOptions, ProcessStats, ScoreRange, ScoredMember, SetItem, SetKeys,
    SortedSetEngine, ToMember, ZsetError, ZsetResult,
};

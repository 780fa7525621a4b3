//! # quarry-kv
//!
//! MVCC key-value layer for QuarryDB.
//!
//! This crate layers a versioned, transactional key-value substrate over an
//! ordered byte-oriented engine. It implements:
//!
//! - The engine abstraction: ordered byte-KV with snapshots, forward
//!   iterators and atomic batched writes (plus an in-memory engine)
//! - MVCC key encoding with descending versions and tombstone deletes
//! - Snapshot point reads and the version-collapsing range scanner
//! - Buffered transactions with atomic commit
//! - Secondary indexes with unique-constraint enforcement

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod index;
pub mod mvcc;
pub mod store;
pub mod txn;

pub use engine::{Engine, EngineIterator, EngineRef, EngineSnapshot, Mutation, WriteBatch};
pub use engine::memory::MemoryEngine;
pub use index::{Index, IndexIterator};
pub use mvcc::snapshot::{MvccScanner, MvccSnapshot};
pub use store::Store;
pub use txn::{Transaction, TxnIterator};

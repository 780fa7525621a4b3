//! Engine abstraction.
//!
//! The engine is a minimal ordered byte-KV store: snapshots, forward
//! iterators starting at the smallest key greater than or equal to a seek
//! key, and atomic multi-key batched writes. The MVCC layer builds
//! everything else on top of this contract. Version allocation is delegated
//! to the engine so that commits are totally ordered.

pub mod memory;

use std::sync::Arc;

use quarry_common::error::QuarryResult;
use quarry_common::types::{EncodedKey, Value, Version};

/// A single buffered engine mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Write a value.
    Put(Value),
    /// Remove the key.
    Delete,
}

/// An atomically applied set of engine mutations.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    entries: Vec<(EncodedKey, Mutation)>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a put to the batch.
    pub fn put(&mut self, key: EncodedKey, value: Value) {
        self.entries.push((key, Mutation::Put(value)));
    }

    /// Adds a delete to the batch.
    pub fn delete(&mut self, key: EncodedKey) {
        self.entries.push((key, Mutation::Delete));
    }

    /// Returns the buffered entries.
    #[must_use]
    pub fn entries(&self) -> &[(EncodedKey, Mutation)] {
        &self.entries
    }

    /// Returns the number of buffered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the batch carries no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Shared handle to an engine.
pub type EngineRef = Arc<dyn Engine>;

/// An ordered byte-KV store.
pub trait Engine: Send + Sync + std::fmt::Debug {
    /// Takes a consistent read snapshot of the current engine state.
    fn snapshot(&self) -> QuarryResult<Arc<dyn EngineSnapshot>>;

    /// Applies a batch of mutations atomically: either every entry is
    /// applied or the engine is left unchanged.
    fn write(&self, batch: WriteBatch) -> QuarryResult<()>;

    /// Allocates a fresh commit version, strictly greater than every
    /// version allocated before.
    fn allocate_version(&self) -> Version;

    /// Returns the newest allocated version. Snapshots taken now observe
    /// every commit up to and including it.
    fn current_version(&self) -> Version;
}

/// A consistent read view of the engine.
pub trait EngineSnapshot: Send + Sync {
    /// Opens a forward iterator positioned at the smallest key greater than
    /// or equal to `start`.
    fn iterator(&self, start: &[u8]) -> QuarryResult<Box<dyn EngineIterator>>;
}

/// A forward engine iterator.
///
/// `key` and `value` are only valid after `next` has returned true. The
/// iterator releases its resources on drop.
pub trait EngineIterator: Send {
    /// Advances to the next entry, returning false once exhausted.
    fn next(&mut self) -> bool;

    /// The current entry's key.
    fn key(&self) -> &[u8];

    /// The current entry's value.
    fn value(&self) -> &[u8];
}

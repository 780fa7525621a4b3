//! Snapshot reads over MVCC-encoded data.
//!
//! A point read starts its scan at `mvcc(key, snapshot_version)`: every
//! version of the key newer than the snapshot encodes to a smaller engine
//! key and is skipped by the seek itself. The range scanner collapses all
//! versions of each user key to its newest non-tombstone value at or below
//! the snapshot, advancing its cursor to the smallest strictly greater user
//! key after each emission.

use std::sync::Arc;

use quarry_common::error::{QuarryError, QuarryResult};
use quarry_common::types::{Key, Value, Version};

use crate::engine::EngineSnapshot;

use super::{is_data_key, is_tombstone, mvcc_decode, mvcc_encode};

/// A read view pinned at a version.
#[derive(Clone)]
pub struct MvccSnapshot {
    snapshot: Arc<dyn EngineSnapshot>,
    version: Version,
}

impl MvccSnapshot {
    /// Creates a snapshot over an engine snapshot, pinned at `version`.
    pub fn new(snapshot: Arc<dyn EngineSnapshot>, version: Version) -> Self {
        Self { snapshot, version }
    }

    /// Returns the pinned version.
    #[must_use]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Reads the newest visible value of `key`.
    ///
    /// Returns [`QuarryError::KeyNotFound`] if the key has no version at or
    /// below the snapshot, or its newest visible version is a tombstone.
    pub fn get(&self, key: &Key) -> QuarryResult<Value> {
        let start = mvcc_encode(key, self.version);
        let mut iter = self.snapshot.iterator(start.as_bytes())?;
        if !iter.next() || !is_data_key(iter.key()) {
            return Err(QuarryError::KeyNotFound);
        }
        let (found, _) = mvcc_decode(iter.key())?;
        if found != *key || is_tombstone(iter.value()) {
            return Err(QuarryError::KeyNotFound);
        }
        Ok(Value::from_bytes(iter.value()))
    }

    /// Opens a collapsing range scanner positioned at `start`.
    #[must_use]
    pub fn scan(&self, start: &Key) -> MvccScanner {
        MvccScanner {
            snapshot: self.snapshot.clone(),
            version: self.version,
            cursor: Some(start.clone()),
        }
    }
}

impl std::fmt::Debug for MvccSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MvccSnapshot")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// A forward scan over live user keys.
///
/// Yields `(user_key, value)` pairs, collapsing every version of each user
/// key to its newest non-tombstone value at or below the snapshot version.
/// Tombstoned keys are silently skipped.
pub struct MvccScanner {
    snapshot: Arc<dyn EngineSnapshot>,
    version: Version,
    /// The next user key to examine; None once the scan is exhausted.
    cursor: Option<Key>,
}

impl MvccScanner {
    /// Advances to the next live user key.
    pub fn next(&mut self) -> QuarryResult<Option<(Key, Value)>> {
        while let Some(cursor) = self.cursor.take() {
            let start = mvcc_encode(&cursor, self.version);
            let mut iter = self.snapshot.iterator(start.as_bytes())?;
            if !iter.next() || !is_data_key(iter.key()) {
                break;
            }
            let (key, version) = mvcc_decode(iter.key())?;
            if version > self.version {
                // A later user key whose newest version is above the
                // snapshot; restart at its visible version block.
                self.cursor = Some(key);
                continue;
            }
            // Newest visible version of `key`. Advance past the whole
            // version block before deciding what to emit.
            self.cursor = Some(key.next());
            if is_tombstone(iter.value()) {
                continue;
            }
            return Ok(Some((key, Value::from_bytes(iter.value()))));
        }
        Ok(None)
    }
}

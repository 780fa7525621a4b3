//! In-memory engine for tests.
//!
//! The whole keyspace lives in one `BTreeMap` behind a copy-on-write `Arc`:
//! snapshots are Arc clones and therefore truly immutable, while a batched
//! write clones the map, applies every mutation and swaps the Arc under the
//! write lock.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use quarry_common::error::QuarryResult;
use quarry_common::types::Version;

use super::{Engine, EngineIterator, EngineSnapshot, Mutation, WriteBatch};

type KeySpace = BTreeMap<Vec<u8>, Vec<u8>>;

/// An in-memory ordered KV engine.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    data: RwLock<Arc<KeySpace>>,
    version: AtomicU64,
}

impl MemoryEngine {
    /// Creates an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live engine entries (all versions).
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if the engine holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl Engine for MemoryEngine {
    fn snapshot(&self) -> QuarryResult<Arc<dyn EngineSnapshot>> {
        Ok(Arc::new(MemorySnapshot {
            data: self.data.read().clone(),
        }))
    }

    fn write(&self, batch: WriteBatch) -> QuarryResult<()> {
        let mut guard = self.data.write();
        let mut map = (**guard).clone();
        for (key, mutation) in batch.entries() {
            match mutation {
                Mutation::Put(value) => {
                    map.insert(key.as_bytes().to_vec(), value.as_bytes().to_vec());
                }
                Mutation::Delete => {
                    map.remove(key.as_bytes());
                }
            }
        }
        *guard = Arc::new(map);
        Ok(())
    }

    fn allocate_version(&self) -> Version {
        Version::new(self.version.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn current_version(&self) -> Version {
        Version::new(self.version.load(Ordering::SeqCst))
    }
}

struct MemorySnapshot {
    data: Arc<KeySpace>,
}

impl EngineSnapshot for MemorySnapshot {
    fn iterator(&self, start: &[u8]) -> QuarryResult<Box<dyn EngineIterator>> {
        Ok(Box::new(MemoryIterator {
            data: self.data.clone(),
            start: start.to_vec(),
            current: None,
            done: false,
        }))
    }
}

struct MemoryIterator {
    data: Arc<KeySpace>,
    start: Vec<u8>,
    current: Option<(Vec<u8>, Vec<u8>)>,
    done: bool,
}

impl EngineIterator for MemoryIterator {
    fn next(&mut self) -> bool {
        if self.done {
            return false;
        }
        let from = match &self.current {
            None => Bound::Included(self.start.clone()),
            Some((key, _)) => Bound::Excluded(key.clone()),
        };
        match self.data.range((from, Bound::Unbounded)).next() {
            Some((key, value)) => {
                self.current = Some((key.clone(), value.clone()));
                true
            }
            None => {
                self.done = true;
                false
            }
        }
    }

    fn key(&self) -> &[u8] {
        self.current.as_ref().map_or(&[], |(key, _)| key.as_slice())
    }

    fn value(&self) -> &[u8] {
        self.current
            .as_ref()
            .map_or(&[], |(_, value)| value.as_slice())
    }
}

//! Buffered transactions.
//!
//! A transaction captures an MVCC snapshot at begin and buffers writes in
//! memory until commit. Reads are read-your-writes: the buffer overlays the
//! snapshot, so a `get` or `seek` observes the transaction's own uncommitted
//! puts and deletes. Commit allocates a version from the engine and flushes
//! the whole buffer as one atomic batch of `(mvcc(key, version), value)`
//! entries, writing tombstones for deletes.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use quarry_common::error::{QuarryError, QuarryResult};
use quarry_common::types::{Key, Value, Version};

use crate::engine::{EngineRef, Mutation, WriteBatch};
use crate::mvcc::snapshot::{MvccScanner, MvccSnapshot};
use crate::mvcc::{mvcc_encode, TOMBSTONE};

/// A buffered read-write transaction.
pub struct Transaction {
    engine: EngineRef,
    snapshot: MvccSnapshot,
    buffer: BTreeMap<Key, Mutation>,
    locked: BTreeSet<Key>,
    finished: bool,
}

impl Transaction {
    /// Creates a transaction over a captured snapshot.
    pub(crate) fn new(engine: EngineRef, snapshot: MvccSnapshot) -> Self {
        Self {
            engine,
            snapshot,
            buffer: BTreeMap::new(),
            locked: BTreeSet::new(),
            finished: false,
        }
    }

    /// Returns the snapshot version this transaction reads at.
    #[must_use]
    pub fn start_version(&self) -> Version {
        self.snapshot.version()
    }

    /// Reads the value of `key`, observing buffered writes first.
    pub fn get(&self, key: &Key) -> QuarryResult<Value> {
        match self.buffer.get(key) {
            Some(Mutation::Put(value)) => Ok(value.clone()),
            Some(Mutation::Delete) => Err(QuarryError::KeyNotFound),
            None => self.snapshot.get(key),
        }
    }

    /// Buffers a write of `value` at `key`.
    pub fn set(&mut self, key: Key, value: Value) -> QuarryResult<()> {
        self.check_active()?;
        self.buffer.insert(key, Mutation::Put(value));
        Ok(())
    }

    /// Buffers a delete of `key`.
    pub fn delete(&mut self, key: Key) -> QuarryResult<()> {
        self.check_active()?;
        self.buffer.insert(key, Mutation::Delete);
        Ok(())
    }

    /// Records row locks for `SELECT ... FOR UPDATE`.
    pub fn lock_keys(&mut self, keys: impl IntoIterator<Item = Key>) -> QuarryResult<()> {
        self.check_active()?;
        self.locked.extend(keys);
        Ok(())
    }

    /// Returns the keys locked so far.
    #[must_use]
    pub fn locked_keys(&self) -> &BTreeSet<Key> {
        &self.locked
    }

    /// Opens a merged iterator over the snapshot and the write buffer,
    /// positioned at the smallest key greater than or equal to `start`.
    ///
    /// The buffer overlay is captured when the iterator is opened; buffered
    /// deletes hide snapshot entries.
    pub fn seek(&self, start: &Key) -> QuarryResult<TxnIterator> {
        let buffered = self
            .buffer
            .range(start.clone()..)
            .map(|(key, mutation)| {
                let value = match mutation {
                    Mutation::Put(value) => Some(value.clone()),
                    Mutation::Delete => None,
                };
                (key.clone(), value)
            })
            .collect();
        Ok(TxnIterator {
            buffered,
            scanner: self.snapshot.scan(start),
            pending: None,
        })
    }

    /// Commits every buffered write atomically under a freshly allocated
    /// version. Returns the commit version (the start version for a
    /// read-only transaction).
    pub fn commit(&mut self) -> QuarryResult<Version> {
        self.check_active()?;
        self.finished = true;

        if self.buffer.is_empty() {
            return Ok(self.snapshot.version());
        }

        let version = self.engine.allocate_version();
        let mut batch = WriteBatch::new();
        for (key, mutation) in &self.buffer {
            let encoded = mvcc_encode(key, version);
            let value = match mutation {
                Mutation::Put(value) => value.clone(),
                Mutation::Delete => Value::from_bytes(&TOMBSTONE),
            };
            batch.put(encoded, value);
        }
        let entries = batch.len();
        self.engine.write(batch)?;
        tracing::debug!(version = version.value(), entries, "transaction committed");
        Ok(version)
    }

    /// Discards every buffered write.
    pub fn rollback(&mut self) -> QuarryResult<()> {
        self.check_active()?;
        self.finished = true;
        self.buffer.clear();
        self.locked.clear();
        Ok(())
    }

    /// Returns true if the transaction is still open.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.finished
    }

    fn check_active(&self) -> QuarryResult<()> {
        if self.finished {
            return Err(QuarryError::TransactionFinished);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("start_version", &self.snapshot.version())
            .field("buffered", &self.buffer.len())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

/// A forward iterator over the union of a transaction's snapshot and its
/// write buffer.
pub struct TxnIterator {
    /// Buffered entries at or after the seek key; None marks a delete.
    buffered: VecDeque<(Key, Option<Value>)>,
    scanner: MvccScanner,
    pending: Option<(Key, Value)>,
}

impl TxnIterator {
    /// Advances to the next live entry.
    pub fn next(&mut self) -> QuarryResult<Option<(Key, Value)>> {
        loop {
            if self.pending.is_none() {
                self.pending = self.scanner.next()?;
            }
            let take_buffer = match (self.buffered.front(), self.pending.as_ref()) {
                (None, None) => return Ok(None),
                (None, Some(_)) => false,
                (Some(_), None) => true,
                (Some((buffer_key, _)), Some((snap_key, _))) => buffer_key <= snap_key,
            };
            if !take_buffer {
                return Ok(self.pending.take());
            }
            let Some((key, value)) = self.buffered.pop_front() else {
                continue;
            };
            // The buffer overrides the snapshot at the same key.
            if let Some((snap_key, _)) = self.pending.as_ref() {
                if *snap_key == key {
                    self.pending = None;
                }
            }
            match value {
                Some(value) => return Ok(Some((key, value))),
                None => continue,
            }
        }
    }
}

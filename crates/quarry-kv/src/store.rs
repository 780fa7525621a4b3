//! Store facade: transaction begin and snapshot capture.

use std::sync::Arc;

use quarry_common::error::QuarryResult;

use crate::engine::EngineRef;
use crate::mvcc::snapshot::MvccSnapshot;
use crate::txn::Transaction;

/// The entry point to the versioned KV layer.
///
/// A `Store` wraps an engine and hands out transactions pinned at the
/// engine's current version.
#[derive(Debug, Clone)]
pub struct Store {
    engine: EngineRef,
}

impl Store {
    /// Creates a store over an engine.
    #[must_use]
    pub fn new(engine: EngineRef) -> Self {
        Self { engine }
    }

    /// Creates a store over a fresh in-memory engine.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(crate::engine::memory::MemoryEngine::new()))
    }

    /// Returns the underlying engine.
    #[must_use]
    pub fn engine(&self) -> &EngineRef {
        &self.engine
    }

    /// Captures a read snapshot at the current version.
    pub fn snapshot(&self) -> QuarryResult<MvccSnapshot> {
        Ok(MvccSnapshot::new(
            self.engine.snapshot()?,
            self.engine.current_version(),
        ))
    }

    /// Begins a transaction reading at the current version.
    pub fn begin(&self) -> QuarryResult<Transaction> {
        let snapshot = self.snapshot()?;
        tracing::trace!(version = snapshot.version().value(), "begin transaction");
        Ok(Transaction::new(self.engine.clone(), snapshot))
    }
}

//! The row/table facade.
//!
//! Key layout, all MVCC-wrapped by the transaction at commit:
//!
//! ```text
//! data rows:     "t_<id>_r" ‖ encode_int(row_id)                  → encode_value(col₁…colₙ)
//! unique index:  enc("t_<id>_i_<name>") ‖ encode_value(cols)       → encode_int(row_id)
//! nonunq index:  enc("t_<id>_i_<name>") ‖ encode_value(cols, rid)  → placeholder
//! ```
//!
//! Row ids are allocated per table from an atomic counter. Decoding a stored
//! row with fewer columns than the schema pads the tail with NULL, so rows
//! written before a column was added still read back.

use std::sync::atomic::{AtomicI64, Ordering};

use quarry_codec::{decode_int, decode_value, encode_int, encode_value, Datum};
use quarry_common::error::{QuarryError, QuarryResult};
use quarry_common::types::{Key, RowId, Value};
use quarry_kv::index::Index;
use quarry_kv::txn::{Transaction, TxnIterator};

use crate::field::ResultField;

use super::catalog::{IndexInfo, TableInfo};

/// A table bound to its key layout and indexes.
#[derive(Debug)]
pub struct Table {
    info: TableInfo,
    record_prefix: Vec<u8>,
    indices: Vec<Index>,
    row_id_alloc: AtomicI64,
}

impl Table {
    /// Creates the facade for `info`.
    #[must_use]
    pub fn new(info: TableInfo) -> Self {
        let record_prefix = format!("t_{}_r", info.id).into_bytes();
        let index_section = format!("t_{}_i", info.id);
        let indices = info
            .indices
            .iter()
            .map(|idx| Index::new(&index_section, &idx.name, idx.unique))
            .collect();
        Self {
            info,
            record_prefix,
            indices,
            row_id_alloc: AtomicI64::new(0),
        }
    }

    /// Returns the table metadata.
    #[must_use]
    pub fn info(&self) -> &TableInfo {
        &self.info
    }

    /// Returns the table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Returns the result fields a scan of this table produces.
    #[must_use]
    pub fn result_fields(&self) -> Vec<ResultField> {
        self.info
            .columns
            .iter()
            .map(|column| ResultField::column(&self.info.name, &column.name))
            .collect()
    }

    /// Returns the secondary index descriptor named `name`.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indices.iter().find(|idx| idx.name() == name)
    }

    /// Allocates the next row id.
    #[must_use]
    pub fn alloc_row_id(&self) -> RowId {
        RowId::new(self.row_id_alloc.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Builds the engine key of a row.
    #[must_use]
    pub fn record_key(&self, row_id: RowId) -> Key {
        let mut buf = self.record_prefix.clone();
        encode_int(&mut buf, row_id.value());
        Key::from_vec(buf)
    }

    /// Recovers a row id from a record key.
    pub fn decode_record_key(&self, key: &Key) -> QuarryResult<RowId> {
        if !key.starts_with(&self.record_prefix) {
            return Err(QuarryError::InvalidKey {
                message: format!("key does not belong to table {}", self.info.name),
            });
        }
        let (row_id, rest) = decode_int(&key.as_bytes()[self.record_prefix.len()..])?;
        if !rest.is_empty() {
            return Err(QuarryError::InvalidKey {
                message: "trailing bytes after row id".to_string(),
            });
        }
        Ok(RowId::new(row_id))
    }

    fn indexed_values(index: &IndexInfo, row: &[Datum]) -> Vec<Datum> {
        index
            .columns
            .iter()
            .map(|&offset| row.get(offset).cloned().unwrap_or(Datum::Null))
            .collect()
    }

    fn check_width(&self, values: &[Datum]) -> QuarryResult<()> {
        if values.len() != self.info.columns.len() {
            return Err(QuarryError::internal(format!(
                "table {} expects {} columns, got {}",
                self.info.name,
                self.info.columns.len(),
                values.len()
            )));
        }
        Ok(())
    }

    /// Inserts a row, maintaining every index, and returns its row id.
    ///
    /// Fails with the duplicate-key kind when a unique index already holds
    /// the row's indexed values.
    pub fn add_record(&self, txn: &mut Transaction, values: &[Datum]) -> QuarryResult<RowId> {
        self.check_width(values)?;
        let row_id = self.alloc_row_id();
        for (info, index) in self.info.indices.iter().zip(&self.indices) {
            index.create(txn, &Self::indexed_values(info, values), row_id)?;
        }
        txn.set(
            self.record_key(row_id),
            Value::from_vec(encode_value(values)),
        )?;
        tracing::trace!(table = %self.info.name, row_id = row_id.value(), "add record");
        Ok(row_id)
    }

    /// Deletes a row and its index entries. `values` must be the row's
    /// current column values.
    pub fn remove_record(
        &self,
        txn: &mut Transaction,
        row_id: RowId,
        values: &[Datum],
    ) -> QuarryResult<()> {
        self.check_width(values)?;
        for (info, index) in self.info.indices.iter().zip(&self.indices) {
            index.delete(txn, &Self::indexed_values(info, values), row_id)?;
        }
        txn.delete(self.record_key(row_id))
    }

    /// Rewrites a row in place, refreshing index entries that changed.
    pub fn update_record(
        &self,
        txn: &mut Transaction,
        row_id: RowId,
        old: &[Datum],
        new: &[Datum],
    ) -> QuarryResult<()> {
        self.check_width(old)?;
        self.check_width(new)?;
        for (info, index) in self.info.indices.iter().zip(&self.indices) {
            let old_values = Self::indexed_values(info, old);
            let new_values = Self::indexed_values(info, new);
            if old_values != new_values {
                index.delete(txn, &old_values, row_id)?;
                index.create(txn, &new_values, row_id)?;
            }
        }
        txn.set(self.record_key(row_id), Value::from_vec(encode_value(new)))
    }

    /// Reads one row by row id.
    pub fn row(&self, txn: &Transaction, row_id: RowId) -> QuarryResult<Vec<Datum>> {
        let value = txn.get(&self.record_key(row_id))?;
        self.decode_row(value.as_bytes())
    }

    /// Opens a full scan over the table's rows.
    pub fn scan(&self, txn: &Transaction) -> QuarryResult<TableIterator> {
        Ok(TableIterator {
            iter: txn.seek(&Key::from_vec(self.record_prefix.clone()))?,
            prefix: self.record_prefix.clone(),
            columns: self.info.columns.len(),
        })
    }

    fn decode_row(&self, bytes: &[u8]) -> QuarryResult<Vec<Datum>> {
        let mut values = decode_value(bytes)?;
        // Rows written under an older, narrower schema read back NULL-padded.
        while values.len() < self.info.columns.len() {
            values.push(Datum::Null);
        }
        values.truncate(self.info.columns.len());
        Ok(values)
    }
}

/// A forward scan over a table's rows in row-id order.
pub struct TableIterator {
    iter: TxnIterator,
    prefix: Vec<u8>,
    columns: usize,
}

impl std::fmt::Debug for TableIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableIterator")
            .field("prefix", &self.prefix)
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

impl TableIterator {
    /// Advances to the next row.
    pub fn next(&mut self) -> QuarryResult<Option<(RowId, Vec<Datum>)>> {
        let Some((key, value)) = self.iter.next()? else {
            return Ok(None);
        };
        if !key.starts_with(&self.prefix) {
            return Ok(None);
        }
        let (row_id, _) = decode_int(&key.as_bytes()[self.prefix.len()..])?;
        let mut values = decode_value(value.as_bytes())?;
        while values.len() < self.columns {
            values.push(Datum::Null);
        }
        values.truncate(self.columns);
        Ok(Some((RowId::new(row_id), values)))
    }
}

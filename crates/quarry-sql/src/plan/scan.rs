//! Full table scan.

use std::sync::Arc;

use quarry_common::error::QuarryResult;

use crate::field::ResultField;
use crate::storage::{Table, TableIterator};

use super::{ExecutionContext, Row, RowKeyEntry};

/// Scans a table's row range in row-id order, emitting each row with its
/// origin row key.
#[derive(Debug)]
pub struct TableScanPlan {
    table: Arc<Table>,
    fields: Vec<ResultField>,
    iter: Option<TableIterator>,
}

impl TableScanPlan {
    /// Creates a scan over `table`.
    #[must_use]
    pub fn new(table: Arc<Table>) -> Self {
        let fields = table.result_fields();
        Self {
            table,
            fields,
            iter: None,
        }
    }

    pub(crate) fn fields(&self) -> &[ResultField] {
        &self.fields
    }

    pub(crate) fn table_name(&self) -> &str {
        self.table.name()
    }

    pub(crate) fn next(&mut self, ctx: &ExecutionContext) -> QuarryResult<Option<Row>> {
        if self.iter.is_none() {
            let txn = ctx.txn.lock();
            self.iter = Some(self.table.scan(&txn)?);
        }
        let Some(iter) = self.iter.as_mut() else {
            return Ok(None);
        };
        match iter.next()? {
            Some((row_id, data)) => Ok(Some(Row {
                data,
                row_keys: vec![RowKeyEntry {
                    table: self.table.name().to_string(),
                    key: self.table.record_key(row_id),
                }],
            })),
            None => Ok(None),
        }
    }

    pub(crate) fn close(&mut self) {
        self.iter = None;
    }
}

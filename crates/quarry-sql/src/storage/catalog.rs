//! Table metadata and the catalog registry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use quarry_common::error::{QuarryError, QuarryResult};
use quarry_common::types::TableId;

use super::table::Table;

/// One column of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
}

impl ColumnInfo {
    /// Creates a column.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// One secondary index of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    /// Index name.
    pub name: String,
    /// Uniqueness constraint.
    pub unique: bool,
    /// Offsets of the indexed columns.
    pub columns: Vec<usize>,
}

/// Table metadata.
#[derive(Debug, Clone)]
pub struct TableInfo {
    /// Table id; namespaces the table's engine keys.
    pub id: TableId,
    /// Table name.
    pub name: String,
    /// Columns in order.
    pub columns: Vec<ColumnInfo>,
    /// Secondary indexes.
    pub indices: Vec<IndexInfo>,
}

impl TableInfo {
    /// Creates table metadata from column names.
    #[must_use]
    pub fn new(id: TableId, name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            id,
            name: name.into(),
            columns: columns.iter().map(|c| ColumnInfo::new(*c)).collect(),
            indices: Vec::new(),
        }
    }

    /// Adds a secondary index over the given column offsets.
    #[must_use]
    pub fn with_index(mut self, name: impl Into<String>, columns: Vec<usize>, unique: bool) -> Self {
        self.indices.push(IndexInfo {
            name: name.into(),
            unique,
            columns,
        });
        self
    }
}

/// The table registry.
///
/// DDL is out of scope here; tables are registered programmatically and
/// looked up by name, case-insensitively.
#[derive(Debug, Default)]
pub struct Catalog {
    tables: RwLock<HashMap<String, Arc<Table>>>,
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table, replacing any previous definition of the name.
    pub fn register(&self, info: TableInfo) -> Arc<Table> {
        let table = Arc::new(Table::new(info));
        self.tables
            .write()
            .insert(table.name().to_ascii_lowercase(), table.clone());
        table
    }

    /// Looks up a table by name.
    pub fn table(&self, name: &str) -> QuarryResult<Arc<Table>> {
        self.tables
            .read()
            .get(&name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| QuarryError::TableNotFound {
                name: name.to_string(),
            })
    }

    /// Lists the registered table names.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.tables.read().values().map(|t| t.name().to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let catalog = Catalog::new();
        catalog.register(TableInfo::new(TableId::new(1), "users", &["id", "name"]));

        assert!(catalog.table("users").is_ok());
        assert!(catalog.table("USERS").is_ok());
        assert!(matches!(
            catalog.table("missing").unwrap_err(),
            QuarryError::TableNotFound { .. }
        ));
    }

    #[test]
    fn test_with_index() {
        let info = TableInfo::new(TableId::new(1), "t", &["id", "name"])
            .with_index("name", vec![1], true);
        assert_eq!(info.indices.len(), 1);
        assert!(info.indices[0].unique);
        assert_eq!(info.indices[0].columns, vec![1]);
    }
}

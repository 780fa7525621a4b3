//! Session variables.
//!
//! A [`SessionVars`] record is owned by one connection and carries the
//! user-defined and system variable maps, the status flags the executor
//! consults (auto-commit, in-transaction) and the counters behind the
//! `FOUND_ROWS()` / `LAST_INSERT_ID()` / `ROW_COUNT()` builtins. System
//! variable defaults come from a [`SystemVarRegistry`] constructed at
//! startup and passed into the server; there is no module-level registry.

use std::collections::HashMap;

/// Per-connection session state.
#[derive(Debug, Clone)]
pub struct SessionVars {
    /// User-defined variables (`@name`).
    pub users: HashMap<String, String>,
    /// System variables (`@@name`).
    pub systems: HashMap<String, String>,
    /// Schema selected with `USE`, if any.
    pub current_schema: Option<String>,
    /// Whether auto-commit is enabled.
    pub auto_commit: bool,
    /// Whether an explicit transaction is open.
    pub in_transaction: bool,
    /// Rows found by the last SELECT.
    pub found_rows: u64,
    /// Last auto-generated row id.
    pub last_insert_id: u64,
    /// Rows affected by the last statement.
    pub affected_rows: u64,
}

impl SessionVars {
    /// Creates session state with default flags.
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: HashMap::new(),
            systems: HashMap::new(),
            current_schema: None,
            auto_commit: true,
            in_transaction: false,
            found_rows: 0,
            last_insert_id: 0,
            affected_rows: 0,
        }
    }

    /// Returns true if statements commit implicitly.
    ///
    /// Locking reads only take effect when this is false: with auto-commit
    /// enabled and no open transaction, `SELECT ... FOR UPDATE` does not
    /// lock the matching rows.
    #[must_use]
    pub fn should_autocommit(&self) -> bool {
        self.auto_commit && !self.in_transaction
    }

    /// Looks up a system variable.
    #[must_use]
    pub fn system_var(&self, name: &str) -> Option<&str> {
        self.systems.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Sets a system variable.
    pub fn set_system_var(&mut self, name: &str, value: impl Into<String>) {
        self.systems.insert(name.to_ascii_lowercase(), value.into());
    }
}

impl Default for SessionVars {
    fn default() -> Self {
        Self::new()
    }
}

/// Startup-constructed registry of system variable defaults.
#[derive(Debug, Clone)]
pub struct SystemVarRegistry {
    defaults: HashMap<String, String>,
}

impl SystemVarRegistry {
    /// Creates a registry with the built-in defaults.
    #[must_use]
    pub fn new() -> Self {
        let mut defaults = HashMap::new();
        defaults.insert("autocommit".to_string(), "ON".to_string());
        defaults.insert("sql_mode".to_string(), String::new());
        defaults.insert("max_allowed_packet".to_string(), "67108864".to_string());
        defaults.insert("version_comment".to_string(), "QuarryDB".to_string());
        Self { defaults }
    }

    /// Overrides or adds a default.
    pub fn register(&mut self, name: &str, value: impl Into<String>) {
        self.defaults.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Returns a default value.
    #[must_use]
    pub fn default_value(&self, name: &str) -> Option<&str> {
        self.defaults.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Creates a fresh session seeded with the registered defaults.
    #[must_use]
    pub fn new_session(&self) -> SessionVars {
        let mut session = SessionVars::new();
        session.systems = self.defaults.clone();
        session
    }
}

impl Default for SystemVarRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_autocommit() {
        let mut vars = SessionVars::new();
        assert!(vars.should_autocommit());

        vars.in_transaction = true;
        assert!(!vars.should_autocommit());

        vars.in_transaction = false;
        vars.auto_commit = false;
        assert!(!vars.should_autocommit());
    }

    #[test]
    fn test_registry_seeds_sessions() {
        let mut registry = SystemVarRegistry::new();
        registry.register("time_zone", "UTC");

        let session = registry.new_session();
        assert_eq!(session.system_var("autocommit"), Some("ON"));
        assert_eq!(session.system_var("time_zone"), Some("UTC"));
        assert_eq!(session.system_var("missing"), None);
    }

    #[test]
    fn test_system_var_case_insensitive() {
        let mut vars = SessionVars::new();
        vars.set_system_var("SQL_MODE", "STRICT");
        assert_eq!(vars.system_var("sql_mode"), Some("STRICT"));
    }
}

//! Result fields and name matching.
//!
//! A [`ResultField`] describes one output column of a plan node: the
//! user-visible name (alias or column name), the origin column and table for
//! fields that came from a table, or empty origins for computed fields.
//!
//! Identifiers bind in one of two modes: [`NameMatch::Resolve`] is used when
//! resolving a column reference (qualifier against the origin table, column
//! against the origin column or the display name), [`NameMatch::Display`] is
//! used when checking whether an expression's display text already names a
//! projection (hidden-field dedup).

use std::fmt;

/// How an identifier is matched against a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameMatch {
    /// Column-reference resolution: qualifier against the origin table,
    /// column against the origin column or the display name.
    Resolve,
    /// Exact (case-insensitive) match against the display name.
    Display,
}

/// One output column of a plan node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultField {
    /// User-visible name: the alias if one was given, otherwise the column
    /// name or the expression text.
    pub name: String,
    /// Origin column name; empty for computed fields.
    pub org_name: String,
    /// Origin table name; empty for computed fields.
    pub table_name: String,
}

impl ResultField {
    /// Creates a computed field with no table origin.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            org_name: String::new(),
            table_name: String::new(),
        }
    }

    /// Creates a field originating from a table column.
    #[must_use]
    pub fn column(table: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            org_name: name.clone(),
            name,
            table_name: table.into(),
        }
    }

    /// Returns the qualified display name.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        join_qualified(&self.table_name, &self.name)
    }

    /// Returns true if `ident` binds to this field in the given mode.
    #[must_use]
    pub fn matches(&self, ident: &str, mode: NameMatch) -> bool {
        match mode {
            NameMatch::Display => self.name.eq_ignore_ascii_case(ident),
            NameMatch::Resolve => {
                let (qualifier, column) = split_qualified(ident);
                if let Some(qualifier) = qualifier {
                    if !self.table_name.eq_ignore_ascii_case(qualifier) {
                        return false;
                    }
                }
                self.org_name.eq_ignore_ascii_case(column)
                    || self.name.eq_ignore_ascii_case(column)
            }
        }
    }
}

impl fmt::Display for ResultField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualified_name())
    }
}

/// Splits `t.c` into `(Some("t"), "c")`; an unqualified name has no
/// qualifier.
#[must_use]
pub fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.split_once('.') {
        Some((qualifier, column)) => (Some(qualifier), column),
        None => (None, name),
    }
}

/// Joins a table qualifier and a column name.
#[must_use]
pub fn join_qualified(table: &str, name: &str) -> String {
    if table.is_empty() {
        name.to_string()
    } else {
        format!("{table}.{name}")
    }
}

/// Returns true if `name` carries a qualifier.
#[must_use]
pub fn is_qualified(name: &str) -> bool {
    name.contains('.')
}

/// Recognizes wildcard fields: `*` yields `Some(None)`, `t.*` yields
/// `Some(Some("t"))`, anything else yields `None`.
#[must_use]
pub fn check_wildcard(name: &str) -> Option<Option<&str>> {
    let (qualifier, column) = split_qualified(name);
    if column == "*" {
        Some(qualifier)
    } else {
        None
    }
}

/// Finds the first field `ident` binds to.
#[must_use]
pub fn find_field(fields: &[ResultField], ident: &str, mode: NameMatch) -> Option<usize> {
    fields.iter().position(|field| field.matches(ident, mode))
}

/// Returns true if `ident` binds to any field.
#[must_use]
pub fn contains_field(fields: &[ResultField], ident: &str, mode: NameMatch) -> bool {
    find_field(fields, ident, mode).is_some()
}

/// Clones the field `ident` resolves to, if any.
#[must_use]
pub fn clone_field_by_name(fields: &[ResultField], ident: &str) -> Option<ResultField> {
    find_field(fields, ident, NameMatch::Resolve).map(|idx| fields[idx].clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> Vec<ResultField> {
        vec![
            ResultField::column("t", "id"),
            ResultField::column("t", "name"),
            ResultField::new("COUNT(*)"),
        ]
    }

    #[test]
    fn test_resolve_unqualified() {
        let fields = fields();
        assert_eq!(find_field(&fields, "id", NameMatch::Resolve), Some(0));
        assert_eq!(find_field(&fields, "NAME", NameMatch::Resolve), Some(1));
        assert_eq!(find_field(&fields, "missing", NameMatch::Resolve), None);
    }

    #[test]
    fn test_resolve_qualified() {
        let fields = fields();
        assert_eq!(find_field(&fields, "t.id", NameMatch::Resolve), Some(0));
        assert_eq!(find_field(&fields, "u.id", NameMatch::Resolve), None);
    }

    #[test]
    fn test_resolve_matches_alias() {
        let mut field = ResultField::column("t", "id");
        field.name = "x".to_string();
        assert!(field.matches("x", NameMatch::Resolve));
        assert!(field.matches("id", NameMatch::Resolve));
        assert!(field.matches("t.id", NameMatch::Resolve));
        assert!(!field.matches("id", NameMatch::Display));
    }

    #[test]
    fn test_display_match() {
        let fields = fields();
        assert_eq!(
            find_field(&fields, "count(*)", NameMatch::Display),
            Some(2)
        );
        assert_eq!(find_field(&fields, "t.id", NameMatch::Display), None);
    }

    #[test]
    fn test_check_wildcard() {
        assert_eq!(check_wildcard("*"), Some(None));
        assert_eq!(check_wildcard("t.*"), Some(Some("t")));
        assert_eq!(check_wildcard("a"), None);
    }

    #[test]
    fn test_qualified_names() {
        assert_eq!(split_qualified("t.c"), (Some("t"), "c"));
        assert_eq!(split_qualified("c"), (None, "c"));
        assert_eq!(join_qualified("t", "c"), "t.c");
        assert_eq!(join_qualified("", "c"), "c");
        assert!(is_qualified("t.c"));
        assert!(!is_qualified("c"));
    }
}

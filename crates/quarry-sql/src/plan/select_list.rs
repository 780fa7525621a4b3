//! Select-list resolution and hidden-field hoisting.
//!
//! The select list carries the projections defined by the statement plus a
//! hidden tail used internally. After the WHERE phase the remaining flow is
//! group by → having → select fields → distinct → order by → limit → final;
//! MySQL lets ORDER BY and HAVING use values that are not in the select
//! fields (`SELECT c1 FROM t ORDER BY c2`), so those expressions are cloned
//! into the hidden tail and rewritten to positional references, and
//! `hidden_field_offset` keeps them out of the client-visible output.

use std::collections::HashSet;

use quarry_common::error::{QuarryError, QuarryResult};

use crate::expr::Expr;
use crate::field::{
    check_wildcard, clone_field_by_name, contains_field, find_field, is_qualified, join_qualified,
    NameMatch, ResultField,
};
use crate::stmt::SelectField;

/// The resolved projection list of one SELECT.
#[derive(Debug, Clone)]
pub struct SelectList {
    /// Projections, visible first, hidden after `hidden_field_offset`.
    pub fields: Vec<SelectField>,
    /// Output schema, parallel to `fields`.
    pub result_fields: Vec<ResultField>,
    /// Offsets of projections containing an aggregate call.
    pub agg_fields: HashSet<usize>,
    /// Number of visible fields; everything at or past this offset is
    /// hidden and trimmed by the final operator.
    pub hidden_field_offset: usize,
    /// The source fields the list was resolved against.
    pub from_fields: Vec<ResultField>,
}

impl SelectList {
    /// Resolves `select_fields` against the source schema: expands
    /// wildcards, verifies every referenced column, inherits column
    /// metadata for bare identifiers, and records aggregate positions.
    pub fn resolve(
        select_fields: &[SelectField],
        src_fields: &[ResultField],
    ) -> QuarryResult<SelectList> {
        let mut list = SelectList {
            fields: Vec::with_capacity(select_fields.len()),
            result_fields: Vec::with_capacity(select_fields.len()),
            agg_fields: HashSet::new(),
            hidden_field_offset: 0,
            from_fields: src_fields.to_vec(),
        };

        let mut wildcards = 0;
        for field in select_fields {
            let names = field.expr.mentioned_columns();
            if names.is_empty() {
                let result = ResultField::new(&field.name);
                list.add_field(field.clone(), result);
                continue;
            }

            if let Some(table) = check_wildcard(&names[0]) {
                // Unqualified `*` may appear at most once.
                if table.is_none() {
                    wildcards += 1;
                    if wildcards > 1 {
                        return Err(QuarryError::WildcardRepeated);
                    }
                }
                list.expand_wildcard(table);
                continue;
            }

            for name in &names {
                if !contains_field(src_fields, name, NameMatch::Resolve) {
                    return Err(QuarryError::UnknownColumn { name: name.clone() });
                }
            }

            let result = if let Expr::Ident(ident) = &field.expr {
                let mut result = clone_field_by_name(src_fields, ident).ok_or_else(|| {
                    QuarryError::UnknownColumn {
                        name: ident.clone(),
                    }
                })?;
                // An alias (or the bare column text) overrides the display
                // name; a qualified reference keeps the column's own name.
                if !is_qualified(&field.name) {
                    result.name = field.name.clone();
                }
                result
            } else {
                ResultField::new(&field.name)
            };
            list.add_field(field.clone(), result);
        }

        list.hidden_field_offset = list.fields.len();
        if list.hidden_field_offset == 0 {
            return Err(QuarryError::EmptySelectFields);
        }
        list.resolve_agg_fields();
        Ok(list)
    }

    fn add_field(&mut self, field: SelectField, result: ResultField) {
        self.fields.push(field);
        self.result_fields.push(result);
    }

    fn expand_wildcard(&mut self, table: Option<&str>) {
        let matching: Vec<ResultField> = self
            .from_fields
            .iter()
            .filter(|field| match table {
                Some(table) => field.table_name.eq_ignore_ascii_case(table),
                None => true,
            })
            .cloned()
            .collect();
        for field in matching {
            let name = join_qualified(&field.table_name, &field.org_name);
            self.add_field(SelectField::aliased(Expr::ident(&name), &name), field);
        }
    }

    fn resolve_agg_fields(&mut self) {
        for (idx, field) in self.fields.iter().enumerate() {
            if field.expr.contains_agg() {
                self.agg_fields.insert(idx);
            }
        }
    }

    /// Returns the client-visible fields.
    #[must_use]
    pub fn visible_fields(&self) -> &[ResultField] {
        &self.result_fields[..self.hidden_field_offset]
    }

    /// Returns true if any projection (visible or hidden) aggregates.
    #[must_use]
    pub fn has_agg_fields(&self) -> bool {
        !self.agg_fields.is_empty()
    }

    /// Hoists an aggregate expression from HAVING or ORDER BY into the
    /// hidden tail and returns the positional reference to evaluate instead.
    ///
    /// Every column the expression mentions must exist in the source fields
    /// or the select list. An expression whose display text already names a
    /// projection reuses that position.
    pub fn update_agg_fields(&mut self, expr: Expr) -> QuarryResult<Expr> {
        for name in expr.mentioned_columns() {
            if check_wildcard(&name).is_some() {
                continue;
            }
            if !contains_field(&self.from_fields, &name, NameMatch::Resolve)
                && !contains_field(&self.result_fields, &name, NameMatch::Resolve)
            {
                return Err(QuarryError::UnknownColumn { name });
            }
        }

        let name = expr.to_string();
        if let Some(idx) = find_field(&self.result_fields, &name, NameMatch::Display) {
            return Ok(Expr::Position { n: idx + 1, name });
        }

        self.add_field(
            SelectField::aliased(expr, &name),
            ResultField::new(&name),
        );
        let position = self.fields.len();
        self.agg_fields.insert(position - 1);
        Ok(Expr::Position { n: position, name })
    }

    /// Clones a source column into the hidden tail and returns its
    /// position, for HAVING/ORDER BY references to columns outside the
    /// visible list.
    fn clone_hidden_field(&mut self, name: &str) -> Option<Expr> {
        let result = clone_field_by_name(&self.from_fields, name)?;
        let ident = join_qualified(&result.table_name, &result.org_name);
        self.add_field(SelectField::aliased(Expr::ident(ident), name), result);
        Some(Expr::Position {
            n: self.fields.len(),
            name: name.to_string(),
        })
    }

    /// Rewrites a HAVING or ORDER BY expression against this list:
    /// aggregates are always hoisted as hidden fields, identifiers outside
    /// the visible list are cloned in and rewritten to positions, and
    /// identifiers that bind to a projection stay by-name.
    pub fn hoist_clause_expr(&mut self, expr: Expr) -> QuarryResult<Expr> {
        match expr {
            Expr::Agg { .. } => self.update_agg_fields(expr),
            Expr::Ident(name) => {
                if check_wildcard(&name).is_some() {
                    return Err(QuarryError::expression(
                        "wildcard is not allowed here".to_string(),
                    ));
                }
                if let Some(idx) = find_field(&self.result_fields, &name, NameMatch::Resolve) {
                    if idx < self.hidden_field_offset {
                        return Ok(Expr::Ident(name));
                    }
                    return Ok(Expr::Position { n: idx + 1, name });
                }
                self.clone_hidden_field(&name)
                    .ok_or(QuarryError::UnknownColumn { name })
            }
            Expr::Binary { op, left, right } => Ok(Expr::Binary {
                op,
                left: Box::new(self.hoist_clause_expr(*left)?),
                right: Box::new(self.hoist_clause_expr(*right)?),
            }),
            Expr::Unary { op, operand } => Ok(Expr::Unary {
                op,
                operand: Box::new(self.hoist_clause_expr(*operand)?),
            }),
            Expr::Builtin { func, args } => Ok(Expr::Builtin {
                func,
                args: args
                    .into_iter()
                    .map(|arg| self.hoist_clause_expr(arg))
                    .collect::<QuarryResult<_>>()?,
            }),
            Expr::Value(_) | Expr::Position { .. } => Ok(expr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{AggFunc, BinaryOp};

    fn src_fields() -> Vec<ResultField> {
        vec![
            ResultField::column("t", "id"),
            ResultField::column("t", "name"),
        ]
    }

    #[test]
    fn test_resolve_bare_ident_inherits_metadata() {
        let fields = vec![SelectField::new(Expr::ident("id"))];
        let list = SelectList::resolve(&fields, &src_fields()).unwrap();

        assert_eq!(list.hidden_field_offset, 1);
        assert_eq!(list.result_fields[0].name, "id");
        assert_eq!(list.result_fields[0].table_name, "t");
        assert_eq!(list.result_fields[0].org_name, "id");
    }

    #[test]
    fn test_resolve_alias() {
        let fields = vec![SelectField::aliased(Expr::ident("id"), "x")];
        let list = SelectList::resolve(&fields, &src_fields()).unwrap();
        assert_eq!(list.result_fields[0].name, "x");
        assert_eq!(list.result_fields[0].org_name, "id");
    }

    #[test]
    fn test_resolve_wildcard() {
        let fields = vec![SelectField::new(Expr::ident("*"))];
        let list = SelectList::resolve(&fields, &src_fields()).unwrap();
        assert_eq!(list.hidden_field_offset, 2);
        assert_eq!(list.result_fields[0].name, "id");
        assert_eq!(list.result_fields[1].name, "name");
    }

    #[test]
    fn test_double_wildcard_rejected() {
        let fields = vec![
            SelectField::new(Expr::ident("*")),
            SelectField::new(Expr::ident("*")),
        ];
        assert!(matches!(
            SelectList::resolve(&fields, &src_fields()).unwrap_err(),
            QuarryError::WildcardRepeated
        ));
    }

    #[test]
    fn test_qualified_wildcard_repeats() {
        let fields = vec![
            SelectField::new(Expr::ident("t.*")),
            SelectField::new(Expr::ident("t.*")),
        ];
        let list = SelectList::resolve(&fields, &src_fields()).unwrap();
        assert_eq!(list.hidden_field_offset, 4);
    }

    #[test]
    fn test_unknown_column_rejected() {
        let fields = vec![SelectField::new(Expr::ident("ghost"))];
        assert!(matches!(
            SelectList::resolve(&fields, &src_fields()).unwrap_err(),
            QuarryError::UnknownColumn { .. }
        ));
    }

    #[test]
    fn test_empty_select_rejected() {
        assert!(matches!(
            SelectList::resolve(&[], &src_fields()).unwrap_err(),
            QuarryError::EmptySelectFields
        ));
    }

    #[test]
    fn test_agg_fields_marked() {
        let fields = vec![
            SelectField::new(Expr::ident("id")),
            SelectField::new(Expr::count_star()),
        ];
        let list = SelectList::resolve(&fields, &src_fields()).unwrap();
        assert!(!list.agg_fields.contains(&0));
        assert!(list.agg_fields.contains(&1));
        assert!(list.has_agg_fields());
    }

    #[test]
    fn test_hoist_aggregate_appends_hidden() {
        let fields = vec![SelectField::new(Expr::ident("id"))];
        let mut list = SelectList::resolve(&fields, &src_fields()).unwrap();

        let rewritten = list
            .hoist_clause_expr(Expr::binary(
                Expr::count_star(),
                BinaryOp::Gt,
                Expr::value(1i64),
            ))
            .unwrap();

        assert_eq!(list.fields.len(), 2);
        assert_eq!(list.hidden_field_offset, 1);
        assert!(list.agg_fields.contains(&1));
        match rewritten {
            Expr::Binary { left, .. } => {
                assert!(matches!(*left, Expr::Position { n: 2, .. }));
            }
            other => panic!("expected binary, got {other:?}"),
        }
        // The invariant the final operator relies on.
        assert!(list.hidden_field_offset <= list.result_fields.len());
    }

    #[test]
    fn test_hoist_reuses_existing_projection() {
        let fields = vec![
            SelectField::new(Expr::ident("id")),
            SelectField::new(Expr::count_star()),
        ];
        let mut list = SelectList::resolve(&fields, &src_fields()).unwrap();

        let rewritten = list.hoist_clause_expr(Expr::count_star()).unwrap();
        assert!(matches!(rewritten, Expr::Position { n: 2, .. }));
        assert_eq!(list.fields.len(), 2);
    }

    #[test]
    fn test_hoist_clones_missing_column() {
        // SELECT id FROM t ORDER BY name: "name" joins the hidden tail.
        let fields = vec![SelectField::new(Expr::ident("id"))];
        let mut list = SelectList::resolve(&fields, &src_fields()).unwrap();

        let rewritten = list.hoist_clause_expr(Expr::ident("name")).unwrap();
        assert!(matches!(rewritten, Expr::Position { n: 2, .. }));
        assert_eq!(list.fields.len(), 2);
        assert_eq!(list.hidden_field_offset, 1);
        assert_eq!(list.result_fields[1].org_name, "name");
    }

    #[test]
    fn test_hoist_keeps_visible_ident() {
        let fields = vec![SelectField::new(Expr::ident("id"))];
        let mut list = SelectList::resolve(&fields, &src_fields()).unwrap();

        let rewritten = list.hoist_clause_expr(Expr::ident("id")).unwrap();
        assert_eq!(rewritten, Expr::ident("id"));
        assert_eq!(list.fields.len(), 1);
    }

    #[test]
    fn test_hoist_unknown_column() {
        let fields = vec![SelectField::new(Expr::ident("id"))];
        let mut list = SelectList::resolve(&fields, &src_fields()).unwrap();
        assert!(matches!(
            list.hoist_clause_expr(Expr::ident("ghost")).unwrap_err(),
            QuarryError::UnknownColumn { .. }
        ));
    }

    #[test]
    fn test_update_agg_fields_checks_columns() {
        let fields = vec![SelectField::new(Expr::ident("id"))];
        let mut list = SelectList::resolve(&fields, &src_fields()).unwrap();
        let expr = Expr::agg(AggFunc::Sum, vec![Expr::ident("ghost")]);
        assert!(matches!(
            list.update_agg_fields(expr).unwrap_err(),
            QuarryError::UnknownColumn { .. }
        ));
    }
}

//! Hidden-field trim.

use quarry_common::error::QuarryResult;

use crate::field::ResultField;

use super::select_list::SelectList;
use super::{ExecutionContext, Plan, Row};

/// Trims hidden fields from each row, leaving the user-visible projection
/// list. Output width always equals the select list's hidden-field offset.
#[derive(Debug)]
pub struct SelectFinalPlan {
    src: Box<Plan>,
    visible: Vec<ResultField>,
    hidden_offset: usize,
}

impl SelectFinalPlan {
    /// Creates the operator from the resolved select list.
    #[must_use]
    pub fn new(src: Box<Plan>, select_list: &SelectList) -> Self {
        Self {
            src,
            visible: select_list.visible_fields().to_vec(),
            hidden_offset: select_list.hidden_field_offset,
        }
    }

    pub(crate) fn fields(&self) -> &[ResultField] {
        &self.visible
    }

    pub(crate) fn src(&self) -> &Plan {
        &self.src
    }

    pub(crate) fn next(&mut self, ctx: &ExecutionContext) -> QuarryResult<Option<Row>> {
        let Some(mut row) = self.src.next(ctx)? else {
            return Ok(None);
        };
        row.data.truncate(self.hidden_offset);
        Ok(Some(row))
    }

    pub(crate) fn close(&mut self) {
        self.src.close();
    }
}

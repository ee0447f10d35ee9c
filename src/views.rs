// 📊 Derived View Builder - income/expense split + counterparty projection
// Views are independent copies of the rows they select; mutating one never
// touches another or the source table

use crate::schema::{SchemaError, Table, TransactionLayout};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// SPLIT VIEWS
// ============================================================================

/// Income and expense subsets of a transaction table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitViews {
    pub income: Table,
    pub expense: Table,
}

// ============================================================================
// VIEW BUILDER
// ============================================================================

pub struct ViewBuilder {
    layout: TransactionLayout,
}

impl ViewBuilder {
    pub fn new(layout: TransactionLayout) -> Self {
        ViewBuilder { layout }
    }

    /// Split a table into income and expense views.
    ///
    /// Amount cells are coerced to numbers with unparsable or empty
    /// values treated as 0. Membership is independent per view: a row
    /// joins the income view iff its income value is > 0 and the expense
    /// view iff its expense value is > 0, so malformed data carrying both
    /// lands in both, and rows with neither land in neither.
    ///
    /// Returns the explicit insufficient-columns result when the table is
    /// too narrow; the caller decides whether that skips the feature.
    pub fn split(&self, table: &Table) -> Result<SplitViews, SchemaError> {
        self.layout.check_split(table)?;

        let mut income_rows = Vec::new();
        let mut expense_rows = Vec::new();

        for (row_idx, row) in table.rows.iter().enumerate() {
            let income = coerce_amount(table.value_at(row_idx, self.layout.income));
            let expense = coerce_amount(table.value_at(row_idx, self.layout.expense));

            if income > 0.0 {
                income_rows.push(row.clone());
            }
            if expense > 0.0 {
                expense_rows.push(row.clone());
            }
        }

        Ok(SplitViews {
            income: Table::new(table.header.clone(), income_rows),
            expense: Table::new(table.header.clone(), expense_rows),
        })
    }

    /// Deduplicated, ascending list of counterparty accounts gathered
    /// from the given source tables. Values are trimmed; empty and
    /// missing cells are dropped. Tables too narrow to carry the
    /// counterparty column contribute nothing.
    pub fn counterparties(&self, sources: &[&Table]) -> Vec<String> {
        let mut accounts = BTreeSet::new();

        for table in sources {
            if self.layout.check_counterparty(table).is_err() {
                continue;
            }
            for row_idx in 0..table.row_count() {
                if let Some(value) = table.value_at(row_idx, self.layout.counterparty) {
                    let trimmed = value.trim();
                    if !trimmed.is_empty() {
                        accounts.insert(trimmed.to_string());
                    }
                }
            }
        }

        accounts.into_iter().collect()
    }
}

/// Numeric coercion for amount cells: unparsable or empty is 0
fn coerce_amount(cell: Option<&str>) -> f64 {
    cell.and_then(|s| s.trim().parse::<f64>().ok()).unwrap_or(0.0)
}

// ============================================================================
// TESTS
// ============================================================================

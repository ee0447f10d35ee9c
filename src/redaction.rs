// 🛡️ Redaction Stage - sensitive column removal
// Runs last in the pipeline: counterparty extraction and the income/expense
// split read columns this stage deletes

use crate::schema::Table;
use serde::{Deserialize, Serialize};

// ============================================================================
// REDACTION ENGINE
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactionEngine {
    /// Input positions to remove, held sorted descending so that removing
    /// one column never shifts the positions still pending
    positions: Vec<usize>,
}

impl RedactionEngine {
    pub fn new(positions: &[usize]) -> Self {
        let mut positions = positions.to_vec();
        positions.sort_unstable_by(|a, b| b.cmp(a));
        positions.dedup();
        RedactionEngine { positions }
    }

    /// Remove the sensitive columns from one table. Positions beyond the
    /// table's current width are ignored. Returns the input positions
    /// actually removed, ascending, for status reporting.
    pub fn redact(&self, table: &mut Table) -> Vec<usize> {
        let width = table.column_count();
        let mut removed = Vec::new();

        for &pos in &self.positions {
            if pos < width {
                table.remove_column(pos);
                removed.push(pos);
            }
        }

        removed.reverse();
        removed
    }

    /// Apply the same redaction to every table in turn. Views are copies,
    /// not references, so each one is redacted independently.
    pub fn redact_all<'a>(&self, tables: impl IntoIterator<Item = &'a mut Table>) {
        for table in tables {
            self.redact(table);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

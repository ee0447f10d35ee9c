// 📐 Record Schema - positional table view + named column layouts
// Indices are the contract with the external reader; layouts give them names
// and validate width once, up front

use serde::{Deserialize, Serialize};

// ============================================================================
// TABLE
// ============================================================================

/// Row-oriented value matrix as delivered by the external reader.
///
/// The engine never parses files itself: it receives rows as ordered
/// value sequences plus an optional header row, and hands tables back the
/// same way. All access is positional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Table {
    /// Column names; empty for headerless input
    pub header: Vec<String>,

    /// Data rows in input order
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Create a table from a header row and data rows
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Table { header, rows }
    }

    /// Create a headerless table
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        Table {
            header: Vec::new(),
            rows,
        }
    }

    /// Width of the table: header width when a header exists, else the
    /// width of the first data row
    pub fn column_count(&self) -> usize {
        if !self.header.is_empty() {
            self.header.len()
        } else {
            self.rows.first().map_or(0, |row| row.len())
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell value at (row, col); `None` when either index is out of range.
    /// Short rows simply lack their trailing columns.
    pub fn value_at(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row).and_then(|r| r.get(col)).map(|s| s.as_str())
    }

    /// Append a derived column on the right. `values` is padded with empty
    /// strings if shorter than the row count.
    pub fn append_column(&mut self, name: &str, values: Vec<String>) {
        if !self.header.is_empty() {
            self.header.push(name.to_string());
        }

        let mut values = values.into_iter();
        for row in &mut self.rows {
            row.push(values.next().unwrap_or_default());
        }
    }

    /// Remove a column by position from the header and every row that has
    /// it. Out-of-range positions are ignored.
    pub fn remove_column(&mut self, col: usize) {
        if col < self.header.len() {
            self.header.remove(col);
        }
        for row in &mut self.rows {
            if col < row.len() {
                row.remove(col);
            }
        }
    }
}

// ============================================================================
// SCHEMA ERROR
// ============================================================================

/// Explicit "insufficient columns" result, produced when a table is too
/// narrow for the feature that wants to read it. The pipeline turns this
/// into a skip-with-notice; it never aborts a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaError {
    pub feature: String,
    pub required: usize,
    pub found: usize,
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} needs >= {} columns, found {}",
            self.feature, self.required, self.found
        )
    }
}

impl std::error::Error for SchemaError {}

fn require_width(table: &Table, feature: &str, required: usize) -> Result<(), SchemaError> {
    let found = table.column_count();
    if found >= required {
        Ok(())
    } else {
        Err(SchemaError {
            feature: feature.to_string(),
            required,
            found,
        })
    }
}

// ============================================================================
// TRANSACTION LAYOUT
// ============================================================================

/// Semantic column positions for the transaction table.
///
/// The input schema is fixed and positional:
/// `[time, account, sensitive_id, type, memo, counterparty_account, bank,
///   branch, expense, income, balance, sensitive_L, sensitive_M]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionLayout {
    pub time: usize,
    pub account: usize,
    pub counterparty: usize,
    pub expense: usize,
    pub income: usize,

    /// Positions removed by the redaction stage. Note that the
    /// counterparty column is itself sensitive: extraction must run
    /// before redaction.
    pub sensitive: Vec<usize>,
}

impl Default for TransactionLayout {
    fn default() -> Self {
        TransactionLayout {
            time: 0,
            account: 1,
            counterparty: 5,
            expense: 8,
            income: 9,
            sensitive: vec![2, 5, 11, 12],
        }
    }
}

impl TransactionLayout {
    /// Matching reads the time and account columns
    pub fn check_matching(&self, table: &Table) -> Result<(), SchemaError> {
        require_width(table, "IP cross-reference", self.time.max(self.account) + 1)
    }

    /// The income/expense split reads both amount columns
    pub fn check_split(&self, table: &Table) -> Result<(), SchemaError> {
        require_width(
            table,
            "income/expense split",
            self.expense.max(self.income) + 1,
        )
    }

    /// Counterparty extraction reads a single column
    pub fn check_counterparty(&self, table: &Table) -> Result<(), SchemaError> {
        require_width(table, "counterparty extraction", self.counterparty + 1)
    }
}

// ============================================================================
// LOGIN LAYOUT
// ============================================================================

/// Semantic column positions for the login table: `[time, account, ip]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginLayout {
    pub time: usize,
    pub account: usize,
    pub ip: usize,
}

impl Default for LoginLayout {
    fn default() -> Self {
        LoginLayout {
            time: 0,
            account: 1,
            ip: 2,
        }
    }
}

impl LoginLayout {
    pub fn check(&self, table: &Table) -> Result<(), SchemaError> {
        let widest = self.time.max(self.account).max(self.ip);
        require_width(table, "login records", widest + 1)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with_width(width: usize) -> Table {
        let header: Vec<String> = (0..width).map(|i| format!("col{}", i)).collect();
        let row: Vec<String> = (0..width).map(|i| format!("v{}", i)).collect();
        Table::new(header, vec![row])
    }

    #[test]
    fn test_column_count_prefers_header() {
        let table = Table::new(
            vec!["a".to_string(), "b".to_string()],
            vec![vec!["1".to_string(), "2".to_string()]],
        );
        assert_eq!(table.column_count(), 2);

        let headerless =
            Table::from_rows(vec![vec!["1".to_string(), "2".to_string(), "3".to_string()]]);
        assert_eq!(headerless.column_count(), 3);

        assert_eq!(Table::default().column_count(), 0);
    }

    #[test]
    fn test_value_at_bounds() {
        let table = table_with_width(3);
        assert_eq!(table.value_at(0, 0), Some("v0"));
        assert_eq!(table.value_at(0, 2), Some("v2"));
        assert_eq!(table.value_at(0, 3), None);
        assert_eq!(table.value_at(1, 0), None);
    }

    #[test]
    fn test_append_column() {
        let mut table = table_with_width(2);
        table.append_column("extra", vec!["x".to_string()]);

        assert_eq!(table.column_count(), 3);
        assert_eq!(table.header[2], "extra");
        assert_eq!(table.value_at(0, 2), Some("x"));
    }

    #[test]
    fn test_append_column_pads_short_values() {
        let mut table = Table::from_rows(vec![vec!["a".to_string()], vec!["b".to_string()]]);
        table.append_column("extra", vec!["only-first".to_string()]);

        assert_eq!(table.value_at(0, 1), Some("only-first"));
        assert_eq!(table.value_at(1, 1), Some(""));
    }

    #[test]
    fn test_remove_column_ignores_out_of_range() {
        let mut table = table_with_width(3);
        table.remove_column(1);
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.value_at(0, 1), Some("v2"));

        // Removing past the end is a no-op
        table.remove_column(10);
        assert_eq!(table.column_count(), 2);
    }

    #[test]
    fn test_transaction_layout_width_checks() {
        let layout = TransactionLayout::default();

        assert!(layout.check_matching(&table_with_width(2)).is_ok());
        assert!(layout.check_matching(&table_with_width(1)).is_err());

        assert!(layout.check_split(&table_with_width(10)).is_ok());
        let err = layout.check_split(&table_with_width(9)).unwrap_err();
        assert_eq!(err.required, 10);
        assert_eq!(err.found, 9);

        assert!(layout.check_counterparty(&table_with_width(6)).is_ok());
        assert!(layout.check_counterparty(&table_with_width(5)).is_err());
    }

    #[test]
    fn test_login_layout_width_check() {
        let layout = LoginLayout::default();
        assert!(layout.check(&table_with_width(3)).is_ok());

        let err = layout.check(&table_with_width(2)).unwrap_err();
        assert_eq!(err.to_string(), "login records needs >= 3 columns, found 2");
    }
}

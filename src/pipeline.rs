// 🚀 Analysis Pipeline - configuration-driven cross-reference run
// Stage order matters: views and counterparty extraction read raw rows,
// matching decorates the summary, redaction always runs last

use crate::enrichment::Enricher;
use crate::matcher::{LoginRecord, MatchEngine, MatchOutcome, MatchStats, MatchWindow};
use crate::redaction::RedactionEngine;
use crate::schema::{LoginLayout, Table, TransactionLayout};
use crate::views::{SplitViews, ViewBuilder};
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Column name for the appended match outcome
pub const MATCHED_IP_COLUMN: &str = "Matched_IP";

/// Column names for the appended enrichment fields
pub const IP_COUNTRY_COLUMN: &str = "IP_Country";
pub const IP_ISP_COLUMN: &str = "IP_ISP";

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Explicit pipeline configuration: one value, passed in, no globals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Remove the sensitive columns from every output section
    pub redact_sensitive: bool,

    /// Build the income and expense views
    pub split_income_expense: bool,

    /// Cross-reference transactions against login records
    pub match_ip: bool,

    /// Resolve country/ISP for matched IPs via the injected lookup
    pub enrich_online: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            redact_sensitive: false,
            split_income_expense: true,
            match_ip: true,
            enrich_online: false,
        }
    }
}

// ============================================================================
// ANALYSIS REPORT
// ============================================================================

/// Multi-section result of one analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Unique id for this run
    pub run_id: String,

    pub generated_at: DateTime<Utc>,

    /// Decorated transaction table (match + enrichment columns appended,
    /// sensitive columns removed when redaction ran)
    pub summary: Table,

    /// Income subset, present when splitting ran
    pub income: Option<Table>,

    /// Expense subset, present when splitting ran
    pub expense: Option<Table>,

    /// Deduplicated, ascending counterparty accounts
    pub counterparties: Vec<String>,

    /// Match summary, present when matching ran
    pub stats: Option<MatchStats>,

    /// Human-readable status lines, one per recoverable condition or
    /// completed stage
    pub log: Vec<String>,

    pub metadata: serde_json::Value,
}

impl AnalysisReport {
    pub fn summary_line(&self) -> String {
        match &self.stats {
            Some(stats) => format!(
                "Run {}: {} rows, {} matched ({} multi-IP, {} invalid, {} unmatched)",
                self.run_id,
                stats.total,
                stats.matched,
                stats.multi_ip,
                stats.invalid,
                stats.unmatched
            ),
            None => format!(
                "Run {}: {} rows, matching disabled",
                self.run_id,
                self.summary.row_count()
            ),
        }
    }
}

// ============================================================================
// ANALYSIS ENGINE
// ============================================================================

pub struct AnalysisEngine {
    config: AnalysisConfig,
    tx_layout: TransactionLayout,
    login_layout: LoginLayout,
    window: MatchWindow,
}

impl AnalysisEngine {
    /// Engine with the standard column layouts and the -1s/+2s window
    pub fn new(config: AnalysisConfig) -> Self {
        AnalysisEngine {
            config,
            tx_layout: TransactionLayout::default(),
            login_layout: LoginLayout::default(),
            window: MatchWindow::default(),
        }
    }

    /// Engine with custom layouts and window
    pub fn with_layouts(
        config: AnalysisConfig,
        tx_layout: TransactionLayout,
        login_layout: LoginLayout,
        window: MatchWindow,
    ) -> Self {
        AnalysisEngine {
            config,
            tx_layout,
            login_layout,
            window,
        }
    }

    /// Run the full pipeline over one pair of input tables.
    ///
    /// Recoverable conditions (schema shortfalls, per-row parse failures,
    /// lookup failures) degrade to status lines and sentinel cells; only
    /// an unusable transaction table aborts the run.
    pub fn run(
        &self,
        transactions: &Table,
        logins: &Table,
        enricher: Option<&mut Enricher>,
    ) -> Result<AnalysisReport> {
        if transactions.column_count() == 0 {
            bail!("transaction table is unreadable: no columns");
        }

        let mut log: Vec<String> = Vec::new();
        log.push(format!(
            "✅ Input loaded: {} transaction rows, {} login rows",
            transactions.row_count(),
            logins.row_count()
        ));

        let mut summary = transactions.clone();
        let builder = ViewBuilder::new(self.tx_layout.clone());

        // --- Income/expense split (reads raw rows) ---
        let mut split_views: Option<SplitViews> = None;
        if self.config.split_income_expense {
            match builder.split(&summary) {
                Ok(views) => {
                    log.push(format!(
                        "📊 Income/expense split complete: {} income rows, {} expense rows",
                        views.income.row_count(),
                        views.expense.row_count()
                    ));
                    split_views = Some(views);
                }
                Err(e) => log.push(format!("⚠️ Income/expense split skipped: {}", e)),
            }
        }

        // --- Counterparty extraction (must precede redaction: the
        //     counterparty column is in the sensitive set) ---
        let counterparties = {
            let sources: Vec<&Table> = match &split_views {
                // When splitting is enabled the projection only reads the
                // split views, even if splitting was skipped and left none
                Some(views) => vec![&views.income, &views.expense],
                None if self.config.split_income_expense => Vec::new(),
                None => vec![&summary],
            };

            if let Some(first) = sources.first() {
                if let Err(e) = self.tx_layout.check_counterparty(first) {
                    if sources
                        .iter()
                        .all(|t| self.tx_layout.check_counterparty(t).is_err())
                    {
                        log.push(format!("⚠️ Counterparty extraction skipped: {}", e));
                    }
                }
            }

            builder.counterparties(&sources)
        };
        if !counterparties.is_empty() {
            log.push(format!(
                "📋 Counterparty accounts extracted ({} unique)",
                counterparties.len()
            ));
        }

        // --- IP cross-reference (appends the outcome column) ---
        let mut stats: Option<MatchStats> = None;
        let mut encoded_values: Option<Vec<String>> = None;
        if self.config.match_ip {
            let checks = self
                .tx_layout
                .check_matching(&summary)
                .and_then(|_| self.login_layout.check(logins));

            match checks {
                Ok(()) => {
                    log.push(format!(
                        "🔄 Running IP cross-reference (window -{}s/+{}s)...",
                        self.window.before_secs, self.window.after_secs
                    ));

                    let records = LoginRecord::from_table(logins, &self.login_layout);
                    let engine = MatchEngine::new(&records, self.window);
                    let outcomes = engine.match_table(&summary, &self.tx_layout);

                    let run_stats = MatchStats::from_outcomes(&outcomes);
                    let encoded: Vec<String> =
                        outcomes.iter().map(MatchOutcome::encode).collect();
                    summary.append_column(MATCHED_IP_COLUMN, encoded.clone());

                    log.push(format!(
                        "✅ IP cross-reference complete: {} of {} rows matched ({} multi-IP, {} invalid)",
                        run_stats.matched, run_stats.total, run_stats.multi_ip, run_stats.invalid
                    ));

                    stats = Some(run_stats);
                    encoded_values = Some(encoded);
                }
                Err(e) => log.push(format!("❌ IP cross-reference skipped: {}", e)),
            }
        }

        // --- Online enrichment (side-channel over the encoded column) ---
        if self.config.enrich_online {
            match (&encoded_values, enricher) {
                (Some(values), Some(enricher)) => {
                    log.push("🌍 Running online IP enrichment...".to_string());

                    let mut countries = Vec::with_capacity(values.len());
                    let mut isps = Vec::with_capacity(values.len());
                    for value in values {
                        let info = enricher.annotate(value);
                        countries.push(info.country);
                        isps.push(info.isp);
                    }

                    summary.append_column(IP_COUNTRY_COLUMN, countries);
                    summary.append_column(IP_ISP_COLUMN, isps);
                    log.push(format!(
                        "✅ Enrichment complete ({} lookups issued)",
                        enricher.queries_issued()
                    ));
                }
                (None, _) => {
                    // Nothing to enrich without a match column
                }
                (_, None) => log.push(
                    "⚠️ Enrichment requested but no lookup service provided; skipped".to_string(),
                ),
            }
        }

        // --- Redaction (always last: extraction and split already ran) ---
        if self.config.redact_sensitive {
            let redactor = RedactionEngine::new(&self.tx_layout.sensitive);
            let removed = redactor.redact(&mut summary);
            if let Some(views) = split_views.as_mut() {
                redactor.redact(&mut views.income);
                redactor.redact(&mut views.expense);
            }
            if !removed.is_empty() {
                log.push(format!("🛡️ Sensitive columns removed (positions {:?})", removed));
            }
        }

        let metadata = serde_json::json!({
            "transaction_rows": transactions.row_count(),
            "login_rows": logins.row_count(),
            "config": self.config,
        });

        let (income, expense) = match split_views {
            Some(views) => (Some(views.income), Some(views.expense)),
            None => (None, None),
        };

        Ok(AnalysisReport {
            run_id: uuid::Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            summary,
            income,
            expense,
            counterparties,
            stats,
            log,
            metadata,
        })
    }
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::{IpInfo, IpLookup};
    use anyhow::Result as AnyResult;

    const TX_HEADER: [&str; 13] = [
        "Time",
        "Account",
        "SensitiveID",
        "Type",
        "Memo",
        "Counterparty",
        "Bank",
        "Branch",
        "Expense",
        "Income",
        "Balance",
        "SensitiveL",
        "SensitiveM",
    ];

    /// 13-column transaction row with the semantic cells filled in
    fn tx_row(time: &str, account: &str, counterparty: &str, expense: &str, income: &str) -> Vec<String> {
        let mut row: Vec<String> = (0..13).map(|_| String::new()).collect();
        row[0] = time.to_string();
        row[1] = account.to_string();
        row[2] = "id-secret".to_string();
        row[5] = counterparty.to_string();
        row[8] = expense.to_string();
        row[9] = income.to_string();
        row[11] = "l-secret".to_string();
        row[12] = "m-secret".to_string();
        row
    }

    fn tx_table(rows: Vec<Vec<String>>) -> Table {
        Table::new(TX_HEADER.iter().map(|s| s.to_string()).collect(), rows)
    }

    fn login_table(rows: &[(&str, &str, &str)]) -> Table {
        Table::new(
            vec!["Time".to_string(), "Account".to_string(), "IP".to_string()],
            rows.iter()
                .map(|(t, a, ip)| vec![t.to_string(), a.to_string(), ip.to_string()])
                .collect(),
        )
    }

    struct StaticLookup;

    impl IpLookup for StaticLookup {
        fn lookup(&self, _ip: &str) -> AnyResult<IpInfo> {
            Ok(IpInfo {
                country: "TW".to_string(),
                isp: "ExampleNet".to_string(),
            })
        }
    }

    #[test]
    fn test_full_run_with_redaction() {
        let transactions = tx_table(vec![
            tx_row("2024-03-01 12:00:00", "A", "CP-1", "", "500"),
            tx_row("112/03/01", "B", "CP-2", "300", ""),
            tx_row("garbage", "A", "CP-1", "", "100"),
        ]);
        let logins = login_table(&[
            ("2024-03-01 12:00:01", "A", "203.0.113.7"),
            ("2023-03-01 00:00:00", "B", "198.51.100.2"),
        ]);

        let config = AnalysisConfig {
            redact_sensitive: true,
            split_income_expense: true,
            match_ip: true,
            enrich_online: false,
        };
        let report = AnalysisEngine::new(config)
            .run(&transactions, &logins, None)
            .unwrap();

        // Match column appended, then sensitive columns {2,5,11,12} removed:
        // 13 + 1 - 4 = 10
        assert_eq!(report.summary.column_count(), 10);
        assert_eq!(
            report.summary.header.last().map(|s| s.as_str()),
            Some(MATCHED_IP_COLUMN)
        );

        // Offset-calendar transaction time matches the Gregorian login time
        assert_eq!(report.summary.value_at(0, 9), Some("203.0.113.7"));
        assert_eq!(report.summary.value_at(1, 9), Some("198.51.100.2"));
        assert_eq!(report.summary.value_at(2, 9), Some("Invalid Data"));

        // Counterparties were extracted before their column was redacted
        assert_eq!(
            report.counterparties,
            vec!["CP-1".to_string(), "CP-2".to_string()]
        );
        assert!(!report.summary.header.contains(&"Counterparty".to_string()));

        // Views redacted too
        let income = report.income.as_ref().unwrap();
        assert_eq!(income.column_count(), 9);
        assert!(!income.header.contains(&"SensitiveID".to_string()));

        let stats = report.stats.as_ref().unwrap();
        assert_eq!(stats.matched, 2);
        assert_eq!(stats.invalid, 1);

        println!("✅ {}", report.summary_line());
    }

    #[test]
    fn test_split_shortfall_skips_but_matching_completes() {
        // 9 columns: too narrow for the split, wide enough for matching
        let narrow_header: Vec<String> = TX_HEADER[..9].iter().map(|s| s.to_string()).collect();
        let mut row: Vec<String> = (0..9).map(|_| String::new()).collect();
        row[0] = "2024-03-01 12:00:00".to_string();
        row[1] = "A".to_string();
        let transactions = Table::new(narrow_header, vec![row]);

        let logins = login_table(&[("2024-03-01 12:00:00", "A", "203.0.113.7")]);

        let report = AnalysisEngine::new(AnalysisConfig::default())
            .run(&transactions, &logins, None)
            .unwrap();

        assert!(report.income.is_none());
        assert!(report.expense.is_none());
        assert!(report
            .log
            .iter()
            .any(|line| line.contains("Income/expense split skipped")));

        // Matching is unaffected by the split shortfall
        assert_eq!(report.summary.value_at(0, 9), Some("203.0.113.7"));
        assert_eq!(report.stats.as_ref().unwrap().matched, 1);
    }

    #[test]
    fn test_counterparties_scope_follows_split_setting() {
        let transactions = tx_table(vec![
            tx_row("2024-03-01 12:00:00", "A", "CP-IN", "", "500"),
            tx_row("2024-03-01 12:00:00", "A", "CP-NONE", "", ""),
        ]);
        let logins = login_table(&[]);

        // Split enabled: only rows that landed in a view are in scope
        let split_on = AnalysisEngine::new(AnalysisConfig {
            match_ip: false,
            ..AnalysisConfig::default()
        })
        .run(&transactions, &logins, None)
        .unwrap();
        assert_eq!(split_on.counterparties, vec!["CP-IN".to_string()]);

        // Split disabled: the whole table is in scope
        let split_off = AnalysisEngine::new(AnalysisConfig {
            split_income_expense: false,
            match_ip: false,
            ..AnalysisConfig::default()
        })
        .run(&transactions, &logins, None)
        .unwrap();
        assert_eq!(
            split_off.counterparties,
            vec!["CP-IN".to_string(), "CP-NONE".to_string()]
        );
    }

    #[test]
    fn test_login_table_shortfall_skips_matching() {
        let transactions = tx_table(vec![tx_row("2024-03-01 12:00:00", "A", "", "", "")]);
        let logins = Table::new(
            vec!["Time".to_string(), "Account".to_string()],
            vec![vec!["2024-03-01 12:00:00".to_string(), "A".to_string()]],
        );

        let report = AnalysisEngine::new(AnalysisConfig::default())
            .run(&transactions, &logins, None)
            .unwrap();

        assert!(report.stats.is_none());
        assert!(!report.summary.header.contains(&MATCHED_IP_COLUMN.to_string()));
        assert!(report
            .log
            .iter()
            .any(|line| line.contains("IP cross-reference skipped")));
    }

    #[test]
    fn test_enrichment_appends_columns() {
        let transactions = tx_table(vec![
            tx_row("2024-03-01 12:00:00", "A", "", "", ""),
            tx_row("2024-03-01 13:00:00", "A", "", "", ""),
        ]);
        let logins = login_table(&[("2024-03-01 12:00:00", "A", "203.0.113.7")]);

        let config = AnalysisConfig {
            enrich_online: true,
            ..AnalysisConfig::default()
        };
        let mut enricher = Enricher::new(Box::new(StaticLookup));
        let report = AnalysisEngine::new(config)
            .run(&transactions, &logins, Some(&mut enricher))
            .unwrap();

        let width = report.summary.column_count();
        assert_eq!(
            report.summary.header[width - 2..],
            [IP_COUNTRY_COLUMN.to_string(), IP_ISP_COLUMN.to_string()]
        );

        // Matched row resolves; the N/A row gets empty fields and no lookup
        assert_eq!(report.summary.value_at(0, width - 2), Some("TW"));
        assert_eq!(report.summary.value_at(0, width - 1), Some("ExampleNet"));
        assert_eq!(report.summary.value_at(1, width - 2), Some(""));
        assert_eq!(enricher.queries_issued(), 1);
    }

    #[test]
    fn test_enrichment_without_lookup_logs_notice() {
        let transactions = tx_table(vec![tx_row("2024-03-01 12:00:00", "A", "", "", "")]);
        let logins = login_table(&[]);

        let config = AnalysisConfig {
            enrich_online: true,
            ..AnalysisConfig::default()
        };
        let report = AnalysisEngine::new(config)
            .run(&transactions, &logins, None)
            .unwrap();

        assert!(report
            .log
            .iter()
            .any(|line| line.contains("no lookup service provided")));
    }

    #[test]
    fn test_empty_transaction_table_aborts() {
        let result =
            AnalysisEngine::default().run(&Table::default(), &login_table(&[]), None);
        assert!(result.is_err());
    }

    #[test]
    fn test_disabled_features_leave_table_untouched() {
        let transactions = tx_table(vec![tx_row("2024-03-01 12:00:00", "A", "CP", "1", "2")]);
        let logins = login_table(&[("2024-03-01 12:00:00", "A", "1.2.3.4")]);

        let config = AnalysisConfig {
            redact_sensitive: false,
            split_income_expense: false,
            match_ip: false,
            enrich_online: false,
        };
        let report = AnalysisEngine::new(config)
            .run(&transactions, &logins, None)
            .unwrap();

        assert_eq!(report.summary.column_count(), 13);
        assert!(report.income.is_none());
        assert!(report.stats.is_none());
        assert_eq!(report.counterparties, vec!["CP".to_string()]);
    }
}

// 🔗 Windowed Matcher - per-account IP cross-reference
// Joins transaction rows against login records inside a -1s/+2s window
// and reduces each candidate set to a canonical string encoding

use crate::schema::{LoginLayout, Table, TransactionLayout};
use crate::timestamp;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

// ============================================================================
// MATCH WINDOW
// ============================================================================

/// Asymmetric time tolerance around a transaction timestamp `t`:
/// a login at `r.time` matches when `t - before <= r.time <= t + after`,
/// both bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchWindow {
    pub before_secs: i64,
    pub after_secs: i64,
}

impl Default for MatchWindow {
    fn default() -> Self {
        MatchWindow {
            before_secs: 1,
            after_secs: 2,
        }
    }
}

impl MatchWindow {
    fn bounds(&self, t: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
        (
            t - Duration::seconds(self.before_secs),
            t + Duration::seconds(self.after_secs),
        )
    }
}

// ============================================================================
// LOGIN RECORDS
// ============================================================================

/// One row of the login table: `[time, account, ip]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRecord {
    /// Normalized login time; `None` when the cell was unparsable
    pub time: Option<NaiveDateTime>,

    pub account: String,
    pub ip: String,

    /// Source row index (0-based)
    pub row: usize,
}

impl LoginRecord {
    /// Build login records from a table. Cells are read positionally via
    /// the layout; missing cells become empty fields.
    pub fn from_table(table: &Table, layout: &LoginLayout) -> Vec<LoginRecord> {
        (0..table.row_count())
            .map(|row| LoginRecord {
                time: timestamp::normalize(table.value_at(row, layout.time).unwrap_or("")),
                account: table
                    .value_at(row, layout.account)
                    .unwrap_or("")
                    .trim()
                    .to_string(),
                ip: table.value_at(row, layout.ip).unwrap_or("").trim().to_string(),
                row,
            })
            .collect()
    }
}

/// One login that fell inside a transaction's window
#[derive(Debug, Clone)]
pub struct Candidate {
    pub ip: String,

    /// Signed offset `login time - transaction time`. Kept at full
    /// resolution: the displayed delta truncates to whole seconds, but the
    /// sign of a sub-second offset is decided here.
    pub offset: Duration,
}

impl Candidate {
    /// Tagged offset string, e.g. `"+0s:203.0.113.7"` or `"-1s:10.0.0.1"`.
    /// The sign is `+` for offsets >= 0 and empty otherwise (the negative
    /// delta carries its own minus sign).
    pub fn tagged(&self) -> String {
        let sign = if self.offset >= Duration::zero() { "+" } else { "" };
        format!("{}{}s:{}", sign, self.offset.num_seconds(), self.ip)
    }
}

// ============================================================================
// MATCH OUTCOME
// ============================================================================

/// Classification of one transaction's matching result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    /// Transaction time or account could not be determined; no search ran
    Invalid,

    /// No login satisfied the window predicate
    NoMatch,

    /// All candidates carried the same IP address
    Single(String),

    /// Two or more distinct IPs: deduplicated, sorted tagged offset strings
    Multi(Vec<String>),
}

impl MatchOutcome {
    /// Reduce a candidate set to an outcome.
    ///
    /// The single-IP branch deduplicates by IP (several hits on one IP
    /// collapse to the bare address, offsets discarded); the multi-IP
    /// branch deduplicates by formatted string, so one IP matching at two
    /// offsets keeps both tags. The asymmetry is inherited behavior,
    /// pending product-owner confirmation; do not unify it here.
    pub fn from_candidates(candidates: &[Candidate]) -> Self {
        if candidates.is_empty() {
            return MatchOutcome::NoMatch;
        }

        let mut distinct_ips: Vec<&str> = Vec::new();
        for c in candidates {
            if !distinct_ips.contains(&c.ip.as_str()) {
                distinct_ips.push(&c.ip);
            }
        }

        if distinct_ips.len() == 1 {
            return MatchOutcome::Single(distinct_ips[0].to_string());
        }

        let tags: BTreeSet<String> = candidates.iter().map(Candidate::tagged).collect();
        MatchOutcome::Multi(tags.into_iter().collect())
    }

    /// Canonical string encoding attached to the transaction row
    pub fn encode(&self) -> String {
        match self {
            MatchOutcome::Invalid => "Invalid Data".to_string(),
            MatchOutcome::NoMatch => "N/A".to_string(),
            MatchOutcome::Single(ip) => ip.clone(),
            MatchOutcome::Multi(tags) => tags.join(" | "),
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, MatchOutcome::Single(_) | MatchOutcome::Multi(_))
    }
}

// ============================================================================
// MATCH ENGINE
// ============================================================================

/// Time-sorted login entry in the per-account index
#[derive(Debug, Clone)]
struct IndexedLogin {
    time: NaiveDateTime,
    ip: String,
}

/// Windowed join engine.
///
/// Logins are grouped per account and sorted by time once at
/// construction; each lookup binary-searches the window, which yields
/// exactly the candidate set a brute-force scan of the predicate would.
/// Lookups are read-only, so transactions can be matched independently,
/// in row order here, or partitioned across threads by a caller.
pub struct MatchEngine {
    window: MatchWindow,
    by_account: HashMap<String, Vec<IndexedLogin>>,
}

impl MatchEngine {
    pub fn new(logins: &[LoginRecord], window: MatchWindow) -> Self {
        let mut by_account: HashMap<String, Vec<IndexedLogin>> = HashMap::new();

        // Logins with unparsable times can never satisfy the window
        // predicate; they are dropped at build time.
        for record in logins {
            if let Some(time) = record.time {
                by_account
                    .entry(record.account.clone())
                    .or_default()
                    .push(IndexedLogin {
                        time,
                        ip: record.ip.clone(),
                    });
            }
        }

        for entries in by_account.values_mut() {
            entries.sort_by_key(|e| e.time);
        }

        MatchEngine { window, by_account }
    }

    pub fn with_default_window(logins: &[LoginRecord]) -> Self {
        Self::new(logins, MatchWindow::default())
    }

    /// Every login for `account` inside the window around `t`, in time order
    pub fn candidates(&self, account: &str, t: NaiveDateTime) -> Vec<Candidate> {
        let entries = match self.by_account.get(account) {
            Some(entries) => entries,
            None => return Vec::new(),
        };

        let (start, end) = self.window.bounds(t);
        let from = entries.partition_point(|e| e.time < start);

        entries[from..]
            .iter()
            .take_while(|e| e.time <= end)
            .map(|e| Candidate {
                ip: e.ip.clone(),
                offset: e.time - t,
            })
            .collect()
    }

    /// Outcome for one transaction. A missing time or account is
    /// `Invalid`; no search is performed.
    pub fn outcome(&self, account: &str, t: Option<NaiveDateTime>) -> MatchOutcome {
        let t = match t {
            Some(t) => t,
            None => return MatchOutcome::Invalid,
        };
        if account.is_empty() {
            return MatchOutcome::Invalid;
        }

        MatchOutcome::from_candidates(&self.candidates(account, t))
    }

    /// Match every row of a transaction table, in row order. Outcomes are
    /// independent per row.
    pub fn match_table(&self, table: &Table, layout: &TransactionLayout) -> Vec<MatchOutcome> {
        (0..table.row_count())
            .map(|row| {
                let t = timestamp::normalize(table.value_at(row, layout.time).unwrap_or(""));
                let account = table.value_at(row, layout.account).unwrap_or("").trim();
                self.outcome(account, t)
            })
            .collect()
    }
}

// ============================================================================
// MATCH STATS
// ============================================================================

/// Run summary over all outcomes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStats {
    pub total: usize,
    pub matched: usize,
    pub multi_ip: usize,
    pub invalid: usize,
    pub unmatched: usize,
}

impl MatchStats {
    pub fn from_outcomes(outcomes: &[MatchOutcome]) -> Self {
        let mut stats = MatchStats {
            total: outcomes.len(),
            ..Default::default()
        };

        for outcome in outcomes {
            match outcome {
                MatchOutcome::Invalid => stats.invalid += 1,
                MatchOutcome::NoMatch => stats.unmatched += 1,
                MatchOutcome::Single(_) => stats.matched += 1,
                MatchOutcome::Multi(_) => {
                    stats.matched += 1;
                    stats.multi_ip += 1;
                }
            }
        }

        stats
    }
}

// ============================================================================
// TESTS
// ============================================================================

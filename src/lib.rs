// IP Cross-Reference Engine - Core Library
// Attributes a probable source IP to each transaction by joining ledger rows
// against login records inside a -1s/+2s window

pub mod timestamp;   // Calendar-aware timestamp normalization
pub mod schema;      // Positional table view + named column layouts
pub mod matcher;     // Windowed matcher + match encoder
pub mod views;       // Income/expense split + counterparty projection
pub mod redaction;   // Sensitive column removal
pub mod enrichment;  // Memoized online IP lookup side-channel
pub mod pipeline;    // Configuration-driven analysis run

// Re-export commonly used types
pub use schema::{LoginLayout, SchemaError, Table, TransactionLayout};
pub use matcher::{
    Candidate, LoginRecord, MatchEngine, MatchOutcome, MatchStats, MatchWindow,
};
pub use views::{SplitViews, ViewBuilder};
pub use redaction::RedactionEngine;
pub use enrichment::{Enricher, IpInfo, IpLookup, LookupCache, MemoryCache};
pub use pipeline::{
    AnalysisConfig, AnalysisEngine, AnalysisReport,
    IP_COUNTRY_COLUMN, IP_ISP_COLUMN, MATCHED_IP_COLUMN,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

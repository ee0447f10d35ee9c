// 🌍 Enrichment - memoized online IP lookup side-channel
// The online service is an external collaborator behind the IpLookup trait;
// the core matching logic has zero network dependency

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fields resolved for one encoded match value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpInfo {
    pub country: String,
    pub isp: String,
}

impl IpInfo {
    fn error() -> Self {
        IpInfo {
            country: "Error".to_string(),
            isp: "Error".to_string(),
        }
    }
}

// ============================================================================
// COLLABORATOR TRAITS
// ============================================================================

/// Pluggable reputation/whois service. Implementations own their own
/// transport, rate limiting and timeouts; the enricher only sees the
/// result.
pub trait IpLookup {
    fn lookup(&self, ip: &str) -> Result<IpInfo>;
}

/// Pluggable memoization store, keyed by the encoded match string
pub trait LookupCache {
    fn get(&self, key: &str) -> Option<IpInfo>;
    fn put(&mut self, key: &str, value: IpInfo);
}

/// In-memory cache for a single analysis run
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: HashMap<String, IpInfo>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl LookupCache for MemoryCache {
    fn get(&self, key: &str) -> Option<IpInfo> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: &str, value: IpInfo) {
        self.entries.insert(key.to_string(), value);
    }
}

// ============================================================================
// ENRICHER
// ============================================================================

/// Memoizing front for the lookup service.
///
/// Sentinel values (`""`, `"N/A"`, `"Invalid Data"`) resolve to empty
/// fields without touching the service. Everything else is looked up at
/// most once per distinct encoded string within a run; failed lookups
/// resolve to the `"Error"` sentinel and are cached too, so a failure is
/// never retried inside the run.
pub struct Enricher {
    lookup: Box<dyn IpLookup>,
    cache: Box<dyn LookupCache>,
    queries_issued: usize,
}

impl Enricher {
    pub fn new(lookup: Box<dyn IpLookup>) -> Self {
        Self::with_cache(lookup, Box::new(MemoryCache::new()))
    }

    pub fn with_cache(lookup: Box<dyn IpLookup>, cache: Box<dyn LookupCache>) -> Self {
        Enricher {
            lookup,
            cache,
            queries_issued: 0,
        }
    }

    /// Resolve enrichment fields for one encoded match value. Never
    /// fails: transport and parsing problems come back as `"Error"`.
    pub fn annotate(&mut self, encoded_match: &str) -> IpInfo {
        if encoded_match.is_empty() || encoded_match == "N/A" || encoded_match == "Invalid Data" {
            return IpInfo::default();
        }

        if let Some(cached) = self.cache.get(encoded_match) {
            return cached;
        }

        let info = match first_ip(encoded_match) {
            Some(ip) => {
                self.queries_issued += 1;
                self.lookup.lookup(ip).unwrap_or_else(|_| IpInfo::error())
            }
            None => IpInfo::error(),
        };

        self.cache.put(encoded_match, info.clone());
        info
    }

    /// Number of lookups actually sent to the service (cache misses)
    pub fn queries_issued(&self) -> usize {
        self.queries_issued
    }
}

/// First IP in an encoded match value: the first `" | "` segment, after
/// the last `:` (which strips an offset tag like `+1s:`).
pub fn first_ip(encoded: &str) -> Option<&str> {
    let segment = encoded.split('|').next()?;
    let ip = segment.rsplit(':').next()?.trim();
    if ip.is_empty() {
        None
    } else {
        Some(ip)
    }
}

// ============================================================================
// TESTS
// ============================================================================

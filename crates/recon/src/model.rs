use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Minimum absolute store discrepancy worth reporting. Fixed by the business
/// contract, not configurable.
pub const REPORTING_FLOOR: f64 = 100.0;

/// Absolute tolerance applied to reporting-floor comparisons so rounding
/// noise cannot flip a store across the gate.
pub const NUMERIC_EPS: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Tender
// ---------------------------------------------------------------------------

/// Payment method category. Declaration order drives every per-tender table,
/// so output ordering is stable across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tender {
    Cash,
    Card,
    #[serde(rename = "UPI")]
    Upi,
    Wallet,
}

impl Tender {
    pub const ALL: [Tender; 4] = [Tender::Cash, Tender::Card, Tender::Upi, Tender::Wallet];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Cash => "Cash",
            Self::Card => "Card",
            Self::Upi => "UPI",
            Self::Wallet => "Wallet",
        }
    }

    /// Parse a config key or file label, case-insensitively.
    pub fn parse_label(label: &str) -> Option<Tender> {
        match label.trim().to_lowercase().as_str() {
            "cash" => Some(Self::Cash),
            "card" => Some(Self::Card),
            "upi" => Some(Self::Upi),
            "wallet" => Some(Self::Wallet),
            _ => None,
        }
    }
}

impl fmt::Display for Tender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A single cleaned row from one tender's response file. Immutable once
/// ingested; identity is not unique — several entries may share
/// (store, tender, date).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TenderEntry {
    pub store_id: i64,
    pub tender: Tender,
    /// Signed response value; never zero after cleaning.
    pub response: f64,
    /// Approval marker as found in the file; never blank after cleaning.
    pub approved_on: String,
    /// Opaque sales-date string, when the file carries one. The engine only
    /// groups by it, never parses it.
    pub sales_date: Option<String>,
}

/// Ingestion failure for one tender, kept as a diagnostic — a failed tender
/// is skipped, never fatal to the run.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedTender {
    pub tender: Tender,
    pub reason: String,
}

/// Pre-loaded entries grouped by tender.
#[derive(Debug, Default)]
pub struct ReconInput {
    pub entries: BTreeMap<Tender, Vec<TenderEntry>>,
    pub skipped: Vec<SkippedTender>,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Per-store rollup across all tenders. Recomputed every run, never stored.
#[derive(Debug, Clone, Serialize)]
pub struct StoreAggregate {
    pub store_id: i64,
    pub net_total: f64,
    pub entry_count: usize,
}

// ---------------------------------------------------------------------------
// Netting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NettingKind {
    /// Two entries, same tender.
    #[serde(rename = "Within-Tender")]
    WithinTender,
    /// Two entries, different tenders.
    #[serde(rename = "Cross-Tender")]
    CrossTender,
    /// Group of entries sharing tender and sales date.
    #[serde(rename = "Within-Tender-Multiple")]
    WithinTenderMultiple,
    /// Group of entries sharing a sales date across tenders.
    #[serde(rename = "Cross-Tender-Multiple")]
    CrossTenderMultiple,
}

impl NettingKind {
    pub fn is_cross_tender(&self) -> bool {
        matches!(self, Self::CrossTender | Self::CrossTenderMultiple)
    }
}

impl fmt::Display for NettingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::WithinTender => "Within-Tender",
            Self::CrossTender => "Cross-Tender",
            Self::WithinTenderMultiple => "Within-Tender-Multiple",
            Self::CrossTenderMultiple => "Cross-Tender-Multiple",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NettingMember {
    pub tender: Tender,
    pub response: f64,
}

/// One removed noise group. Invariant: `residual` (the absolute sum of the
/// member responses) is below the run's netting threshold.
#[derive(Debug, Clone, Serialize)]
pub struct NettingRecord {
    pub store_id: i64,
    pub sales_date: Option<String>,
    pub kind: NettingKind,
    pub members: Vec<NettingMember>,
    pub residual: f64,
}

impl NettingRecord {
    /// Distinct tenders involved, in declaration order.
    pub fn tenders(&self) -> Vec<Tender> {
        let mut seen = Vec::new();
        for m in &self.members {
            if !seen.contains(&m.tender) {
                seen.push(m.tender);
            }
        }
        seen.sort();
        seen
    }

    pub fn members_total(&self) -> f64 {
        self.members.iter().map(|m| m.response).sum()
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Severity band for an exception's absolute total. Labels match the
/// report vocabulary the finance team reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    #[serde(rename = "Diff less than +/- 100")]
    Under100,
    #[serde(rename = "Diff b/w +/- 1000")]
    UpTo1000,
    #[serde(rename = "Diff b/w +/- 5000")]
    UpTo5000,
    #[serde(rename = "Diff b/w +/- 10000")]
    UpTo10000,
    #[serde(rename = "Diff b/w +/- 25000")]
    UpTo25000,
    #[serde(rename = "Diff b/w +/- 50000")]
    UpTo50000,
    #[serde(rename = "Diff more than +/- 50000")]
    Over50000,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Under100 => "Diff less than +/- 100",
            Self::UpTo1000 => "Diff b/w +/- 1000",
            Self::UpTo5000 => "Diff b/w +/- 5000",
            Self::UpTo10000 => "Diff b/w +/- 10000",
            Self::UpTo25000 => "Diff b/w +/- 25000",
            Self::UpTo50000 => "Diff b/w +/- 50000",
            Self::Over50000 => "Diff more than +/- 50000",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassificationCount {
    pub classification: Severity,
    pub store_count: usize,
}

// ---------------------------------------------------------------------------
// Summary rows
// ---------------------------------------------------------------------------

/// One row per store that is still an exception after netting.
#[derive(Debug, Clone, Serialize)]
pub struct StoreSummary {
    pub store_id: i64,
    /// Entry count before netting, across all tenders.
    pub total_entries: usize,
    /// Surviving (non-netted) entry count.
    pub exception_entries: usize,
    /// Signed sum of the surviving responses.
    pub exception_total: f64,
    /// Surviving response sum per ingested tender; zero when a tender
    /// contributed nothing to the exception.
    pub tender_totals: BTreeMap<Tender, f64>,
    pub classification: Severity,
    /// exception_entries / total_entries × 100.
    pub error_rate_pct: f64,
}

/// Per-tender counters for the whole run.
#[derive(Debug, Clone, Serialize)]
pub struct TenderPerformance {
    pub tender: Tender,
    pub total_entries: usize,
    pub exceptional_entries: usize,
    /// exceptional_entries / total_entries × 100; zero when nothing ingested.
    pub exception_rate_pct: f64,
    pub within_tender_netting: usize,
    pub cross_tender_netting: usize,
    pub items_removed_by_netting: usize,
    pub total_netting_variance: f64,
}

// ---------------------------------------------------------------------------
// Result bundle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub netting_threshold: f64,
    pub approval_filter: crate::config::ApprovalFilter,
    pub engine_version: String,
    pub run_at: String,
    pub skipped_tenders: Vec<SkippedTender>,
}

/// Everything a report or dashboard layer needs; the engine's sole hand-off.
#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    /// Exception stores, ascending store id.
    pub summary: Vec<StoreSummary>,
    /// Severity bands that occurred, ordered by severity.
    pub classification: Vec<ClassificationCount>,
    /// Surviving entries per tender; every ingested tender has a table,
    /// possibly empty.
    pub exceptions: BTreeMap<Tender, Vec<TenderEntry>>,
    /// Every removed noise group, in store order.
    pub netting_log: Vec<NettingRecord>,
    pub tender_performance: Vec<TenderPerformance>,
    /// Stores seen across all tenders.
    pub total_stores: usize,
    /// Stores past the pre-netting reporting gate.
    pub candidate_stores: usize,
    /// Stores still exceptional after netting (= summary rows).
    pub exception_stores: usize,
}

//! Per-tender run counters, carried as an explicit value through the
//! pipeline and consumed at assembly — never retained between runs.

use std::collections::BTreeMap;

use crate::model::{NettingRecord, Tender, TenderPerformance};

#[derive(Debug, Default, Clone, Copy)]
struct TenderCounters {
    total_entries: usize,
    exception_entries: usize,
    within_tender_netting: usize,
    cross_tender_netting: usize,
    netting_variance: f64,
}

#[derive(Debug, Default)]
pub struct MetricsAccumulator {
    tenders: BTreeMap<Tender, TenderCounters>,
}

impl MetricsAccumulator {
    fn counters(&mut self, tender: Tender) -> &mut TenderCounters {
        self.tenders.entry(tender).or_default()
    }

    /// Count a tender's cleaned entries, once at ingestion.
    pub fn record_ingested(&mut self, tender: Tender, entries: usize) {
        self.counters(tender).total_entries += entries;
    }

    /// Credit a netting event to every distinct tender it involves.
    pub fn record_netting(&mut self, record: &NettingRecord) {
        for tender in record.tenders() {
            let counters = self.counters(tender);
            if record.kind.is_cross_tender() {
                counters.cross_tender_netting += 1;
            } else {
                counters.within_tender_netting += 1;
            }
            counters.netting_variance += record.residual;
        }
    }

    /// Count one surviving entry of a store that passed the reporting gate.
    pub fn record_exception_entry(&mut self, tender: Tender) {
        self.counters(tender).exception_entries += 1;
    }

    /// Fold another accumulator in. Lets per-store work run split across
    /// workers and still produce one deterministic table.
    pub fn merge(&mut self, other: MetricsAccumulator) {
        for (tender, theirs) in other.tenders {
            let ours = self.counters(tender);
            ours.total_entries += theirs.total_entries;
            ours.exception_entries += theirs.exception_entries;
            ours.within_tender_netting += theirs.within_tender_netting;
            ours.cross_tender_netting += theirs.cross_tender_netting;
            ours.netting_variance += theirs.netting_variance;
        }
    }

    /// Per-tender performance rows, in tender order.
    pub fn into_performance(self) -> Vec<TenderPerformance> {
        self.tenders
            .into_iter()
            .map(|(tender, c)| {
                let exception_rate_pct = if c.total_entries > 0 {
                    c.exception_entries as f64 / c.total_entries as f64 * 100.0
                } else {
                    0.0
                };
                TenderPerformance {
                    tender,
                    total_entries: c.total_entries,
                    exceptional_entries: c.exception_entries,
                    exception_rate_pct,
                    within_tender_netting: c.within_tender_netting,
                    cross_tender_netting: c.cross_tender_netting,
                    items_removed_by_netting: c.within_tender_netting + c.cross_tender_netting,
                    total_netting_variance: c.netting_variance,
                }
            })
            .collect()
    }
}

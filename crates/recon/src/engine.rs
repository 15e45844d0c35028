use std::collections::BTreeMap;

use crate::aggregate::{aggregate_stores, meets_reporting_floor};
use crate::classify::{classify, count_by_severity};
use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::metrics::MetricsAccumulator;
use crate::model::{
    ReconInput, ReconMeta, ReconResult, StoreSummary, Tender, TenderEntry,
};
use crate::netting::net_store;

/// Run reconciliation over pre-loaded tender entries.
///
/// Single-shot batch transform: aggregate stores, gate candidates, net each
/// candidate's noise, classify what survives, and assemble the result
/// bundle. Candidate stores are processed in ascending store id, so
/// identical inputs produce identical output tables.
pub fn run(config: &ReconConfig, input: &ReconInput) -> Result<ReconResult, ReconError> {
    if input.entries.values().all(|entries| entries.is_empty()) {
        return Err(ReconError::NoUsableData);
    }

    let mut metrics = MetricsAccumulator::default();
    for (&tender, entries) in &input.entries {
        metrics.record_ingested(tender, entries.len());
    }

    // One pool across all tenders; tender map order keeps it stable.
    let pool: Vec<TenderEntry> = input
        .entries
        .values()
        .flat_map(|entries| entries.iter().cloned())
        .collect();

    let stores = aggregate_stores(&pool);
    let total_stores = stores.len();

    let candidates: Vec<i64> = stores
        .values()
        .filter(|agg| meets_reporting_floor(agg.net_total))
        .map(|agg| agg.store_id)
        .collect();
    let candidate_stores = candidates.len();

    let mut summary: Vec<StoreSummary> = Vec::new();
    let mut exceptions: BTreeMap<Tender, Vec<TenderEntry>> = BTreeMap::new();
    let mut netting_log = Vec::new();

    for store_id in candidates {
        let store_entries: Vec<TenderEntry> = pool
            .iter()
            .filter(|entry| entry.store_id == store_id)
            .cloned()
            .collect();
        let total_entries = store_entries.len();

        let outcome = net_store(store_id, store_entries, config.netting_threshold);

        for record in &outcome.records {
            metrics.record_netting(record);
        }
        netting_log.extend(outcome.records);

        if outcome.survivors.is_empty() {
            continue;
        }

        let exception_total: f64 = outcome.survivors.iter().map(|e| e.response).sum();

        let mut tender_totals: BTreeMap<Tender, f64> = BTreeMap::new();
        for &tender in input.entries.keys() {
            tender_totals.insert(tender, 0.0);
        }
        for entry in &outcome.survivors {
            *tender_totals.entry(entry.tender).or_insert(0.0) += entry.response;
            metrics.record_exception_entry(entry.tender);
        }

        let error_rate_pct = if total_entries > 0 {
            outcome.survivors.len() as f64 / total_entries as f64 * 100.0
        } else {
            0.0
        };

        summary.push(StoreSummary {
            store_id,
            total_entries,
            exception_entries: outcome.survivors.len(),
            exception_total,
            tender_totals,
            classification: classify(exception_total),
            error_rate_pct,
        });

        for entry in outcome.survivors {
            exceptions.entry(entry.tender).or_default().push(entry);
        }
    }

    // Every ingested tender gets an exception table, even when empty.
    for &tender in input.entries.keys() {
        exceptions.entry(tender).or_default();
    }

    let classification = count_by_severity(&summary);
    let exception_stores = summary.len();

    Ok(ReconResult {
        meta: ReconMeta {
            config_name: config.name.clone(),
            netting_threshold: config.netting_threshold,
            approval_filter: config.approval_filter,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            skipped_tenders: input.skipped.clone(),
        },
        summary,
        classification,
        exceptions,
        netting_log,
        tender_performance: metrics.into_performance(),
        total_stores,
        candidate_stores,
        exception_stores,
    })
}

use std::collections::BTreeMap;

use crate::model::{StoreAggregate, TenderEntry, NUMERIC_EPS, REPORTING_FLOOR};

/// True when a discrepancy magnitude is large enough to report. The small
/// tolerance keeps rounding noise from flipping a store across the gate.
pub fn meets_reporting_floor(total: f64) -> bool {
    total.abs() >= REPORTING_FLOOR - NUMERIC_EPS
}

/// Group the combined entry pool by store, summing responses.
pub fn aggregate_stores(pool: &[TenderEntry]) -> BTreeMap<i64, StoreAggregate> {
    let mut stores: BTreeMap<i64, StoreAggregate> = BTreeMap::new();

    for entry in pool {
        let agg = stores.entry(entry.store_id).or_insert(StoreAggregate {
            store_id: entry.store_id,
            net_total: 0.0,
            entry_count: 0,
        });
        agg.net_total += entry.response;
        agg.entry_count += 1;
    }

    stores
}

//! Noise removal: strip out groups of entries whose combined value is
//! negligible, leaving only the genuinely unresolved discrepancy.
//!
//! Three passes in fixed priority order — simple pairings first (most noise
//! is a duplicate/reversal pair), group-level netting only where needed.
//! The pass order and the pairwise tie-break change which groups get
//! removed on ambiguous input, so both are part of the engine's contract.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::aggregate::meets_reporting_floor;
use crate::model::{NettingKind, NettingMember, NettingRecord, Tender, TenderEntry};

/// What netting left behind for one store: the surviving entries (empty when
/// the residual discrepancy fell under the reporting floor) and the log of
/// removed groups.
#[derive(Debug, Default)]
pub struct NettingOutcome {
    pub survivors: Vec<TenderEntry>,
    pub records: Vec<NettingRecord>,
}

/// True when a combined group value is small enough to be noise.
fn nets_off(sum: f64, threshold: f64) -> bool {
    sum.abs() < threshold
}

fn member(entry: &TenderEntry) -> NettingMember {
    NettingMember {
        tender: entry.tender,
        response: entry.response,
    }
}

/// Remove nettable groups from one store's entries.
///
/// Survivors keep descending-magnitude order. A store whose surviving total
/// falls under the reporting floor yields no survivors at all, but its
/// netting records are still returned.
pub fn net_store(store_id: i64, entries: Vec<TenderEntry>, threshold: f64) -> NettingOutcome {
    // A lone entry is never netted: it survives on magnitude alone.
    if entries.len() <= 1 {
        let survives = entries
            .first()
            .map(|e| meets_reporting_floor(e.response))
            .unwrap_or(false);
        return NettingOutcome {
            survivors: if survives { entries } else { Vec::new() },
            records: Vec::new(),
        };
    }

    // Stable sort keeps equal magnitudes in pool order, which pins down the
    // "first eligible partner" tie-break.
    let mut items = entries;
    items.sort_by(|a, b| {
        b.response
            .abs()
            .partial_cmp(&a.response.abs())
            .unwrap_or(Ordering::Equal)
    });

    let mut used = vec![false; items.len()];
    let mut records = Vec::new();

    pair_pass(store_id, &items, &mut used, threshold, &mut records);
    same_tender_group_pass(store_id, &items, &mut used, threshold, &mut records);
    cross_tender_group_pass(store_id, &items, &mut used, threshold, &mut records);

    let mut survivors: Vec<TenderEntry> = Vec::new();
    for (idx, entry) in items.into_iter().enumerate() {
        if !used[idx] {
            survivors.push(entry);
        }
    }

    let surviving_total: f64 = survivors.iter().map(|e| e.response).sum();
    if !meets_reporting_floor(surviving_total) {
        survivors.clear();
    }

    NettingOutcome { survivors, records }
}

/// Pass 1: greedy pairwise matching over the descending-magnitude order.
///
/// Each unused entry takes the first later unused entry that nets with it,
/// then stops looking. Deliberately not an optimal matching — the
/// first-eligible rule is what downstream consumers reconcile against.
fn pair_pass(
    store_id: i64,
    items: &[TenderEntry],
    used: &mut [bool],
    threshold: f64,
    records: &mut Vec<NettingRecord>,
) {
    for i in 0..items.len() {
        if used[i] {
            continue;
        }
        for j in (i + 1)..items.len() {
            if used[j] {
                continue;
            }
            let combined = items[i].response + items[j].response;
            if nets_off(combined, threshold) {
                used[i] = true;
                used[j] = true;
                let kind = if items[i].tender == items[j].tender {
                    NettingKind::WithinTender
                } else {
                    NettingKind::CrossTender
                };
                records.push(NettingRecord {
                    store_id,
                    sales_date: items[i].sales_date.clone(),
                    kind,
                    members: vec![member(&items[i]), member(&items[j])],
                    residual: combined.abs(),
                });
                break;
            }
        }
    }
}

/// Pass 2: whole groups sharing (sales date, tender) whose sum nets off.
/// Dateless entries group together under the missing date.
fn same_tender_group_pass(
    store_id: i64,
    items: &[TenderEntry],
    used: &mut [bool],
    threshold: f64,
    records: &mut Vec<NettingRecord>,
) {
    let mut groups: BTreeMap<(Option<String>, Tender), Vec<usize>> = BTreeMap::new();
    for (idx, entry) in items.iter().enumerate() {
        if used[idx] {
            continue;
        }
        groups
            .entry((entry.sales_date.clone(), entry.tender))
            .or_default()
            .push(idx);
    }

    for ((sales_date, _), indices) in groups {
        if indices.len() < 2 {
            continue;
        }
        let sum: f64 = indices.iter().map(|&i| items[i].response).sum();
        if !nets_off(sum, threshold) {
            continue;
        }
        for &i in &indices {
            used[i] = true;
        }
        records.push(NettingRecord {
            store_id,
            sales_date,
            kind: NettingKind::WithinTenderMultiple,
            members: indices.iter().map(|&i| member(&items[i])).collect(),
            residual: sum.abs(),
        });
    }
}

/// Pass 3: whole groups sharing a sales date, any mix of tenders.
fn cross_tender_group_pass(
    store_id: i64,
    items: &[TenderEntry],
    used: &mut [bool],
    threshold: f64,
    records: &mut Vec<NettingRecord>,
) {
    let mut groups: BTreeMap<Option<String>, Vec<usize>> = BTreeMap::new();
    for (idx, entry) in items.iter().enumerate() {
        if used[idx] {
            continue;
        }
        groups.entry(entry.sales_date.clone()).or_default().push(idx);
    }

    for (sales_date, indices) in groups {
        if indices.len() < 2 {
            continue;
        }
        let sum: f64 = indices.iter().map(|&i| items[i].response).sum();
        if !nets_off(sum, threshold) {
            continue;
        }
        for &i in &indices {
            used[i] = true;
        }
        let first_tender = items[indices[0]].tender;
        let spans_tenders = indices.iter().any(|&i| items[i].tender != first_tender);
        records.push(NettingRecord {
            store_id,
            sales_date,
            kind: if spans_tenders {
                NettingKind::CrossTenderMultiple
            } else {
                NettingKind::WithinTenderMultiple
            },
            members: indices.iter().map(|&i| member(&items[i])).collect(),
            residual: sum.abs(),
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tender: Tender, response: f64, date: Option<&str>) -> TenderEntry {
        TenderEntry {
            store_id: 404,
            tender,
            response,
            approved_on: "2026-07-02".into(),
            sales_date: date.map(str::to_string),
        }
    }

    #[test]
    fn lone_large_entry_survives() {
        let outcome = net_store(404, vec![entry(Tender::Cash, 250.0, None)], 5.0);
        assert_eq!(outcome.survivors.len(), 1);
        assert!(outcome.records.is_empty());
    }

    #[test]
    fn lone_small_entry_is_silently_discarded() {
        let outcome = net_store(404, vec![entry(Tender::Cash, 42.0, None)], 5.0);
        assert!(outcome.survivors.is_empty());
        assert!(outcome.records.is_empty());
    }

    #[test]
    fn reversal_pair_nets_within_tender() {
        let outcome = net_store(
            404,
            vec![
                entry(Tender::Cash, 500.0, Some("2026-07-01")),
                entry(Tender::Cash, -499.5, Some("2026-07-01")),
            ],
            5.0,
        );
        assert!(outcome.survivors.is_empty());
        assert_eq!(outcome.records.len(), 1);
        let rec = &outcome.records[0];
        assert_eq!(rec.kind, NettingKind::WithinTender);
        assert!((rec.residual - 0.5).abs() < 1e-9);
        assert_eq!(rec.sales_date.as_deref(), Some("2026-07-01"));
    }

    #[test]
    fn pair_across_tenders_is_cross_tender() {
        let outcome = net_store(
            404,
            vec![
                entry(Tender::Cash, 500.02, None),
                entry(Tender::Card, -499.99, None),
            ],
            5.0,
        );
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].kind, NettingKind::CrossTender);
    }

    #[test]
    fn far_apart_entries_survive() {
        let outcome = net_store(
            303,
            vec![entry(Tender::Cash, 1500.0, None), entry(Tender::Card, -1200.0, None)],
            5.0,
        );
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.survivors.len(), 2);
        let total: f64 = outcome.survivors.iter().map(|e| e.response).sum();
        assert!((total - 300.0).abs() < 1e-9);
    }

    #[test]
    fn greedy_pairs_in_descending_magnitude_order() {
        // Sorted order: 50, -48, -30.5, 30. Greedy pairs (50, -48) then
        // (-30.5, 30); both within-tender.
        let outcome = net_store(
            404,
            vec![
                entry(Tender::Cash, 50.0, Some("2026-07-01")),
                entry(Tender::Cash, -48.0, Some("2026-07-01")),
                entry(Tender::Cash, 30.0, Some("2026-07-01")),
                entry(Tender::Cash, -30.5, Some("2026-07-01")),
            ],
            5.0,
        );
        assert!(outcome.survivors.is_empty());
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].kind, NettingKind::WithinTender);
        assert!((outcome.records[0].residual - 2.0).abs() < 1e-9);
        assert_eq!(outcome.records[1].kind, NettingKind::WithinTender);
        assert!((outcome.records[1].residual - 0.5).abs() < 1e-9);
    }

    #[test]
    fn first_eligible_partner_wins_over_closer_one() {
        // For 100.0 both -98.0 and -99.9 are eligible; -99.9 sorts first
        // (larger magnitude), so it is taken even though -98.0 appears
        // earlier in the input.
        let outcome = net_store(
            404,
            vec![
                entry(Tender::Cash, 100.0, None),
                entry(Tender::Cash, -98.0, None),
                entry(Tender::Cash, -99.9, None),
            ],
            5.0,
        );
        assert_eq!(outcome.records.len(), 1);
        let partners: Vec<f64> = outcome.records[0].members.iter().map(|m| m.response).collect();
        assert_eq!(partners, vec![100.0, -99.9]);
        // -98.0 survives alone but falls under the floor, so no survivors.
        assert!(outcome.survivors.is_empty());
    }

    #[test]
    fn pair_at_threshold_does_not_net() {
        // Combined variance exactly at the threshold is not noise.
        let outcome = net_store(
            404,
            vec![
                entry(Tender::Cash, 505.0, None),
                entry(Tender::Cash, -500.0, None),
                entry(Tender::Card, 200.0, Some("2026-07-05")),
            ],
            5.0,
        );
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.survivors.len(), 3);
    }

    #[test]
    fn same_tender_date_group_nets_as_multiple() {
        // No pair of these three nets (best pair variance 40), but the
        // whole same-day cash group sums to 2.0.
        let outcome = net_store(
            404,
            vec![
                entry(Tender::Cash, 120.0, Some("2026-07-01")),
                entry(Tender::Cash, -80.0, Some("2026-07-01")),
                entry(Tender::Cash, -38.0, Some("2026-07-01")),
            ],
            5.0,
        );
        assert!(outcome.survivors.is_empty());
        assert_eq!(outcome.records.len(), 1);
        let rec = &outcome.records[0];
        assert_eq!(rec.kind, NettingKind::WithinTenderMultiple);
        assert_eq!(rec.members.len(), 3);
        assert!((rec.residual - 2.0).abs() < 1e-9);
    }

    #[test]
    fn cross_tender_date_group_nets_last() {
        // Neither pairwise nor same-tender passes fire; the whole day nets
        // across three tenders.
        let outcome = net_store(
            202,
            vec![
                entry(Tender::Cash, 700.0, Some("2026-07-01")),
                entry(Tender::Upi, -650.0, Some("2026-07-01")),
                entry(Tender::Wallet, -48.0, Some("2026-07-01")),
            ],
            5.0,
        );
        assert!(outcome.survivors.is_empty());
        assert_eq!(outcome.records.len(), 1);
        let rec = &outcome.records[0];
        assert_eq!(rec.kind, NettingKind::CrossTenderMultiple);
        assert!((rec.residual - 2.0).abs() < 1e-9);
        assert_eq!(rec.tenders(), vec![Tender::Cash, Tender::Upi, Tender::Wallet]);
    }

    #[test]
    fn dateless_entries_group_together() {
        let outcome = net_store(
            404,
            vec![
                entry(Tender::Card, 90.0, None),
                entry(Tender::Card, -50.0, None),
                entry(Tender::Card, -39.0, None),
            ],
            5.0,
        );
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].kind, NettingKind::WithinTenderMultiple);
        assert_eq!(outcome.records[0].sales_date, None);
    }

    #[test]
    fn pair_pass_runs_before_group_passes() {
        // (600, -599) pair first; the remaining same-day trio (150, -100,
        // -49) then nets as a group. One pair record, one group record.
        let outcome = net_store(
            404,
            vec![
                entry(Tender::Cash, 600.0, Some("2026-07-01")),
                entry(Tender::Cash, -599.0, Some("2026-07-01")),
                entry(Tender::Cash, 150.0, Some("2026-07-01")),
                entry(Tender::Cash, -100.0, Some("2026-07-01")),
                entry(Tender::Cash, -49.0, Some("2026-07-01")),
            ],
            5.0,
        );
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].kind, NettingKind::WithinTender);
        assert_eq!(outcome.records[0].members.len(), 2);
        assert_eq!(outcome.records[1].kind, NettingKind::WithinTenderMultiple);
        assert_eq!(outcome.records[1].members.len(), 3);
        assert!(outcome.survivors.is_empty());
    }

    #[test]
    fn survivors_below_floor_are_dropped_but_records_kept() {
        // The pair nets away; the lone leftover (60) is under the floor.
        let outcome = net_store(
            404,
            vec![
                entry(Tender::Cash, 300.0, Some("2026-07-01")),
                entry(Tender::Cash, -299.0, Some("2026-07-01")),
                entry(Tender::Card, 60.0, Some("2026-07-02")),
            ],
            5.0,
        );
        assert!(outcome.survivors.is_empty());
        assert_eq!(outcome.records.len(), 1);
    }

    #[test]
    fn conservation_across_netting() {
        let entries = vec![
            entry(Tender::Cash, 1500.0, Some("2026-07-01")),
            entry(Tender::Cash, -1499.0, Some("2026-07-01")),
            entry(Tender::Card, 730.0, Some("2026-07-02")),
            entry(Tender::Upi, -420.0, Some("2026-07-02")),
            entry(Tender::Wallet, 12.5, Some("2026-07-03")),
            entry(Tender::Wallet, -11.0, Some("2026-07-03")),
        ];
        let net_total: f64 = entries.iter().map(|e| e.response).sum();

        let outcome = net_store(404, entries, 5.0);
        let surviving: f64 = outcome.survivors.iter().map(|e| e.response).sum();
        let netted: f64 = outcome.records.iter().map(|r| r.members_total()).sum();
        assert!((surviving + netted - net_total).abs() < 1e-9);
    }

    #[test]
    fn netting_invariant_holds_for_every_record() {
        let threshold = 5.0;
        let outcome = net_store(
            404,
            vec![
                entry(Tender::Cash, 50.0, Some("2026-07-01")),
                entry(Tender::Cash, -48.0, Some("2026-07-01")),
                entry(Tender::Upi, 200.0, Some("2026-07-02")),
                entry(Tender::Card, -199.0, Some("2026-07-02")),
                entry(Tender::Wallet, 90.0, Some("2026-07-03")),
                entry(Tender::Wallet, -50.0, Some("2026-07-03")),
                entry(Tender::Wallet, -39.0, Some("2026-07-03")),
            ],
            threshold,
        );
        assert!(!outcome.records.is_empty());
        for rec in &outcome.records {
            assert!(rec.residual < threshold);
            assert!((rec.members_total().abs() - rec.residual).abs() < 1e-9);
        }
    }
}

use crate::model::{ClassificationCount, Severity, StoreSummary};

/// Severity bands over the absolute exception total, walked in order with
/// inclusive bounds — the first match wins, so a boundary value lands in the
/// lower band (exactly 1000 classifies as "+/- 1000").
const BANDS: &[(f64, f64, Severity)] = &[
    (0.0, 100.0, Severity::Under100),
    (100.0, 1_000.0, Severity::UpTo1000),
    (1_000.0, 5_000.0, Severity::UpTo5000),
    (5_000.0, 10_000.0, Severity::UpTo10000),
    (10_000.0, 25_000.0, Severity::UpTo25000),
    (25_000.0, 50_000.0, Severity::UpTo50000),
    (50_000.0, f64::INFINITY, Severity::Over50000),
];

/// Map an exception total to its severity band. Anything the table misses
/// (NaN sneaking through arithmetic) lands in the top band.
pub fn classify(total: f64) -> Severity {
    let abs_total = total.abs();
    for &(min, max, severity) in BANDS {
        if abs_total >= min && abs_total <= max {
            return severity;
        }
    }
    Severity::Over50000
}

/// Count exception stores per severity band, ordered by severity. Bands with
/// no stores are omitted.
pub fn count_by_severity(summary: &[StoreSummary]) -> Vec<ClassificationCount> {
    let mut counts: Vec<ClassificationCount> = Vec::new();
    for &(_, _, severity) in BANDS {
        let store_count = summary.iter().filter(|s| s.classification == severity).count();
        if store_count > 0 {
            counts.push(ClassificationCount {
                classification: severity,
                store_count,
            });
        }
    }
    counts
}

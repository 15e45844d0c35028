//! Tender file ingestion: decode, locate the header, resolve columns by
//! alias, clean rows into [`TenderEntry`] values.

use std::io::Read;
use std::path::Path;

use crate::config::{ColumnAliases, ReconConfig};
use crate::error::ReconError;
use crate::model::{ReconInput, SkippedTender, Tender, TenderEntry};

/// Rows above the header in every tender export (report banner, filters).
const HEADER_OFFSET: usize = 5;

/// Trimmed approval markers that mean "never approved". Only approved
/// entries participate in reconciliation.
const NULL_MARKERS: &[&str] = &["", "nan", "NaN", "NA", "NULL", "null", "0", "None"];

// ---------------------------------------------------------------------------
// File handling
// ---------------------------------------------------------------------------

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1).
pub fn read_file_as_utf8(path: &Path) -> Result<String, ReconError> {
    let mut file = std::fs::File::open(path)
        .map_err(|e| ReconError::Io(format!("{}: {e}", path.display())))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| ReconError::Io(format!("{}: {e}", path.display())))?;

    // Try UTF-8 first; on failure, recover the buffer from the error
    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            // Fall back to Windows-1252 (common for spreadsheet-exported CSVs)
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

/// Detect the most likely field delimiter by checking consistency across the
/// first few lines. The delimiter producing the most consistent field count
/// (>1 field) wins; comma on no evidence.
///
/// Banner rows above the header often carry no delimiter at all, so each
/// candidate is scored against its widest sample line, not the first.
pub fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        let target = counts.iter().copied().max().unwrap_or(0);
        if target <= 1 {
            continue;
        }

        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

// ---------------------------------------------------------------------------
// Column resolution
// ---------------------------------------------------------------------------

/// First header containing any alias, case-insensitively.
fn find_column(headers: &[String], aliases: &[String]) -> Option<usize> {
    headers.iter().position(|header| {
        let header = header.to_lowercase();
        aliases.iter().any(|alias| header.contains(&alias.to_lowercase()))
    })
}

/// First header carrying both "sales" and "date" tokens.
fn find_sales_date_column(headers: &[String]) -> Option<usize> {
    headers.iter().position(|header| {
        let header = header.to_lowercase();
        header.contains("sales") && header.contains("date")
    })
}

// ---------------------------------------------------------------------------
// Row cleaning
// ---------------------------------------------------------------------------

/// Strip thousands separators and non-breaking spaces, then parse.
/// Unparsable or non-finite values are missing.
fn clean_numeric(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|&c| c != ',' && c != '\u{a0}').collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// Parse one tender's file content into cleaned entries.
///
/// Drops rows with a missing store id or response, a zero response, or an
/// approval marker in the null set. Fails typed when a required column cannot
/// be resolved or nothing survives cleaning.
pub fn read_tender_records(
    content: &str,
    tender: Tender,
    aliases: &ColumnAliases,
) -> Result<Vec<TenderEntry>, ReconError> {
    let delimiter = sniff_delimiter(content);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ReconError::Malformed {
            tender,
            detail: e.to_string(),
        })?;
        records.push(record);
    }

    // Header sits at the fixed offset; at least one data row must follow.
    if records.len() <= HEADER_OFFSET + 1 {
        return Err(ReconError::NoData { tender });
    }

    let headers: Vec<String> = records[HEADER_OFFSET]
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let store_idx = find_column(&headers, &aliases.store_id)
        .ok_or(ReconError::MissingColumn { tender, role: "store_id" })?;
    let response_idx = find_column(&headers, &aliases.response)
        .ok_or(ReconError::MissingColumn { tender, role: "response" })?;
    let approval_idx = find_column(&headers, &aliases.approval)
        .ok_or(ReconError::MissingColumn { tender, role: "approval" })?;
    let sales_idx = find_sales_date_column(&headers);

    let mut entries = Vec::new();
    for record in &records[HEADER_OFFSET + 1..] {
        let store_id = match record.get(store_idx).and_then(clean_numeric) {
            Some(v) => v as i64,
            None => continue,
        };
        let response = match record.get(response_idx).and_then(clean_numeric) {
            Some(v) if v != 0.0 => v,
            _ => continue,
        };
        let approved_on = record.get(approval_idx).unwrap_or("").trim();
        if NULL_MARKERS.contains(&approved_on) {
            continue;
        }
        let sales_date = sales_idx
            .and_then(|i| record.get(i))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        entries.push(TenderEntry {
            store_id,
            tender,
            response,
            approved_on: approved_on.to_string(),
            sales_date,
        });
    }

    if entries.is_empty() {
        return Err(ReconError::NoData { tender });
    }

    Ok(entries)
}

/// Read every configured tender file, resolving paths against `base_dir`.
///
/// A tender that fails is skipped with a recorded reason; the run only fails
/// when no tender yields usable data.
pub fn load_tender_files(config: &ReconConfig, base_dir: &Path) -> Result<ReconInput, ReconError> {
    let mut input = ReconInput::default();

    for (tender, file) in config.resolved_tenders() {
        let path = base_dir.join(&file);
        let loaded = read_file_as_utf8(&path)
            .and_then(|content| read_tender_records(&content, tender, &config.columns));
        match loaded {
            Ok(entries) => {
                input.entries.insert(tender, entries);
            }
            Err(err) => input.skipped.push(SkippedTender {
                tender,
                reason: err.to_string(),
            }),
        }
    }

    if input.entries.is_empty() {
        return Err(ReconError::NoUsableData);
    }

    Ok(input)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

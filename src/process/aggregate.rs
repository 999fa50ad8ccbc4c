//! Picks each practice's main supplier for a month.
//!
//! The main supplier is the one with the most appointments summed over every
//! row and every regional table. Ties go to the name that sorts first
//! alphabetically, ignoring case (exact bytes decide only between names that
//! differ in case alone), so a rerun over the same archive always picks the
//! same supplier and the history diff stays clean.
//! Practices whose best total is zero get no assignment at all.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

use crate::config::{ColumnNames, Config};
use crate::error::{Error, Result};
use crate::fetch::zips::ExtractedEntry;
use crate::month::MonthKey;
use crate::process::records::{parse_table, PracticeRecord};
use crate::process::utils::SupplierNormalizer;

/// This month's practice → main supplier mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthAssignments {
    pub month: MonthKey,
    pub suppliers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub entries: usize,
    pub rows: usize,
    pub skipped_rows: usize,
    pub practices: usize,
    /// Practices seen only with zero appointments.
    pub omitted_practices: usize,
}

pub struct SupplierAggregator {
    columns: ColumnNames,
    normalizer: SupplierNormalizer,
    max_bad_row_ratio: f64,
}

impl SupplierAggregator {
    pub fn new(
        columns: ColumnNames,
        normalizer: SupplierNormalizer,
        max_bad_row_ratio: f64,
    ) -> Self {
        Self {
            columns,
            normalizer,
            max_bad_row_ratio,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.columns.clone(),
            SupplierNormalizer::new(&config.secondary_systems, &config.synonyms),
            config.max_bad_row_ratio,
        )
    }

    #[instrument(level = "info", skip_all, fields(month = %month, entries = entries.len()))]
    pub fn aggregate(
        &self,
        month: MonthKey,
        entries: &[ExtractedEntry],
    ) -> Result<(MonthAssignments, AggregateStats)> {
        let mut stats = AggregateStats {
            entries: entries.len(),
            ..Default::default()
        };
        let mut records = Vec::new();
        for entry in entries {
            let table = parse_table(&entry.name, &entry.bytes, &self.columns, &self.normalizer)?;
            if table.bad_rows > 0 {
                warn!(
                    entry = %entry.name,
                    skipped = table.bad_rows,
                    rows = table.total_rows,
                    "skipped malformed rows"
                );
            }
            stats.rows += table.total_rows;
            stats.skipped_rows += table.bad_rows;
            records.extend(table.records);
        }

        if stats.rows == 0 {
            let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
            return Err(Error::parse(names.join(", "), "no data rows"));
        }
        if stats.skipped_rows as f64 > self.max_bad_row_ratio * stats.rows as f64 {
            return Err(Error::DataQuality {
                month,
                bad: stats.skipped_rows,
                total: stats.rows,
                max_ratio: self.max_bad_row_ratio,
            });
        }

        let totals = sum_by_practice(records);
        let mut suppliers = BTreeMap::new();
        for (practice, by_supplier) in totals {
            match main_supplier(&by_supplier) {
                Some(name) => {
                    suppliers.insert(practice, name.to_string());
                }
                None => stats.omitted_practices += 1,
            }
        }
        stats.practices = suppliers.len();

        info!(
            practices = stats.practices,
            omitted = stats.omitted_practices,
            rows = stats.rows,
            skipped = stats.skipped_rows,
            "aggregated suppliers"
        );
        Ok((MonthAssignments { month, suppliers }, stats))
    }
}

/// practice → supplier → appointments.
pub fn sum_by_practice(
    records: impl IntoIterator<Item = PracticeRecord>,
) -> BTreeMap<String, BTreeMap<String, u64>> {
    let mut totals: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();
    for rec in records {
        let slot = totals
            .entry(rec.practice_id)
            .or_default()
            .entry(rec.supplier)
            .or_default();
        *slot = slot.saturating_add(rec.appointments);
    }
    totals
}

/// Largest total wins; on a tie the alphabetically first name wins.
/// `None` when every total is zero.
pub fn main_supplier(by_supplier: &BTreeMap<String, u64>) -> Option<&str> {
    let mut best: Option<(&str, u64)> = None;
    for (name, &count) in by_supplier {
        if count == 0 {
            continue;
        }
        let better = match best {
            None => true,
            Some((held, c)) => {
                count > c || (count == c && alphabetical(name, held) == Ordering::Less)
            }
        };
        if better {
            best = Some((name.as_str(), count));
        }
    }
    best.map(|(name, _)| name)
}

/// Case-insensitive order, falling back to bytes so the result is total.
fn alphabetical(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

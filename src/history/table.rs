use csv::{ReaderBuilder, Terminator, WriterBuilder};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::month::MonthKey;
use crate::process::utils::normalize_practice_id;
use crate::process::MonthAssignments;

pub const KEY_COLUMN: &str = "practice_id";

/// The persisted practice × month grid of main suppliers.
///
/// Columns and rows live in ordered maps, so the CSV form is always months
/// oldest-first and practices ascending no matter how they were inserted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryTable {
    months: BTreeSet<MonthKey>,
    rows: BTreeMap<String, BTreeMap<MonthKey, String>>,
}

/// What a merge changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub new_practices: usize,
    /// Cells that were blank and now hold a supplier.
    pub filled_cells: usize,
    /// Cells whose previous value was replaced by a different one.
    pub changed_cells: usize,
}

impl HistoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn months(&self) -> impl Iterator<Item = MonthKey> + '_ {
        self.months.iter().copied()
    }

    pub fn practices(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn get(&self, practice_id: &str, month: MonthKey) -> Option<&str> {
        self.rows
            .get(practice_id)
            .and_then(|cells| cells.get(&month))
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty() && self.rows.is_empty()
    }

    /// Fold one month's assignments in.
    ///
    /// The month's column is added if absent. A computed supplier overwrites
    /// whatever the cell held; practices without a computed value keep their
    /// existing cell for that month, and every other month is left alone.
    pub fn merge(mut self, update: &MonthAssignments) -> (Self, MergeStats) {
        let mut stats = MergeStats::default();
        self.months.insert(update.month);
        for (practice, supplier) in &update.suppliers {
            if !self.rows.contains_key(practice) {
                stats.new_practices += 1;
            }
            let cells = self.rows.entry(practice.clone()).or_default();
            match cells.insert(update.month, supplier.clone()) {
                None => stats.filled_cells += 1,
                Some(old) if old != *supplier => stats.changed_cells += 1,
                Some(_) => {}
            }
        }
        debug!(month = %update.month, ?stats, "merged month");
        (self, stats)
    }

    /// Parse the CSV form. An empty input is an empty table.
    #[instrument(level = "debug", skip(bytes), fields(bytes = bytes.len()))]
    pub fn from_csv(input: &str, bytes: &[u8]) -> Result<Self> {
        let mut table = Self::new();
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(table);
        }

        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(Cursor::new(bytes));
        let headers = rdr
            .headers()
            .map_err(|e| Error::parse(input, format!("unreadable header: {e}")))?
            .clone();

        let mut header_iter = headers.iter();
        match header_iter.next().map(|h| h.trim_start_matches('\u{feff}').trim()) {
            Some(KEY_COLUMN) => {}
            other => {
                return Err(Error::parse(
                    input,
                    format!("first column must be `{KEY_COLUMN}`, found {other:?}"),
                ))
            }
        }
        let mut columns = Vec::new();
        for h in header_iter {
            let month: MonthKey = h
                .trim()
                .parse()
                .map_err(|_| Error::parse(input, format!("column `{h}` is not a YYYY-MM month")))?;
            if !table.months.insert(month) {
                return Err(Error::parse(input, format!("month {month} appears twice")));
            }
            columns.push(month);
        }

        for (idx, result) in rdr.records().enumerate() {
            let line = idx + 2;
            let record =
                result.map_err(|e| Error::parse(input, format!("line {line}: {e}")))?;
            let practice = normalize_practice_id(record.get(0).unwrap_or_default());
            if practice.is_empty() {
                return Err(Error::parse(input, format!("line {line}: empty {KEY_COLUMN}")));
            }
            if table.rows.contains_key(&practice) {
                return Err(Error::parse(
                    input,
                    format!("line {line}: duplicate practice {practice}"),
                ));
            }
            let cells = table.rows.entry(practice).or_default();
            for (month, value) in columns.iter().zip(record.iter().skip(1)) {
                let value = value.trim();
                if !value.is_empty() {
                    cells.insert(*month, value.to_string());
                }
            }
        }
        Ok(table)
    }

    /// Serialise to CSV: `practice_id,<YYYY-MM>...`, `\n` line endings,
    /// blank cell where a practice has no value.
    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut wtr = WriterBuilder::new()
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        let to_err = |e: csv::Error| Error::parse("history table", e.to_string());

        let mut header = vec![KEY_COLUMN.to_string()];
        header.extend(self.months.iter().map(ToString::to_string));
        wtr.write_record(&header).map_err(to_err)?;

        for (practice, cells) in &self.rows {
            let mut row = Vec::with_capacity(self.months.len() + 1);
            row.push(practice.as_str());
            row.extend(
                self.months
                    .iter()
                    .map(|m| cells.get(m).map(String::as_str).unwrap_or("")),
            );
            wtr.write_record(&row).map_err(to_err)?;
        }
        wtr.into_inner()
            .map_err(|e| Error::parse("history table", e.to_string()))
    }
}

use csv::{ReaderBuilder, StringRecord};
use std::io::Cursor;
use tracing::{debug, trace};

use crate::config::ColumnNames;
use crate::error::{Error, Result};
use crate::process::utils::{clean_str, normalize_practice_id, SupplierNormalizer};

/// One usable input row: appointments booked at a practice through a supplier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PracticeRecord {
    pub practice_id: String,
    pub supplier: String,
    pub appointments: u64,
}

/// The rows of one extracted table, with bad rows already dropped.
#[derive(Debug, Default)]
pub struct ParsedTable {
    pub records: Vec<PracticeRecord>,
    /// Data rows seen, good and bad.
    pub total_rows: usize,
    pub bad_rows: usize,
}

#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    practice: usize,
    supplier: usize,
    count: usize,
}

impl ColumnIndex {
    fn locate(headers: &StringRecord, names: &ColumnNames, input: &str) -> Result<Self> {
        let find = |wanted: &str| {
            headers
                .iter()
                .position(|h| {
                    clean_str(h.trim_start_matches('\u{feff}')).eq_ignore_ascii_case(wanted.trim())
                })
                .ok_or_else(|| {
                    Error::parse(
                        input,
                        format!(
                            "required column `{}` not found in header [{}]",
                            wanted,
                            headers.iter().collect::<Vec<_>>().join(", ")
                        ),
                    )
                })
        };
        Ok(Self {
            practice: find(&names.practice)?,
            supplier: find(&names.supplier)?,
            count: find(&names.count)?,
        })
    }
}

/// The error side says why the row was dropped; it is only logged.
fn to_record(
    record: &StringRecord,
    cols: ColumnIndex,
    normalizer: &SupplierNormalizer,
) -> std::result::Result<PracticeRecord, &'static str> {
    let practice_id = record
        .get(cols.practice)
        .map(normalize_practice_id)
        .filter(|p| !p.is_empty())
        .ok_or("missing practice id")?;
    let supplier = record
        .get(cols.supplier)
        .and_then(|s| normalizer.normalize(s))
        .ok_or("missing supplier")?;
    let appointments = record
        .get(cols.count)
        .map(clean_str)
        .filter(|c| !c.is_empty())
        .ok_or("missing count")?
        .parse::<u64>()
        .map_err(|_| "count is not a non-negative integer")?;
    Ok(PracticeRecord {
        practice_id,
        supplier,
        appointments,
    })
}

/// Parse one CSV table. Structural problems (unreadable header, missing
/// columns) fail with `Error::Parse`; bad data rows are counted and skipped.
pub fn parse_table(
    input: &str,
    bytes: &[u8],
    names: &ColumnNames,
    normalizer: &SupplierNormalizer,
) -> Result<ParsedTable> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(Cursor::new(bytes));

    let headers = rdr
        .headers()
        .map_err(|e| Error::parse(input, format!("unreadable header: {e}")))?
        .clone();
    if headers.is_empty() {
        return Err(Error::parse(input, "empty table"));
    }
    let cols = ColumnIndex::locate(&headers, names, input)?;
    trace!(?cols, "located columns");

    let mut table = ParsedTable::default();
    for (idx, result) in rdr.records().enumerate() {
        table.total_rows += 1;
        let line = idx + 2;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                debug!(input, line, error = %e, "skipping unreadable row");
                table.bad_rows += 1;
                continue;
            }
        };
        match to_record(&record, cols, normalizer) {
            Ok(rec) => table.records.push(rec),
            Err(reason) => {
                debug!(input, line, reason, "skipping row");
                table.bad_rows += 1;
            }
        }
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(csv: &str) -> Result<ParsedTable> {
        parse_table(
            "test.csv",
            csv.as_bytes(),
            &ColumnNames::default(),
            &SupplierNormalizer::default(),
        )
    }

    #[test]
    fn reads_required_columns_by_name() {
        let table = parse(
            "\u{feff}APPOINTMENT_MONTH,GP_CODE,GP_NAME,SUPPLIER,HCP_TYPE,COUNT_OF_APPOINTMENTS\n\
             01SEP2025, a81001 ,THE DENSHAM SURGERY,EMIS,GP,120\n\
             01SEP2025,A81001,THE DENSHAM SURGERY,EMIS,Other,30\n",
        )
        .unwrap();
        assert_eq!(table.total_rows, 2);
        assert_eq!(table.bad_rows, 0);
        assert_eq!(
            table.records[0],
            PracticeRecord {
                practice_id: "A81001".into(),
                supplier: "EMIS".into(),
                appointments: 120,
            }
        );
    }

    #[test]
    fn missing_column_is_a_parse_error() {
        let err = parse("GP_CODE,SUPPLIER\nA81001,EMIS\n").unwrap_err();
        match err {
            Error::Parse { input, reason } => {
                assert_eq!(input, "test.csv");
                assert!(reason.contains("COUNT_OF_APPOINTMENTS"), "{reason}");
            }
            other => panic!("expected Parse, got {other:?}"),
        }
    }

    #[test]
    fn empty_input_is_a_parse_error() {
        assert!(matches!(parse(""), Err(Error::Parse { .. })));
    }

    #[test]
    fn bad_rows_are_counted_not_fatal() {
        let table = parse(
            "GP_CODE,SUPPLIER,COUNT_OF_APPOINTMENTS\n\
             A81001,EMIS,10\n\
             A81002,TPP,lots\n\
             A81003,TPP,-4\n\
             A81004,TPP,\n\
             ,TPP,5\n\
             A81005,,5\n\
             A81006,TPP\n",
        )
        .unwrap();
        assert_eq!(table.total_rows, 7);
        assert_eq!(table.bad_rows, 6);
        assert_eq!(table.records.len(), 1);
    }
}

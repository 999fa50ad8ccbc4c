// src/fetch/zips.rs
//! Pulls the practice-level tables out of a downloaded archive.

use regex::Regex;
use std::io::{Cursor, Read};
use tracing::{debug, info, instrument};
use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::month::MonthKey;

/// One matched archive entry, held in memory.
#[derive(Debug, Clone)]
pub struct ExtractedEntry {
    /// Full name inside the archive.
    pub name: String,
    /// Which regional table this is, e.g. `Midlands`.
    pub label: String,
    pub bytes: Vec<u8>,
}

/// Which entries to take: basename starts with `prefix` and ends `.csv`.
#[derive(Debug, Clone)]
pub struct EntryPattern {
    prefix: String,
    name_re: Regex,
    month_suffix: Option<String>,
}

impl EntryPattern {
    pub fn new(prefix: &str) -> Result<Self> {
        let name_re = Regex::new(&format!(r"(?i)(?:^|/){}[^/]*\.csv$", regex::escape(prefix)))
            .map_err(|e| Error::Config(format!("entry pattern for `{prefix}`: {e}")))?;
        Ok(Self {
            prefix: prefix.to_string(),
            name_re,
            month_suffix: None,
        })
    }

    /// Same pattern, with `_Sep_25` style suffixes stripped from labels.
    pub fn for_month(prefix: &str, month: MonthKey) -> Result<Self> {
        let mut pattern = Self::new(prefix)?;
        pattern.month_suffix = Some(format!("_{}_{}", month.abbreviation(), month.short_year()));
        Ok(pattern)
    }

    pub fn matches(&self, name: &str) -> bool {
        self.name_re.is_match(name)
    }

    pub fn label(&self, name: &str) -> String {
        let base = name.rsplit('/').next().unwrap_or(name);
        let stem = base
            .get(..base.len().saturating_sub(".csv".len()))
            .unwrap_or(base);
        let mut rest = stem.get(self.prefix.len()..).unwrap_or("");
        if let Some(suffix) = &self.month_suffix {
            let cut = rest.len().saturating_sub(suffix.len());
            if let (Some(head), Some(tail)) = (rest.get(..cut), rest.get(cut..)) {
                if tail.eq_ignore_ascii_case(suffix) {
                    rest = head;
                }
            }
        }
        let label = rest.trim_matches(|c: char| c == '_' || c == '-' || c == ' ');
        if label.is_empty() {
            "all".to_string()
        } else {
            label.to_string()
        }
    }

    pub fn as_str(&self) -> &str {
        self.name_re.as_str()
    }
}

/// Read every entry of the zip in `archive` that matches `pattern`.
/// `origin` names the source (usually its URL) in errors.
#[instrument(level = "info", skip(archive, pattern), fields(bytes = archive.len()))]
pub fn extract_entries(
    archive: &[u8],
    pattern: &EntryPattern,
    origin: &str,
) -> Result<Vec<ExtractedEntry>> {
    let format_err = |source| Error::Format {
        origin: origin.to_string(),
        source,
    };
    let mut zip = ZipArchive::new(Cursor::new(archive)).map_err(format_err)?;

    let mut entries = Vec::new();
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(format_err)?;
        let name = entry.name().to_string();
        if !entry.is_file() || !pattern.matches(&name) {
            debug!(entry = %name, "skipping entry");
            continue;
        }

        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| format_err(e.into()))?;
        let label = pattern.label(&name);
        info!(entry = %name, label = %label, bytes = bytes.len(), "extracted");
        entries.push(ExtractedEntry { name, label, bytes });
    }

    if entries.is_empty() {
        return Err(Error::MissingEntry {
            origin: origin.to_string(),
            pattern: pattern.as_str().to_string(),
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::zip_archive;

    fn pattern() -> EntryPattern {
        EntryPattern::for_month("Practice_Level_Crosstab", "2025-09".parse().unwrap()).unwrap()
    }

    #[test]
    fn extracts_matching_entries_with_labels() {
        let archive = zip_archive(&[
            ("Practice_Level_Crosstab_North_East_Sep_25.csv", "a"),
            ("Regional_CSV_Sep_25.csv", "b"),
            ("csv/Practice_Level_Crosstab_Midlands_Sep_25.csv", "c"),
            ("Practice_Level_Crosstab_Readme.txt", "d"),
        ]);

        let entries = extract_entries(&archive, &pattern(), "test.zip").unwrap();
        let found: Vec<(&str, &str, &[u8])> = entries
            .iter()
            .map(|e| (e.name.as_str(), e.label.as_str(), e.bytes.as_slice()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("Practice_Level_Crosstab_North_East_Sep_25.csv", "North_East", &b"a"[..]),
                ("csv/Practice_Level_Crosstab_Midlands_Sep_25.csv", "Midlands", &b"c"[..]),
            ]
        );
    }

    #[test]
    fn single_national_file_is_labelled_all() {
        let archive = zip_archive(&[("PRACTICE_LEVEL_CROSSTAB_SEP_25.CSV", "x")]);
        let entries = extract_entries(&archive, &pattern(), "test.zip").unwrap();
        assert_eq!(entries[0].label, "all");
    }

    #[test]
    fn missing_entry_is_reported() {
        let archive = zip_archive(&[("Appointments_GPAD_Sep_25.csv", "x")]);
        let err = extract_entries(&archive, &pattern(), "https://x/a.zip").unwrap_err();
        match err {
            Error::MissingEntry { origin, .. } => assert_eq!(origin, "https://x/a.zip"),
            other => panic!("expected MissingEntry, got {other:?}"),
        }
    }

    #[test]
    fn garbage_is_a_format_error() {
        let err = extract_entries(b"<html>not a zip</html>", &pattern(), "x").unwrap_err();
        assert!(matches!(err, Error::Format { .. }), "{err}");
    }
}

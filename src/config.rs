use serde::Deserialize;
use std::{collections::BTreeMap, fs, path::Path, path::PathBuf};
use tracing::debug;

use crate::error::{Error, Result};

pub const DEFAULT_INDEX_URL: &str = "https://digital.nhs.uk/data-and-information/publications/statistical/appointments-in-general-practice/{month_name}-{year}";

/// Run configuration. Every field has a default, so a JSON file only needs
/// the keys it changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Index page to scrape, rendered per month (see `MonthKey::render`).
    pub index_url: String,
    /// Words a download link's href or text must all contain
    /// (case-insensitive). The defaults pick the practice-level CSV card.
    pub link_keywords: Vec<String>,
    /// Required suffix of a download link's path; empty accepts any link.
    pub archive_suffix: String,
    /// File name prefix of the tabular entries inside the archive.
    pub entry_prefix: String,
    pub columns: ColumnNames,
    /// Booking front-ends that appear next to the clinical system in compound
    /// supplier values such as `EVERGREENLIFE/TPP`.
    pub secondary_systems: Vec<String>,
    /// Curated spelling fixes, keyed by the variant (case-insensitive).
    pub synonyms: BTreeMap<String, String>,
    /// Fraction of unusable rows above which a month is rejected.
    pub max_bad_row_ratio: f64,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub practice: String,
    pub supplier: String,
    pub count: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index_url: DEFAULT_INDEX_URL.to_string(),
            link_keywords: vec!["annex 1".to_string(), "csv".to_string()],
            archive_suffix: ".zip".to_string(),
            entry_prefix: "Practice_Level_Crosstab".to_string(),
            columns: ColumnNames::default(),
            secondary_systems: vec!["EVERGREENLIFE".to_string()],
            synonyms: BTreeMap::new(),
            max_bad_row_ratio: 0.10,
            output: PathBuf::from("data/gp_suppliers.csv"),
        }
    }
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            practice: "GP_CODE".to_string(),
            supplier: "SUPPLIER".to_string(),
            count: "COUNT_OF_APPOINTMENTS".to_string(),
        }
    }
}

impl Config {
    /// Load from a JSON file, or the defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|source| Error::Io {
                    action: "reading config",
                    path: path.to_path_buf(),
                    source,
                })?;
                debug!(path = %path.display(), "loaded config file");
                serde_json::from_str(&text)
                    .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?
            }
            None => Config::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.max_bad_row_ratio) {
            return Err(Error::Config(format!(
                "max_bad_row_ratio must be between 0 and 1, got {}",
                self.max_bad_row_ratio
            )));
        }
        if self.entry_prefix.trim().is_empty() {
            return Err(Error::Config("entry_prefix must not be empty".into()));
        }
        for (name, value) in [
            ("columns.practice", &self.columns.practice),
            ("columns.supplier", &self.columns.supplier),
            ("columns.count", &self.columns.count),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"max_bad_row_ratio": 0.25, "synonyms": {{"Emis Web": "EMIS"}}}}"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.max_bad_row_ratio, 0.25);
        assert_eq!(config.synonyms.get("Emis Web").map(String::as_str), Some("EMIS"));
        assert_eq!(config.columns.practice, "GP_CODE");
        assert_eq!(config.entry_prefix, "Practice_Level_Crosstab");
    }

    #[test]
    fn rejects_out_of_range_ratio() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_bad_row_ratio": 1.5}}"#).unwrap();
        assert!(matches!(
            Config::load(Some(file.path())),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.json"))).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}

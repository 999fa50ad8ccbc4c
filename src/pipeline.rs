//! One run: locate → fetch → extract → aggregate → merge → write.
//!
//! Nothing touches the history file until the new table is fully built in
//! memory, so any failure leaves the previous file as it was.

use std::path::Path;
use tokio::time::Instant;
use tracing::{info, instrument};
use url::Url;

use crate::config::Config;
use crate::error::Result;
use crate::fetch::urls::ResourceLocator;
use crate::fetch::zips::{extract_entries, EntryPattern};
use crate::fetch::Transport;
use crate::history::{HistoryStore, HistoryTable, MergeStats};
use crate::month::MonthKey;
use crate::process::{AggregateStats, MonthAssignments, SupplierAggregator};

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub month: MonthKey,
    pub url: Url,
    pub aggregate: AggregateStats,
    pub merge: MergeStats,
}

pub struct Pipeline<T> {
    transport: T,
    config: Config,
    locator: ResourceLocator,
    aggregator: SupplierAggregator,
}

impl<T: Transport> Pipeline<T> {
    pub fn new(transport: T, config: Config) -> Result<Self> {
        config.validate()?;
        let locator = ResourceLocator::new(
            &config.index_url,
            &config.link_keywords,
            &config.archive_suffix,
        );
        let aggregator = SupplierAggregator::from_config(&config);
        Ok(Self {
            transport,
            config,
            locator,
            aggregator,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The archive URL: `direct` when given (no index request), otherwise
    /// whatever the index page links for `month`.
    pub async fn resolve_url(&self, month: MonthKey, direct: Option<Url>) -> Result<Url> {
        match direct {
            Some(url) => {
                info!(%url, "using supplied archive url; skipping link discovery");
                Ok(url)
            }
            None => self.locator.locate(&self.transport, month).await,
        }
    }

    /// Download the archive at `url` and compute the month's assignments.
    #[instrument(level = "info", skip_all, fields(month = %month, url = %url))]
    pub async fn assignments(
        &self,
        month: MonthKey,
        url: &Url,
    ) -> Result<(MonthAssignments, AggregateStats)> {
        let start = Instant::now();
        let archive = self.transport.fetch(url).await?;
        info!(bytes = archive.len(), elapsed = ?start.elapsed(), "downloaded archive");

        let pattern = EntryPattern::for_month(&self.config.entry_prefix, month)?;
        let entries = extract_entries(&archive, &pattern, url.as_str())?;
        self.aggregator.aggregate(month, &entries)
    }

    /// Merge `month` into the history at `history_path` and rewrite it.
    #[instrument(level = "info", skip_all, fields(month = %month))]
    pub async fn run(
        &self,
        month: MonthKey,
        direct: Option<Url>,
        history_path: &Path,
    ) -> Result<RunSummary> {
        let url = self.resolve_url(month, direct).await?;
        let (update, aggregate) = self.assignments(month, &url).await?;

        let store = HistoryStore::new(history_path);
        let history: HistoryTable = store.load()?;
        let (merged, merge) = history.merge(&update);
        store.save(&merged)?;

        info!(
            practices = aggregate.practices,
            new_practices = merge.new_practices,
            changed = merge.changed_cells,
            "completed month"
        );
        Ok(RunSummary {
            month,
            url,
            aggregate,
            merge,
        })
    }
}

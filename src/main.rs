use anyhow::{anyhow, Context, Result};
use clap::Parser;
use gpscraper::{fetch::HttpTransport, Config, MonthKey, Pipeline};
use reqwest::Client;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

/// Records each GP practice's main IT system supplier for a month of the
/// Appointments in General Practice publication.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Month to process, YYYY-MM. Defaults to the previous calendar month.
    #[arg(long, short)]
    month: Option<MonthKey>,

    /// Archive URL or local path; skips finding the link on the index page.
    #[arg(long, value_name = "URL|PATH")]
    zip_url: Option<String>,

    /// History CSV to update (overrides the config file).
    #[arg(long, short, value_name = "PATH")]
    output: Option<PathBuf>,

    /// JSON config file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn archive_url(raw: &str) -> Result<Url> {
    match Url::parse(raw) {
        // one-letter "schemes" are Windows drive letters
        Ok(url) if url.scheme().len() > 1 => Ok(url),
        _ => {
            let path = std::fs::canonicalize(raw)
                .with_context(|| format!("archive `{raw}` is neither a URL nor a readable path"))?;
            Url::from_file_path(&path)
                .map_err(|_| anyhow!("cannot turn {} into a URL", path.display()))
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    // ─── 2) resolve inputs ───────────────────────────────────────────
    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(output) = args.output {
        config.output = output;
    }
    let month = args.month.unwrap_or_else(MonthKey::last_completed);
    let direct = args.zip_url.as_deref().map(archive_url).transpose()?;
    let output = config.output.clone();
    info!(%month, output = %output.display(), "startup");

    // ─── 3) run ──────────────────────────────────────────────────────
    let pipeline = Pipeline::new(HttpTransport::new(Client::new()), config)?;
    match pipeline.run(month, direct, &output).await {
        Ok(summary) => {
            info!(
                month = %summary.month,
                url = %summary.url,
                practices = summary.aggregate.practices,
                skipped_rows = summary.aggregate.skipped_rows,
                new_practices = summary.merge.new_practices,
                changed_cells = summary.merge.changed_cells,
                "done"
            );
            Ok(())
        }
        Err(e) => {
            error!(%month, error = %e, "run failed; history left unchanged");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_month_and_url() {
        let args = Args::try_parse_from([
            "gpscraper",
            "--month",
            "2025-09",
            "--zip-url",
            "https://files.example/a.zip",
        ])
        .unwrap();
        assert_eq!(args.month.unwrap().to_string(), "2025-09");
        assert_eq!(
            archive_url(args.zip_url.as_deref().unwrap()).unwrap().as_str(),
            "https://files.example/a.zip"
        );
    }

    #[test]
    fn rejects_bad_month() {
        assert!(Args::try_parse_from(["gpscraper", "--month", "Sep 25"]).is_err());
    }

    #[test]
    fn local_path_becomes_file_url() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let url = archive_url(file.path().to_str().unwrap()).unwrap();
        assert_eq!(url.scheme(), "file");
        assert!(archive_url("/definitely/not/here.zip").is_err());
    }
}

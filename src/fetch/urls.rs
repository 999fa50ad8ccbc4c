// src/fetch/urls.rs
//! Finds the archive link for a month on the publisher's index page.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use tracing::{debug, info, instrument, trace};
use url::Url;

use super::Transport;
use crate::error::{Error, Result};
use crate::month::MonthKey;

/// An anchor on the index page, resolved against the page URL.
#[derive(Debug, Clone)]
pub struct Link {
    pub href: Url,
    /// Visible text plus any `title` attribute and the enclosing download
    /// card's text, whitespace-collapsed.
    pub text: String,
}

/// Decides whether a link is the archive for a month. Swappable so a change
/// in the publisher's naming only touches the matcher.
pub trait LinkMatcher {
    fn matches(&self, link: &Link) -> bool;
    /// Human-readable form for logs.
    fn describe(&self) -> String;
}

/// Matches links whose href or text encodes the month as `Sep 25`,
/// `Sep_25`, `September 2025` and similar.
pub struct MonthLinkMatcher {
    month_re: Regex,
    keywords: Vec<String>,
    archive_suffix: String,
}

impl MonthLinkMatcher {
    pub fn new(month: MonthKey, keywords: &[String], archive_suffix: &str) -> Result<Self> {
        let mut names = vec![
            month.abbreviation().to_lowercase(),
            month.month_name().to_string(),
        ];
        if month.month() == 9 {
            names.push("sept".to_string());
        }
        names.dedup();
        let pattern = format!(
            r"(?i)(?:^|[^a-z])(?:{})(?:[\s_.\-]|%20)*(?:{})?{}(?:$|[^0-9])",
            names.join("|"),
            month.year() / 100,
            month.short_year(),
        );
        let month_re = Regex::new(&pattern)
            .map_err(|e| Error::Config(format!("month link pattern: {e}")))?;
        Ok(Self {
            month_re,
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            archive_suffix: archive_suffix.to_lowercase(),
        })
    }
}

impl LinkMatcher for MonthLinkMatcher {
    fn matches(&self, link: &Link) -> bool {
        let path = link.href.path().to_lowercase();
        if !self.archive_suffix.is_empty() && !path.ends_with(&self.archive_suffix) {
            return false;
        }
        // the file name only; index directories are often named after the month
        let file_name = link
            .href
            .path_segments()
            .and_then(|mut segs| segs.next_back())
            .unwrap_or_default();
        if !self.month_re.is_match(file_name) && !self.month_re.is_match(&link.text) {
            return false;
        }
        let haystack = format!("{} {}", link.href, link.text).to_lowercase();
        self.keywords.iter().all(|k| haystack.contains(k.as_str()))
    }

    fn describe(&self) -> String {
        let mut out = format!("href or text matching /{}/", self.month_re.as_str());
        if !self.archive_suffix.is_empty() {
            out.push_str(&format!(", path ending `{}`", self.archive_suffix));
        }
        if !self.keywords.is_empty() {
            out.push_str(&format!(", containing {:?}", self.keywords));
        }
        out
    }
}

/// Every `a[href]` on the page that resolves to an absolute URL.
pub fn collect_links(html: &str, base: &Url) -> Vec<Link> {
    let selector = Selector::parse("a[href]").expect("CSS selector for links should be valid");
    Html::parse_document(html)
        .select(&selector)
        .filter_map(|el| {
            let href = base.join(el.value().attr("href")?).ok()?;
            let mut text = el.text().collect::<Vec<_>>().join(" ");
            if let Some(title) = el.value().attr("title") {
                text.push(' ');
                text.push_str(title);
            }
            if let Some(card) = download_card(el) {
                for part in card.text() {
                    text.push(' ');
                    text.push_str(part);
                }
            }
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            Some(Link { href, text })
        })
        .collect()
}

/// The publisher wraps each file in a `div.nhsd-m-download-card` whose
/// title sits outside the anchor.
fn download_card<'a>(el: ElementRef<'a>) -> Option<ElementRef<'a>> {
    el.ancestors().filter_map(ElementRef::wrap).find(|anc| {
        anc.value()
            .classes()
            .any(|class| class.ends_with("download-card"))
    })
}

/// Pick the single link the matcher accepts. Links that resolve to the same
/// URL count once.
pub fn select_link(
    links: &[Link],
    matcher: &dyn LinkMatcher,
    month: MonthKey,
    index_url: &Url,
) -> Result<Url> {
    let candidates: BTreeSet<&Url> = links
        .iter()
        .filter(|link| {
            let hit = matcher.matches(link);
            trace!(href = %link.href, text = %link.text, hit, "candidate link");
            hit
        })
        .map(|link| &link.href)
        .collect();

    let mut iter = candidates.iter();
    match (iter.next(), iter.next()) {
        (Some(only), None) => Ok((*only).clone()),
        (None, _) => Err(Error::NotFound {
            month,
            index_url: index_url.to_string(),
        }),
        (Some(_), Some(_)) => Err(Error::AmbiguousResult {
            month,
            index_url: index_url.to_string(),
            candidates: candidates.iter().map(|u| u.to_string()).collect(),
        }),
    }
}

/// Resolves a month to its archive URL via the index page.
pub struct ResourceLocator {
    index_template: String,
    keywords: Vec<String>,
    archive_suffix: String,
}

impl ResourceLocator {
    pub fn new(index_template: &str, keywords: &[String], archive_suffix: &str) -> Self {
        Self {
            index_template: index_template.to_string(),
            keywords: keywords.to_vec(),
            archive_suffix: archive_suffix.to_string(),
        }
    }

    pub fn index_url(&self, month: MonthKey) -> Result<Url> {
        let rendered = month.render(&self.index_template);
        Url::parse(&rendered)
            .map_err(|e| Error::Config(format!("index url `{rendered}`: {e}")))
    }

    pub fn matcher(&self, month: MonthKey) -> Result<MonthLinkMatcher> {
        MonthLinkMatcher::new(month, &self.keywords, &self.archive_suffix)
    }

    #[instrument(level = "info", skip_all, fields(month = %month))]
    pub async fn locate<T: Transport>(&self, transport: &T, month: MonthKey) -> Result<Url> {
        let index_url = self.index_url(month)?;
        let matcher = self.matcher(month)?;
        info!(%index_url, "finding download link");

        let body = transport.fetch(&index_url).await?;
        let html = String::from_utf8_lossy(&body);
        let links = collect_links(&html, &index_url);
        debug!(links = links.len(), rule = %matcher.describe(), "scanned index page");

        let url = select_link(&links, &matcher, month, &index_url)?;
        info!(%url, "found download link");
        Ok(url)
    }
}

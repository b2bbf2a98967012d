//! Article search through the `MediaWiki` search API.

use scrapedeck_core::{SummaryConfig, WikipediaConfig};
use serde::Deserialize;
use tracing::Instrument;

use crate::client::{FetchSettings, Fetcher};
use crate::error::ScraperError;
use crate::summary::summarize;
use crate::types::{FieldValue, ListingRecord, SearchExtent, SearchResult};

const SOURCE: &str = "wikipedia";
const NO_RESULTS: &str = "No results found";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: Option<QueryBlock>,
}

#[derive(Debug, Deserialize)]
struct QueryBlock {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
    pageid: u64,
    #[serde(default)]
    snippet: String,
}

pub struct WikipediaSource {
    api_url: String,
    article_base: String,
    fetcher: Fetcher,
    span: tracing::Span,
}

impl WikipediaSource {
    /// # Errors
    ///
    /// Returns [`ScraperError`] if the HTTP client cannot be built.
    pub fn new(config: &WikipediaConfig, settings: &FetchSettings) -> Result<Self, ScraperError> {
        Ok(Self {
            api_url: config.api_url.clone(),
            article_base: config.article_base.clone(),
            fetcher: Fetcher::new(SOURCE, &config.fetch, settings, None)?,
            span: tracing::info_span!("scraper", site = SOURCE),
        })
    }

    /// Returns up to `max_results` article hits for `term`.
    ///
    /// Transport or decoding failures come back as a result with `error` set.
    pub async fn search(&self, term: &str, max_results: u32) -> SearchResult {
        let max_results = max_results.max(1);
        async {
            match self.lookup(term, max_results).await {
                Ok(records) => {
                    tracing::info!(hits = records.len(), "search finished");
                    let summary = summarize(&records, &SummaryConfig::default());
                    SearchResult::new(
                        term,
                        SOURCE,
                        SearchExtent::TotalResults(records.len()),
                        records,
                        summary,
                        NO_RESULTS,
                    )
                }
                Err(err) => {
                    tracing::error!(error = %err, "article search failed");
                    SearchResult::failed(
                        term,
                        SOURCE,
                        SearchExtent::TotalResults(0),
                        err.to_string(),
                    )
                }
            }
        }
        .instrument(self.span.clone())
        .await
    }

    fn search_url(&self, term: &str, max_results: u32) -> Result<reqwest::Url, ScraperError> {
        let limit = max_results.to_string();
        reqwest::Url::parse_with_params(
            &self.api_url,
            &[
                ("action", "query"),
                ("format", "json"),
                ("list", "search"),
                ("srsearch", term),
                ("utf8", "1"),
                ("srlimit", limit.as_str()),
            ],
        )
        .map_err(|e| ScraperError::InvalidUrl {
            url: self.api_url.clone(),
            reason: e.to_string(),
        })
    }

    async fn lookup(
        &self,
        term: &str,
        max_results: u32,
    ) -> Result<Vec<ListingRecord>, ScraperError> {
        let url = self.search_url(term, max_results)?;
        let page = self
            .fetcher
            .fetch(url.as_str(), self.fetcher.max_attempts())
            .await?;
        let parsed: SearchResponse =
            serde_json::from_str(&page.body).map_err(|e| ScraperError::Deserialize {
                context: format!("search response for \"{term}\""),
                source: e,
            })?;

        let hits = parsed.query.map(|q| q.search).unwrap_or_default();
        Ok(hits
            .into_iter()
            .take(usize::try_from(max_results).unwrap_or(usize::MAX))
            .map(|hit| self.to_record(hit))
            .collect())
    }

    fn to_record(&self, hit: SearchHit) -> ListingRecord {
        let mut record = ListingRecord {
            url: format!("{}{}", self.article_base, hit.title.replace(' ', "_")),
            name: hit.title,
            ..ListingRecord::default()
        };
        #[allow(clippy::cast_precision_loss)]
        let page_id = hit.pageid as f64;
        record.assign("page_id", FieldValue::Number(page_id));
        record.assign("snippet", FieldValue::Text(hit.snippet));
        record
    }
}

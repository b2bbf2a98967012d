//! Page walker for listing sites.
//!
//! Pages are fetched one after another. A page that cannot be fetched is
//! skipped; a page without listings, without valid records, or without a
//! next-page marker ends the walk.

use std::sync::Arc;

use scraper::{ElementRef, Html};
use tracing::Instrument;

use crate::client::{page_url, FetchSettings, Fetcher};
use crate::error::ScraperError;
use crate::extract::extract;
use crate::hidden_blob::blob_records;
use crate::rate_limit::pause;
use crate::rules::CompiledSite;
use crate::summary::summarize;
use crate::types::{ListingRecord, SearchExtent, SearchResult};

const NO_PRODUCTS: &str = "No products found";

/// What one results page held.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    /// Neither a container locator nor the hidden blob matched.
    NoListings,
    Listings {
        /// Listing elements (or blob entries) found on the page.
        found: usize,
        /// The valid records among them.
        records: Vec<ListingRecord>,
        more_pages: bool,
    },
}

/// Parses one results page.
///
/// Container locators are tried in order and the first that matches wins.
/// When none match, the site's hidden blob (if any) is decoded instead.
#[must_use]
pub fn extract_page(body: &str, site: &CompiledSite) -> PageOutcome {
    let document = Html::parse_document(body);

    let containers = find_containers(&document, site);
    let candidates = if containers.is_empty() {
        let from_blob = blob_records(&document, site);
        if from_blob.is_empty() {
            return PageOutcome::NoListings;
        }
        tracing::debug!(site = %site.id, entries = from_blob.len(), "using hidden product blob");
        from_blob
    } else {
        containers.into_iter().map(|element| extract(element, site)).collect()
    };

    let found = candidates.len();
    let records: Vec<ListingRecord> = candidates
        .into_iter()
        .filter(ListingRecord::is_valid)
        .collect();

    PageOutcome::Listings {
        found,
        records,
        more_pages: has_next_page(&document, site),
    }
}

fn find_containers<'a>(document: &'a Html, site: &CompiledSite) -> Vec<ElementRef<'a>> {
    for container in &site.containers {
        let matched: Vec<ElementRef<'a>> = document
            .select(&container.selector)
            .filter(|element| {
                container.require_attr.as_deref().map_or(true, |attr| {
                    element
                        .value()
                        .attr(attr)
                        .is_some_and(|value| !value.trim().is_empty())
                })
            })
            .collect();
        if !matched.is_empty() {
            tracing::debug!(
                site = %site.id,
                css = %container.css,
                count = matched.len(),
                "containers matched"
            );
            return matched;
        }
    }
    Vec::new()
}

fn has_next_page(document: &Html, site: &CompiledSite) -> bool {
    let Some(marker) = &site.next_page_marker else {
        return true;
    };
    match document.select(&marker.selector).next() {
        None => false,
        Some(element) => marker
            .disabled_class
            .as_deref()
            .map_or(true, |class| !element.value().classes().any(|c| c == class)),
    }
}

/// Search engine for one listing site.
///
/// Owns its [`Fetcher`] (and so its cookie jar); build one per search.
pub struct ListingScraper {
    site: Arc<CompiledSite>,
    fetcher: Fetcher,
    span: tracing::Span,
}

impl ListingScraper {
    /// # Errors
    ///
    /// Returns [`ScraperError`] if the site's fetch policy cannot be turned
    /// into an HTTP client.
    pub fn new(site: Arc<CompiledSite>, settings: &FetchSettings) -> Result<Self, ScraperError> {
        let fetcher = Fetcher::new(&site.id, &site.fetch, settings, Some(&site.domain))?;
        let span = tracing::info_span!("scraper", site = %site.id);
        Ok(Self {
            site,
            fetcher,
            span,
        })
    }

    #[must_use]
    pub fn site(&self) -> &CompiledSite {
        &self.site
    }

    #[must_use]
    pub fn page_url(&self, term: &str, page: u32) -> String {
        page_url(
            &self.site.search_url,
            term,
            self.site.term_encoding,
            &self.site.page_param,
            page,
        )
    }

    /// Walks up to `max_pages` result pages for `term`.
    ///
    /// `total_pages_scraped` reports the requested budget, not the number of
    /// pages actually visited.
    pub async fn search(&self, term: &str, max_pages: u32) -> SearchResult {
        self.walk(term, max_pages.max(1))
            .instrument(self.span.clone())
            .await
    }

    async fn walk(&self, term: &str, max_pages: u32) -> SearchResult {
        tracing::info!(term, max_pages, "starting search");
        let mut records = Vec::new();

        for page in 1..=max_pages {
            let url = self.page_url(term, page);
            tracing::info!(page, %url, "fetching results page");

            let body = match self.fetcher.fetch(&url, self.fetcher.max_attempts()).await {
                Ok(fetched) => fetched.body,
                Err(err) => {
                    tracing::error!(page, error = %err, "results page unavailable; skipping");
                    continue;
                }
            };

            match extract_page(&body, &self.site) {
                PageOutcome::NoListings => {
                    tracing::warn!(page, "no listing containers on page; stopping");
                    break;
                }
                PageOutcome::Listings {
                    found,
                    records: page_records,
                    more_pages,
                } => {
                    tracing::info!(page, found, kept = page_records.len(), "page extracted");
                    if page_records.is_empty() {
                        tracing::info!(page, "no valid records on page; stopping");
                        break;
                    }
                    records.extend(page_records);
                    if !more_pages {
                        tracing::info!(page, "no further pages advertised; stopping");
                        break;
                    }
                }
            }

            if page < max_pages {
                pause(self.site.fetch.page_pacing, self.fetcher.delay_scale()).await;
            }
        }

        tracing::info!(records = records.len(), "search finished");
        let summary = summarize(&records, &self.site.summary);
        SearchResult::new(
            term,
            &self.site.id,
            SearchExtent::TotalPagesScraped(max_pages),
            records,
            summary,
            NO_PRODUCTS,
        )
    }
}

//! Static registry of runnable sites, keyed by site id.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use scrapedeck_core::{
    builtin_sites, load_sites, SiteConfig, SitesFile, SourceConfig, WikipediaConfig,
};

use crate::client::FetchSettings;
use crate::error::ScraperError;
use crate::rules::CompiledSite;
use crate::types::SearchResult;
use crate::walker::ListingScraper;
use crate::wikipedia::WikipediaSource;

/// Common interface of every search source.
pub trait SearchSource {
    /// Runs one search; `limit` is pages for listing sites and hits for
    /// Wikipedia. Failures are reported inside the result.
    fn search(&self, term: &str, limit: u32) -> impl Future<Output = SearchResult> + Send;
}

impl SearchSource for ListingScraper {
    async fn search(&self, term: &str, limit: u32) -> SearchResult {
        ListingScraper::search(self, term, limit).await
    }
}

impl SearchSource for WikipediaSource {
    async fn search(&self, term: &str, limit: u32) -> SearchResult {
        WikipediaSource::search(self, term, limit).await
    }
}

#[derive(Debug)]
enum Engine {
    Listing(Arc<CompiledSite>),
    Wikipedia(WikipediaConfig),
}

/// One site: its published metadata plus compiled rules.
#[derive(Debug)]
pub struct RegisteredSite {
    config: SiteConfig,
    engine: Engine,
    settings: FetchSettings,
}

impl RegisteredSite {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.config.id
    }

    #[must_use]
    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// The limit used when a request does not name one.
    #[must_use]
    pub fn default_limit(&self) -> u32 {
        self.config
            .limit_parameter()
            .and_then(|p| p.default.map(|d| p.clamp(d)))
            .unwrap_or(1)
    }

    /// Runs a search with a fresh source instance.
    ///
    /// Every call builds its own HTTP client and cookie jar, so concurrent
    /// searches never share session state.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError`] only if the source cannot be constructed;
    /// scraping failures are reported inside the [`SearchResult`].
    pub async fn run(&self, term: &str, limit: u32) -> Result<SearchResult, ScraperError> {
        match &self.engine {
            Engine::Listing(site) => {
                let scraper = ListingScraper::new(Arc::clone(site), &self.settings)?;
                Ok(SearchSource::search(&scraper, term, limit).await)
            }
            Engine::Wikipedia(config) => {
                let source = WikipediaSource::new(config, &self.settings)?;
                Ok(SearchSource::search(&source, term, limit).await)
            }
        }
    }
}

/// Sites in declaration order.
#[derive(Debug)]
pub struct SiteRegistry {
    sites: Vec<RegisteredSite>,
}

impl SiteRegistry {
    /// Compiles every site in `file`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidRule`] if any site's rules do not compile.
    pub fn from_sites(file: SitesFile, settings: &FetchSettings) -> Result<Self, ScraperError> {
        let sites = file
            .sites
            .into_iter()
            .map(|config| {
                let engine = match &config.source {
                    SourceConfig::Listing(listing) => Engine::Listing(Arc::new(
                        CompiledSite::compile(&config.id, &config.name, listing)?,
                    )),
                    SourceConfig::Wikipedia(wiki) => Engine::Wikipedia(wiki.clone()),
                };
                Ok(RegisteredSite {
                    config,
                    engine,
                    settings: *settings,
                })
            })
            .collect::<Result<Vec<_>, ScraperError>>()?;

        tracing::debug!(sites = sites.len(), "site registry compiled");
        Ok(Self { sites })
    }

    /// The registry compiled into the binary.
    ///
    /// # Errors
    ///
    /// Fails only if the embedded registry is invalid.
    pub fn builtin(settings: &FetchSettings) -> Result<Self, ScraperError> {
        Self::from_sites(builtin_sites()?, settings)
    }

    /// Loads `path` when given, the built-in registry otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Config`] for an unreadable or invalid file and
    /// [`ScraperError::InvalidRule`] for rules that do not compile.
    pub fn load(path: Option<&Path>, settings: &FetchSettings) -> Result<Self, ScraperError> {
        match path {
            Some(path) => Self::from_sites(load_sites(path)?, settings),
            None => Self::builtin(settings),
        }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&RegisteredSite> {
        self.sites.iter().find(|site| site.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredSite> {
        self.sites.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_keeps_declaration_order() {
        let registry = SiteRegistry::builtin(&FetchSettings::default()).unwrap();
        let ids: Vec<&str> = registry.iter().map(RegisteredSite::id).collect();
        assert_eq!(
            ids,
            vec!["amazon", "flipkart", "snapdeal", "jiomart", "tatacliq", "wikipedia"]
        );
        assert_eq!(registry.len(), 6);
    }

    #[test]
    fn lookup_by_id() {
        let registry = SiteRegistry::builtin(&FetchSettings::default()).unwrap();
        assert!(registry.get("snapdeal").is_some());
        assert!(registry.get("ebay").is_none());
    }

    #[test]
    fn default_limits_come_from_parameters() {
        let registry = SiteRegistry::builtin(&FetchSettings::default()).unwrap();
        assert_eq!(registry.get("amazon").unwrap().default_limit(), 3);
        assert_eq!(registry.get("jiomart").unwrap().default_limit(), 2);
        assert_eq!(registry.get("wikipedia").unwrap().default_limit(), 1);
    }

    #[test]
    fn load_without_path_uses_builtin() {
        let registry = SiteRegistry::load(None, &FetchSettings::default()).unwrap();
        assert!(!registry.is_empty());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = SiteRegistry::load(
            Some(Path::new("/nonexistent/sites.yaml")),
            &FetchSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ScraperError::Config(_)), "got: {err:?}");
    }
}

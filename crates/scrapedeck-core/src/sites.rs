//! Declarative site registry.
//!
//! Every scraper the dispatcher can run is described by one [`SiteConfig`]
//! entry in `config/sites.yaml`. Listing sites carry the complete rule set the
//! generic engine needs (search URL template, container locators, per-field
//! locator lists, fetch policy, summary extras); the Wikipedia entry points at
//! the JSON search API instead.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::ConfigError;

const BUILTIN_SITES: &str = include_str!("../../../config/sites.yaml");

#[derive(Debug, Clone, Deserialize)]
pub struct SitesFile {
    pub sites: Vec<SiteConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    pub source: SourceConfig,
}

impl SiteConfig {
    /// The numeric parameter that bounds a search (`max_pages` for listing
    /// sites, `max_results` for Wikipedia).
    #[must_use]
    pub fn limit_parameter(&self) -> Option<&ParameterSpec> {
        self.parameters
            .iter()
            .find(|p| p.kind == ParameterKind::Number)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "engine", rename_all = "snake_case")]
pub enum SourceConfig {
    Listing(Box<ListingConfig>),
    Wikipedia(WikipediaConfig),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    Text,
    Number,
}

/// Parameter metadata published by `GET /api/scrapers` and used to validate
/// dispatch requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParameterKind,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
    #[serde(default)]
    pub required: bool,
}

impl ParameterSpec {
    /// Clamps `value` into the declared `[min, max]` window.
    #[must_use]
    pub fn clamp(&self, value: u32) -> u32 {
        let lower = self.min.unwrap_or(0);
        let upper = self.max.unwrap_or(u32::MAX);
        value.clamp(lower, upper.max(lower))
    }
}

/// A `[min_secs, max_secs]` window for randomized sleeps.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(from = "(f64, f64)")]
pub struct DelayRange {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl DelayRange {
    pub const ZERO: DelayRange = DelayRange {
        min_secs: 0.0,
        max_secs: 0.0,
    };

    #[must_use]
    pub const fn new(min_secs: f64, max_secs: f64) -> Self {
        Self { min_secs, max_secs }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min_secs.is_finite()
            && self.max_secs.is_finite()
            && self.min_secs >= 0.0
            && self.min_secs <= self.max_secs
    }
}

impl From<(f64, f64)> for DelayRange {
    fn from((min_secs, max_secs): (f64, f64)) -> Self {
        Self { min_secs, max_secs }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ThrottleRule {
    pub status: u16,
    pub delay: DelayRange,
}

/// How the Fetcher paces, identifies itself, and backs off for one site.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchPolicy {
    /// Slept before every attempt, including the first.
    #[serde(default)]
    pub pacing: DelayRange,
    /// Slept between result pages.
    #[serde(default)]
    pub page_pacing: DelayRange,
    /// Longer sleeps for rate-limited / unavailable / forbidden responses.
    #[serde(default)]
    pub throttle: Vec<ThrottleRule>,
    #[serde(default)]
    pub other_status: DelayRange,
    #[serde(default)]
    pub transport_error: DelayRange,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Identity pool; empty means the built-in desktop browser pool.
    #[serde(default)]
    pub user_agents: Vec<String>,
    #[serde(default)]
    pub cookies: Vec<String>,
    #[serde(default)]
    pub referer_on_retry: Option<String>,
}

impl FetchPolicy {
    #[must_use]
    pub fn throttle_delay(&self, status: u16) -> Option<DelayRange> {
        self.throttle
            .iter()
            .find(|rule| rule.status == status)
            .map(|rule| rule.delay)
    }

    /// Backoff for a throttling status: its own rule, else the widest window
    /// any backoff rule configures, so throttling never waits less than a
    /// transport error.
    #[must_use]
    pub fn throttle_window(&self, status: u16) -> DelayRange {
        self.throttle_delay(status)
            .unwrap_or_else(|| self.widest_backoff())
    }

    fn widest_backoff(&self) -> DelayRange {
        self.throttle
            .iter()
            .map(|rule| rule.delay)
            .chain([self.other_status, self.transport_error])
            .fold(DelayRange::ZERO, |widest, range| {
                DelayRange::new(
                    widest.min_secs.max(range.min_secs),
                    widest.max_secs.max(range.max_secs),
                )
            })
    }

    fn ranges(&self) -> impl Iterator<Item = (&'static str, DelayRange)> + '_ {
        [
            ("pacing", self.pacing),
            ("page_pacing", self.page_pacing),
            ("other_status", self.other_status),
            ("transport_error", self.transport_error),
        ]
        .into_iter()
        .chain(self.throttle.iter().map(|rule| ("throttle", rule.delay)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermEncoding {
    /// Form encoding: spaces become `+`.
    #[default]
    Query,
    /// Percent encoding for path segments: spaces become `%20`.
    Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceFormat {
    /// Keep digits only.
    #[default]
    Integer,
    /// Keep digits and the decimal point.
    Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrandInference {
    /// Leading run of ASCII letters.
    #[default]
    LeadingWord,
    /// Letters and spaces up to the first hyphen, falling back to the leading word.
    UpToHyphen,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContainerLocator {
    pub css: String,
    /// Elements without a non-empty value for this attribute are dropped.
    #[serde(default)]
    pub require_attr: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NextPageMarker {
    pub css: String,
    #[serde(default)]
    pub disabled_class: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextMode {
    #[default]
    Compact,
    Full,
    TitleOverText,
    LongerTitle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    Url,
    WidthRating,
}

/// One candidate way of reading a field out of a listing element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Locator {
    /// Sub-element selector; absent means the listing element itself.
    #[serde(default)]
    pub css: Option<String>,
    /// Attribute(s) to read, first non-empty wins. Empty means element text.
    #[serde(default, deserialize_with = "one_or_many")]
    pub attr: Vec<String>,
    #[serde(default)]
    pub text: TextMode,
    #[serde(default)]
    pub contains_all: Vec<String>,
    #[serde(default)]
    pub contains_any: Vec<String>,
    /// Lets a bare number through a `contains_any` filter.
    #[serde(default)]
    pub numeric_ok: bool,
    #[serde(default)]
    pub reject: Vec<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub skip_class: Option<String>,
    #[serde(default)]
    pub transform: Option<Transform>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    #[default]
    Text,
    Number,
    Flag,
    List,
}

/// An independent indicator check for a boolean field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Indicator {
    #[serde(default)]
    pub css: Option<String>,
    #[serde(default)]
    pub text_contains: Option<String>,
    #[serde(default)]
    pub markup_contains: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FieldSpec {
    #[serde(default)]
    pub kind: FieldKind,
    /// Value used when no locator resolves (text fields only).
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub locate: Vec<Locator>,
    #[serde(default)]
    pub any_of: Vec<Indicator>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BlobKey {
    pub key: String,
    pub field: String,
    /// `{}` is replaced by the raw value.
    #[serde(default)]
    pub template: Option<String>,
}

/// Where a page hides its pseudo-JSON product list and how its keys map to fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HiddenBlobConfig {
    pub css: String,
    #[serde(default = "default_blob_attr")]
    pub attr: String,
    pub keys: Vec<BlobKey>,
}

fn default_blob_attr() -> String {
    "value".to_owned()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SummaryField {
    pub label: String,
    pub field: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SummaryBreakdown {
    pub label: String,
    pub field: String,
    /// Output key -> field value counted under it.
    pub values: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SummaryConfig {
    #[serde(default)]
    pub counts: Vec<SummaryField>,
    #[serde(default)]
    pub distinct: Vec<SummaryField>,
    #[serde(default)]
    pub averages: Vec<SummaryField>,
    #[serde(default)]
    pub breakdowns: Vec<SummaryBreakdown>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingConfig {
    pub domain: String,
    pub search_url: String,
    #[serde(default)]
    pub term_encoding: TermEncoding,
    #[serde(default = "default_page_param")]
    pub page_param: String,
    pub containers: Vec<ContainerLocator>,
    #[serde(default)]
    pub next_page_marker: Option<NextPageMarker>,
    #[serde(default)]
    pub price_format: PriceFormat,
    #[serde(default)]
    pub brand_inference: BrandInference,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSpec>,
    #[serde(default)]
    pub hidden_blob: Option<HiddenBlobConfig>,
    #[serde(default)]
    pub fetch: FetchPolicy,
    #[serde(default)]
    pub summary: SummaryConfig,
}

fn default_page_param() -> String {
    "page".to_owned()
}

#[derive(Debug, Clone, Deserialize)]
pub struct WikipediaConfig {
    pub api_url: String,
    pub article_base: String,
    #[serde(default)]
    pub fetch: FetchPolicy,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

/// Load and validate a site registry from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_sites(path: &Path) -> Result<SitesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SitesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_sites(&content)
}

/// Parse and validate a site registry from YAML text.
///
/// # Errors
///
/// Returns `ConfigError::SitesFileParse` on malformed YAML and
/// `ConfigError::Validation` when an entry is inconsistent.
pub fn parse_sites(content: &str) -> Result<SitesFile, ConfigError> {
    let sites_file: SitesFile = serde_yaml::from_str(content)?;
    validate_sites(&sites_file)?;
    Ok(sites_file)
}

/// The registry compiled into the binary from `config/sites.yaml`.
///
/// # Errors
///
/// Only fails if the embedded file itself is invalid.
pub fn builtin_sites() -> Result<SitesFile, ConfigError> {
    parse_sites(BUILTIN_SITES)
}

fn validate_sites(sites_file: &SitesFile) -> Result<(), ConfigError> {
    if sites_file.sites.is_empty() {
        return Err(ConfigError::Validation(
            "site registry must define at least one site".to_string(),
        ));
    }

    let mut seen_ids = HashSet::new();

    for site in &sites_file.sites {
        let id = site.id.trim();
        if id.is_empty() {
            return Err(ConfigError::Validation(
                "site id must be non-empty".to_string(),
            ));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            return Err(ConfigError::Validation(format!(
                "site id '{id}' may only contain lowercase letters, digits, '_' and '-'"
            )));
        }
        if !seen_ids.insert(id.to_owned()) {
            return Err(ConfigError::Validation(format!(
                "duplicate site id: '{id}'"
            )));
        }

        validate_parameters(site)?;

        match &site.source {
            SourceConfig::Listing(listing) => validate_listing(id, listing)?,
            SourceConfig::Wikipedia(wiki) => {
                if wiki.api_url.trim().is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "site '{id}' has an empty api_url"
                    )));
                }
                validate_fetch(id, &wiki.fetch)?;
            }
        }
    }

    Ok(())
}

fn validate_parameters(site: &SiteConfig) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for param in &site.parameters {
        if !seen.insert(param.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "site '{}' declares parameter '{}' twice",
                site.id, param.name
            )));
        }
        if let (Some(min), Some(max)) = (param.min, param.max) {
            if min > max {
                return Err(ConfigError::Validation(format!(
                    "site '{}' parameter '{}' has min {min} > max {max}",
                    site.id, param.name
                )));
            }
        }
    }

    if !site.parameters.iter().any(|p| p.name == "search_term") {
        return Err(ConfigError::Validation(format!(
            "site '{}' must declare a search_term parameter",
            site.id
        )));
    }

    Ok(())
}

fn validate_listing(id: &str, listing: &ListingConfig) -> Result<(), ConfigError> {
    if !listing.search_url.contains("{term}") {
        return Err(ConfigError::Validation(format!(
            "site '{id}' search_url must contain a {{term}} placeholder"
        )));
    }
    if !listing.domain.starts_with("http://") && !listing.domain.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "site '{id}' domain must be an absolute http(s) origin"
        )));
    }
    if listing.containers.is_empty() {
        return Err(ConfigError::Validation(format!(
            "site '{id}' must declare at least one container locator"
        )));
    }
    if listing.page_param.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "site '{id}' has an empty page_param"
        )));
    }

    for (name, field) in &listing.fields {
        match field.kind {
            FieldKind::Flag if field.any_of.is_empty() && field.locate.is_empty() => {
                return Err(ConfigError::Validation(format!(
                    "site '{id}' flag field '{name}' needs any_of or locate entries"
                )));
            }
            FieldKind::Text | FieldKind::Number | FieldKind::List if field.locate.is_empty() => {
                return Err(ConfigError::Validation(format!(
                    "site '{id}' field '{name}' has no locators"
                )));
            }
            _ => {}
        }
        if field.default.is_some() && field.kind != FieldKind::Text {
            return Err(ConfigError::Validation(format!(
                "site '{id}' field '{name}': only text fields take a default"
            )));
        }
    }

    validate_fetch(id, &listing.fetch)
}

fn validate_fetch(id: &str, fetch: &FetchPolicy) -> Result<(), ConfigError> {
    for (label, range) in fetch.ranges() {
        if !range.is_valid() {
            return Err(ConfigError::Validation(format!(
                "site '{id}' {label} delay [{}, {}] must satisfy 0 <= min <= max",
                range.min_secs, range.max_secs
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "sites_test.rs"]
mod tests;

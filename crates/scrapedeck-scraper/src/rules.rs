//! Site rules compiled once into selectors and regexes.
//!
//! A [`CompiledSite`] is immutable and shared (behind `Arc`) by every search
//! against that site.

use regex::Regex;
use scraper::Selector;
use scrapedeck_core::{
    BlobKey, BrandInference, FetchPolicy, FieldKind, FieldSpec, Indicator, ListingConfig,
    Locator, PriceFormat, SummaryConfig, TermEncoding, TextMode, Transform,
};

use crate::error::ScraperError;
use crate::types::{core_field_kind, DERIVED_FIELDS};

#[derive(Debug)]
pub struct CompiledSite {
    pub id: String,
    pub name: String,
    pub domain: String,
    pub search_url: String,
    pub term_encoding: TermEncoding,
    pub page_param: String,
    pub containers: Vec<CompiledContainer>,
    pub next_page_marker: Option<CompiledMarker>,
    pub price_format: PriceFormat,
    pub brand_inference: BrandInference,
    pub fields: Vec<CompiledField>,
    pub hidden_blob: Option<CompiledBlob>,
    pub fetch: FetchPolicy,
    pub summary: SummaryConfig,
}

#[derive(Debug)]
pub struct CompiledContainer {
    pub css: String,
    pub selector: Selector,
    pub require_attr: Option<String>,
}

#[derive(Debug)]
pub struct CompiledMarker {
    pub selector: Selector,
    pub disabled_class: Option<String>,
}

#[derive(Debug)]
pub struct CompiledField {
    pub name: String,
    pub kind: FieldKind,
    pub default: Option<String>,
    pub locators: Vec<CompiledLocator>,
    pub indicators: Vec<CompiledIndicator>,
}

#[derive(Debug)]
pub struct CompiledLocator {
    pub selector: Option<Selector>,
    pub attrs: Vec<String>,
    pub text: TextMode,
    /// Filters are stored lowercased and matched case-insensitively.
    pub contains_all: Vec<String>,
    pub contains_any: Vec<String>,
    pub numeric_ok: bool,
    pub reject: Vec<String>,
    pub pattern: Option<Regex>,
    pub template: String,
    pub skip_class: Option<String>,
    pub transform: Option<Transform>,
}

#[derive(Debug)]
pub struct CompiledIndicator {
    pub selector: Option<Selector>,
    /// Matched as written, case included.
    pub text_contains: Option<String>,
    pub markup_contains: Option<String>,
}

#[derive(Debug)]
pub struct CompiledBlob {
    pub selector: Selector,
    pub attr: String,
    pub keys: Vec<BlobKey>,
}

impl CompiledSite {
    /// Compiles the rules of listing site `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidRule`] for an unparsable selector or
    /// pattern, or a core field declared with the wrong kind.
    pub fn compile(id: &str, name: &str, listing: &ListingConfig) -> Result<Self, ScraperError> {
        let invalid = |reason: String| ScraperError::InvalidRule {
            site: id.to_owned(),
            reason,
        };

        let containers = listing
            .containers
            .iter()
            .map(|c| {
                Ok(CompiledContainer {
                    css: c.css.clone(),
                    selector: selector(id, &c.css)?,
                    require_attr: c.require_attr.clone(),
                })
            })
            .collect::<Result<Vec<_>, ScraperError>>()?;

        let next_page_marker = listing
            .next_page_marker
            .as_ref()
            .map(|m| {
                Ok::<_, ScraperError>(CompiledMarker {
                    selector: selector(id, &m.css)?,
                    disabled_class: m.disabled_class.clone(),
                })
            })
            .transpose()?;

        let mut fields = Vec::with_capacity(listing.fields.len());
        for (field_name, spec) in &listing.fields {
            if DERIVED_FIELDS.contains(&field_name.as_str()) {
                return Err(invalid(format!("'{field_name}' is computed and cannot be located")));
            }
            if let Some(expected) = core_field_kind(field_name) {
                if expected != spec.kind {
                    return Err(invalid(format!(
                        "core field '{field_name}' must be {expected:?}, not {:?}",
                        spec.kind
                    )));
                }
            }
            fields.push(compile_field(id, field_name, spec)?);
        }

        let hidden_blob = match &listing.hidden_blob {
            Some(blob) => {
                for key in &blob.keys {
                    let declared = listing.fields.get(&key.field).map(|f| f.kind);
                    let kind = core_field_kind(&key.field).or(declared);
                    if kind.is_some_and(|k| k != FieldKind::Text) {
                        return Err(invalid(format!(
                            "hidden blob key '{}' must map to a text field, '{}' is not one",
                            key.key, key.field
                        )));
                    }
                }
                Some(CompiledBlob {
                    selector: selector(id, &blob.css)?,
                    attr: blob.attr.clone(),
                    keys: blob.keys.clone(),
                })
            }
            None => None,
        };

        Ok(Self {
            id: id.to_owned(),
            name: name.to_owned(),
            domain: listing.domain.trim_end_matches('/').to_owned(),
            search_url: listing.search_url.clone(),
            term_encoding: listing.term_encoding,
            page_param: listing.page_param.clone(),
            containers,
            next_page_marker,
            price_format: listing.price_format,
            brand_inference: listing.brand_inference,
            fields,
            hidden_blob,
            fetch: listing.fetch.clone(),
            summary: listing.summary.clone(),
        })
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&CompiledField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

fn selector(site: &str, css: &str) -> Result<Selector, ScraperError> {
    Selector::parse(css).map_err(|e| ScraperError::InvalidRule {
        site: site.to_owned(),
        reason: format!("selector '{css}': {e}"),
    })
}

fn compile_field(site: &str, name: &str, spec: &FieldSpec) -> Result<CompiledField, ScraperError> {
    let locators = spec
        .locate
        .iter()
        .map(|l| compile_locator(site, name, l))
        .collect::<Result<Vec<_>, _>>()?;
    let indicators = spec
        .any_of
        .iter()
        .map(|i| compile_indicator(site, i))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CompiledField {
        name: name.to_owned(),
        kind: spec.kind,
        default: spec.default.clone(),
        locators,
        indicators,
    })
}

fn compile_locator(
    site: &str,
    field: &str,
    locator: &Locator,
) -> Result<CompiledLocator, ScraperError> {
    let pattern = locator
        .pattern
        .as_deref()
        .map(|p| {
            Regex::new(p).map_err(|e| ScraperError::InvalidRule {
                site: site.to_owned(),
                reason: format!("field '{field}' pattern: {e}"),
            })
        })
        .transpose()?;

    // `$1` when the pattern captures, the whole match otherwise.
    let template = match (&locator.template, &pattern) {
        (Some(template), _) => template.clone(),
        (None, Some(re)) if re.captures_len() > 1 => "$1".to_owned(),
        (None, _) => "$0".to_owned(),
    };

    let lowered = |values: &[String]| {
        values
            .iter()
            .map(|v| v.to_lowercase())
            .collect::<Vec<_>>()
    };

    Ok(CompiledLocator {
        selector: locator.css.as_deref().map(|css| selector(site, css)).transpose()?,
        attrs: locator.attr.clone(),
        text: locator.text,
        contains_all: lowered(&locator.contains_all),
        contains_any: lowered(&locator.contains_any),
        numeric_ok: locator.numeric_ok,
        reject: lowered(&locator.reject),
        pattern,
        template,
        skip_class: locator.skip_class.clone(),
        transform: locator.transform,
    })
}

fn compile_indicator(site: &str, indicator: &Indicator) -> Result<CompiledIndicator, ScraperError> {
    Ok(CompiledIndicator {
        selector: indicator.css.as_deref().map(|css| selector(site, css)).transpose()?,
        text_contains: indicator.text_contains.clone(),
        markup_contains: indicator.markup_contains.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrapedeck_core::{builtin_sites, parse_sites, SourceConfig};

    fn listing(yaml_fields: &str) -> ListingConfig {
        let yaml = format!(
            "sites:\n  - id: demo\n    name: Demo\n    parameters:\n      - {{ name: search_term, type: text, label: Term, required: true }}\n    source:\n      engine: listing\n      domain: \"https://shop.example.com/\"\n      search_url: \"https://shop.example.com/s?q={{term}}\"\n      containers: [{{ css: \".item\" }}]\n      fields:\n{yaml_fields}"
        );
        let file = parse_sites(&yaml).expect("valid yaml");
        match file.sites.into_iter().next().map(|s| s.source) {
            Some(SourceConfig::Listing(listing)) => *listing,
            _ => panic!("expected listing"),
        }
    }

    #[test]
    fn compiles_every_builtin_listing_site() {
        for site in builtin_sites().unwrap().sites {
            if let SourceConfig::Listing(listing) = &site.source {
                let compiled = CompiledSite::compile(&site.id, &site.name, listing);
                assert!(compiled.is_ok(), "{}: {:?}", site.id, compiled.err());
            }
        }
    }

    #[test]
    fn trims_trailing_slash_from_domain() {
        let config = listing("        name:\n          locate: [{ css: \".t\" }]\n");
        let site = CompiledSite::compile("demo", "Demo", &config).unwrap();
        assert_eq!(site.domain, "https://shop.example.com");
    }

    #[test]
    fn default_template_uses_first_capture_group() {
        let config = listing(
            "        rating:\n          locate:\n            - { css: \".r\", pattern: \"([0-9.]+) out of\" }\n        review_count:\n          locate:\n            - { css: \".c\", pattern: \"[0-9,]+\" }\n",
        );
        let site = CompiledSite::compile("demo", "Demo", &config).unwrap();
        assert_eq!(site.field("rating").unwrap().locators[0].template, "$1");
        assert_eq!(site.field("review_count").unwrap().locators[0].template, "$0");
    }

    #[test]
    fn filters_are_lowercased() {
        let config = listing(
            "        delivery_info:\n          locate:\n            - { css: \".d\", contains_any: [FREE, Delivery] }\n",
        );
        let site = CompiledSite::compile("demo", "Demo", &config).unwrap();
        assert_eq!(
            site.field("delivery_info").unwrap().locators[0].contains_any,
            vec!["free", "delivery"]
        );
    }

    #[test]
    fn rejects_bad_selector() {
        let config = listing("        name:\n          locate: [{ css: \"div[[\" }]\n");
        let err = CompiledSite::compile("demo", "Demo", &config).unwrap_err();
        assert!(
            matches!(err, ScraperError::InvalidRule { ref reason, .. } if reason.contains("div[[")),
            "got: {err:?}"
        );
    }

    #[test]
    fn rejects_bad_pattern() {
        let config =
            listing("        name:\n          locate: [{ css: \".t\", pattern: \"(\" }]\n");
        assert!(CompiledSite::compile("demo", "Demo", &config).is_err());
    }

    #[test]
    fn rejects_core_field_with_wrong_kind() {
        let config = listing(
            "        is_sponsored:\n          kind: text\n          locate: [{ css: \".ad\" }]\n",
        );
        let err = CompiledSite::compile("demo", "Demo", &config).unwrap_err();
        assert!(matches!(err, ScraperError::InvalidRule { .. }), "got: {err:?}");
    }

    #[test]
    fn rejects_located_savings() {
        let config = listing(
            "        savings_amount:\n          kind: number\n          locate: [{ css: \".s\" }]\n",
        );
        assert!(CompiledSite::compile("demo", "Demo", &config).is_err());
    }
}

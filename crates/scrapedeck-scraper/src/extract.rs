//! Field extraction from a single listing element.
//!
//! Each field tries its locators in order; the first one that yields a
//! non-empty value wins. A field that fails is logged and keeps its zero
//! value, so one bad field never drops a record.

use scraper::ElementRef;
use scrapedeck_core::{FieldKind, TextMode, Transform};

use crate::client::resolve_url;
use crate::parse_helpers::{
    infer_brand, is_plain_number, parse_price, rating_from_width, savings, NumberError,
};
use crate::rules::{CompiledField, CompiledIndicator, CompiledLocator, CompiledSite};
use crate::types::{FieldValue, ListingRecord};

/// Extracts one record from `element` using `site`'s field rules.
///
/// Fields start at their zero value (or declared default), located values
/// overwrite them, then prices, brand and savings are derived.
#[must_use]
pub fn extract(element: ElementRef<'_>, site: &CompiledSite) -> ListingRecord {
    let mut record = ListingRecord::default();
    let mut numeric_located = NumericLocated::default();

    for field in &site.fields {
        record.assign(&field.name, initial_value(field));

        match resolve_field(element, field, site) {
            Ok(Some(value)) => {
                if matches!(value, FieldValue::Number(n) if n > 0.0) {
                    numeric_located.mark(&field.name);
                }
                record.assign(&field.name, value);
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(
                    site = %site.id,
                    field = %field.name,
                    error = %err,
                    "field extraction failed; keeping zero value"
                );
            }
        }
    }

    finalize(&mut record, site, numeric_located);
    record
}

/// Which numeric price fields came straight from markup.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct NumericLocated {
    price: bool,
    original_price: bool,
}

impl NumericLocated {
    fn mark(&mut self, field: &str) {
        match field {
            "price_numeric" => self.price = true,
            "original_price_numeric" => self.original_price = true,
            _ => {}
        }
    }
}

/// Derives numeric prices, brand and savings from the text fields.
pub(crate) fn finalize(record: &mut ListingRecord, site: &CompiledSite, located: NumericLocated) {
    if !located.price {
        record.price_numeric = numeric_price(&record.price_text, site);
    }
    if !located.original_price {
        record.original_price_numeric = numeric_price(&record.original_price_text, site);
    }
    if record.brand.is_empty() {
        record.brand = infer_brand(&record.name, site.brand_inference);
    }
    record.savings_amount = savings(record.price_numeric, record.original_price_numeric);
}

fn numeric_price(text: &str, site: &CompiledSite) -> f64 {
    parse_price(text, site.price_format).unwrap_or_else(|err| {
        tracing::warn!(site = %site.id, error = %err, "unparsable price; using 0");
        0.0
    })
}

pub(crate) fn initial_value(field: &CompiledField) -> FieldValue {
    match (&field.default, field.kind) {
        (Some(default), FieldKind::Text) => FieldValue::Text(default.clone()),
        (_, kind) => FieldValue::zero(kind),
    }
}

fn resolve_field(
    element: ElementRef<'_>,
    field: &CompiledField,
    site: &CompiledSite,
) -> Result<Option<FieldValue>, NumberError> {
    match field.kind {
        FieldKind::Text => {
            Ok(first_value(element, &field.locators, &site.domain).map(FieldValue::Text))
        }
        FieldKind::Number => first_value(element, &field.locators, &site.domain)
            .map(|text| parse_price(&text, site.price_format).map(FieldValue::Number))
            .transpose(),
        FieldKind::Flag => {
            let flagged = field.indicators.iter().any(|i| indicator_holds(element, i))
                || first_value(element, &field.locators, &site.domain).is_some();
            Ok(Some(FieldValue::Flag(flagged)))
        }
        FieldKind::List => Ok(field
            .locators
            .iter()
            .map(|locator| all_values(element, locator, &site.domain))
            .find(|values| !values.is_empty())
            .map(FieldValue::List)),
    }
}

/// First non-empty value over `locators`, trying every matched element of
/// each locator before moving on to the next.
fn first_value(
    element: ElementRef<'_>,
    locators: &[CompiledLocator],
    domain: &str,
) -> Option<String> {
    locators.iter().find_map(|locator| {
        targets(element, locator)
            .into_iter()
            .find_map(|target| read(target, locator, domain))
    })
}

/// Every distinct value one locator yields, in document order.
fn all_values(element: ElementRef<'_>, locator: &CompiledLocator, domain: &str) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for target in targets(element, locator) {
        if let Some(value) = read(target, locator, domain) {
            if !values.contains(&value) {
                values.push(value);
            }
        }
    }
    values
}

fn targets<'a>(element: ElementRef<'a>, locator: &CompiledLocator) -> Vec<ElementRef<'a>> {
    match &locator.selector {
        Some(selector) => element.select(selector).collect(),
        None => vec![element],
    }
}

fn read(target: ElementRef<'_>, locator: &CompiledLocator, domain: &str) -> Option<String> {
    if let Some(skip) = &locator.skip_class {
        if target.value().classes().any(|class| class == skip) {
            return None;
        }
    }

    let raw = if locator.attrs.is_empty() {
        element_text(target, locator.text)
    } else {
        locator
            .attrs
            .iter()
            .filter_map(|attr| target.value().attr(attr))
            .map(str::trim)
            .find(|value| !value.is_empty())?
            .to_owned()
    };
    let raw = raw.trim();
    if raw.is_empty() || !passes_filters(raw, locator) {
        return None;
    }

    let value = match &locator.pattern {
        Some(pattern) => {
            let captures = pattern.captures(raw)?;
            let mut expanded = String::new();
            captures.expand(&locator.template, &mut expanded);
            expanded
        }
        None => raw.to_owned(),
    };
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    match locator.transform {
        Some(Transform::Url) => Some(resolve_url(domain, value)),
        Some(Transform::WidthRating) => rating_from_width(value).map(|r| format!("{r:.1}")),
        None => Some(value.to_owned()),
    }
}

fn passes_filters(raw: &str, locator: &CompiledLocator) -> bool {
    let lower = raw.to_lowercase();
    if locator.reject.iter().any(|needle| lower.contains(needle.as_str())) {
        return false;
    }
    if !locator.contains_all.iter().all(|needle| lower.contains(needle.as_str())) {
        return false;
    }
    locator.contains_any.is_empty()
        || locator.contains_any.iter().any(|needle| lower.contains(needle.as_str()))
        || (locator.numeric_ok && is_plain_number(raw))
}

pub(crate) fn compact_text(element: ElementRef<'_>) -> String {
    element.text().map(str::trim).collect()
}

pub(crate) fn full_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}

fn element_text(element: ElementRef<'_>, mode: TextMode) -> String {
    let title = element
        .value()
        .attr("title")
        .map(str::trim)
        .filter(|t| !t.is_empty());
    match mode {
        TextMode::Compact => compact_text(element),
        TextMode::Full => full_text(element),
        TextMode::TitleOverText => title.map_or_else(|| compact_text(element), str::to_owned),
        TextMode::LongerTitle => {
            let text = compact_text(element);
            match title {
                Some(title) if title.chars().count() > text.chars().count() => title.to_owned(),
                _ => text,
            }
        }
    }
}

/// An indicator holds when every condition it names holds.
fn indicator_holds(element: ElementRef<'_>, indicator: &CompiledIndicator) -> bool {
    if indicator.selector.is_none()
        && indicator.text_contains.is_none()
        && indicator.markup_contains.is_none()
    {
        return false;
    }

    let located = match &indicator.selector {
        Some(selector) => element.select(selector).any(|target| {
            indicator
                .text_contains
                .as_ref()
                .map_or(true, |needle| full_text(target).contains(needle.as_str()))
        }),
        None => indicator
            .text_contains
            .as_ref()
            .map_or(true, |needle| full_text(element).contains(needle.as_str())),
    };

    located
        && indicator
            .markup_contains
            .as_ref()
            .map_or(true, |needle| element.html().contains(needle.as_str()))
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;

//! Records and results produced by every source.
//!
//! Core listing fields are typed struct members; site-specific extras live in
//! an ordered map that is flattened into the record's JSON object.

use std::collections::BTreeMap;

use scrapedeck_core::FieldKind;
use serde::{Serialize, Serializer};

use crate::summary::Summary;

/// Names of the text members of [`ListingRecord`] as they appear in site rules.
pub const CORE_TEXT_FIELDS: [&str; 6] = [
    "name",
    "url",
    "price",
    "original_price",
    "image_url",
    "brand",
];
pub const CORE_NUMBER_FIELDS: [&str; 2] = ["price_numeric", "original_price_numeric"];
pub const CORE_FLAG_FIELDS: [&str; 1] = ["is_sponsored"];
/// Computed after extraction; never read from markup.
pub const DERIVED_FIELDS: [&str; 1] = ["savings_amount"];

/// The expected kind of a core field, `None` for site extras.
#[must_use]
pub fn core_field_kind(name: &str) -> Option<FieldKind> {
    if CORE_TEXT_FIELDS.contains(&name) {
        Some(FieldKind::Text)
    } else if CORE_NUMBER_FIELDS.contains(&name) || DERIVED_FIELDS.contains(&name) {
        Some(FieldKind::Number)
    } else if CORE_FLAG_FIELDS.contains(&name) {
        Some(FieldKind::Flag)
    } else {
        None
    }
}

/// Value of a site-specific field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Flag(bool),
    List(Vec<String>),
}

impl FieldValue {
    /// Zero value for `kind`: empty text, `0`, `false`, empty list.
    #[must_use]
    pub fn zero(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Text => Self::Text(String::new()),
            FieldKind::Number => Self::Number(0.0),
            FieldKind::Flag => Self::Flag(false),
            FieldKind::List => Self::List(Vec::new()),
        }
    }

    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Text(text) => !text.is_empty(),
            Self::Number(n) => *n != 0.0,
            Self::Flag(flag) => *flag,
            Self::List(items) => !items.is_empty(),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(text) => serializer.serialize_str(text),
            Self::Number(n) => serialize_amount(n, serializer),
            Self::Flag(flag) => serializer.serialize_bool(*flag),
            Self::List(items) => items.serialize(serializer),
        }
    }
}

/// Whole amounts serialize as JSON integers (`45990`), others as floats.
#[allow(clippy::trivially_copy_pass_by_ref)]
pub(crate) fn serialize_amount<S: Serializer>(
    value: &f64,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    if value.is_finite() && value.fract() == 0.0 && value.abs() < MAX_EXACT {
        #[allow(clippy::cast_possible_truncation)]
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

/// One product/result extracted from a listing page.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListingRecord {
    pub name: String,
    pub url: String,
    #[serde(rename = "price")]
    pub price_text: String,
    #[serde(rename = "original_price")]
    pub original_price_text: String,
    #[serde(serialize_with = "serialize_amount")]
    pub price_numeric: f64,
    #[serde(serialize_with = "serialize_amount")]
    pub original_price_numeric: f64,
    #[serde(serialize_with = "serialize_amount")]
    pub savings_amount: f64,
    pub image_url: String,
    pub brand: String,
    pub is_sponsored: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, FieldValue>,
}

impl ListingRecord {
    /// A record is kept only with a name and at least a price or a link.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty() && (!self.price_text.is_empty() || !self.url.is_empty())
    }

    /// Text value of a core or extra field.
    #[must_use]
    pub fn text(&self, field: &str) -> Option<&str> {
        match field {
            "name" => Some(&self.name),
            "url" => Some(&self.url),
            "price" => Some(&self.price_text),
            "original_price" => Some(&self.original_price_text),
            "image_url" => Some(&self.image_url),
            "brand" => Some(&self.brand),
            _ => match self.extra.get(field) {
                Some(FieldValue::Text(text)) => Some(text),
                _ => None,
            },
        }
    }

    /// Whether `field` holds a non-empty / non-zero / true value.
    #[must_use]
    pub fn is_set(&self, field: &str) -> bool {
        match field {
            "price_numeric" => self.price_numeric > 0.0,
            "original_price_numeric" => self.original_price_numeric > 0.0,
            "savings_amount" => self.savings_amount > 0.0,
            "is_sponsored" => self.is_sponsored,
            _ => match self.text(field) {
                Some(text) => !text.is_empty(),
                None => self.extra.get(field).is_some_and(FieldValue::is_truthy),
            },
        }
    }

    /// Stores `value` under `field`, routing core names to their members.
    ///
    /// A value whose kind does not match a core member is dropped.
    pub fn assign(&mut self, field: &str, value: FieldValue) {
        match (field, value) {
            ("name", FieldValue::Text(v)) => self.name = v,
            ("url", FieldValue::Text(v)) => self.url = v,
            ("price", FieldValue::Text(v)) => self.price_text = v,
            ("original_price", FieldValue::Text(v)) => self.original_price_text = v,
            ("image_url", FieldValue::Text(v)) => self.image_url = v,
            ("brand", FieldValue::Text(v)) => self.brand = v,
            ("price_numeric", FieldValue::Number(v)) => self.price_numeric = v,
            ("original_price_numeric", FieldValue::Number(v)) => self.original_price_numeric = v,
            ("is_sponsored", FieldValue::Flag(v)) => self.is_sponsored = v,
            (name, value) => {
                if core_field_kind(name).is_some() {
                    tracing::debug!(field = name, ?value, "kind mismatch for core field; dropped");
                } else {
                    self.extra.insert(name.to_owned(), value);
                }
            }
        }
    }
}

/// How far a search went: pages walked for listing sites, hits for Wikipedia.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchExtent {
    TotalPagesScraped(u32),
    TotalResults(usize),
}

/// Outcome of one search against one site.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub search_term: String,
    /// Local wall-clock time, `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,
    #[serde(flatten)]
    pub extent: SearchExtent,
    pub summary: Summary,
    #[serde(rename = "products")]
    pub records: Vec<ListingRecord>,
    /// Id of the site that produced the result; kept out of the JSON body.
    #[serde(skip)]
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResult {
    /// Assembles a result, attaching `empty_error` when no record survived.
    #[must_use]
    pub fn new(
        search_term: &str,
        source: &str,
        extent: SearchExtent,
        records: Vec<ListingRecord>,
        summary: Summary,
        empty_error: &str,
    ) -> Self {
        let error = records.is_empty().then(|| empty_error.to_owned());
        Self {
            search_term: search_term.to_owned(),
            timestamp: now_timestamp(),
            extent,
            summary,
            records,
            source: source.to_owned(),
            error,
        }
    }

    /// A result that carries only an error.
    #[must_use]
    pub fn failed(search_term: &str, source: &str, extent: SearchExtent, error: String) -> Self {
        Self {
            search_term: search_term.to_owned(),
            timestamp: now_timestamp(),
            extent,
            summary: Summary::default(),
            records: Vec::new(),
            source: source.to_owned(),
            error: Some(error),
        }
    }
}

pub(crate) fn now_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

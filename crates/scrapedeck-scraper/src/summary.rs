//! Aggregate statistics over the records of one search.
//!
//! [`summarize`] is pure and independent of record order: numeric series are
//! sorted before summing and distinct values go through ordered sets.

use std::collections::{BTreeMap, BTreeSet};

use scrapedeck_core::SummaryConfig;
use serde::Serialize;

use crate::parse_helpers::{leading_integer, round_to};
use crate::types::{serialize_amount, ListingRecord};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total_products: usize,
    pub products_with_price: usize,
    pub products_with_rating: usize,
    pub sponsored_products: usize,
    pub brands_found: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_range: Option<PriceRange>,
    pub avg_rating: f64,
    /// Site-declared extras, flattened next to the standard keys.
    #[serde(flatten)]
    pub extras: BTreeMap<String, SummaryValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceRange {
    #[serde(serialize_with = "serialize_amount")]
    pub min_price: f64,
    #[serde(serialize_with = "serialize_amount")]
    pub max_price: f64,
    pub avg_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SummaryValue {
    Count(usize),
    Average(f64),
    Values(Vec<String>),
    Breakdown(BTreeMap<String, usize>),
}

/// Summarizes `records`; extras follow `config`.
#[must_use]
pub fn summarize(records: &[ListingRecord], config: &SummaryConfig) -> Summary {
    let mut prices: Vec<f64> = records
        .iter()
        .map(|r| r.price_numeric)
        .filter(|price| *price > 0.0)
        .collect();
    prices.sort_by(f64::total_cmp);

    let rated: Vec<&str> = records
        .iter()
        .filter_map(|r| r.text("rating"))
        .map(str::trim)
        .filter(|rating| !rating.is_empty())
        .collect();
    let mut ratings: Vec<f64> = rated
        .iter()
        .filter_map(|rating| rating.parse::<f64>().ok())
        .filter(|rating| rating.is_finite())
        .collect();
    ratings.sort_by(f64::total_cmp);

    let brands: BTreeSet<&str> = records
        .iter()
        .map(|r| r.brand.as_str())
        .filter(|brand| !brand.is_empty())
        .collect();

    let price_range = match (prices.first(), prices.last()) {
        (Some(&min_price), Some(&max_price)) => Some(PriceRange {
            min_price,
            max_price,
            avg_price: round_to(mean(&prices), 2),
        }),
        _ => None,
    };

    Summary {
        total_products: records.len(),
        products_with_price: prices.len(),
        products_with_rating: rated.len(),
        sponsored_products: records.iter().filter(|r| r.is_sponsored).count(),
        brands_found: brands.into_iter().map(str::to_owned).collect(),
        price_range,
        avg_rating: if ratings.is_empty() {
            0.0
        } else {
            round_to(mean(&ratings), 2)
        },
        extras: extras(records, config),
    }
}

fn extras(records: &[ListingRecord], config: &SummaryConfig) -> BTreeMap<String, SummaryValue> {
    let mut extras = BTreeMap::new();

    for count in &config.counts {
        let n = records.iter().filter(|r| r.is_set(&count.field)).count();
        extras.insert(count.label.clone(), SummaryValue::Count(n));
    }

    for distinct in &config.distinct {
        let values: BTreeSet<&str> = records
            .iter()
            .filter_map(|r| r.text(&distinct.field))
            .filter(|value| !value.is_empty())
            .collect();
        extras.insert(
            distinct.label.clone(),
            SummaryValue::Values(values.into_iter().map(str::to_owned).collect()),
        );
    }

    for average in &config.averages {
        #[allow(clippy::cast_precision_loss)]
        let mut values: Vec<f64> = records
            .iter()
            .filter_map(|r| r.text(&average.field))
            .filter_map(leading_integer)
            .map(|n| n as f64)
            .collect();
        values.sort_by(f64::total_cmp);
        let avg = if values.is_empty() {
            0.0
        } else {
            round_to(mean(&values), 1)
        };
        extras.insert(average.label.clone(), SummaryValue::Average(avg));
    }

    for breakdown in &config.breakdowns {
        let counts = breakdown
            .values
            .iter()
            .map(|(key, wanted)| {
                let n = records
                    .iter()
                    .filter(|r| r.text(&breakdown.field) == Some(wanted.as_str()))
                    .count();
                (key.clone(), n)
            })
            .collect();
        extras.insert(breakdown.label.clone(), SummaryValue::Breakdown(counts));
    }

    extras
}

#[allow(clippy::cast_precision_loss)]
fn mean(sorted: &[f64]) -> f64 {
    sorted.iter().sum::<f64>() / sorted.len() as f64
}

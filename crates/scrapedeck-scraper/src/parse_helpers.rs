//! Small text-to-value conversions shared by the extractor and the summarizer.

use scrapedeck_core::{BrandInference, PriceFormat};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot read a number from \"{text}\"")]
pub struct NumberError {
    pub text: String,
}

/// Parses a displayed price such as `"₹45,990"` or `"₹1,299.50"`.
///
/// Text without any digit is a price of `0`.
///
/// # Errors
///
/// Returns [`NumberError`] when the remaining digits do not form a number
/// (for example `"1.2.3"` under [`PriceFormat::Decimal`]).
pub fn parse_price(text: &str, format: PriceFormat) -> Result<f64, NumberError> {
    let kept: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || (format == PriceFormat::Decimal && *c == '.'))
        .collect();
    let kept = kept.trim_matches('.');
    if !kept.bytes().any(|b| b.is_ascii_digit()) {
        return Ok(0.0);
    }
    kept.parse::<f64>().map_err(|_| NumberError {
        text: text.to_owned(),
    })
}

/// Converts a star-bar width such as `"84%"` into a 0-5 rating (`4.2`).
#[must_use]
pub fn rating_from_width(width: &str) -> Option<f64> {
    let percent = width.trim().trim_end_matches('%').trim().parse::<f64>().ok()?;
    percent
        .is_finite()
        .then(|| round_to(percent / 100.0 * 5.0, 1))
}

/// Infers a brand from a product name.
#[must_use]
pub fn infer_brand(name: &str, strategy: BrandInference) -> String {
    match strategy {
        BrandInference::None => String::new(),
        BrandInference::LeadingWord => leading_word(name).to_owned(),
        BrandInference::UpToHyphen => {
            let run_len = name
                .find(|c: char| !(c.is_ascii_alphabetic() || c == ' '))
                .unwrap_or(name.len());
            let candidate = if name[run_len..].starts_with('-') {
                name[..run_len].trim()
            } else {
                ""
            };
            if candidate.len() > 1 {
                return candidate.to_owned();
            }
            let word = leading_word(name);
            if word.len() > 1 {
                word.to_owned()
            } else {
                String::new()
            }
        }
    }
}

fn leading_word(name: &str) -> &str {
    let end = name
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(name.len());
    &name[..end]
}

/// The first run of ASCII digits in `text`, e.g. `40` from `"Save 40% today"`.
#[must_use]
pub fn leading_integer(text: &str) -> Option<u64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits = &text[start..];
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse().ok()
}

/// Digits with optional `,` / `.` separators and nothing else.
#[must_use]
pub fn is_plain_number(text: &str) -> bool {
    let mut saw_digit = false;
    for c in text.chars() {
        match c {
            '0'..='9' => saw_digit = true,
            ',' | '.' => {}
            _ => return false,
        }
    }
    saw_digit
}

#[must_use]
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// `original - price`, floored at zero; zero unless both prices are known.
#[must_use]
pub fn savings(price: f64, original: f64) -> f64 {
    if price > 0.0 && original > 0.0 {
        (original - price).max(0.0)
    } else {
        0.0
    }
}

//! Decoder for the pseudo-JSON product list some sites hide in an input value.
//!
//! Grammar (whitespace allowed between tokens):
//!
//! ```text
//! blob   := prefix '[' (record (',' record)* ','?)? ']'
//! record := '{' (pair (',' pair)* ','?)? '}'
//! pair   := scalar ':' scalar
//! scalar := quoted | bare
//! quoted := '\'' ... '\'' | '"' ... '"'     (backslash escapes the next char)
//! bare   := one or more chars other than whitespace , : } ]
//! ```
//!
//! Everything before the first `[` is ignored. Pair order is preserved.

use scraper::Html;
use thiserror::Error;

use crate::extract::{finalize, initial_value, NumericLocated};
use crate::rules::{CompiledBlob, CompiledSite};
use crate::types::{FieldValue, ListingRecord};

/// One decoded record: ordered `(key, value)` pairs.
pub type BlobRecord = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed hidden blob at byte {offset}: expected {expected}")]
pub struct BlobError {
    pub offset: usize,
    pub expected: &'static str,
}

/// Decodes a blob into its records.
///
/// # Errors
///
/// Returns [`BlobError`] with the byte offset of the first token that does
/// not fit the grammar.
pub fn decode(input: &str) -> Result<Vec<BlobRecord>, BlobError> {
    let start = input.find('[').ok_or(BlobError {
        offset: input.len(),
        expected: "'['",
    })?;
    let mut cursor = Cursor {
        src: input,
        pos: start + 1,
    };

    let mut records = Vec::new();
    loop {
        cursor.skip_ws();
        match cursor.peek() {
            Some(']') => {
                cursor.bump();
                return Ok(records);
            }
            Some('{') => {
                records.push(cursor.record()?);
                cursor.skip_ws();
                match cursor.peek() {
                    Some(',') => cursor.bump(),
                    Some(']') => {}
                    _ => return Err(cursor.error("',' or ']'")),
                }
            }
            _ => return Err(cursor.error("'{' or ']'")),
        }
    }
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn error(&self, expected: &'static str) -> BlobError {
        BlobError {
            offset: self.pos,
            expected,
        }
    }

    fn expect(&mut self, wanted: char, expected: &'static str) -> Result<(), BlobError> {
        if self.peek() == Some(wanted) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(expected))
        }
    }

    fn record(&mut self) -> Result<BlobRecord, BlobError> {
        self.expect('{', "'{'")?;
        let mut pairs = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.bump();
                return Ok(pairs);
            }
            let key = self.scalar()?;
            self.skip_ws();
            self.expect(':', "':'")?;
            self.skip_ws();
            let value = self.scalar()?;
            pairs.push((key, value));
            self.skip_ws();
            match self.peek() {
                Some(',') => self.bump(),
                Some('}') => {}
                _ => return Err(self.error("',' or '}'")),
            }
        }
    }

    fn scalar(&mut self) -> Result<String, BlobError> {
        match self.peek() {
            Some(quote @ ('\'' | '"')) => self.quoted(quote),
            Some(_) => self.bare(),
            None => Err(self.error("a value")),
        }
    }

    fn quoted(&mut self, quote: char) -> Result<String, BlobError> {
        self.bump();
        let mut out = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(self.error("closing quote"));
            };
            self.bump();
            match c {
                '\\' => {
                    let Some(escaped) = self.peek() else {
                        return Err(self.error("escaped character"));
                    };
                    self.bump();
                    out.push(escaped);
                }
                c if c == quote => return Ok(out),
                c => out.push(c),
            }
        }
    }

    fn bare(&mut self) -> Result<String, BlobError> {
        let begin = self.pos;
        while self
            .peek()
            .is_some_and(|c| !c.is_whitespace() && !matches!(c, ',' | ':' | '}' | ']'))
        {
            self.bump();
        }
        if self.pos == begin {
            return Err(self.error("a value"));
        }
        Ok(self.src[begin..self.pos].to_owned())
    }
}

/// Records from the hidden blob on `document`, mapped onto `site`'s fields.
///
/// Returns an empty list when the site has no blob, the page lacks it, or it
/// does not decode.
pub(crate) fn blob_records(document: &Html, site: &CompiledSite) -> Vec<ListingRecord> {
    let Some(blob) = &site.hidden_blob else {
        return Vec::new();
    };
    let Some(raw) = document
        .select(&blob.selector)
        .find_map(|element| element.value().attr(&blob.attr))
    else {
        return Vec::new();
    };

    match decode(raw) {
        Ok(decoded) => decoded
            .iter()
            .map(|pairs| map_record(pairs, blob, site))
            .collect(),
        Err(err) => {
            tracing::warn!(site = %site.id, error = %err, "hidden product blob did not decode");
            Vec::new()
        }
    }
}

fn map_record(pairs: &BlobRecord, blob: &CompiledBlob, site: &CompiledSite) -> ListingRecord {
    let mut record = ListingRecord::default();
    for field in &site.fields {
        record.assign(&field.name, initial_value(field));
    }

    for mapping in &blob.keys {
        let value = pairs
            .iter()
            .find(|(key, _)| key == &mapping.key)
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty());
        if let Some(value) = value {
            let text = mapping
                .template
                .as_deref()
                .map_or_else(|| value.to_owned(), |template| template.replace("{}", value));
            record.assign(&mapping.field, FieldValue::Text(text));
        }
    }

    finalize(&mut record, site, NumericLocated::default());
    record
}

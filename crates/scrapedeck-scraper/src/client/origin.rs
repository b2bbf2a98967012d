//! URL building for search pages and listing links.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use scrapedeck_core::TermEncoding;

/// Everything except ASCII alphanumerics and `-._~` is escaped.
const TERM: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Encodes a search term for insertion into a site's search URL template.
///
/// `Query` encoding turns spaces into `+`; `Path` encoding keeps `%20`.
#[must_use]
pub fn encode_term(term: &str, encoding: TermEncoding) -> String {
    let escaped = utf8_percent_encode(term, TERM).to_string();
    match encoding {
        TermEncoding::Query => escaped.replace("%20", "+"),
        TermEncoding::Path => escaped,
    }
}

/// Builds the URL of results page `page` (1-based).
///
/// Page 1 is the bare template; later pages append `<page_param>=<n>` with
/// `&` or `?` depending on whether the template already has a query.
#[must_use]
pub fn page_url(
    template: &str,
    term: &str,
    encoding: TermEncoding,
    page_param: &str,
    page: u32,
) -> String {
    let base = template.replace("{term}", &encode_term(term, encoding));
    if page <= 1 {
        return base;
    }
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}{page_param}={page}")
}

/// Resolves a listing link against the site origin.
#[must_use]
pub fn resolve_url(domain: &str, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() || href.starts_with("http://") || href.starts_with("https://") {
        return href.to_owned();
    }
    if let Some(rest) = href.strip_prefix("//") {
        return format!("https://{rest}");
    }
    let domain = domain.trim_end_matches('/');
    if href.starts_with('/') {
        format!("{domain}{href}")
    } else {
        format!("{domain}/{href}")
    }
}

//! Browser-like page fetcher with identity rotation, pacing and a retry budget.

mod identity;
mod origin;

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, REFERER, USER_AGENT};
use reqwest::{Client, StatusCode};
use scrapedeck_core::{AppConfig, FetchPolicy};

use crate::error::ScraperError;
use crate::rate_limit::retry_paced;

pub use origin::{encode_term, page_url, resolve_url};

/// Statuses treated as throttling even when the site policy has no explicit window.
const THROTTLE_STATUSES: [u16; 3] = [403, 429, 503];

/// Process-wide fetch knobs, shared by every site.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchSettings {
    pub timeout_secs: u64,
    pub max_attempts: u32,
    /// Multiplier applied to every pacing and backoff sleep.
    pub delay_scale: f64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            max_attempts: 3,
            delay_scale: 1.0,
        }
    }
}

impl FetchSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            timeout_secs: config.request_timeout_secs,
            max_attempts: config.max_attempts,
            delay_scale: config.delay_scale,
        }
    }
}

/// A successful (HTTP 200) response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

/// Fetches pages for one site.
///
/// Each attempt picks a random identity from the pool, sends the static
/// browser headers plus the site's own, and keeps cookies across requests.
/// Only HTTP 200 counts as success; everything else is retried under the
/// site's [`FetchPolicy`] until the attempt budget runs out.
pub struct Fetcher {
    client: Client,
    policy: FetchPolicy,
    identities: Vec<String>,
    max_attempts: u32,
    delay_scale: f64,
}

impl Fetcher {
    /// Builds a fetcher for `site`.
    ///
    /// Cookies listed in the policy are seeded for `cookie_origin` when given.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidRule`] for malformed headers or cookie
    /// origin, and [`ScraperError::Http`] if the client cannot be built.
    pub fn new(
        site: &str,
        policy: &FetchPolicy,
        settings: &FetchSettings,
        cookie_origin: Option<&str>,
    ) -> Result<Self, ScraperError> {
        let jar = Arc::new(Jar::default());
        if let Some(origin) = cookie_origin {
            if !policy.cookies.is_empty() {
                let origin_url =
                    reqwest::Url::parse(origin).map_err(|e| ScraperError::InvalidRule {
                        site: site.to_owned(),
                        reason: format!("cookie origin '{origin}': {e}"),
                    })?;
                for cookie in &policy.cookies {
                    jar.add_cookie_str(cookie, &origin_url);
                }
            }
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .cookie_provider(jar)
            .default_headers(request_headers(site, policy)?)
            .build()?;

        let identities = if policy.user_agents.is_empty() {
            identity::DESKTOP_IDENTITIES
                .iter()
                .map(|ua| (*ua).to_owned())
                .collect()
        } else {
            policy.user_agents.clone()
        };

        Ok(Self {
            client,
            policy: policy.clone(),
            identities,
            max_attempts: settings.max_attempts.max(1),
            delay_scale: settings.delay_scale,
        })
    }

    /// Attempt budget from the process settings.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    #[must_use]
    pub fn delay_scale(&self) -> f64 {
        self.delay_scale
    }

    /// Fetches `url`, making at most `max_attempts` attempts.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::MaxRetriesExceeded`] when no attempt produced an
    /// HTTP 200 response.
    pub async fn fetch(&self, url: &str, max_attempts: u32) -> Result<FetchedPage, ScraperError> {
        retry_paced(
            url,
            max_attempts,
            &self.policy,
            self.delay_scale,
            |attempt| async move {
                let identity = identity::pick(&self.identities);
                let mut request = self.client.get(url).header(USER_AGENT, identity);
                if attempt > 0 {
                    if let Some(referer) = &self.policy.referer_on_retry {
                        request = request.header(REFERER, referer);
                    }
                }

                let response = request.send().await?;
                let status = response.status();
                tracing::debug!(url, status = status.as_u16(), attempt, "response received");

                if status == StatusCode::OK {
                    let body = response.text().await?;
                    return Ok(FetchedPage {
                        status: status.as_u16(),
                        body,
                    });
                }

                let code = status.as_u16();
                if THROTTLE_STATUSES.contains(&code) || self.policy.throttle_delay(code).is_some() {
                    Err(ScraperError::Throttled {
                        status: code,
                        url: url.to_owned(),
                    })
                } else {
                    Err(ScraperError::UnexpectedStatus {
                        status: code,
                        url: url.to_owned(),
                    })
                }
            },
        )
        .await
    }
}

fn request_headers(site: &str, policy: &FetchPolicy) -> Result<HeaderMap, ScraperError> {
    let invalid = |name: &str, reason: String| ScraperError::InvalidRule {
        site: site.to_owned(),
        reason: format!("header '{name}': {reason}"),
    };

    let mut headers = HeaderMap::new();
    let static_headers = identity::BROWSER_HEADERS.iter().map(|(k, v)| (*k, *v));
    let site_headers = policy.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()));

    // Site headers come last so they override the static set.
    for (name, value) in static_headers.chain(site_headers) {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(name, e.to_string()))?;
        let header_value = HeaderValue::from_str(value).map_err(|e| invalid(name, e.to_string()))?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

#[cfg(test)]
#[path = "../client_test.rs"]
mod tests;

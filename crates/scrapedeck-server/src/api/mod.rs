mod scrape;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use scrapedeck_core::{AppConfig, ParameterSpec};
use scrapedeck_scraper::{RegisteredSite, SiteRegistry};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::middleware::{enforce_rate_limit, request_id, RateLimitState};

const ENDPOINTS: [&str; 4] = ["/api/scrapers", "/api/scrape", "/api/health", "/api/test"];

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SiteRegistry>,
    pub config: Arc<AppConfig>,
}

/// Error body: `{error, trace?}`. `code` selects the HTTP status.
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    code: &'static str,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl ApiError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            error: message.into(),
            trace: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("bad_request", message)
    }

    #[must_use]
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.code {
            "bad_request" => StatusCode::BAD_REQUEST,
            "not_found" => StatusCode::NOT_FOUND,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ScraperInfo<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a [ParameterSpec],
}

impl<'a> From<&'a RegisteredSite> for ScraperInfo<'a> {
    fn from(site: &'a RegisteredSite) -> Self {
        let config = site.config();
        Self {
            name: &config.name,
            description: &config.description,
            parameters: &config.parameters,
        }
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-request-id")])
}

fn scrape_router(rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/scrape", post(scrape::scrape))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit,
            enforce_rate_limit,
        ))
}

pub fn build_app(state: AppState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new()
        .route("/", get(index))
        .route("/api/test", get(api_test))
        .route("/api/health", get(health))
        .route("/api/scrapers", get(list_scrapers));

    Router::new()
        .merge(public_routes)
        .merge(scrape_router(rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn index() -> impl IntoResponse {
    Json(json!({
        "message": "Multi-Platform Scraper API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ENDPOINTS,
    }))
}

async fn api_test(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "message": "API is working!",
        "timestamp": Local::now().to_rfc3339(),
        "scrapers_count": state.registry.len(),
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let available: Vec<&str> = state.registry.iter().map(RegisteredSite::id).collect();
    Json(json!({
        "status": "healthy",
        "timestamp": Local::now().to_rfc3339(),
        "available_scrapers": available,
    }))
}

async fn list_scrapers(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let mut scrapers = Map::new();
    for site in state.registry.iter() {
        let info = serde_json::to_value(ScraperInfo::from(site)).map_err(|e| {
            tracing::error!(site = site.id(), error = %e, "failed to serialize scraper metadata");
            ApiError::new("internal_error", "failed to list scrapers")
        })?;
        scrapers.insert(site.id().to_owned(), info);
    }
    Ok(Json(json!({ "scrapers": scrapers })))
}

pub fn rate_limit_state(config: &AppConfig) -> RateLimitState {
    RateLimitState::new(config.rate_limit_per_minute, Duration::from_secs(60))
}

#[cfg(test)]
mod tests;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::IntoResponse;
use scrapedeck_core::{parse_sites, AppConfig};
use scrapedeck_scraper::{FetchSettings, SiteRegistry};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

fn test_config(output_dir: PathBuf, save_results: bool) -> AppConfig {
    AppConfig {
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        log_level: "info".to_owned(),
        sites_path: None,
        output_dir,
        save_results,
        request_timeout_secs: 5,
        max_attempts: 1,
        delay_scale: 0.0,
        rate_limit_per_minute: 30,
    }
}

fn settings() -> FetchSettings {
    FetchSettings {
        timeout_secs: 5,
        max_attempts: 1,
        delay_scale: 0.0,
    }
}

fn builtin_app() -> Router {
    app_with(
        SiteRegistry::builtin(&settings()).expect("builtin registry"),
        test_config(std::env::temp_dir(), false),
        RateLimitState::new(30, Duration::from_secs(60)),
    )
}

fn app_with(registry: SiteRegistry, config: AppConfig, rate_limit: RateLimitState) -> Router {
    build_app(
        AppState {
            registry: Arc::new(registry),
            config: Arc::new(config),
        },
        rate_limit,
    )
}

fn mock_registry(uri: &str) -> SiteRegistry {
    let yaml = format!(
        r#"
sites:
  - id: mockshop
    name: Mock Shop
    description: Storefront served by the test
    parameters:
      - {{ name: search_term, type: text, label: Term, required: true }}
      - {{ name: max_pages, type: number, label: Max Pages, default: 1, min: 1, max: 2, required: true }}
    source:
      engine: listing
      domain: "{uri}"
      search_url: "{uri}/search?q={{term}}"
      containers:
        - {{ css: ".product" }}
      fields:
        name:
          locate:
            - {{ css: ".name" }}
        price:
          locate:
            - {{ css: ".price" }}
"#
    );
    let file = parse_sites(&yaml).expect("mock yaml");
    SiteRegistry::from_sites(file, &settings()).expect("mock registry")
}

const LISTING: &str = r#"<html><body>
<div class="product"><span class="name">Kettle</span><span class="price">₹1,299</span></div>
<div class="product"><span class="name">Toaster</span><span class="price">₹2,001</span></div>
</body></html>"#;

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
        .await
        .expect("response");
    read_json(response).await
}

async fn post_scrape(app: Router, body: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(scrape_request(body))
        .await
        .expect("response");
    read_json(response).await
}

fn scrape_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/scrape")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_owned()))
        .expect("request")
}

async fn read_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = serde_json::from_slice(&body).expect("json parse");
    (status, json)
}

#[test]
fn api_error_codes_map_to_statuses() {
    let response = ApiError::bad_request("nope").into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let response = ApiError::new("internal_error", "boom").into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn api_error_omits_missing_trace() {
    let json = serde_json::to_value(ApiError::bad_request("nope")).unwrap();
    assert_eq!(json, json!({ "error": "nope" }));

    let json = serde_json::to_value(ApiError::new("internal_error", "x").with_trace("t")).unwrap();
    assert_eq!(json["trace"], "t");
}

#[tokio::test]
async fn index_lists_endpoints() {
    let (status, json) = get_json(builtin_app(), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Multi-Platform Scraper API");
    assert_eq!(json["endpoints"].as_array().map(Vec::len), Some(4));
}

#[tokio::test]
async fn test_endpoint_counts_scrapers() {
    let (status, json) = get_json(builtin_app(), "/api/test").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "API is working!");
    assert_eq!(json["scrapers_count"], 6);
}

#[tokio::test]
async fn health_reports_available_scrapers() {
    let (status, json) = get_json(builtin_app(), "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(
        json["available_scrapers"],
        json!(["amazon", "flipkart", "snapdeal", "jiomart", "tatacliq", "wikipedia"])
    );
    assert!(json["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn scrapers_endpoint_publishes_parameter_metadata() {
    let (status, json) = get_json(builtin_app(), "/api/scrapers").await;
    assert_eq!(status, StatusCode::OK);

    let wikipedia = &json["scrapers"]["wikipedia"];
    assert!(wikipedia["name"].as_str().is_some());
    let limit = &wikipedia["parameters"][1];
    assert_eq!(limit["name"], "max_results");
    assert_eq!(limit["type"], "number");
    assert_eq!(limit["default"], 1);
    assert_eq!(limit["max"], 5);
    assert_eq!(limit["required"], true);
    assert!(json["scrapers"]["amazon"].is_object());
}

#[tokio::test]
async fn request_id_is_echoed_or_generated() {
    let response = builtin_app()
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(
        response.headers().get("x-request-id").and_then(|v| v.to_str().ok()),
        Some("req-42")
    );

    let response = builtin_app()
        .oneshot(Request::builder().uri("/").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn scrape_rejects_malformed_body() {
    let (status, json) = post_scrape(builtin_app(), "not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "No data provided");
}

#[tokio::test]
async fn scrape_rejects_unknown_site() {
    let (status, json) = post_scrape(
        builtin_app(),
        r#"{"scraper_id":"youtube","parameters":{"search_term":"x"}}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Invalid scraper ID");
}

#[tokio::test]
async fn scrape_rejects_missing_parameter() {
    let (status, json) = post_scrape(
        builtin_app(),
        r#"{"scraper_id":"jiomart","parameters":{"max_pages":1}}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Parameter search_term is required");
}

#[tokio::test]
async fn scrape_is_rate_limited() {
    let app = app_with(
        SiteRegistry::builtin(&settings()).expect("builtin registry"),
        test_config(std::env::temp_dir(), false),
        RateLimitState::new(1, Duration::from_secs(60)),
    );

    let (status, _) = post_scrape(app.clone(), "{}").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = post_scrape(app.clone(), "{}").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["error"], "rate limit exceeded");

    // Metadata routes sit outside the limiter.
    let (status, _) = get_json(app, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn scrape_runs_the_site_and_wraps_the_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "kitchen"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LISTING))
        .mount(&server)
        .await;

    let app = app_with(
        mock_registry(&server.uri()),
        test_config(std::env::temp_dir(), false),
        RateLimitState::new(30, Duration::from_secs(60)),
    );

    let (status, json) = post_scrape(
        app,
        r#"{"scraper_id":"mockshop","parameters":{"search_term":"kitchen","max_pages":"7"}}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    let data = &json["data"];
    assert_eq!(data["scraper_used"], "Mock Shop");
    assert_eq!(data["search_term"], "kitchen");
    assert_eq!(data["total_pages_scraped"], 2);
    assert_eq!(data["products"][0]["name"], "Kettle");
    assert_eq!(data["products"][1]["price_numeric"], 2001);
    // Both pages of the clamped budget were walked.
    assert_eq!(data["summary"]["total_products"], 4);
    assert!(data["execution_timestamp"].as_str().is_some());
    assert!(data.get("saved_to").is_none());
}

#[tokio::test]
async fn scrape_persists_result_when_enabled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LISTING))
        .mount(&server)
        .await;

    let output_dir =
        std::env::temp_dir().join(format!("scrapedeck-server-save-{}", std::process::id()));
    let app = app_with(
        mock_registry(&server.uri()),
        test_config(output_dir.clone(), true),
        RateLimitState::new(30, Duration::from_secs(60)),
    );

    let (status, json) = post_scrape(
        app,
        r#"{"scraper_id":"mockshop","parameters":{"search_term":"kettle","max_pages":1}}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let saved_to = json["data"]["saved_to"].as_str().expect("saved_to present");
    let written: Value =
        serde_json::from_str(&std::fs::read_to_string(saved_to).expect("artifact readable"))
            .expect("artifact is json");
    assert_eq!(written["search_term"], "kettle");
    assert!(written.get("scraper_used").is_none());

    std::fs::remove_dir_all(&output_dir).ok();
}

#[tokio::test]
async fn unreachable_site_still_returns_a_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let app = app_with(
        mock_registry(&server.uri()),
        test_config(std::env::temp_dir(), false),
        RateLimitState::new(30, Duration::from_secs(60)),
    );

    let (status, json) = post_scrape(
        app,
        r#"{"scraper_id":"mockshop","parameters":{"search_term":"kettle","max_pages":1}}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["error"], "No products found");
    assert_eq!(json["data"]["products"], json!([]));
}

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use chrono::Local;
use scrapedeck_core::{ParameterKind, ParameterSpec};
use scrapedeck_scraper::{save_result, timestamped_artifact_path, ScraperError, SiteRegistry};
use serde_json::{json, Map, Value};
use tokio::task::JoinError;
use tracing::Instrument;

use crate::middleware::RequestId;

use super::{ApiError, AppState};

/// A scrape request that passed validation.
#[derive(Debug, PartialEq, Eq)]
pub(super) struct ScrapeJob {
    pub site_id: String,
    pub search_term: String,
    pub limit: u32,
}

/// Checks a `{scraper_id, parameters}` body against the registry. `site_id`
/// is accepted in place of `scraper_id`.
///
/// Number parameters accept JSON numbers and numeric strings and are clamped
/// into the declared window; absent optional ones fall back to their default.
pub(super) fn validate(
    registry: &SiteRegistry,
    body: Option<&Value>,
) -> Result<ScrapeJob, ApiError> {
    let data = match body {
        Some(Value::Object(map)) if !map.is_empty() => map,
        _ => return Err(ApiError::bad_request("No data provided")),
    };

    let site = data
        .get("scraper_id")
        .or_else(|| data.get("site_id"))
        .and_then(Value::as_str)
        .and_then(|id| registry.get(id))
        .ok_or_else(|| ApiError::bad_request("Invalid scraper ID"))?;

    let empty = Map::new();
    let parameters = data
        .get("parameters")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let mut search_term = String::new();
    let mut limit = None;

    for spec in &site.config().parameters {
        let Some(value) = parameters.get(&spec.name).filter(|v| !v.is_null()) else {
            if spec.required {
                return Err(ApiError::bad_request(format!(
                    "Parameter {} is required",
                    spec.name
                )));
            }
            continue;
        };

        match spec.kind {
            ParameterKind::Text => {
                search_term = match value {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
            }
            ParameterKind::Number => limit = Some(number_parameter(spec, value)?),
        }
    }

    Ok(ScrapeJob {
        site_id: site.id().to_owned(),
        search_term,
        limit: limit.unwrap_or_else(|| site.default_limit()),
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn number_parameter(spec: &ParameterSpec, value: &Value) -> Result<u32, ApiError> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };

    let number = parsed.filter(|n| n.is_finite()).ok_or_else(|| {
        ApiError::bad_request(format!("Parameter {} must be a number", spec.name))
    })?;

    // Saturates into u32 before the declared window applies.
    let whole = number.trunc().clamp(0.0, f64::from(u32::MAX)) as u32;
    Ok(spec.clamp(whole))
}

pub(super) async fn scrape(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let body = body.ok().map(|Json(value)| value);
    let job = validate(&state.registry, body.as_ref())?;

    let span = tracing::info_span!(
        "scrape",
        request_id = %req_id.0,
        site = %job.site_id,
        term = %job.search_term,
        limit = job.limit,
    );
    tracing::info!(parent: &span, "scrape started");

    let registry = std::sync::Arc::clone(&state.registry);
    let site_id = job.site_id.clone();
    let term = job.search_term.clone();
    let limit = job.limit;
    let handle = tokio::spawn(
        async move {
            match registry.get(&site_id) {
                Some(site) => site.run(&term, limit).await,
                None => Err(ScraperError::InvalidRule {
                    site: site_id,
                    reason: "site is not registered".to_owned(),
                }),
            }
        }
        .instrument(span.clone()),
    );

    let result = match handle.await {
        Ok(Ok(result)) => result,
        Ok(Err(error)) => {
            tracing::error!(parent: &span, error = %error, "scraper could not be started");
            return Err(
                ApiError::new("internal_error", format!("Scraping failed: {error}"))
                    .with_trace(format!("{error:?}")),
            );
        }
        Err(join_error) => {
            let (message, trace) = describe_join_error(join_error);
            tracing::error!(parent: &span, error = %message, "scrape task failed");
            return Err(
                ApiError::new("internal_error", format!("Scraping failed: {message}"))
                    .with_trace(trace),
            );
        }
    };

    tracing::info!(
        parent: &span,
        products = result.records.len(),
        error = result.error.as_deref().unwrap_or(""),
        "scrape finished"
    );

    let site_name = state
        .registry
        .get(&job.site_id)
        .map_or(job.site_id.as_str(), |site| site.config().name.as_str());

    let mut data = match serde_json::to_value(&result) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            tracing::error!(parent: &span, "search result did not serialize to an object");
            return Err(ApiError::new(
                "internal_error",
                "Scraping failed: result could not be serialized",
            ));
        }
    };
    data.insert("scraper_used".to_owned(), json!(site_name));
    data.insert(
        "execution_timestamp".to_owned(),
        json!(Local::now().to_rfc3339()),
    );

    if state.config.save_results {
        let path =
            timestamped_artifact_path(&state.config.output_dir, &job.site_id, &job.search_term);
        if save_result(&result, &path) {
            data.insert("saved_to".to_owned(), json!(path.display().to_string()));
        }
    }

    Ok(Json(json!({ "success": true, "data": data })))
}

/// Panic payload text plus the join error's own description.
fn describe_join_error(error: JoinError) -> (String, String) {
    let trace = error.to_string();
    let message = match error.try_into_panic() {
        Ok(payload) => payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "scrape task panicked".to_owned()),
        Err(error) => error.to_string(),
    };
    (message, trace)
}

//! Command handlers for `sites` and `search`.

use std::path::Path;

use scrapedeck_scraper::{
    save_result, timestamped_artifact_path, RegisteredSite, SearchResult, SiteRegistry,
};

/// Prints one line per site, followed by its parameters.
pub(crate) fn run_sites(registry: &SiteRegistry) {
    if registry.is_empty() {
        println!("no sites registered");
        return;
    }

    println!("{:<12}{:<24}DESCRIPTION", "ID", "NAME");
    for site in registry.iter() {
        let config = site.config();
        println!("{:<12}{:<24}{}", config.id, config.name, config.description);
        for param in &config.parameters {
            let mut detail = format!("{:?}", param.kind).to_lowercase();
            if let Some(default) = param.default {
                detail.push_str(&format!(", default {default}"));
            }
            if let (Some(min), Some(max)) = (param.min, param.max) {
                detail.push_str(&format!(", {min}..={max}"));
            }
            if param.required {
                detail.push_str(", required");
            }
            println!("{:<12}  --{} ({detail})", "", param.name);
        }
    }
}

/// Looks up `site_id`, naming the known ids when it is missing.
pub(crate) fn find_site<'r>(
    registry: &'r SiteRegistry,
    site_id: &str,
) -> anyhow::Result<&'r RegisteredSite> {
    registry.get(site_id).ok_or_else(|| {
        let known: Vec<&str> = registry.iter().map(RegisteredSite::id).collect();
        anyhow::anyhow!(
            "unknown site '{site_id}'; known sites: {}",
            known.join(", ")
        )
    })
}

/// The requested limit clamped to the site's window, or the site default.
pub(crate) fn resolve_limit(site: &RegisteredSite, requested: Option<u32>) -> u32 {
    match (requested, site.config().limit_parameter()) {
        (Some(limit), Some(param)) => param.clamp(limit),
        (Some(limit), None) => limit.max(1),
        (None, _) => site.default_limit(),
    }
}

/// Runs one search, prints the result as pretty JSON on stdout and, when
/// `output_dir` is set, persists it as an artifact.
///
/// # Errors
///
/// Returns an error for an unknown site, a source that cannot be built, or a
/// result that cannot be serialized. Scraping failures are part of the
/// printed result.
pub(crate) async fn run_search(
    registry: &SiteRegistry,
    site_id: &str,
    term: &str,
    limit: Option<u32>,
    output_dir: Option<&Path>,
) -> anyhow::Result<SearchResult> {
    let site = find_site(registry, site_id)?;
    let limit = resolve_limit(site, limit);

    tracing::info!(site = site_id, term, limit, "running search");
    let result = site.run(term, limit).await?;

    println!("{}", serde_json::to_string_pretty(&result)?);

    if let Some(dir) = output_dir {
        let path = timestamped_artifact_path(dir, site_id, term);
        if save_result(&result, &path) {
            eprintln!("saved results to {}", path.display());
        } else {
            eprintln!("error: failed to save results to {}", path.display());
        }
    }

    Ok(result)
}

#[cfg(test)]
#[path = "search_test.rs"]
mod tests;

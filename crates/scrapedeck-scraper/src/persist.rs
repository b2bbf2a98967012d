//! JSON artifacts for finished searches.

use std::path::{Path, PathBuf};

use crate::types::SearchResult;

/// `<dir>/<site>_<term>_<unix_ts>.json`, with whitespace and path separators
/// in the term replaced by `_`.
#[must_use]
pub fn artifact_path(dir: &Path, site: &str, term: &str, unix_ts: i64) -> PathBuf {
    let safe_term: String = term
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() || c == '/' || c == '\\' { '_' } else { c })
        .collect();
    dir.join(format!("{site}_{safe_term}_{unix_ts}.json"))
}

/// [`artifact_path`] stamped with the current time.
#[must_use]
pub fn timestamped_artifact_path(dir: &Path, site: &str, term: &str) -> PathBuf {
    artifact_path(dir, site, term, chrono::Utc::now().timestamp())
}

/// Writes `result` as pretty JSON, creating parent directories.
///
/// Failures are logged and reported as `false`; they never abort a search.
pub fn save_result(result: &SearchResult, path: &Path) -> bool {
    let write = || -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let json = serde_json::to_string_pretty(result).map_err(|e| e.to_string())?;
        std::fs::write(path, json).map_err(|e| e.to_string())
    };

    match write() {
        Ok(()) => {
            tracing::info!(path = %path.display(), "result saved");
            true
        }
        Err(error) => {
            tracing::error!(path = %path.display(), %error, "failed to save result");
            false
        }
    }
}

use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub log_level: String,
    /// Site registry override; `None` uses the registry compiled into the binary.
    pub sites_path: Option<PathBuf>,
    pub output_dir: PathBuf,
    /// Persist every dispatched result as a JSON artifact.
    pub save_results: bool,
    pub request_timeout_secs: u64,
    /// Fetch attempts per page before the page is skipped.
    pub max_attempts: u32,
    /// Multiplier applied to every pacing and backoff sleep; `0.0` disables sleeping.
    pub delay_scale: f64,
    pub rate_limit_per_minute: usize,
}

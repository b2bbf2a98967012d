pub mod app_config;
pub mod config;
pub mod sites;

pub use app_config::AppConfig;
pub use config::{load_app_config, load_app_config_from_env};
pub use sites::{
    builtin_sites, load_sites, parse_sites, BlobKey, BrandInference, ContainerLocator,
    DelayRange, FetchPolicy, FieldKind, FieldSpec, HiddenBlobConfig, Indicator, ListingConfig,
    Locator, NextPageMarker, ParameterKind, ParameterSpec, PriceFormat, SiteConfig, SitesFile,
    SourceConfig, SummaryBreakdown, SummaryConfig, SummaryField, TermEncoding, TextMode,
    ThrottleRule, Transform, WikipediaConfig,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read sites file {path}: {source}")]
    SitesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse sites file: {0}")]
    SitesFileParse(#[from] serde_yaml::Error),

    #[error("site registry validation failed: {0}")]
    Validation(String),
}

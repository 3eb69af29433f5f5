use thiserror::Error;

/// Crate-wide error type.
///
/// Upstream API failures carry the API name so callers can attribute the
/// failure to a source; the recoverable variants map onto the ingestion
/// error taxonomy used for retry decisions.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{api} API error: {message}")]
    Api { api: String, message: String },

    #[error("{api} request timed out")]
    Timeout { api: String },

    #[error("{api} rate limit exceeded")]
    RateLimited { api: String },

    #[error("{api} service unavailable")]
    ServiceUnavailable { api: String },

    #[error("{api} network error: {message}")]
    Network { api: String, message: String },

    #[error("Failed to initialize HTTP client: {0}")]
    HttpClientInit(reqwest::Error),

    #[error("Parse error in {source_name} record: {message}")]
    Parse { source_name: String, message: String },

    #[error("Job store error: {0}")]
    JobStore(String),

    #[error("Package error: {0}")]
    Package(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}

impl HarvestError {
    /// Error-type tag recorded on ingestion errors. The recoverable set is
    /// `timeout`, `rate_limit`, `temporary_failure`, `network_error`, and
    /// `service_unavailable`.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::RateLimited { .. } => "rate_limit",
            Self::ServiceUnavailable { .. } => "service_unavailable",
            Self::Network { .. } => "network_error",
            Self::Api { .. } => "api_error",
            Self::Parse { .. } => "parse_error",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::JobStore(_) => "job_store_error",
            Self::Package(_) => "package_error",
            Self::Io(_) => "io_error",
            Self::Json(_) | Self::Yaml(_) => "serialization_error",
            Self::Zip(_) => "archive_error",
            Self::HttpClientInit(_) => "temporary_failure",
        }
    }
}

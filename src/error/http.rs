use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Invalid target URL '{value}': {source}")]
    InvalidHref {
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Target URL '{value}' is missing a host.")]
    HrefMissingHost { value: String },
    #[error("Invalid HTTP method '{value}'.")]
    InvalidMethod { value: String },
    #[error("Failed to build HTTP client: {source}")]
    BuildClientFailed {
        #[source]
        source: reqwest::Error,
    },
}

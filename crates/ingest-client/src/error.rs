use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("no configured API host")]
    NoHosts,

    #[error("invalid API host `{host}`: {reason}")]
    InvalidHost { host: String, reason: String },

    #[error("API unavailable: all {attempts} host(s) failed to connect: {source}")]
    Unavailable {
        attempts: usize,
        #[source]
        source: reqwest::Error,
    },

    #[error("request failed with HTTP {status} during {operation}")]
    HttpStatus {
        status: StatusCode,
        operation: &'static str,
    },

    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("malformed API response: {source}")]
    Decode {
        #[from]
        source: serde_json::Error,
    },
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FoglinkError {
    #[error("Invalid instance URL: {0}")]
    Validation(String),

    #[error("Probe timeout after {0}ms")]
    ProbeTimeout(u64),

    #[error("Endpoint unreachable: {0}")]
    ProbeUnreachable(String),

    #[error("Proxy unavailable: {0}")]
    ProxyUnavailable(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("No endpoint reachable: {0}")]
    NoEndpointReachable(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),
}

impl From<hyper::http::uri::InvalidUri> for FoglinkError {
    fn from(err: hyper::http::uri::InvalidUri) -> Self {
        FoglinkError::Validation(err.to_string())
    }
}

impl From<hyper::http::Error> for FoglinkError {
    fn from(err: hyper::http::Error) -> Self {
        FoglinkError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FoglinkError>;

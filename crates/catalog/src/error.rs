use thiserror::Error;

/// Errors from the fetch collaborator.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

/// Errors that end a discovery run. No tree changes are made when one is returned.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error(
        "Could not load the data catalog from {url}. The server may be unreachable, \
         or it may not support cross-origin resource sharing (CORS)."
    )]
    UpstreamUnavailable {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("invalid discovery configuration: {0}")]
    InvalidConfiguration(String),
}

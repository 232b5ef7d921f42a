//! Fetch collaborator: "give me the JSON or text at this URL".
//!
//! No retries happen here or anywhere else in the engine.

use std::time::Duration;

use async_trait::async_trait;
use mapcat_core::HttpConfig;
use reqwest::Client;
use serde_json::Value;

use crate::error::FetchError;

/// Trait for transport backends.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_json(&self, url: &str) -> Result<Value, FetchError>;

    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
}

/// Fetcher backed by a shared reqwest client (connection pooling).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_json(&self, url: &str) -> Result<Value, FetchError> {
        let body = self.fetch_text(url).await?;
        serde_json::from_str(&body).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            tracing::debug!(url, %status, "upstream returned non-2xx status");
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    /// Canned responses keyed by exact URL; unknown URLs are 404s.
    #[derive(Default)]
    pub struct MockFetcher {
        responses: HashMap<String, (String, Duration)>,
        failures: HashMap<String, u16>,
        pub requested: Mutex<Vec<String>>,
    }

    impl MockFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(mut self, url: &str, body: impl Into<String>) -> Self {
            self.responses
                .insert(url.to_string(), (body.into(), Duration::ZERO));
            self
        }

        pub fn respond_after(mut self, url: &str, body: impl Into<String>, delay: Duration) -> Self {
            self.responses.insert(url.to_string(), (body.into(), delay));
            self
        }

        pub fn fail(mut self, url: &str, status: u16) -> Self {
            self.failures.insert(url.to_string(), status);
            self
        }

        pub fn requests(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetcher for MockFetcher {
        async fn fetch_json(&self, url: &str) -> Result<Value, FetchError> {
            let body = self.fetch_text(url).await?;
            serde_json::from_str(&body).map_err(|e| FetchError::Decode {
                url: url.to_string(),
                message: e.to_string(),
            })
        }

        async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
            self.requested.lock().unwrap().push(url.to_string());
            if let Some(status) = self.failures.get(url) {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: *status,
                });
            }
            match self.responses.get(url) {
                Some((body, delay)) => {
                    if !delay.is_zero() {
                        tokio::time::sleep(*delay).await;
                    }
                    Ok(body.clone())
                }
                None => Err(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                }),
            }
        }
    }
}

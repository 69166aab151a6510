//! HTTP fetcher built on reqwest.

use std::time::Duration;

use async_trait::async_trait;
use climagraph_core::{
    ClimagraphError, ClimagraphResult, ConfigError, RemoteError, Series, SeriesKind,
};

use crate::config::RemoteConfig;
use crate::decode::decode_records;
use crate::RemoteFetcher;

/// Longest response body excerpt kept in a status error.
const ERROR_BODY_LIMIT: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum HttpFetchError {
    #[error("HTTP error for {kind} at {url}: {source}")]
    Http {
        kind: SeriesKind,
        url: String,
        source: reqwest::Error,
    },
    #[error("HTTP {status} from {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error(transparent)]
    Decode(#[from] RemoteError),
    #[error("Failed to build HTTP client: {0}")]
    Client(reqwest::Error),
}

impl From<HttpFetchError> for ClimagraphError {
    fn from(e: HttpFetchError) -> Self {
        match e {
            HttpFetchError::Http { kind, url, source } => RemoteError::RequestFailed {
                kind,
                url,
                reason: source.to_string(),
            }
            .into(),
            HttpFetchError::Status { url, status, body } => {
                RemoteError::BadStatus { url, status, body }.into()
            }
            HttpFetchError::Decode(remote) => remote.into(),
            HttpFetchError::Client(source) => ConfigError::InvalidValue {
                field: "remote".to_string(),
                reason: source.to_string(),
            }
            .into(),
        }
    }
}

/// Fetches feeds over HTTP(S).
#[derive(Clone)]
pub struct HttpRemoteFetcher {
    client: reqwest::Client,
    config: RemoteConfig,
}

impl HttpRemoteFetcher {
    pub fn new(config: RemoteConfig) -> Result<Self, HttpFetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(HttpFetchError::Client)?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    async fn get_feed(&self, kind: SeriesKind) -> Result<Series, HttpFetchError> {
        let url = self.config.endpoint(kind);
        let http_err = |source| HttpFetchError::Http {
            kind,
            url: url.clone(),
            source,
        };

        tracing::debug!(kind = %kind, url = %url, "Requesting feed");
        let response = self.client.get(url.as_str()).send().await.map_err(http_err)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body: String = text.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(HttpFetchError::Status {
                url: url.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await.map_err(http_err)?;
        let series = decode_records(kind, &body)?;
        Ok(series)
    }
}

#[async_trait]
impl RemoteFetcher for HttpRemoteFetcher {
    async fn fetch_full(&self, kind: SeriesKind) -> ClimagraphResult<Series> {
        let series = self.get_feed(kind).await?;
        tracing::debug!(kind = %kind, samples = series.len(), "Decoded feed");
        Ok(series)
    }
}

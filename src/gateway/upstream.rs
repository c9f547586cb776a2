//! HTTP client for upstream sampling services.

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, Method, Request, StatusCode, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::UpstreamConfig;

/// Failure talking to the upstream. Never caused by the upstream's status code.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("invalid upstream uri '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },
    #[error("upstream did not answer within {0:?}")]
    Timeout(Duration),
    #[error("upstream request failed: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),
    #[error("failed to read upstream body: {0}")]
    Body(#[source] axum::Error),
}

/// Raw upstream answer.
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub body: Bytes,
}

/// Shared upstream client.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client<HttpConnector, Body>,
    timeout: Option<Duration>,
}

impl UpstreamClient {
    /// `timeout` bounds the request plus the full body read; `None` waits forever.
    pub fn new(connect_timeout: Duration, timeout: Option<Duration>) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            // one request per lock hold, nothing worth keeping warm
            .pool_max_idle_per_host(0)
            .build(connector);

        Self { client, timeout }
    }

    /// GET `target` with `query` and read the whole body.
    pub async fn get(&self, target: &UpstreamConfig, query: &str) -> Result<UpstreamReply, UpstreamError> {
        let uri = upstream_uri(target, query)?;
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.fetch(uri))
                .await
                .map_err(|_| UpstreamError::Timeout(limit))?,
            None => self.fetch(uri).await,
        }
    }

    async fn fetch(&self, uri: Uri) -> Result<UpstreamReply, UpstreamError> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri.clone())
            .header(header::USER_AGENT, concat!("sampler-gateway/", env!("CARGO_PKG_VERSION")))
            .body(Body::empty())
            .map_err(|e| UpstreamError::InvalidUri {
                uri: uri.to_string(),
                reason: e.to_string(),
            })?;

        let response: hyper::Response<hyper::body::Incoming> = self.client.request(request).await?;
        let status = response.status();
        let body = axum::body::to_bytes(Body::new(response.into_body()), usize::MAX)
            .await
            .map_err(UpstreamError::Body)?;

        Ok(UpstreamReply { status, body })
    }
}

/// `http://host:port/path?query` for an upstream.
pub fn upstream_uri(target: &UpstreamConfig, query: &str) -> Result<Uri, UpstreamError> {
    let raw = format!("http://{}:{}{}", target.host, target.port, target.path);
    let invalid = |reason: String| UpstreamError::InvalidUri {
        uri: raw.clone(),
        reason,
    };

    let mut url = url::Url::parse(&raw).map_err(|e| invalid(e.to_string()))?;
    url.set_query(Some(query));
    url.as_str().parse::<Uri>().map_err(|e| invalid(e.to_string()))
}

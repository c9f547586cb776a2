//! Mapping gateway and upload results to HTTP responses.
//!
//! Bodies are always plain text. Only the status code depends on the policy:
//! legacy mode answers 200 for everything, strict mode tells outcomes apart.

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::config::schema::ResponseConfig;
use crate::gateway::{Outcome, UpstreamError, BUSY_MESSAGE};
use crate::upload::UploadError;

pub const TEXT_PLAIN_UTF_8: &str = "text/plain; charset=utf-8";

/// Body for upstream failures in strict mode.
pub const UPSTREAM_FAILED: &str = "Upstream request failed";

/// Status-code policy for sampler and upload responses.
#[derive(Debug, Clone, Copy)]
pub struct ResponsePolicy {
    legacy_status: bool,
}

impl ResponsePolicy {
    pub fn new(config: &ResponseConfig) -> Self {
        Self {
            legacy_status: config.legacy_status,
        }
    }

    pub fn legacy() -> Self {
        Self { legacy_status: true }
    }

    pub fn strict() -> Self {
        Self { legacy_status: false }
    }

    fn status(&self, strict: StatusCode) -> StatusCode {
        if self.legacy_status {
            StatusCode::OK
        } else {
            strict
        }
    }

    /// Response for a sampler outcome.
    pub fn sampler(&self, outcome: Outcome) -> Response {
        match outcome {
            Outcome::Forwarded(body) => plain_text(StatusCode::OK, body),
            Outcome::Busy => plain_text(self.status(StatusCode::SERVICE_UNAVAILABLE), BUSY_MESSAGE),
            // An unreachable upstream used to yield an empty page.
            Outcome::UpstreamFailed(_) if self.legacy_status => plain_text(StatusCode::OK, Body::empty()),
            Outcome::UpstreamFailed(UpstreamError::Timeout(_)) => {
                plain_text(StatusCode::GATEWAY_TIMEOUT, UPSTREAM_FAILED)
            }
            Outcome::UpstreamFailed(_) => plain_text(StatusCode::BAD_GATEWAY, UPSTREAM_FAILED),
        }
    }

    /// Response for an upload.
    pub fn upload(&self, result: Result<String, UploadError>) -> Response {
        match result {
            Ok(text) => plain_text(StatusCode::OK, text),
            Err(e) => plain_text(self.status(e.status()), e.to_string()),
        }
    }
}

/// `text/plain; charset=utf-8` response.
pub fn plain_text(status: StatusCode, body: impl Into<Body>) -> Response {
    (status, [(header::CONTENT_TYPE, TEXT_PLAIN_UTF_8)], body.into()).into_response()
}

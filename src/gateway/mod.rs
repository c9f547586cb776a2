//! Serialized proxy gateway.
//!
//! # Data Flow
//! ```text
//! GET /inmt_sampler?source=...
//!     → params.rs (decode query, pick recognised names)
//!     → gate.rs (try to take the route's gate, never wait)
//!         held elsewhere → Outcome::Busy
//!     → upstream.rs (GET upstream with the rebuilt query, read full body)
//!     → Outcome::Forwarded(body) | Outcome::UpstreamFailed(err)
//!     → permit dropped, gate open again
//! ```

pub mod gate;
pub mod params;
pub mod upstream;

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;

use crate::config::UpstreamConfig;

pub use gate::{FileGate, Gate, GateError, GatePermit, GateRegistry, SlotGate};
pub use params::RequestParams;
pub use upstream::{UpstreamClient, UpstreamError, UpstreamReply};

/// Body sent when the gate is held by someone else.
pub const BUSY_MESSAGE: &str = "Server timeout! Try again later.";

/// Result of one pass through the gateway.
#[derive(Debug)]
pub enum Outcome {
    /// Upstream answered; body is passed through untouched.
    Forwarded(Bytes),
    /// Gate was held; upstream never contacted.
    Busy,
    /// Gate was taken but the upstream call failed.
    UpstreamFailed(UpstreamError),
}

impl Outcome {
    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Forwarded(_) => "forwarded",
            Outcome::Busy => "busy",
            Outcome::UpstreamFailed(UpstreamError::Timeout(_)) => "upstream_timeout",
            Outcome::UpstreamFailed(_) => "upstream_error",
        }
    }
}

/// A sampler route: recognised parameters, one upstream, one gate.
#[derive(Debug, Clone)]
pub struct SamplerRoute {
    pub name: String,
    pub params: Vec<String>,
    pub upstream: UpstreamConfig,
    pub gate: Arc<dyn Gate>,
}

impl SamplerRoute {
    /// Serve one request.
    ///
    /// The gate permit lives until the upstream body has been read in full.
    pub async fn handle(&self, client: &UpstreamClient, params: &RequestParams) -> Outcome {
        let _permit = match self.gate.try_enter() {
            Ok(permit) => permit,
            Err(GateError::Busy(gate)) => {
                tracing::debug!(route = %self.name, gate = %gate, "Gate busy, rejecting");
                return Outcome::Busy;
            }
            Err(e) => {
                // Reported to the caller exactly like contention.
                tracing::error!(route = %self.name, gate = %self.gate.name(), error = %e, "Gate unavailable");
                return Outcome::Busy;
            }
        };

        let query = params.forward(&self.params);
        let start = Instant::now();
        tracing::debug!(route = %self.name, upstream = %self.upstream, query = %query, "Forwarding to upstream");

        match client.get(&self.upstream, &query).await {
            Ok(reply) => {
                if !reply.status.is_success() {
                    tracing::warn!(
                        route = %self.name,
                        upstream = %self.upstream,
                        status = %reply.status,
                        "Upstream answered with non-success status"
                    );
                }
                tracing::debug!(
                    route = %self.name,
                    bytes = reply.body.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Upstream replied"
                );
                Outcome::Forwarded(reply.body)
            }
            Err(e) => {
                tracing::error!(route = %self.name, upstream = %self.upstream, error = %e, "Upstream error");
                Outcome::UpstreamFailed(e)
            }
        }
    }
}

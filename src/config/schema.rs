//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Lock file shared by the built-in sampler routes.
pub const DEFAULT_LOCK_PATH: &str = "/tmp/flock";

/// Name of the gate shared by the built-in sampler routes.
pub const DEFAULT_GATE: &str = "sampler";

/// Path of the JSON status endpoint. No sampler route may use it.
pub const HEALTH_PATH: &str = "/healthz";

/// Root configuration for the sampler gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Mutual-exclusion resources guarding upstream samplers.
    pub gates: Vec<GateConfig>,

    /// Sampler routes mapping inbound paths to upstreams.
    pub routes: Vec<RouteConfig>,

    /// File upload endpoint.
    pub upload: UploadConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Response status policy.
    pub responses: ResponseConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            gates: vec![GateConfig {
                name: DEFAULT_GATE.to_string(),
                kind: GateKind::File,
                path: Some(PathBuf::from(DEFAULT_LOCK_PATH)),
            }],
            routes: default_routes(),
            upload: UploadConfig::default(),
            timeouts: TimeoutConfig::default(),
            responses: ResponseConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Look up a gate definition by name.
    pub fn gate(&self, name: &str) -> Option<&GateConfig> {
        self.gates.iter().find(|g| g.name == name)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// How a gate enforces mutual exclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GateKind {
    /// Advisory `flock` on a file; excludes other processes too.
    File,
    /// Single-slot semaphore living as long as the server.
    Memory,
}

/// A named mutual-exclusion resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct GateConfig {
    /// Gate identifier referenced by routes.
    pub name: String,

    /// Locking mechanism.
    pub kind: GateKind,

    /// Lock file path. Required for `file` gates.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// A sampler route.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Inbound path matched exactly (e.g., "/inmt_sampler").
    pub path: String,

    /// Query parameters forwarded upstream, in outbound order.
    pub params: Vec<String>,

    /// Upstream sampling service.
    pub upstream: UpstreamConfig,

    /// Name of the gate serialising access to the upstream.
    #[serde(default = "default_gate_name")]
    pub gate: String,
}

fn default_gate_name() -> String {
    DEFAULT_GATE.to_string()
}

/// Upstream sampler address.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UpstreamConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_upstream_path")]
    pub path: String,
}

fn default_upstream_path() -> String {
    "/".to_string()
}

impl UpstreamConfig {
    fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            path: default_upstream_path(),
        }
    }
}

impl std::fmt::Display for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}{}", self.host, self.port, self.path)
    }
}

/// Parameters understood by the interactive sampler.
pub const INTERACTIVE_PARAMS: [&str; 7] = [
    "source",
    "prefix",
    "learn",
    "beam_size",
    "length_norm",
    "coverage_norm",
    "alpha_norm",
];

fn default_routes() -> Vec<RouteConfig> {
    let params = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();

    vec![
        RouteConfig {
            name: "inmt_sampler".to_string(),
            path: "/inmt_sampler".to_string(),
            params: params(&INTERACTIVE_PARAMS),
            upstream: UpstreamConfig::new("127.0.0.1", 6542),
            gate: default_gate_name(),
        },
        RouteConfig {
            name: "legacy_sampler".to_string(),
            path: "/legacy_sampler".to_string(),
            params: params(&INTERACTIVE_PARAMS[..3]),
            upstream: UpstreamConfig::new("localhost", 8888),
            gate: default_gate_name(),
        },
        RouteConfig {
            name: "sampler".to_string(),
            path: "/sampler".to_string(),
            params: params(&INTERACTIVE_PARAMS[..1]),
            upstream: UpstreamConfig::new("158.42.161.42", 6542),
            gate: default_gate_name(),
        },
    ]
}

/// Upload endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Enable the upload endpoint.
    pub enabled: bool,

    /// Inbound path (POST).
    pub path: String,

    /// Multipart field carrying the file.
    pub field_name: String,

    /// Largest accepted file in bytes.
    pub max_file_bytes: usize,

    /// Largest accepted request body in bytes (multipart framing included).
    pub max_body_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/load_file".to_string(),
            field_name: "source_file".to_string(),
            max_file_bytes: 1_000_000,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Upstream call (request + body read) timeout in seconds. 0 disables it.
    pub upstream_secs: u64,

    /// Inbound request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            upstream_secs: 0,
            request_secs: 300,
        }
    }
}

/// Response status policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// Answer every sampler and upload outcome with 200; errors only show in the body.
    pub legacy_status: bool,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            legacy_status: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

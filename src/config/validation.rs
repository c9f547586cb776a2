//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes reference existing gates)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Detect conflicting routes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::{GateKind, GatewayConfig, HEALTH_PATH};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),
    #[error("duplicate gate name '{0}'")]
    DuplicateGate(String),
    #[error("file gate '{0}' has no path")]
    MissingLockPath(String),
    #[error("duplicate route name '{0}'")]
    DuplicateRouteName(String),
    #[error("route '{route}': path '{path}' already in use")]
    DuplicateRoutePath { route: String, path: String },
    #[error("route '{route}': path '{path}' must start with '/'")]
    RoutePath { route: String, path: String },
    #[error("route '{route}' references unknown gate '{gate}'")]
    UnknownGate { route: String, gate: String },
    #[error("route '{route}': upstream {reason}")]
    Upstream { route: String, reason: &'static str },
    #[error("route '{0}': empty parameter name")]
    EmptyParam(String),
    #[error("upload: {0}")]
    Upload(&'static str),
    #[error("timeouts: {0}")]
    Timeout(&'static str),
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    let mut gate_names = HashSet::new();
    for gate in &config.gates {
        if !gate_names.insert(gate.name.as_str()) {
            errors.push(ValidationError::DuplicateGate(gate.name.clone()));
        }
        if gate.kind == GateKind::File && gate.path.is_none() {
            errors.push(ValidationError::MissingLockPath(gate.name.clone()));
        }
    }

    let mut route_names = HashSet::new();
    let mut route_paths = HashSet::from([HEALTH_PATH]);
    if config.upload.enabled {
        route_paths.insert(config.upload.path.as_str());
    }
    for route in &config.routes {
        if !route_names.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateRouteName(route.name.clone()));
        }
        if !route.path.starts_with('/') {
            errors.push(ValidationError::RoutePath {
                route: route.name.clone(),
                path: route.path.clone(),
            });
        } else if !route_paths.insert(route.path.as_str()) {
            errors.push(ValidationError::DuplicateRoutePath {
                route: route.name.clone(),
                path: route.path.clone(),
            });
        }
        if !gate_names.contains(route.gate.as_str()) {
            errors.push(ValidationError::UnknownGate {
                route: route.name.clone(),
                gate: route.gate.clone(),
            });
        }
        if route.upstream.host.is_empty() {
            errors.push(ValidationError::Upstream { route: route.name.clone(), reason: "host is empty" });
        }
        if route.upstream.port == 0 {
            errors.push(ValidationError::Upstream { route: route.name.clone(), reason: "port must be non-zero" });
        }
        if !route.upstream.path.starts_with('/') {
            errors.push(ValidationError::Upstream { route: route.name.clone(), reason: "path must start with '/'" });
        }
        if route.params.iter().any(|p| p.is_empty()) {
            errors.push(ValidationError::EmptyParam(route.name.clone()));
        }
    }

    let upload = &config.upload;
    if upload.enabled {
        if !upload.path.starts_with('/') {
            errors.push(ValidationError::Upload("path must start with '/'"));
        }
        if upload.field_name.is_empty() {
            errors.push(ValidationError::Upload("field_name is empty"));
        }
        if upload.max_file_bytes == 0 {
            errors.push(ValidationError::Upload("max_file_bytes must be > 0"));
        }
        if upload.max_body_bytes < upload.max_file_bytes {
            errors.push(ValidationError::Upload("max_body_bytes must be >= max_file_bytes"));
        }
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::Timeout("connect_secs must be > 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Timeout("request_secs must be > 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

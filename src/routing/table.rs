//! Route lookup.
//!
//! # Design Decisions
//! - Immutable after construction; a reload builds a fresh table
//! - Exact path match via HashMap, one trailing slash tolerated
//! - Explicit no-match rather than a silent default

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::gateway::{GateRegistry, SamplerRoute};

/// Failure compiling routes from a config.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteTableError {
    #[error("route '{route}' references unknown gate '{gate}'")]
    UnknownGate { route: String, gate: String },
    #[error("gate '{0}' cannot be built (file gate without path?)")]
    Gate(String),
}

/// Compiled sampler routes keyed by inbound path.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: HashMap<String, Arc<SamplerRoute>>,
}

impl RouteTable {
    /// Compile the routes of `config`, resolving gates through `gates`.
    pub fn build(config: &GatewayConfig, gates: &GateRegistry) -> Result<Self, RouteTableError> {
        let mut routes = HashMap::with_capacity(config.routes.len());

        for route in &config.routes {
            let gate_config = config.gate(&route.gate).ok_or_else(|| RouteTableError::UnknownGate {
                route: route.name.clone(),
                gate: route.gate.clone(),
            })?;
            let gate = gates
                .resolve(gate_config)
                .ok_or_else(|| RouteTableError::Gate(gate_config.name.clone()))?;

            routes.insert(
                route.path.clone(),
                Arc::new(SamplerRoute {
                    name: route.name.clone(),
                    params: route.params.clone(),
                    upstream: route.upstream.clone(),
                    gate,
                }),
            );
        }
        gates.retain(&config.gates);

        Ok(Self { routes })
    }

    /// Find the route serving `path`.
    pub fn lookup(&self, path: &str) -> Option<Arc<SamplerRoute>> {
        self.routes
            .get(path)
            .or_else(|| {
                let trimmed = path.strip_suffix('/').filter(|p| !p.is_empty())?;
                self.routes.get(trimmed)
            })
            .cloned()
    }

    /// Routes sorted by path.
    pub fn routes(&self) -> Vec<(&str, &SamplerRoute)> {
        let mut all: Vec<_> = self.routes.iter().map(|(p, r)| (p.as_str(), r.as_ref())).collect();
        all.sort_by_key(|(p, _)| *p);
        all
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

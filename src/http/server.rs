//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with sampler, upload and status handlers
//! - Wire up middleware (request ID, tracing)
//! - Bound every sampler and upload request by `timeouts.request_secs`
//! - Bind server to listener and shut down gracefully
//! - Swap in a new route table when a reloaded config arrives

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{multipart::Multipart, DefaultBodyLimit, FromRequest, RawQuery, Request, State},
    http::{StatusCode, Uri},
    response::Response,
    routing::{get, post},
    Router,
};
use http_body_util::Limited;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::schema::HEALTH_PATH;
use crate::config::validation::validate_config;
use crate::config::{ConfigError, GatewayConfig};
use crate::gateway::{Gate, GateRegistry, Outcome, RequestParams, UpstreamClient, UpstreamError};
use crate::http::request::{make_span, propagate_request_id_layer, set_request_id_layer};
use crate::http::response::{plain_text, ResponsePolicy};
use crate::http::status::get_status;
use crate::lifecycle::shutdown::stopped;
use crate::observability::metrics;
use crate::routing::{RouteTable, RouteTableError};
use crate::upload::{self, UploadError};

/// Everything a request needs, rebuilt as a whole on reload.
pub struct Runtime {
    pub config: GatewayConfig,
    pub routes: RouteTable,
    pub client: UpstreamClient,
    pub policy: ResponsePolicy,
}

impl Runtime {
    fn build(config: GatewayConfig, gates: &GateRegistry) -> Result<Self, RouteTableError> {
        let routes = RouteTable::build(&config, gates)?;
        let timeouts = &config.timeouts;
        let client = UpstreamClient::new(
            Duration::from_secs(timeouts.connect_secs),
            (timeouts.upstream_secs > 0).then(|| Duration::from_secs(timeouts.upstream_secs)),
        );
        let policy = ResponsePolicy::new(&config.responses);
        Ok(Self {
            config,
            routes,
            client,
            policy,
        })
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    runtime: Arc<ArcSwap<Runtime>>,
    gates: Arc<GateRegistry>,
}

impl AppState {
    /// Current runtime snapshot. Stays valid for the whole request even if a
    /// reload lands meanwhile.
    pub fn runtime(&self) -> Arc<Runtime> {
        self.runtime.load_full()
    }

    /// Validate `config` and make it live.
    pub fn apply(&self, config: GatewayConfig) -> Result<(), String> {
        if let Err(errors) = validate_config(&config) {
            return Err(ConfigError::Validation(errors).to_string());
        }
        let current = self.runtime();
        if config.listener.bind_address != current.config.listener.bind_address {
            tracing::warn!(
                bind_address = %config.listener.bind_address,
                "Listener changes need a restart, keeping current socket"
            );
        }
        if config.upload.path != current.config.upload.path || config.upload.enabled != current.config.upload.enabled {
            tracing::warn!("Upload endpoint changes need a restart");
        }

        let runtime = Runtime::build(config, &self.gates).map_err(|e| e.to_string())?;
        tracing::info!(routes = runtime.routes.len(), "Configuration applied");
        self.runtime.store(Arc::new(runtime));
        Ok(())
    }
}

/// HTTP server for the sampler gateway.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, RouteTableError> {
        let gates = Arc::new(GateRegistry::new());
        let runtime = Runtime::build(config, &gates)?;
        let router = Self::build_router(&runtime.config);
        let state = AppState {
            runtime: Arc::new(ArcSwap::from_pointee(runtime)),
            gates,
        };

        Ok(Self {
            router: router.with_state(state.clone()),
            state,
        })
    }

    fn build_router(config: &GatewayConfig) -> Router<AppState> {
        let mut router = Router::new()
            .route(HEALTH_PATH, get(get_status))
            .route("/", get(sampler_handler))
            .route("/{*path}", get(sampler_handler));

        if config.upload.enabled {
            router = router.route(
                &config.upload.path,
                // The limit comes from the live config in `upload_handler`.
                post(upload_handler).layer(DefaultBodyLimit::disable()),
            );
        }

        router.layer(
            ServiceBuilder::new()
                .layer(set_request_id_layer())
                .layer(propagate_request_id_layer())
                .layer(TraceLayer::new_for_http().make_span_with(make_span)),
        )
    }

    /// Shared state, for applying configs from outside.
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// The finished router, e.g. for driving with `tower::ServiceExt::oneshot`.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires, applying configs from `config_updates`.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        tokio::spawn(reload_loop(self.state.clone(), config_updates, shutdown.resubscribe()));

        axum::serve(listener, self.router)
            .with_graceful_shutdown(stopped(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn reload_loop(
    state: AppState,
    mut updates: mpsc::UnboundedReceiver<GatewayConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(config) = update else { break };
                match state.apply(config) {
                    Ok(()) => metrics::record_reload(true),
                    Err(e) => {
                        metrics::record_reload(false);
                        tracing::error!(error = %e, "Rejected configuration, keeping current one");
                    }
                }
            }
            _ = shutdown.recv() => break,
        }
    }
    tracing::debug!("Config reload loop finished");
}

/// Serialized proxy handler for every sampler route.
async fn sampler_handler(State(state): State<AppState>, uri: Uri, RawQuery(query): RawQuery) -> Response {
    let start = Instant::now();
    let runtime = state.runtime();

    let Some(route) = runtime.routes.lookup(uri.path()) else {
        tracing::warn!(path = %uri.path(), "No route matched");
        return plain_text(StatusCode::NOT_FOUND, "No matching route found");
    };

    let params = RequestParams::from_query(query.as_deref().unwrap_or(""));
    let limit = Duration::from_secs(runtime.config.timeouts.request_secs);
    // Dropping the handle future on expiry releases the gate.
    let outcome = match tokio::time::timeout(limit, route.handle(&runtime.client, &params)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            tracing::warn!(route = %route.name, timeout_secs = limit.as_secs(), "Request timed out");
            Outcome::UpstreamFailed(UpstreamError::Timeout(limit))
        }
    };

    tracing::info!(
        route = %route.name,
        outcome = outcome.label(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Sampler request finished"
    );
    metrics::record_request(&route.name, route.gate.name(), outcome.label(), start);
    runtime.policy.sampler(outcome)
}

/// File upload handler.
async fn upload_handler(State(state): State<AppState>, request: Request) -> Response {
    let runtime = state.runtime();
    let upload = &runtime.config.upload;
    let limit = Duration::from_secs(runtime.config.timeouts.request_secs);
    let request = request.map(|body| Body::new(Limited::new(body, upload.max_body_bytes)));

    let result = match Multipart::from_request(request, &state).await {
        Ok(multipart) => {
            let process = upload::process(multipart, &upload.field_name, upload.max_file_bytes);
            match tokio::time::timeout(limit, process).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(timeout_secs = limit.as_secs(), "Upload timed out");
                    Err(UploadError::Unknown)
                }
            }
        }
        Err(rejection) => {
            tracing::warn!(error = %rejection, "Upload is not multipart");
            Err(UploadError::InvalidParameters)
        }
    };

    match &result {
        Ok(text) => {
            tracing::info!(chars = text.chars().count(), "Upload transcoded");
            metrics::record_upload("ok");
        }
        Err(e) => {
            tracing::info!(error = %e, "Upload rejected");
            metrics::record_upload(e.label());
        }
    }
    runtime.policy.upload(result)
}

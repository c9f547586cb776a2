use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::gateway::Gate;
use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct GatewayStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub routes: Vec<RouteStatus>,
}

#[derive(Debug, Serialize)]
pub struct RouteStatus {
    pub name: String,
    pub path: String,
    pub upstream: String,
    pub gate: String,
    pub params: Vec<String>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<GatewayStatus> {
    let runtime = state.runtime();
    let routes = runtime
        .routes
        .routes()
        .into_iter()
        .map(|(path, route)| RouteStatus {
            name: route.name.clone(),
            path: path.to_string(),
            upstream: route.upstream.to_string(),
            gate: route.gate.name().to_string(),
            params: route.params.clone(),
        })
        .collect();

    Json(GatewayStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        routes,
    })
}

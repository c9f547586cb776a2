//! Serialized proxy gateway for interactive sampling services.

pub mod config;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod upload;

pub use config::GatewayConfig;
pub use gateway::{Outcome, BUSY_MESSAGE};
pub use http::HttpServer;
pub use lifecycle::Shutdown;

//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, tracing span)
//!     → routing lookup → gateway (sampler routes) | upload
//!     → response.rs (status policy, plain-text body)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod status;

pub use request::X_REQUEST_ID;
pub use response::ResponsePolicy;
pub use server::{AppState, HttpServer};

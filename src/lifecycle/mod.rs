//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → server stops accepting, drains in-flight requests
//!             → reload loop exits
//! ```
//!
//! In-flight sampler requests finish normally during drain, so a held gate is
//! released by its own request rather than by process exit.

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;

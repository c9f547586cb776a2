//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming GET (path)
//!     → table.rs (exact path lookup)
//!     → Return: SamplerRoute or NoMatch
//!
//! Route Compilation (startup and every reload):
//!     RouteConfig[] + GateConfig[]
//!     → resolve gates through the shared GateRegistry
//!     → Freeze as immutable RouteTable
//! ```

pub mod table;

pub use table::{RouteTable, RouteTableError};

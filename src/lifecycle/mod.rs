//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Gateway::bootstrap → Initial refresh → Start listeners
//!
//! Reload (startup.rs):
//!     New config → Gateway::apply_config → holder refresh + refresh event
//!     Dispatcher → RoutingRefresher → chains rebuilt → Router swap
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger → Servers drain → Dispatcher exits → Cache cleared
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Listeners start after the first refresh is queued

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{Gateway, StartupError};

//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Exchange (host, path)
//!     → router.rs (route lookup)
//!     → matcher.rs (evaluate match conditions)
//!     → Return: matched route id or no match
//!
//! Route Compilation (at startup and on reload):
//!     RouteConfig[]
//!     → Sort by priority
//!     → Compile matchers
//!     → Carried on the refresh event
//!     → refresher.rs: swap in once the chains for the same revision are live
//! ```
//!
//! # Design Decisions
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - First match wins (ordered by priority)
//! - Matching only yields the route id; filters come from the chain cache

pub mod matcher;
pub mod refresher;
pub mod router;

pub use refresher::RoutingRefresher;
pub use router::Router;

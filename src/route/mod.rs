//! Route topology.
//!
//! # Data Flow
//! ```text
//! Config [RouteConfig]
//!     → locator.rs (build each route's filters via the factory registry)
//!     → Vec<Route> (immutable, one topology)
//!     → refresh subsystem (event carries the locator)
//!     → chain cache rebuild
//! ```
//!
//! # Design Decisions
//! - A `Route` is immutable once built; a new topology means new routes
//! - The locator is the only source of truth for "all routes"
//! - Request matching lives in `routing`, not here

pub mod locator;
pub mod policy;

pub use locator::{ConfigRouteLocator, RouteLocator};
pub use policy::{PolicyDirectory, UpstreamPolicy};

use std::sync::Arc;

use crate::filter::SharedFilter;

/// A named routing rule and its route-scoped filters.
#[derive(Debug, Clone)]
pub struct Route {
    id: String,
    filters: Arc<[SharedFilter]>,
}

impl Route {
    pub fn new(id: impl Into<String>, filters: Vec<SharedFilter>) -> Self {
        Self {
            id: id.into(),
            filters: Arc::from(filters),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Route filters in declaration sequence.
    pub fn filters(&self) -> &[SharedFilter] {
        &self.filters
    }
}

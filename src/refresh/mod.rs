//! Topology-change trigger.
//!
//! # Data Flow
//! ```text
//! Topology source (config reload, admin API, startup)
//!     → bus.rs (RefreshBus::publish, unbounded mpsc)
//!     → RefreshDispatcher task (one event at a time)
//!     → listener.rs (ChainCacheRefresher, wrapped by routing::RoutingRefresher)
//!         success + locator: rebuild cache, publish new snapshot
//!         failure:           skip, previous snapshot stays current
//! ```
//!
//! # Design Decisions
//! - Rebuilds run outside the request path, on the dispatcher task
//! - Delivery is serialized, so rebuilds never race each other
//! - Failed refreshes back off to the last good snapshot
//! - An event may carry the routing table built from the same revision; it goes
//!   live only once that revision's chains are published

pub mod bus;
pub mod listener;

pub use bus::{RefreshBus, RefreshDispatcher};
pub use listener::{ChainCacheRefresher, RefreshError, RefreshOutcome, TopologyListener};

use std::sync::Arc;

use crate::route::RouteLocator;
use crate::routing::Router;

/// Result of one topology refresh attempt.
#[derive(Debug, Clone)]
pub struct RefreshRoutesEvent {
    success: bool,
    locator: Option<Arc<dyn RouteLocator>>,
    router: Option<Arc<Router>>,
    error: Option<String>,
}

impl RefreshRoutesEvent {
    /// The topology was refreshed; `locator` yields the full route set.
    pub fn succeeded(locator: Arc<dyn RouteLocator>) -> Self {
        Self {
            success: true,
            locator: Some(locator),
            router: None,
            error: None,
        }
    }

    /// The topology refresh failed.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            locator: None,
            router: None,
            error: Some(reason.into()),
        }
    }

    /// Attach the routing table that matches this topology.
    pub fn with_router(mut self, router: Arc<Router>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn locator(&self) -> Option<&Arc<dyn RouteLocator>> {
        self.locator.as_ref()
    }

    pub fn router(&self) -> Option<&Arc<Router>> {
        self.router.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

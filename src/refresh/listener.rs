//! Topology listeners.

use std::sync::Arc;

use crate::chain::{ChainError, RouteFilterChainCache};
use crate::refresh::RefreshRoutesEvent;

/// Reacts to topology refresh notifications.
pub trait TopologyListener: Send + Sync {
    fn on_topology_refreshed(
        &self,
        event: &RefreshRoutesEvent,
    ) -> Result<RefreshOutcome, RefreshError>;
}

/// What a listener did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The event was not applicable (failed refresh or no route source).
    Skipped,
    /// The cache was rebuilt and a new snapshot published.
    Rebuilt { generation: u64, routes: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("filter chain rebuild failed: {0}")]
    Rebuild(#[from] ChainError),

    #[error("refresh bus is closed")]
    BusClosed,
}

/// Rebuilds the route filter-chain cache on every successful refresh.
#[derive(Debug, Clone)]
pub struct ChainCacheRefresher {
    cache: Arc<RouteFilterChainCache>,
}

impl ChainCacheRefresher {
    pub fn new(cache: Arc<RouteFilterChainCache>) -> Self {
        Self { cache }
    }
}

impl TopologyListener for ChainCacheRefresher {
    fn on_topology_refreshed(
        &self,
        event: &RefreshRoutesEvent,
    ) -> Result<RefreshOutcome, RefreshError> {
        let locator = match event.locator() {
            Some(locator) if event.is_success() => locator,
            _ => {
                tracing::info!(
                    reason = event.error().unwrap_or("no route source"),
                    generation = self.cache.generation(),
                    "Topology refresh not applicable, keeping current filter chains"
                );
                return Ok(RefreshOutcome::Skipped);
            }
        };

        let routes = locator.routes();
        let generation = self.cache.rebuild(&routes)?;
        Ok(RefreshOutcome::Rebuilt {
            generation,
            routes: routes.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::CompositionLimits;
    use crate::route::{ConfigRouteLocator, Route};

    fn refresher() -> (ChainCacheRefresher, Arc<RouteFilterChainCache>) {
        let cache = Arc::new(RouteFilterChainCache::new(vec![], CompositionLimits::default()));
        (ChainCacheRefresher::new(cache.clone()), cache)
    }

    #[test]
    fn test_successful_refresh_rebuilds() {
        let (refresher, cache) = refresher();
        let event = RefreshRoutesEvent::succeeded(Arc::new(ConfigRouteLocator::new(vec![
            Route::new("r1", vec![]),
            Route::new("r2", vec![]),
        ])));

        let outcome = refresher.on_topology_refreshed(&event).unwrap();
        assert_eq!(outcome, RefreshOutcome::Rebuilt { generation: 1, routes: 2 });
        assert!(cache.is_warm());
    }

    #[test]
    fn test_failed_refresh_is_skipped() {
        let (refresher, cache) = refresher();
        let outcome = refresher
            .on_topology_refreshed(&RefreshRoutesEvent::failed("discovery timeout"))
            .unwrap();
        assert_eq!(outcome, RefreshOutcome::Skipped);
        assert!(!cache.is_warm());
    }

    #[test]
    fn test_bad_topology_surfaces_error() {
        let (refresher, cache) = refresher();
        let event = RefreshRoutesEvent::succeeded(Arc::new(ConfigRouteLocator::new(vec![
            Route::new("dup", vec![]),
            Route::new("dup", vec![]),
        ])));

        let err = refresher.on_topology_refreshed(&event).unwrap_err();
        assert!(matches!(err, RefreshError::Rebuild(ChainError::DuplicateRouteId(_))));
        assert!(!cache.is_warm());
    }
}

//! Dispatch entry point.
//!
//! # Data Flow
//! ```text
//! Exchange (route id set by the matcher)
//!     → RouteFilterChainCache::lookup (lock-free)
//!     → FilterExecutor::execute (ordered chain)
//!     → FilterAction (continue to upstream, or respond now)
//! ```
//!
//! # Design Decisions
//! - No chain is computed here; a cold cache simply yields no filters
//! - A missing route id is a caller bug, reported as an error

use std::sync::Arc;

use crate::chain::{FilterExecutor, RouteFilterChainCache, SequentialExecutor};
use crate::filter::{Exchange, FilterAction, FilterError};
use crate::observability::metrics;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("exchange {request_id} has no matched route")]
    MissingRoute { request_id: String },

    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// Looks up the cached chain of the matched route and runs it.
#[derive(Clone)]
pub struct FilteringHandler {
    cache: Arc<RouteFilterChainCache>,
    executor: Arc<dyn FilterExecutor>,
}

impl FilteringHandler {
    /// Handler using the sequential executor.
    pub fn new(cache: Arc<RouteFilterChainCache>) -> Self {
        Self::with_executor(cache, Arc::new(SequentialExecutor))
    }

    pub fn with_executor(
        cache: Arc<RouteFilterChainCache>,
        executor: Arc<dyn FilterExecutor>,
    ) -> Self {
        Self { cache, executor }
    }

    pub fn cache(&self) -> &Arc<RouteFilterChainCache> {
        &self.cache
    }

    pub fn handle(&self, exchange: &mut Exchange) -> Result<FilterAction, DispatchError> {
        let chain = match exchange.route_id.as_deref() {
            Some(route_id) => self.cache.lookup(route_id),
            None => {
                return Err(DispatchError::MissingRoute {
                    request_id: exchange.request_id.clone(),
                })
            }
        };

        metrics::record_lookup(!chain.is_empty());
        tracing::trace!(
            request_id = %exchange.request_id,
            route = ?exchange.route_id,
            filters = chain.len(),
            "Dispatching filter chain"
        );

        Ok(self.executor.execute(&chain, exchange)?)
    }
}

impl std::fmt::Debug for FilteringHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilteringHandler")
            .field("generation", &self.cache.generation())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::CompositionLimits;
    use crate::filter::builtin::{RequestLogFilter, SetAttributeFilter};
    use crate::route::Route;
    use axum::http::Method;

    fn handler() -> FilteringHandler {
        let cache = Arc::new(RouteFilterChainCache::new(
            vec![Arc::new(RequestLogFilter)],
            CompositionLimits::default(),
        ));
        FilteringHandler::new(cache)
    }

    #[test]
    fn test_cold_cache_runs_nothing() {
        let handler = handler();
        let mut exchange = Exchange::new(Method::GET, "/").with_route("r1");
        assert_eq!(handler.handle(&mut exchange).unwrap(), FilterAction::Continue);
        assert!(exchange.trace().is_empty());
    }

    #[test]
    fn test_runs_cached_chain() {
        let handler = handler();
        handler
            .cache()
            .rebuild(&[Route::new("r1", vec![Arc::new(SetAttributeFilter::new("k", "v"))])])
            .unwrap();

        let mut exchange = Exchange::new(Method::GET, "/").with_route("r1");
        handler.handle(&mut exchange).unwrap();
        assert_eq!(exchange.trace(), ["request_log", "set_attribute"]);
        assert_eq!(exchange.attribute("k"), Some("v"));
    }

    #[test]
    fn test_missing_route_is_error() {
        let handler = handler();
        let mut exchange = Exchange::new(Method::GET, "/");
        assert!(matches!(
            handler.handle(&mut exchange),
            Err(DispatchError::MissingRoute { .. })
        ));
    }
}

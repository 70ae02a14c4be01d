//! Publishes routing tables in step with the filter-chain cache.

use arc_swap::ArcSwap;
use std::sync::Arc;

use crate::chain::RouteFilterChainCache;
use crate::refresh::{
    ChainCacheRefresher, RefreshError, RefreshOutcome, RefreshRoutesEvent, TopologyListener,
};
use crate::routing::Router;

/// Rebuilds the chain cache, then makes the event's routing table live.
///
/// While the rebuild runs, the live router only holds routes that already
/// have a published chain, so a matched route is never served unfiltered.
/// A failed rebuild restores the previous router.
#[derive(Debug)]
pub struct RoutingRefresher {
    chains: ChainCacheRefresher,
    cache: Arc<RouteFilterChainCache>,
    router: Arc<ArcSwap<Router>>,
}

impl RoutingRefresher {
    pub fn new(cache: Arc<RouteFilterChainCache>, router: Arc<ArcSwap<Router>>) -> Self {
        Self {
            chains: ChainCacheRefresher::new(cache.clone()),
            cache,
            router,
        }
    }
}

impl TopologyListener for RoutingRefresher {
    fn on_topology_refreshed(
        &self,
        event: &RefreshRoutesEvent,
    ) -> Result<RefreshOutcome, RefreshError> {
        let next = match event.router() {
            Some(next) if event.is_success() && event.locator().is_some() => Arc::clone(next),
            _ => return self.chains.on_topology_refreshed(event),
        };

        let previous = self.router.load_full();
        let published = self.cache.snapshot();
        self.router.store(Arc::new(next.restricted_to(|id| {
            published
                .as_ref()
                .is_some_and(|snapshot| snapshot.get(id).is_some())
        })));

        match self.chains.on_topology_refreshed(event) {
            Ok(outcome) => {
                tracing::debug!(routes = next.len(), "Routing table published");
                self.router.store(next);
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Restoring previous routing table");
                self.router.store(previous);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::CompositionLimits;
    use crate::config::RouteConfig;
    use crate::filter::{Exchange, Filter, FilterAction, FilterError};
    use crate::route::{ConfigRouteLocator, Route, RouteLocator};
    use axum::http::Method;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct Marker;

    impl Filter for Marker {
        fn name(&self) -> &str {
            "marker"
        }

        fn order(&self) -> i32 {
            0
        }

        fn filter(&self, _exchange: &mut Exchange) -> Result<FilterAction, FilterError> {
            Ok(FilterAction::Continue)
        }
    }

    /// Route source that records the live routing table when it is read mid-rebuild.
    #[derive(Debug)]
    struct ObservingLocator {
        routes: Vec<Route>,
        router: Arc<ArcSwap<Router>>,
        seen: Mutex<Vec<String>>,
    }

    impl RouteLocator for ObservingLocator {
        fn routes(&self) -> Vec<Route> {
            let live = self.router.load();
            *self.seen.lock().unwrap() = live.route_ids().map(str::to_string).collect();
            self.routes.clone()
        }
    }

    fn route_config(id: &str, prefix: &str) -> RouteConfig {
        RouteConfig {
            id: id.to_string(),
            host: None,
            path_prefix: Some(prefix.to_string()),
            priority: 0,
            filters: vec![],
        }
    }

    fn routes(configs: &[RouteConfig]) -> Vec<Route> {
        configs.iter().map(|c| Route::new(c.id.clone(), vec![])).collect()
    }

    fn event(configs: &[RouteConfig]) -> RefreshRoutesEvent {
        RefreshRoutesEvent::succeeded(Arc::new(ConfigRouteLocator::new(routes(configs))))
            .with_router(Arc::new(Router::from_config(configs)))
    }

    fn refresher() -> (RoutingRefresher, Arc<ArcSwap<Router>>, Arc<RouteFilterChainCache>) {
        let cache = Arc::new(RouteFilterChainCache::new(
            vec![Arc::new(Marker)],
            CompositionLimits::default(),
        ));
        let router = Arc::new(ArcSwap::from_pointee(Router::default()));
        (RoutingRefresher::new(cache.clone(), router.clone()), router, cache)
    }

    #[test]
    fn test_router_published_after_rebuild() {
        let (refresher, router, cache) = refresher();
        let outcome = refresher
            .on_topology_refreshed(&event(&[route_config("api", "/api")]))
            .unwrap();

        assert_eq!(outcome, RefreshOutcome::Rebuilt { generation: 1, routes: 1 });
        let exchange = Exchange::new(Method::GET, "/api/x");
        assert_eq!(router.load().match_route(&exchange), Some("api"));
        assert_eq!(cache.lookup("api").names(), ["marker"]);
    }

    #[test]
    fn test_new_route_hidden_while_rebuilding() {
        let (refresher, router, cache) = refresher();
        refresher
            .on_topology_refreshed(&event(&[route_config("api", "/api")]))
            .unwrap();

        let configs = [route_config("api", "/api"), route_config("beta", "/beta")];
        let locator = Arc::new(ObservingLocator {
            routes: routes(&configs),
            router: router.clone(),
            seen: Mutex::new(vec![]),
        });
        let next = RefreshRoutesEvent::succeeded(locator.clone())
            .with_router(Arc::new(Router::from_config(&configs)));
        refresher.on_topology_refreshed(&next).unwrap();

        assert_eq!(*locator.seen.lock().unwrap(), ["api"]);
        assert_eq!(router.load().len(), 2);
        for id in router.load().route_ids() {
            assert_eq!(cache.lookup(id).names(), ["marker"], "route {id}");
        }
    }

    #[test]
    fn test_cold_cache_routes_nothing_while_rebuilding() {
        let (refresher, router, _cache) = refresher();
        let configs = [route_config("api", "/api")];
        let locator = Arc::new(ObservingLocator {
            routes: routes(&configs),
            router: router.clone(),
            seen: Mutex::new(vec!["stale".to_string()]),
        });
        let first = RefreshRoutesEvent::succeeded(locator.clone())
            .with_router(Arc::new(Router::from_config(&configs)));
        refresher.on_topology_refreshed(&first).unwrap();

        assert!(locator.seen.lock().unwrap().is_empty());
        assert_eq!(router.load().len(), 1);
    }

    #[test]
    fn test_failed_rebuild_restores_router() {
        let (refresher, router, _cache) = refresher();
        refresher
            .on_topology_refreshed(&event(&[route_config("api", "/api")]))
            .unwrap();

        let duplicate = event(&[route_config("dup", "/a"), route_config("dup", "/b")]);
        assert!(refresher.on_topology_refreshed(&duplicate).is_err());

        let exchange = Exchange::new(Method::GET, "/api/x");
        assert_eq!(router.load().match_route(&exchange), Some("api"));
        assert_eq!(router.load().len(), 1);
    }

    #[test]
    fn test_failed_event_leaves_router_alone() {
        let (refresher, router, _cache) = refresher();
        let outcome = refresher
            .on_topology_refreshed(&RefreshRoutesEvent::failed("discovery down"))
            .unwrap();
        assert_eq!(outcome, RefreshOutcome::Skipped);
        assert!(router.load().is_empty());
    }
}

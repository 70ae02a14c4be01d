//! Startup orchestration.
//!
//! # Responsibilities
//! - Build every subsystem from one validated configuration
//! - Wire the refresh bus to the chain cache and router
//! - Apply later configuration revisions in place
//!
//! # Design Decisions
//! - Fail fast: an unbuildable global filter is fatal at startup
//! - Global filters and composition limits are fixed for the process lifetime
//! - A revision whose routes cannot be built is rejected whole
//! - The router starts empty and only changes on the dispatcher, after the
//!   chains of the same revision are published

use arc_swap::ArcSwap;
use std::sync::Arc;

use crate::chain::{CompositionLimits, RouteFilterChainCache};
use crate::config::GatewayConfig;
use crate::delegate::{ContextRegistry, RefreshableRegistry};
use crate::filter::{FilterBuildError, FilterFactoryRegistry};
use crate::handler::FilteringHandler;
use crate::refresh::{RefreshBus, RefreshDispatcher, RefreshError, RefreshRoutesEvent};
use crate::route::locator::RouteBuildError;
use crate::route::{ConfigRouteLocator, PolicyDirectory};
use crate::routing::{Router, RoutingRefresher};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid global filter: {0}")]
    GlobalFilter(#[from] FilterBuildError),

    #[error("invalid route: {0}")]
    Route(#[from] RouteBuildError),

    #[error(transparent)]
    Refresh(#[from] RefreshError),
}

/// Every long-lived component of a running gateway.
pub struct Gateway {
    config: ArcSwap<GatewayConfig>,
    router: Arc<ArcSwap<Router>>,
    filters: FilterFactoryRegistry,
    cache: Arc<RouteFilterChainCache>,
    handler: FilteringHandler,
    policies: Arc<PolicyDirectory>,
    refreshables: RefreshableRegistry,
    bus: RefreshBus,
}

impl Gateway {
    /// Build the gateway. The cache stays cold and the router empty until the
    /// first refresh is delivered.
    ///
    /// The returned dispatcher must be driven (usually spawned) for refreshes to apply.
    pub fn bootstrap(
        config: GatewayConfig,
    ) -> Result<(Arc<Self>, RefreshDispatcher), StartupError> {
        let filters = FilterFactoryRegistry::with_builtins();
        let global_filters = filters.build_all(&config.global_filters)?;
        let limits = CompositionLimits {
            max_chain_length: config.cache.max_chain_length,
        };

        let cache = Arc::new(RouteFilterChainCache::new(global_filters, limits));
        let handler = FilteringHandler::new(cache.clone());

        let router = Arc::new(ArcSwap::from_pointee(Router::default()));
        let (bus, mut dispatcher) = RefreshBus::new();
        dispatcher.add_listener(Arc::new(RoutingRefresher::new(cache.clone(), router.clone())));

        let policies = Arc::new(PolicyDirectory::new(Arc::new(ContextRegistry::new())));
        policies.load(&config.contexts);

        let refreshables = RefreshableRegistry::new();
        refreshables.register(policies.clone());

        tracing::info!(
            global_filters = config.global_filters.len(),
            routes = config.routes.len(),
            contexts = config.contexts.len(),
            max_chain_length = limits.max_chain_length,
            "Gateway initialized"
        );

        let gateway = Self {
            router,
            config: ArcSwap::from_pointee(config),
            filters,
            cache,
            handler,
            policies,
            refreshables,
            bus,
        };
        Ok((Arc::new(gateway), dispatcher))
    }

    /// Publish a topology refresh for the current configuration.
    ///
    /// A route whose filters cannot be built publishes a failed event
    /// (the cache keeps its snapshot) and returns the build error.
    pub fn publish_refresh(&self) -> Result<usize, StartupError> {
        let config = self.config.load();
        match ConfigRouteLocator::from_config(&config.routes, &self.filters) {
            Ok(locator) => {
                let routes = locator.len();
                let router = Router::from_config(&config.routes);
                self.bus.publish(
                    RefreshRoutesEvent::succeeded(Arc::new(locator)).with_router(Arc::new(router)),
                )?;
                Ok(routes)
            }
            Err(e) => {
                self.bus.publish(RefreshRoutesEvent::failed(e.to_string()))?;
                Err(e.into())
            }
        }
    }

    /// Swap in a new configuration revision.
    ///
    /// Routes change once the dispatcher delivers the published refresh.
    pub fn apply_config(&self, config: GatewayConfig) -> Result<(), StartupError> {
        let locator = match ConfigRouteLocator::from_config(&config.routes, &self.filters) {
            Ok(locator) => locator,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "Rejected configuration revision, keeping current routes"
                );
                self.bus.publish(RefreshRoutesEvent::failed(e.to_string()))?;
                return Err(e.into());
            }
        };

        let current = self.config.load();
        if current.global_filters != config.global_filters {
            tracing::warn!("global_filters changed; restart required to apply");
        }
        if current.cache.max_chain_length != config.cache.max_chain_length {
            tracing::warn!("cache.max_chain_length changed; restart required to apply");
        }

        self.policies.load(&config.contexts);
        self.policies
            .retain_routes(config.routes.iter().map(|route| route.id.as_str()));
        let router = Router::from_config(&config.routes);
        tracing::info!(routes = config.routes.len(), "Configuration revision applied");
        self.config.store(Arc::new(config));
        self.refreshables.refresh_all();

        self.bus.publish(
            RefreshRoutesEvent::succeeded(Arc::new(locator)).with_router(Arc::new(router)),
        )?;
        Ok(())
    }

    pub fn config(&self) -> Arc<GatewayConfig> {
        self.config.load_full()
    }

    pub fn router(&self) -> Arc<Router> {
        self.router.load_full()
    }

    pub fn cache(&self) -> &Arc<RouteFilterChainCache> {
        &self.cache
    }

    pub fn handler(&self) -> &FilteringHandler {
        &self.handler
    }

    pub fn policies(&self) -> &Arc<PolicyDirectory> {
        &self.policies
    }

    pub fn refreshables(&self) -> &RefreshableRegistry {
        &self.refreshables
    }
}

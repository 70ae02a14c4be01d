//! Topology sources.

use std::fmt::Debug;

use crate::config::RouteConfig;
use crate::filter::{FilterBuildError, FilterFactoryRegistry};
use crate::route::Route;

/// Supplies the full current set of routes.
pub trait RouteLocator: Send + Sync + Debug {
    fn routes(&self) -> Vec<Route>;
}

/// Fixed topology, typically built from one configuration revision.
#[derive(Debug, Clone, Default)]
pub struct ConfigRouteLocator {
    routes: Vec<Route>,
}

impl ConfigRouteLocator {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// Build every configured route's filters.
    ///
    /// Fails on the first filter that cannot be built; the error names the route.
    pub fn from_config(
        configs: &[RouteConfig],
        registry: &FilterFactoryRegistry,
    ) -> Result<Self, RouteBuildError> {
        let mut routes = Vec::with_capacity(configs.len());
        for config in configs {
            let filters = registry
                .build_all(&config.filters)
                .map_err(|source| RouteBuildError {
                    route: config.id.clone(),
                    source,
                })?;
            routes.push(Route::new(config.id.clone(), filters));
        }
        Ok(Self { routes })
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl RouteLocator for ConfigRouteLocator {
    fn routes(&self) -> Vec<Route> {
        self.routes.clone()
    }
}

/// A route whose filters could not be built.
#[derive(Debug, thiserror::Error)]
#[error("route `{route}`: {source}")]
pub struct RouteBuildError {
    pub route: String,
    #[source]
    pub source: FilterBuildError,
}

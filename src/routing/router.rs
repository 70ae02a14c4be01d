//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up the matching route id for an exchange
//! - Return an explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction; a reload builds a new Router
//! - O(n) scan in priority order (acceptable for typical route counts)
//! - Equal priorities keep declaration order

use std::sync::Arc;

use crate::config::RouteConfig;
use crate::filter::Exchange;
use crate::routing::matcher::{AndMatcher, HostMatcher, Matcher, PathPrefixMatcher};

#[derive(Debug)]
struct CompiledRoute {
    id: String,
    priority: u32,
    matcher: AndMatcher,
}

/// Priority-ordered route table.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Arc<CompiledRoute>>,
}

impl Router {
    pub fn from_config(configs: &[RouteConfig]) -> Self {
        let mut routes: Vec<Arc<CompiledRoute>> = configs
            .iter()
            .map(|config| {
                let mut matchers: Vec<Box<dyn Matcher>> = Vec::new();
                if let Some(host) = &config.host {
                    matchers.push(Box::new(HostMatcher::new(host.clone())));
                }
                if let Some(prefix) = &config.path_prefix {
                    matchers.push(Box::new(PathPrefixMatcher::new(prefix.clone())));
                }
                Arc::new(CompiledRoute {
                    id: config.id.clone(),
                    priority: config.priority,
                    matcher: AndMatcher::new(matchers),
                })
            })
            .collect();

        // Stable: ties keep declaration order.
        routes.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self { routes }
    }

    /// Id of the first route matching the exchange.
    pub fn match_route(&self, exchange: &Exchange) -> Option<&str> {
        self.routes
            .iter()
            .find(|route| route.matcher.matches(exchange))
            .map(|route| route.id.as_str())
    }

    /// A router holding only the routes `keep` accepts, in the same order.
    pub fn restricted_to(&self, keep: impl Fn(&str) -> bool) -> Self {
        Self {
            routes: self
                .routes
                .iter()
                .filter(|route| keep(&route.id))
                .cloned()
                .collect(),
        }
    }

    pub fn route_ids(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|route| route.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    fn route(id: &str, host: Option<&str>, prefix: Option<&str>, priority: u32) -> RouteConfig {
        RouteConfig {
            id: id.to_string(),
            host: host.map(str::to_string),
            path_prefix: prefix.map(str::to_string),
            priority,
            filters: vec![],
        }
    }

    #[test]
    fn test_priority_wins() {
        let router = Router::from_config(&[
            route("catch-all", None, Some("/"), 0),
            route("api", None, Some("/api"), 10),
        ]);

        let exchange = Exchange::new(Method::GET, "/api/users");
        assert_eq!(router.match_route(&exchange), Some("api"));

        let exchange = Exchange::new(Method::GET, "/static/app.js");
        assert_eq!(router.match_route(&exchange), Some("catch-all"));
    }

    #[test]
    fn test_equal_priority_keeps_declaration_order() {
        let router = Router::from_config(&[
            route("first", None, Some("/"), 5),
            route("second", None, Some("/"), 5),
        ]);
        assert_eq!(router.match_route(&Exchange::new(Method::GET, "/x")), Some("first"));
    }

    #[test]
    fn test_host_and_path_combined() {
        let router = Router::from_config(&[route("tenant", Some("a.example.com"), Some("/v1"), 0)]);

        let hit = Exchange::new(Method::GET, "/v1/items").with_header("host", "a.example.com");
        assert_eq!(router.match_route(&hit), Some("tenant"));

        let miss = Exchange::new(Method::GET, "/v1/items").with_header("host", "b.example.com");
        assert_eq!(router.match_route(&miss), None);
    }

    #[test]
    fn test_restricted_router_keeps_priority_order() {
        let router = Router::from_config(&[
            route("low", None, Some("/"), 0),
            route("new", None, Some("/api"), 20),
            route("high", None, Some("/api"), 10),
        ]);

        let staged = router.restricted_to(|id| id != "new");
        assert_eq!(staged.route_ids().collect::<Vec<_>>(), ["high", "low"]);
        assert_eq!(staged.match_route(&Exchange::new(Method::GET, "/api/x")), Some("high"));
        assert_eq!(router.len(), 3);
    }

    #[test]
    fn test_no_routes_no_match() {
        let router = Router::default();
        assert!(router.is_empty());
        assert_eq!(router.match_route(&Exchange::new(Method::GET, "/")), None);
    }
}

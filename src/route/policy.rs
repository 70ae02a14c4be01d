//! Per-route upstream policies.
//!
//! # Responsibilities
//! - Hand out one lazily resolved policy holder per route id
//! - Resolve policies from the `[contexts.<route>]` configuration tables
//! - Fall back to `UpstreamPolicy::default()` for routes without a table
//!
//! # Design Decisions
//! - Holders are created on first use and dropped when their route leaves the configuration
//! - A config reload refreshes every holder in place

use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::ContextConfig;
use crate::delegate::{
    ComponentResolver, ContextRegistry, DefaultFactory, LazyDelegate, Refreshable,
};

/// Settings the forwarding stage applies to one route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpstreamPolicy {
    pub timeout_ms: u64,
    pub max_body_bytes: usize,
}

impl Default for UpstreamPolicy {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

impl From<&ContextConfig> for UpstreamPolicy {
    fn from(config: &ContextConfig) -> Self {
        let defaults = Self::default();
        Self {
            timeout_ms: config.timeout_ms.unwrap_or(defaults.timeout_ms),
            max_body_bytes: config.max_body_bytes.unwrap_or(defaults.max_body_bytes),
        }
    }
}

impl std::fmt::Display for UpstreamPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "timeout={}ms max_body={}B", self.timeout_ms, self.max_body_bytes)
    }
}

/// Route id → policy holder.
#[derive(Debug)]
pub struct PolicyDirectory {
    resolver: Arc<ContextRegistry>,
    holders: DashMap<String, Arc<LazyDelegate<UpstreamPolicy>>>,
}

impl PolicyDirectory {
    pub fn new(resolver: Arc<ContextRegistry>) -> Self {
        Self {
            resolver,
            holders: DashMap::new(),
        }
    }

    /// Holder for `route_id`, created cold on first request.
    pub fn get(&self, route_id: &str) -> Arc<LazyDelegate<UpstreamPolicy>> {
        if let Some(holder) = self.holders.get(route_id) {
            return Arc::clone(holder.value());
        }
        let resolver: Arc<dyn ComponentResolver<UpstreamPolicy>> = self.resolver.clone();
        self.holders
            .entry(route_id.to_string())
            .or_insert_with(|| {
                Arc::new(LazyDelegate::new(route_id, resolver, Arc::new(DefaultFactory)))
            })
            .value()
            .clone()
    }

    /// Load the policies of one configuration revision into the resolver.
    pub fn load(&self, contexts: &std::collections::BTreeMap<String, ContextConfig>) {
        self.resolver.replace_all(
            contexts
                .iter()
                .map(|(id, config)| (id.clone(), UpstreamPolicy::from(config))),
        );
    }

    /// Drop the holders of routes that are no longer configured.
    pub fn retain_routes<'a>(&self, route_ids: impl IntoIterator<Item = &'a str>) {
        let live: HashSet<&str> = route_ids.into_iter().collect();
        let before = self.holders.len();
        self.holders.retain(|id, _| live.contains(id.as_str()));
        let dropped = before.saturating_sub(self.holders.len());
        if dropped > 0 {
            tracing::debug!(dropped, remaining = self.holders.len(), "Pruned policy holders");
        }
    }

    pub fn len(&self) -> usize {
        self.holders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }
}

impl Refreshable for PolicyDirectory {
    fn refresh(&self) {
        for holder in self.holders.iter() {
            holder.value().invalidate();
        }
    }
}

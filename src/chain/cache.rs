//! Route-keyed filter chain cache.
//!
//! # Responsibilities
//! - Serve `route id → FilterChain` lookups without locks
//! - Rebuild every chain from a full topology and publish atomically
//! - Keep the previous snapshot when a rebuild fails
//!
//! # Design Decisions
//! - `ArcSwapOption` holds the current snapshot; `None` is the cold state
//! - Readers load the pointer and clone one `Arc`; no allocation on the hot path
//! - Rebuilds happen off to the side and are published with a single `store`
//! - Rebuilds are expected to be serialized by the caller (refresh bus)

use arc_swap::ArcSwapOption;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::chain::composer::{compose_all, CompositionLimits};
use crate::chain::{ChainError, FilterChain};
use crate::filter::SharedFilter;
use crate::observability::metrics;
use crate::route::Route;

/// Immutable `route id → chain` mapping, built in full before publication.
#[derive(Debug)]
pub struct ChainSnapshot {
    generation: u64,
    chains: HashMap<String, FilterChain>,
}

impl ChainSnapshot {
    /// Rebuild counter value this snapshot was published with (starts at 1).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, route_id: &str) -> Option<&FilterChain> {
        self.chains.get(route_id)
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterChain)> {
        self.chains.iter().map(|(id, chain)| (id.as_str(), chain))
    }

    /// Route ids in ascending order.
    pub fn route_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.chains.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

/// Caches the composed filter chain of every route.
#[derive(Debug)]
pub struct RouteFilterChainCache {
    global_filters: Arc<[SharedFilter]>,
    limits: CompositionLimits,
    current: ArcSwapOption<ChainSnapshot>,
    rebuilds: AtomicU64,
}

impl RouteFilterChainCache {
    /// Create a cold cache around a fixed set of global filters.
    pub fn new(global_filters: Vec<SharedFilter>, limits: CompositionLimits) -> Self {
        Self {
            global_filters: Arc::from(global_filters),
            limits,
            current: ArcSwapOption::empty(),
            rebuilds: AtomicU64::new(0),
        }
    }

    pub fn global_filters(&self) -> &[SharedFilter] {
        &self.global_filters
    }

    pub fn limits(&self) -> CompositionLimits {
        self.limits
    }

    /// Chain for `route_id`. Empty when cold or when the route is unknown.
    pub fn lookup(&self, route_id: &str) -> FilterChain {
        let current = self.current.load();
        match current.as_deref().and_then(|snapshot| snapshot.get(route_id)) {
            Some(chain) => chain.clone(),
            None => FilterChain::empty(),
        }
    }

    /// Compose every route and publish the result as the current snapshot.
    ///
    /// Returns the new generation. On error nothing is published.
    pub fn rebuild(&self, routes: &[Route]) -> Result<u64, ChainError> {
        let started = Instant::now();

        let chains = match compose_all(routes, &self.global_filters, &self.limits) {
            Ok(chains) => chains,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    routes = routes.len(),
                    current_generation = self.generation(),
                    "Filter chain rebuild failed, keeping current snapshot"
                );
                metrics::record_cache_rebuild("failed");
                return Err(e);
            }
        };

        let generation = self.rebuilds.fetch_add(1, Ordering::Relaxed) + 1;
        let route_count = chains.len();
        self.current
            .store(Some(Arc::new(ChainSnapshot { generation, chains })));

        tracing::info!(
            generation,
            routes = route_count,
            global_filters = self.global_filters.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "Filter chain cache rebuilt"
        );
        metrics::record_cache_rebuild("ok");
        metrics::record_cache_routes(route_count);

        Ok(generation)
    }

    /// The current snapshot, if any.
    pub fn snapshot(&self) -> Option<Arc<ChainSnapshot>> {
        self.current.load_full()
    }

    /// Generation of the current snapshot (0 while cold).
    pub fn generation(&self) -> u64 {
        self.current
            .load()
            .as_deref()
            .map(ChainSnapshot::generation)
            .unwrap_or(0)
    }

    pub fn is_warm(&self) -> bool {
        self.current.load().is_some()
    }

    /// Drop the current snapshot and return to the cold state.
    pub fn clear(&self) {
        if self.current.swap(None).is_some() {
            tracing::debug!("Filter chain cache cleared");
            metrics::record_cache_routes(0);
        }
    }
}

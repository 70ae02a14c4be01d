//! Filter chain subsystem.
//!
//! # Data Flow
//! ```text
//! Topology refresh (all routes) + global filters
//!     → composer.rs (global ++ route, stable sort by order)
//!     → ChainSnapshot (route id → FilterChain, fully built)
//!     → cache.rs (one atomic pointer swap publishes it)
//!
//! Per request:
//!     route id → cache.rs lookup (lock-free load, Arc clone)
//!     → executor.rs (run filters in order)
//! ```
//!
//! # Design Decisions
//! - Snapshots are immutable and replaced wholesale, never patched
//! - Cold cache and unknown routes both yield the empty chain
//! - A failed rebuild leaves the previous snapshot published

pub mod cache;
pub mod composer;
pub mod executor;

pub use cache::{ChainSnapshot, RouteFilterChainCache};
pub use composer::{compose, compose_all, CompositionLimits};
pub use executor::{FilterExecutor, SequentialExecutor};

use std::sync::Arc;

use crate::filter::SharedFilter;

/// Ordered, immutable sequence of filters for one route.
///
/// Cloning shares the underlying storage. The empty chain owns no
/// allocation.
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    filters: Option<Arc<[SharedFilter]>>,
}

impl FilterChain {
    /// The empty chain.
    pub const fn empty() -> Self {
        Self { filters: None }
    }

    /// Take ownership of already-ordered filters.
    pub fn from_ordered(filters: Vec<SharedFilter>) -> Self {
        if filters.is_empty() {
            Self::empty()
        } else {
            Self {
                filters: Some(Arc::from(filters)),
            }
        }
    }

    pub fn as_slice(&self) -> &[SharedFilter] {
        self.filters.as_deref().unwrap_or(&[])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SharedFilter> {
        self.as_slice().iter()
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    /// Filter names in chain order.
    pub fn names(&self) -> Vec<&str> {
        self.iter().map(|f| f.name()).collect()
    }

    /// True if both chains share the same storage (or are both empty).
    pub fn ptr_eq(&self, other: &FilterChain) -> bool {
        match (&self.filters, &other.filters) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<'a> IntoIterator for &'a FilterChain {
    type Item = &'a SharedFilter;
    type IntoIter = std::slice::Iter<'a, SharedFilter>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Failure while composing chains for a topology.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("route id must not be blank")]
    EmptyRouteId,

    #[error("route id `{0}` appears more than once in the topology")]
    DuplicateRouteId(String),

    #[error("route `{route}` composes {len} filters, limit is {max}")]
    ChainTooLong {
        route: String,
        len: usize,
        max: usize,
    },
}

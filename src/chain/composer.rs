//! Chain composition.
//!
//! # Algorithm
//! 1. Start with the global filters, in their configured sequence
//! 2. Append the route's own filters, in declaration sequence
//! 3. Stable sort the combined sequence by order value
//!
//! Equal order values therefore keep global filters ahead of route filters.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::chain::{ChainError, FilterChain};
use crate::filter::{sort_by_order, SharedFilter};
use crate::route::Route;

/// Bounds checked while composing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositionLimits {
    /// Maximum filters in one composed chain.
    pub max_chain_length: usize,
}

impl Default for CompositionLimits {
    fn default() -> Self {
        Self {
            max_chain_length: 64,
        }
    }
}

/// Compose the ordered chain for one route.
pub fn compose(
    route: &Route,
    global_filters: &[SharedFilter],
    limits: &CompositionLimits,
) -> Result<FilterChain, ChainError> {
    if route.id().trim().is_empty() {
        return Err(ChainError::EmptyRouteId);
    }

    let len = global_filters.len() + route.filters().len();
    if len > limits.max_chain_length {
        return Err(ChainError::ChainTooLong {
            route: route.id().to_string(),
            len,
            max: limits.max_chain_length,
        });
    }

    let mut combined = Vec::with_capacity(len);
    combined.extend(global_filters.iter().cloned());
    combined.extend(route.filters().iter().cloned());
    sort_by_order(&mut combined);

    Ok(FilterChain::from_ordered(combined))
}

/// Compose every route of a topology. Fails on the first bad route.
pub fn compose_all(
    routes: &[Route],
    global_filters: &[SharedFilter],
    limits: &CompositionLimits,
) -> Result<HashMap<String, FilterChain>, ChainError> {
    let mut chains = HashMap::with_capacity(routes.len());

    for route in routes {
        let chain = compose(route, global_filters, limits)?;
        match chains.entry(route.id().to_string()) {
            Entry::Occupied(_) => return Err(ChainError::DuplicateRouteId(route.id().to_string())),
            Entry::Vacant(slot) => {
                slot.insert(chain);
            }
        }
    }

    Ok(chains)
}

//! Ordering policy for filters.
//!
//! Ascending by `order()`. The sort is stable, so filters with the same
//! order keep the sequence they were combined in.

use std::cmp::Ordering;

use crate::filter::{Exchange, Filter, FilterAction, FilterError, SharedFilter};

/// Runs before everything else.
pub const HIGHEST_PRECEDENCE: i32 = i32::MIN;

/// Runs after everything else.
pub const LOWEST_PRECEDENCE: i32 = i32::MAX;

/// Total order over two filters by order value.
pub fn compare(a: &dyn Filter, b: &dyn Filter) -> Ordering {
    a.order().cmp(&b.order())
}

/// Stable in-place sort by order value.
pub fn sort_by_order(filters: &mut [SharedFilter]) {
    filters.sort_by(|a, b| compare(a.as_ref(), b.as_ref()));
}

/// Wraps a filter and overrides its order value.
#[derive(Debug)]
pub struct OrderedFilter {
    inner: SharedFilter,
    order: i32,
}

impl OrderedFilter {
    pub fn new(inner: SharedFilter, order: i32) -> Self {
        Self { inner, order }
    }
}

impl Filter for OrderedFilter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn filter(&self, exchange: &mut Exchange) -> Result<FilterAction, FilterError> {
        self.inner.filter(exchange)
    }
}

//! Filter subsystem.
//!
//! # Data Flow
//! ```text
//! Config [FilterDefinition]
//!     → factory.rs (name → built-in constructor, optional order override)
//!     → SharedFilter (Arc<dyn Filter>, immutable)
//!     → order.rs (stable sort by order value)
//!     → chain subsystem (composed per route, cached)
//! ```
//!
//! # Design Decisions
//! - Filters are opaque to the chain cache; only `order()` is consulted
//! - Lower order runs earlier; equal orders keep declaration sequence
//! - Filters are synchronous and may short-circuit with a response

pub mod builtin;
pub mod exchange;
pub mod factory;
pub mod order;

pub use exchange::Exchange;
pub use factory::{FilterBuildError, FilterDefinition, FilterFactoryRegistry};
pub use order::{sort_by_order, OrderedFilter, HIGHEST_PRECEDENCE, LOWEST_PRECEDENCE};

use axum::http::StatusCode;
use std::fmt::Debug;
use std::sync::Arc;

/// A unit of request processing.
pub trait Filter: Send + Sync + Debug {
    /// Name used for logs, traces and the admin API.
    fn name(&self) -> &str;

    /// Order value. Lower sorts earlier.
    fn order(&self) -> i32;

    /// Apply the filter to one exchange.
    fn filter(&self, exchange: &mut Exchange) -> Result<FilterAction, FilterError>;
}

/// Filters are shared between every chain that contains them.
pub type SharedFilter = Arc<dyn Filter>;

/// What the executor should do after a filter ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterAction {
    /// Hand the exchange to the next filter.
    Continue,
    /// Stop the chain and answer with this status and body.
    Respond(StatusCode, String),
}

/// Failure raised while a filter processes an exchange.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("filter `{filter}` failed: {reason}")]
    Failed { filter: String, reason: String },
}

impl FilterError {
    pub fn failed(filter: &str, reason: impl Into<String>) -> Self {
        FilterError::Failed {
            filter: filter.to_string(),
            reason: reason.into(),
        }
    }
}

//! Filter construction from configuration.
//!
//! # Responsibilities
//! - Map a filter name to a constructor
//! - Validate constructor arguments
//! - Apply the optional per-definition order override

use axum::http::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::filter::builtin::{
    AddRequestHeaderFilter, AddResponseHeaderFilter, BearerAuthFilter, RateLimitFilter,
    RequestLogFilter, RequireHeaderFilter, SetAttributeFilter,
};
use crate::filter::{OrderedFilter, SharedFilter};

/// Declarative description of one filter.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct FilterDefinition {
    /// Registered filter name (e.g., "bearer_auth").
    pub name: String,

    /// Overrides the filter's built-in order value.
    #[serde(default)]
    pub order: Option<i32>,

    /// Constructor arguments.
    #[serde(default)]
    pub args: BTreeMap<String, String>,
}

impl FilterDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: None,
            args: BTreeMap::new(),
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    fn arg(&self, key: &str) -> Result<&str, FilterBuildError> {
        self.args
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| FilterBuildError::MissingArg {
                filter: self.name.clone(),
                arg: key.to_string(),
            })
    }

    fn invalid(&self, arg: &str, reason: impl ToString) -> FilterBuildError {
        FilterBuildError::InvalidArg {
            filter: self.name.clone(),
            arg: arg.to_string(),
            reason: reason.to_string(),
        }
    }

    fn header_name(&self, key: &str) -> Result<HeaderName, FilterBuildError> {
        self.arg(key)?
            .parse::<HeaderName>()
            .map_err(|e| self.invalid(key, e))
    }

    fn header_value(&self, key: &str) -> Result<HeaderValue, FilterBuildError> {
        self.arg(key)?
            .parse::<HeaderValue>()
            .map_err(|e| self.invalid(key, e))
    }

    fn number(&self, key: &str, default: u32) -> Result<u32, FilterBuildError> {
        match self.args.get(key) {
            Some(raw) => raw.parse::<u32>().map_err(|e| self.invalid(key, e)),
            None => Ok(default),
        }
    }
}

/// Error building a filter from its definition.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FilterBuildError {
    #[error("unknown filter `{0}`")]
    UnknownFilter(String),

    #[error("filter `{filter}` requires argument `{arg}`")]
    MissingArg { filter: String, arg: String },

    #[error("filter `{filter}` has invalid argument `{arg}`: {reason}")]
    InvalidArg {
        filter: String,
        arg: String,
        reason: String,
    },
}

type FactoryFn =
    Box<dyn Fn(&FilterDefinition) -> Result<SharedFilter, FilterBuildError> + Send + Sync>;

/// Registry of named filter constructors.
pub struct FilterFactoryRegistry {
    factories: HashMap<String, FactoryFn>,
}

impl std::fmt::Debug for FilterFactoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("FilterFactoryRegistry")
            .field("factories", &names)
            .finish()
    }
}

impl FilterFactoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry with every built-in filter registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register(AddRequestHeaderFilter::NAME, |def| {
            Ok(Arc::new(AddRequestHeaderFilter::new(
                def.header_name("header")?,
                def.header_value("value")?,
            )))
        });
        registry.register(AddResponseHeaderFilter::NAME, |def| {
            Ok(Arc::new(AddResponseHeaderFilter::new(
                def.header_name("header")?,
                def.header_value("value")?,
            )))
        });
        registry.register(RequireHeaderFilter::NAME, |def| {
            Ok(Arc::new(RequireHeaderFilter::new(def.header_name("header")?)))
        });
        registry.register(BearerAuthFilter::NAME, |def| {
            let token = def.arg("token")?;
            if token.is_empty() {
                return Err(def.invalid("token", "must not be empty"));
            }
            Ok(Arc::new(BearerAuthFilter::new(token)))
        });
        registry.register(RateLimitFilter::NAME, |def| {
            let key_header = match def.args.get("key_header") {
                Some(_) => def.header_name("key_header")?,
                None => HeaderName::from_static("x-client-id"),
            };
            let rps = def.number("requests_per_second", 100)?;
            let burst = def.number("burst", rps.saturating_mul(2))?;
            if burst == 0 {
                return Err(def.invalid("burst", "must be greater than zero"));
            }
            let max_keys = def.number("max_keys", RateLimitFilter::DEFAULT_MAX_KEYS as u32)?;
            if max_keys == 0 {
                return Err(def.invalid("max_keys", "must be greater than zero"));
            }
            Ok(Arc::new(
                RateLimitFilter::new(key_header, rps, burst).with_max_keys(max_keys as usize),
            ))
        });
        registry.register(SetAttributeFilter::NAME, |def| {
            Ok(Arc::new(SetAttributeFilter::new(def.arg("key")?, def.arg("value")?)))
        });
        registry.register(RequestLogFilter::NAME, |_| Ok(Arc::new(RequestLogFilter)));

        registry
    }

    /// Register (or replace) a constructor under `name`.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&FilterDefinition) -> Result<SharedFilter, FilterBuildError> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Build one filter, wrapping it when the definition overrides its order.
    pub fn build(&self, definition: &FilterDefinition) -> Result<SharedFilter, FilterBuildError> {
        let factory = self
            .factories
            .get(&definition.name)
            .ok_or_else(|| FilterBuildError::UnknownFilter(definition.name.clone()))?;

        let filter = factory(definition)?;
        Ok(match definition.order {
            Some(order) => Arc::new(OrderedFilter::new(filter, order)),
            None => filter,
        })
    }

    /// Build every definition, keeping declaration sequence.
    pub fn build_all(
        &self,
        definitions: &[FilterDefinition],
    ) -> Result<Vec<SharedFilter>, FilterBuildError> {
        definitions.iter().map(|d| self.build(d)).collect()
    }
}

impl Default for FilterFactoryRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

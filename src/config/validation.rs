//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Route ids present and unique
//! - Bind addresses parse as socket addresses
//! - Admin API not enabled with an empty key
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Filter arguments are checked later, when filters are built

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("route #{index} has a blank id")]
    BlankRouteId { index: usize },

    #[error("route id `{0}` is defined more than once")]
    DuplicateRouteId(String),

    #[error("{field} `{value}` is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("admin API enabled without an api_key")]
    MissingAdminKey,

    #[error("cache.max_chain_length must be greater than zero")]
    ZeroChainLength,

    #[error("filter #{index} in {scope} has a blank name")]
    BlankFilterName { scope: String, index: usize },
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }
    if config.admin.enabled {
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.trim().is_empty() {
            errors.push(ValidationError::MissingAdminKey);
        }
    }

    if config.cache.max_chain_length == 0 {
        errors.push(ValidationError::ZeroChainLength);
    }

    for (index, filter) in config.global_filters.iter().enumerate() {
        if filter.name.trim().is_empty() {
            errors.push(ValidationError::BlankFilterName {
                scope: "global_filters".to_string(),
                index,
            });
        }
    }

    let mut seen = HashSet::new();
    for (index, route) in config.routes.iter().enumerate() {
        if route.id.trim().is_empty() {
            errors.push(ValidationError::BlankRouteId { index });
            continue;
        }
        if !seen.insert(route.id.as_str()) {
            errors.push(ValidationError::DuplicateRouteId(route.id.clone()));
        }
        for (filter_index, filter) in route.filters.iter().enumerate() {
            if filter.name.trim().is_empty() {
                errors.push(ValidationError::BlankFilterName {
                    scope: format!("route `{}`", route.id),
                    index: filter_index,
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RouteConfig;
    use crate::filter::FilterDefinition;

    fn route(id: &str) -> RouteConfig {
        RouteConfig {
            id: id.to_string(),
            host: None,
            path_prefix: None,
            priority: 0,
            filters: Vec::new(),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.routes = vec![route("a"), route(""), route("a")];
        config.cache.max_chain_length = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::InvalidAddress {
                    field: "listener.bind_address",
                    value: "not-an-address".into()
                },
                ValidationError::ZeroChainLength,
                ValidationError::BlankRouteId { index: 1 },
                ValidationError::DuplicateRouteId("a".into()),
            ]
        );
    }

    #[test]
    fn test_admin_requires_key() {
        let mut config = GatewayConfig::default();
        config.admin.enabled = true;
        config.admin.api_key = " ".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::MissingAdminKey]);
    }

    #[test]
    fn test_blank_filter_names() {
        let mut config = GatewayConfig::default();
        config.global_filters.push(FilterDefinition::new(""));
        let mut r = route("r1");
        r.filters.push(FilterDefinition::new(" "));
        config.routes.push(r);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}

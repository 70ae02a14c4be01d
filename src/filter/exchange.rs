//! Per-request context handed through a filter chain.

use axum::http::{request::Parts, HeaderMap, Method};
use std::collections::HashMap;
use uuid::Uuid;

/// Mutable request context seen by every filter of one chain.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub request_id: String,
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    /// Set by the external route matcher before dispatch.
    pub route_id: Option<String>,
    pub attributes: HashMap<String, String>,
    pub response_headers: HeaderMap,
    trace: Vec<String>,
}

impl Exchange {
    /// Create an exchange with a fresh request ID and no headers.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            route_id: None,
            attributes: HashMap::new(),
            response_headers: HeaderMap::new(),
            trace: Vec::new(),
        }
    }

    /// Build an exchange from the head of an HTTP request.
    pub fn from_parts(parts: &Parts, request_id: Option<String>) -> Self {
        let mut exchange = Self::new(parts.method.clone(), parts.uri.path());
        exchange.headers = parts.headers.clone();
        if let Some(id) = request_id {
            exchange.request_id = id;
        }
        exchange
    }

    pub fn with_route(mut self, route_id: impl Into<String>) -> Self {
        self.route_id = Some(route_id.into());
        self
    }

    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = value.parse() {
            self.headers.insert(name, value);
        }
        self
    }

    /// Header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Record that a filter ran against this exchange.
    pub fn record(&mut self, filter: &str) {
        self.trace.push(filter.to_string());
    }

    /// Names of the filters that ran, in execution order.
    pub fn trace(&self) -> &[String] {
        &self.trace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn test_from_parts_keeps_request_id() {
        let (parts, _) = Request::builder()
            .uri("http://example.com/api/v1?x=1")
            .header("Host", "example.com")
            .body(())
            .unwrap()
            .into_parts();

        let exchange = Exchange::from_parts(&parts, Some("req-1".into()));
        assert_eq!(exchange.request_id, "req-1");
        assert_eq!(exchange.path, "/api/v1");
        assert_eq!(exchange.header("host"), Some("example.com"));
        assert!(exchange.route_id.is_none());
    }

    #[test]
    fn test_generated_request_ids_are_unique() {
        let a = Exchange::new(Method::GET, "/");
        let b = Exchange::new(Method::GET, "/");
        assert_ne!(a.request_id, b.request_id);
    }
}

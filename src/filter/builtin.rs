//! Built-in filters.
//!
//! # Responsibilities
//! - Header manipulation (request and response side)
//! - Bearer-token authentication
//! - Token bucket rate limiting per client key, with a bounded key table
//! - Exchange attributes and request logging
//!
//! # Default Orders
//! - `request_log`: HIGHEST_PRECEDENCE
//! - `bearer_auth`: -100
//! - `rate_limit`: -50
//! - everything else: 0

use axum::http::{HeaderName, HeaderValue, StatusCode};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use crate::filter::{Exchange, Filter, FilterAction, FilterError, HIGHEST_PRECEDENCE};

pub const AUTH_ORDER: i32 = -100;
pub const RATE_LIMIT_ORDER: i32 = -50;
pub const DEFAULT_ORDER: i32 = 0;

/// Adds a header to the request before later filters see it.
#[derive(Debug)]
pub struct AddRequestHeaderFilter {
    header: HeaderName,
    value: HeaderValue,
}

impl AddRequestHeaderFilter {
    pub const NAME: &'static str = "add_request_header";

    pub fn new(header: HeaderName, value: HeaderValue) -> Self {
        Self { header, value }
    }
}

impl Filter for AddRequestHeaderFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        DEFAULT_ORDER
    }

    fn filter(&self, exchange: &mut Exchange) -> Result<FilterAction, FilterError> {
        exchange.headers.insert(self.header.clone(), self.value.clone());
        Ok(FilterAction::Continue)
    }
}

/// Adds a header to whatever response ends up being sent.
#[derive(Debug)]
pub struct AddResponseHeaderFilter {
    header: HeaderName,
    value: HeaderValue,
}

impl AddResponseHeaderFilter {
    pub const NAME: &'static str = "add_response_header";

    pub fn new(header: HeaderName, value: HeaderValue) -> Self {
        Self { header, value }
    }
}

impl Filter for AddResponseHeaderFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        DEFAULT_ORDER
    }

    fn filter(&self, exchange: &mut Exchange) -> Result<FilterAction, FilterError> {
        exchange
            .response_headers
            .insert(self.header.clone(), self.value.clone());
        Ok(FilterAction::Continue)
    }
}

/// Rejects requests missing a header with 400.
#[derive(Debug)]
pub struct RequireHeaderFilter {
    header: HeaderName,
}

impl RequireHeaderFilter {
    pub const NAME: &'static str = "require_header";

    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }
}

impl Filter for RequireHeaderFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        DEFAULT_ORDER
    }

    fn filter(&self, exchange: &mut Exchange) -> Result<FilterAction, FilterError> {
        if exchange.headers.contains_key(&self.header) {
            Ok(FilterAction::Continue)
        } else {
            Ok(FilterAction::Respond(
                StatusCode::BAD_REQUEST,
                format!("Missing {} header", self.header),
            ))
        }
    }
}

/// Requires `Authorization: Bearer <token>`.
#[derive(Debug)]
pub struct BearerAuthFilter {
    expected: String,
}

impl BearerAuthFilter {
    pub const NAME: &'static str = "bearer_auth";

    pub fn new(token: &str) -> Self {
        Self {
            expected: format!("Bearer {}", token),
        }
    }
}

impl Filter for BearerAuthFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        AUTH_ORDER
    }

    fn filter(&self, exchange: &mut Exchange) -> Result<FilterAction, FilterError> {
        match exchange.header("authorization") {
            Some(value) if value == self.expected => Ok(FilterAction::Continue),
            _ => {
                tracing::debug!(request_id = %exchange.request_id, "Bearer authentication failed");
                Ok(FilterAction::Respond(
                    StatusCode::UNAUTHORIZED,
                    "Unauthorized".to_string(),
                ))
            }
        }
    }
}

struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    /// True once the bucket has refilled; it is then indistinguishable from a new one.
    fn is_full(&self, now: Instant, capacity: f64, refill_rate: f64) -> bool {
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens + elapsed * refill_rate >= capacity
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

struct BucketTable {
    per_key: HashMap<String, TokenBucket>,
    overflow: TokenBucket,
}

/// Token bucket per client key, read from `key_header` (falls back to "anonymous").
///
/// At most `max_keys` buckets are tracked. When the table is full, refilled
/// buckets are evicted; if none are, new keys share a single overflow bucket.
pub struct RateLimitFilter {
    key_header: HeaderName,
    requests_per_second: f64,
    burst: f64,
    max_keys: usize,
    buckets: Mutex<BucketTable>,
}

impl std::fmt::Debug for RateLimitFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitFilter")
            .field("key_header", &self.key_header)
            .field("requests_per_second", &self.requests_per_second)
            .field("burst", &self.burst)
            .field("max_keys", &self.max_keys)
            .finish()
    }
}

impl RateLimitFilter {
    pub const NAME: &'static str = "rate_limit";
    pub const DEFAULT_MAX_KEYS: usize = 10_000;

    pub fn new(key_header: HeaderName, requests_per_second: u32, burst: u32) -> Self {
        let burst = burst as f64;
        Self {
            key_header,
            requests_per_second: requests_per_second as f64,
            burst,
            max_keys: Self::DEFAULT_MAX_KEYS,
            buckets: Mutex::new(BucketTable {
                per_key: HashMap::new(),
                overflow: TokenBucket::new(burst),
            }),
        }
    }

    pub fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = max_keys.max(1);
        self
    }

    /// Number of client keys with their own bucket.
    pub fn tracked_keys(&self) -> usize {
        self.buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .per_key
            .len()
    }

    #[cfg(test)]
    fn is_tracked(&self, key: &str) -> bool {
        self.buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .per_key
            .contains_key(key)
    }

    fn check(&self, key: &str) -> bool {
        let mut table = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let BucketTable { per_key, overflow } = &mut *table;

        if let Some(bucket) = per_key.get_mut(key) {
            return bucket.try_acquire(self.burst, self.requests_per_second);
        }

        if per_key.len() >= self.max_keys {
            let now = Instant::now();
            per_key.retain(|_, bucket| !bucket.is_full(now, self.burst, self.requests_per_second));
        }
        if per_key.len() >= self.max_keys {
            tracing::debug!(
                max_keys = self.max_keys,
                "Rate limit key table full, using shared bucket"
            );
            return overflow.try_acquire(self.burst, self.requests_per_second);
        }

        per_key
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.burst))
            .try_acquire(self.burst, self.requests_per_second)
    }
}

impl Filter for RateLimitFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        RATE_LIMIT_ORDER
    }

    fn filter(&self, exchange: &mut Exchange) -> Result<FilterAction, FilterError> {
        let key = exchange
            .headers
            .get(&self.key_header)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("anonymous")
            .to_string();

        if self.check(&key) {
            Ok(FilterAction::Continue)
        } else {
            tracing::warn!(client = %key, route = ?exchange.route_id, "Rate limit exceeded");
            Ok(FilterAction::Respond(
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded".to_string(),
            ))
        }
    }
}

/// Sets a string attribute on the exchange.
#[derive(Debug)]
pub struct SetAttributeFilter {
    key: String,
    value: String,
}

impl SetAttributeFilter {
    pub const NAME: &'static str = "set_attribute";

    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl Filter for SetAttributeFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        DEFAULT_ORDER
    }

    fn filter(&self, exchange: &mut Exchange) -> Result<FilterAction, FilterError> {
        exchange
            .attributes
            .insert(self.key.clone(), self.value.clone());
        Ok(FilterAction::Continue)
    }
}

#[derive(Debug, Default)]
pub struct RequestLogFilter;

impl RequestLogFilter {
    pub const NAME: &'static str = "request_log";
}

impl Filter for RequestLogFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        HIGHEST_PRECEDENCE
    }

    fn filter(&self, exchange: &mut Exchange) -> Result<FilterAction, FilterError> {
        tracing::info!(
            request_id = %exchange.request_id,
            route = ?exchange.route_id,
            method = %exchange.method,
            path = %exchange.path,
            "Gateway request"
        );
        Ok(FilterAction::Continue)
    }
}

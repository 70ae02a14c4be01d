//! Filter gateway library.
//!
//! Route-keyed filter chains composed once per topology revision and read
//! lock-free on the request path.

pub mod admin;
pub mod chain;
pub mod config;
pub mod delegate;
pub mod filter;
pub mod handler;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod refresh;
pub mod route;
pub mod routing;

pub use chain::{FilterChain, RouteFilterChainCache};
pub use config::schema::GatewayConfig;
pub use delegate::LazyDelegate;
pub use handler::FilteringHandler;
pub use http::HttpServer;
pub use lifecycle::{Gateway, Shutdown};

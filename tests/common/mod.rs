//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use filter_gateway::admin::setup_admin_router;
use filter_gateway::config::{GatewayConfig, RouteConfig};
use filter_gateway::filter::{
    Exchange, Filter, FilterAction, FilterDefinition, FilterError, SharedFilter,
};
use filter_gateway::http::{AppState, HttpServer};
use filter_gateway::lifecycle::{shutdown, Gateway, Shutdown};

pub const ADMIN_KEY: &str = "test-admin-key";

/// Filter that only records that it ran.
#[derive(Debug)]
pub struct NamedFilter {
    name: &'static str,
    order: i32,
}

impl Filter for NamedFilter {
    fn name(&self) -> &str {
        self.name
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn filter(&self, _exchange: &mut Exchange) -> Result<FilterAction, FilterError> {
        Ok(FilterAction::Continue)
    }
}

pub fn named(name: &'static str, order: i32) -> SharedFilter {
    Arc::new(NamedFilter { name, order })
}

pub fn route(id: &str, prefix: &str, filters: Vec<FilterDefinition>) -> RouteConfig {
    RouteConfig {
        id: id.to_string(),
        host: None,
        path_prefix: Some(prefix.to_string()),
        priority: 0,
        filters,
    }
}

/// A running gateway bound to ephemeral ports.
pub struct TestGateway {
    pub gateway: Arc<Gateway>,
    pub addr: SocketAddr,
    pub admin_addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn admin_url(&self, path: &str) -> String {
        format!("http://{}{}", self.admin_addr, path)
    }

    /// Wait until the cache has published at least `generation` and the
    /// router serves every configured route.
    pub async fn wait_for_generation(&self, generation: u64) {
        let routes = self.gateway.config().routes.len();
        for _ in 0..200 {
            if self.gateway.cache().generation() >= generation
                && self.gateway.router().len() == routes
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "stuck at generation {} with {} routes, expected {} with {}",
            self.gateway.cache().generation(),
            self.gateway.router().len(),
            generation,
            routes
        );
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the gateway and admin servers plus the refresh dispatcher, and
/// wait for the first snapshot.
pub async fn start_gateway(mut config: GatewayConfig) -> TestGateway {
    config.admin.enabled = true;
    config.admin.api_key = ADMIN_KEY.to_string();

    let (gateway, dispatcher) = Gateway::bootstrap(config).unwrap();
    let shutdown = Shutdown::new();
    tokio::spawn(dispatcher.run(shutdown.subscribe()));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(gateway.clone());
    tokio::spawn(server.run(listener, shutdown.subscribe()));

    let admin_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let admin_addr = admin_listener.local_addr().unwrap();
    let admin = setup_admin_router(AppState::new(gateway.clone()));
    let admin_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = axum::serve(admin_listener, admin)
            .with_graceful_shutdown(shutdown::wait(admin_shutdown))
            .await;
    });

    let test = TestGateway {
        gateway,
        addr,
        admin_addr,
        shutdown,
    };
    test.gateway.publish_refresh().unwrap();
    test.wait_for_generation(1).await;
    test
}

//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router with the gateway handler
//! - Wire up middleware (request ID, tracing)
//! - Match each request to a route and run its cached filter chain
//! - Serve until shutdown fires

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::filter::{Exchange, FilterAction};
use crate::http::request::{self, UuidRequestId, X_REQUEST_ID};
use crate::lifecycle::{shutdown, Gateway};
use crate::observability::metrics;
use crate::route::UpstreamPolicy;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
}

impl AppState {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            router: Self::build_router(AppState::new(gateway)),
        }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", any(gateway_handler))
            .route("/{*path}", any(gateway_handler))
            .with_state(state)
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
    }

    /// The fully layered router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(shutdown_rx))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Body returned when a request passes its whole chain.
#[derive(Serialize)]
struct DispatchSummary<'a> {
    route: &'a str,
    request_id: &'a str,
    filters: &'a [String],
    attributes: &'a HashMap<String, String>,
    policy: &'a UpstreamPolicy,
}

async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request::request_id(&request).map(str::to_string);
    let (parts, _body) = request.into_parts();
    let mut exchange = Exchange::from_parts(&parts, request_id);

    let router = state.gateway.router();
    let Some(route_id) = router.match_route(&exchange).map(str::to_string) else {
        tracing::warn!(
            request_id = %exchange.request_id,
            path = %exchange.path,
            "No route matched"
        );
        metrics::record_request(404, start);
        return (StatusCode::NOT_FOUND, "No matching route found").into_response();
    };
    exchange.route_id = Some(route_id.clone());

    let response = match state.gateway.handler().handle(&mut exchange) {
        Ok(FilterAction::Respond(status, body)) => {
            tracing::debug!(
                request_id = %exchange.request_id,
                route = %route_id,
                status = status.as_u16(),
                "Filter chain answered request"
            );
            with_response_headers((status, body).into_response(), &exchange)
        }
        Ok(FilterAction::Continue) => {
            match state.gateway.policies().get(&route_id).resolve() {
                Ok(policy) => {
                    let summary = DispatchSummary {
                        route: &route_id,
                        request_id: &exchange.request_id,
                        filters: exchange.trace(),
                        attributes: &exchange.attributes,
                        policy: &policy,
                    };
                    with_response_headers(Json(summary).into_response(), &exchange)
                }
                Err(e) => {
                    tracing::error!(
                        request_id = %exchange.request_id,
                        error = %e,
                        "Upstream policy unavailable"
                    );
                    (StatusCode::INTERNAL_SERVER_ERROR, "Upstream policy unavailable")
                        .into_response()
                }
            }
        }
        Err(e) => {
            tracing::error!(
                request_id = %exchange.request_id,
                route = %route_id,
                error = %e,
                "Filter chain failed"
            );
            (StatusCode::INTERNAL_SERVER_ERROR, "Filter chain failed").into_response()
        }
    };

    metrics::record_request(response.status().as_u16(), start);
    response
}

fn with_response_headers(mut response: Response, exchange: &Exchange) -> Response {
    for (name, value) in &exchange.response_headers {
        response.headers_mut().append(name.clone(), value.clone());
    }
    response
}

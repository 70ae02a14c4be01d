use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::http::server::AppState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub cache_warm: bool,
    pub generation: u64,
    pub routes: usize,
    pub global_filters: usize,
    pub refreshables: usize,
}

#[derive(Serialize)]
pub struct FilterEntry {
    pub name: String,
    pub order: i32,
}

#[derive(Serialize)]
pub struct ChainsSnapshot {
    pub generation: u64,
    pub warm: bool,
    pub routes: BTreeMap<String, Vec<FilterEntry>>,
}

#[derive(Serialize)]
pub struct RefreshAccepted {
    pub routes: usize,
    pub refreshed: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let cache = state.gateway.cache();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        cache_warm: cache.is_warm(),
        generation: cache.generation(),
        routes: state.gateway.router().len(),
        global_filters: cache.global_filters().len(),
        refreshables: state.gateway.refreshables().len(),
    })
}

pub async fn get_chains(State(state): State<AppState>) -> Json<ChainsSnapshot> {
    let Some(snapshot) = state.gateway.cache().snapshot() else {
        return Json(ChainsSnapshot {
            generation: 0,
            warm: false,
            routes: BTreeMap::new(),
        });
    };

    let routes = snapshot
        .iter()
        .map(|(route, chain)| {
            let filters = chain
                .iter()
                .map(|f| FilterEntry {
                    name: f.name().to_string(),
                    order: f.order(),
                })
                .collect();
            (route.to_string(), filters)
        })
        .collect();

    Json(ChainsSnapshot {
        generation: snapshot.generation(),
        warm: true,
        routes,
    })
}

/// Queue a topology refresh from the current configuration.
pub async fn post_refresh(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<RefreshAccepted>), (StatusCode, String)> {
    let routes = state
        .gateway
        .publish_refresh()
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
    let refreshed = state.gateway.refreshables().refresh_all();

    tracing::info!(routes, refreshed, "Refresh requested via admin API");
    Ok((StatusCode::ACCEPTED, Json(RefreshAccepted { routes, refreshed })))
}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::QuerySpec;
use crate::services::aggregator::HISTORY_DAYS_DEFAULT;
use crate::services::{RiskPreference, YieldAggregator};
use crate::sources::FetchError;

const YIELDS_DEFAULT_LIMIT: usize = 20;
const BEST_YIELDS_DEFAULT_LIMIT: usize = 10;

pub struct AppState {
    pub aggregator: Arc<YieldAggregator>,
}

/// Upstream failures surface as a tagged error payload: 504 when the
/// upstream timed out, 502 otherwise.
fn error_response(err: FetchError) -> Response {
    let status = if err.is_timeout() {
        StatusCode::GATEWAY_TIMEOUT
    } else {
        StatusCode::BAD_GATEWAY
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

/// GET /
async fn home() -> Html<&'static str> {
    Html(
        "<h2>Stablecoin Yields API is live!</h2>\
         <p>Visit <a href=\"/yields\">/yields</a> to get data.</p>",
    )
}

/// GET /yields
async fn get_yields(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let query = QuerySpec::from_params(&params, YIELDS_DEFAULT_LIMIT);
    match state.aggregator.yields(&query).await {
        Ok(pools) => Json((*pools).clone()).into_response(),
        Err(err) => error_response(err),
    }
}

/// GET /yields/best — same pipeline as /yields with a tighter default cut.
async fn get_best_yields(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let query = QuerySpec::from_params(&params, BEST_YIELDS_DEFAULT_LIMIT);
    match state.aggregator.yields(&query).await {
        Ok(pools) => Json((*pools).clone()).into_response(),
        Err(err) => error_response(err),
    }
}

/// GET /yields/historical/{pool_id}?days=30
async fn get_historical(
    State(state): State<Arc<AppState>>,
    Path(pool_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let days = params
        .get("days")
        .and_then(|s| s.trim().parse::<u32>().ok())
        .filter(|d| *d > 0)
        .unwrap_or(HISTORY_DAYS_DEFAULT);

    match state.aggregator.historical(&pool_id, days).await {
        Ok(payload) => Json((*payload).clone()).into_response(),
        Err(err) => error_response(err),
    }
}

/// GET /yields/cross-chain/{symbol}
async fn get_cross_chain(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Response {
    match state.aggregator.cross_chain(&symbol).await {
        Ok(payload) => Json((*payload).clone()).into_response(),
        Err(err) => error_response(err),
    }
}

/// GET /portfolio/optimize?risk=medium&amount=10000
async fn get_portfolio(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let preference = params
        .get("risk")
        .map(|s| RiskPreference::parse(s))
        .unwrap_or(RiskPreference::Medium);
    let amount = params
        .get("amount")
        .and_then(|s| s.trim().parse::<f64>().ok())
        .unwrap_or(10_000.0);

    match state.aggregator.portfolio(preference, amount).await {
        Ok(payload) => Json((*payload).clone()).into_response(),
        Err(err) => error_response(err),
    }
}

/// GET /risk/analysis?platform=aave
async fn get_risk_analysis(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    match state
        .aggregator
        .risk_analysis(params.get("platform").map(|s| s.as_str()))
        .await
    {
        Ok(payload) => {
            if payload.get("error").is_some() {
                (StatusCode::NOT_FOUND, Json((*payload).clone())).into_response()
            } else {
                Json((*payload).clone()).into_response()
            }
        }
        Err(err) => error_response(err),
    }
}

/// GET /prices
async fn get_prices(State(state): State<Arc<AppState>>) -> Response {
    match state.aggregator.stablecoin_prices().await {
        Ok(payload) => Json((*payload).clone()).into_response(),
        Err(err) => error_response(err),
    }
}

/// GET /tvl
async fn get_tvl(State(state): State<Arc<AppState>>) -> Response {
    match state.aggregator.protocol_tvl().await {
        Ok(payload) => Json((*payload).clone()).into_response(),
        Err(err) => error_response(err),
    }
}

/// GET /health
async fn health() -> &'static str {
    "OK"
}

pub fn create_rest_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/yields", get(get_yields))
        .route("/yields/best", get(get_best_yields))
        .route("/yields/historical/:pool_id", get(get_historical))
        .route("/yields/cross-chain/:symbol", get(get_cross_chain))
        .route("/portfolio/optimize", get(get_portfolio))
        .route("/risk/analysis", get(get_risk_analysis))
        .route("/prices", get(get_prices))
        .route("/tvl", get(get_tvl))
        .route("/health", get(health))
        .with_state(state)
}

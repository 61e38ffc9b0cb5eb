mod api;
mod config;
mod models;
mod services;
mod sources;

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::AppState;
use config::Config;
use services::YieldAggregator;
use sources::llama::{LlamaYields, TvlSource};
use sources::prices::PriceSource;
use sources::HttpFetcher;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,stable_yields=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!("✓ Configuration loaded");

    let fetcher = Arc::new(HttpFetcher::new(&config.upstream)?);
    let aggregator = Arc::new(YieldAggregator::new(
        Arc::new(LlamaYields::new(
            fetcher.clone(),
            config.upstream.yields_url.clone(),
        )),
        PriceSource::new(fetcher.clone(), config.upstream.prices_url.clone()),
        TvlSource::new(fetcher, config.upstream.tvl_url.clone()),
        &config.cache,
    ));

    let state = Arc::new(AppState { aggregator });
    let app = api::create_rest_router(state).layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("✓ Server ready on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use predflux_core::aggregate::StockService;
use predflux_core::domain::news::NewsItem;
use predflux_core::domain::stock::{SearchResult, Stock, StockDetails};
use predflux_core::llm::anthropic::AnthropicClient;
use predflux_core::llm::LlmClient;
use predflux_core::market::finnhub::FinnhubClient;
use predflux_core::news::NewsFeed;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = predflux_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    // Market data is the hard dependency; without it the stock endpoints
    // answer 503. The LLM is softer: details fall back to the placeholder.
    let service: Option<StockService> = match FinnhubClient::from_settings(&settings) {
        Ok(finnhub) => {
            let llm: Option<Arc<dyn LlmClient>> = match AnthropicClient::from_settings(&settings) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "LLM client unavailable; serving placeholder analyses");
                    None
                }
            };
            Some(StockService::new(Arc::new(finnhub), llm))
        }
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "market data client unavailable; starting API in degraded mode");
            None
        }
    };

    let news = NewsFeed::from_env()?;
    let state = AppState { service, news };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/stocks/:ticker", get(get_stock))
        .route("/api/news", get(get_news))
        .route("/api/search", get(search_stocks))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    service: Option<StockService>,
    news: NewsFeed,
}

#[derive(Debug, Deserialize)]
struct DashboardParams {
    symbols: Option<String>,
}

async fn get_dashboard(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<Vec<Stock>>, StatusCode> {
    let Some(service) = &state.service else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let symbols = parse_symbols(params.symbols.as_deref());
    Ok(Json(service.dashboard_stocks(&symbols).await))
}

async fn get_stock(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<StockDetails>, StatusCode> {
    let Some(service) = &state.service else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let details = service
        .stock_details(&ticker)
        .await
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(details))
}

#[derive(Debug, Deserialize)]
struct NewsParams {
    page: Option<usize>,
}

async fn get_news(
    State(state): State<AppState>,
    Query(params): Query<NewsParams>,
) -> Json<Vec<NewsItem>> {
    Json(state.news.page(params.page.unwrap_or(1)).await)
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
}

async fn search_stocks(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, StatusCode> {
    let query = params.q.unwrap_or_default();

    // A blank query is an empty result, degraded or not.
    if query.trim().is_empty() {
        return Ok(Json(SearchResponse {
            results: Vec::new(),
        }));
    }

    let Some(service) = &state.service else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    Ok(Json(SearchResponse {
        results: service.search(&query).await,
    }))
}

fn parse_symbols(raw: Option<&str>) -> Vec<String> {
    let parsed: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if parsed.is_empty() {
        predflux_core::config::dashboard_symbols()
    } else {
        parsed
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &predflux_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

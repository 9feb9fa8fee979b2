use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use divgrowth_core::config::parse_symbol_list;
use divgrowth_core::domain::recommendation::{Recommendation, ScreenReport};
use divgrowth_core::domain::stock::StockRecord;
use divgrowth_core::ingest::provider::AlphaVantageClient;
use divgrowth_core::ingest::universe::{self, Universe, UniverseOptions};
use divgrowth_core::screen;
use divgrowth_core::time::market;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = divgrowth_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let provider = match AlphaVantageClient::from_settings(&settings) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            tracing::warn!(error = %e, "data provider not configured; live screening disabled");
            None
        }
    };

    let state = AppState {
        provider,
        universe_opts: UniverseOptions::from_env(),
    };

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/screen", get(screen_symbols).post(screen_records))
        .route("/screen/:symbol", get(screen_one))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Clone)]
struct AppState {
    provider: Option<Arc<AlphaVantageClient>>,
    universe_opts: UniverseOptions,
}

#[derive(Debug, Deserialize)]
struct ScreenQuery {
    symbols: Option<String>,
    as_of_date: Option<String>,
}

/// Screens caller-supplied records; no provider involved.
async fn screen_records(
    Json(records): Json<BTreeMap<String, StockRecord>>,
) -> Json<Vec<Recommendation>> {
    Json(screen::rank(screen::screen(&records)))
}

async fn screen_symbols(
    State(state): State<AppState>,
    Query(query): Query<ScreenQuery>,
) -> Result<Json<ScreenReport>, StatusCode> {
    let symbols = parse_symbol_list(query.symbols.as_deref().unwrap_or_default());
    if symbols.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let as_of_date = market::resolve_live_as_of_date(query.as_of_date.as_deref(), Utc::now())
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let universe = fetch(&state, &symbols, as_of_date).await?;
    if universe.all_failed() {
        return Err(StatusCode::BAD_GATEWAY);
    }

    Ok(Json(ScreenReport {
        as_of_date,
        generated_at: Utc::now(),
        screened: universe.records.len(),
        recommendations: screen::rank(screen::screen(&universe.records)),
        failures: universe.failures,
    }))
}

async fn screen_one(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<Recommendation>, StatusCode> {
    let symbols = parse_symbol_list(&symbol);
    if symbols.len() != 1 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let as_of_date = market::resolve_live_as_of_date(None, Utc::now())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let universe = fetch(&state, &symbols, as_of_date).await?;
    if let Some(failure) = universe.failures.first() {
        return Err(if failure.kind == "not_found" {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::BAD_GATEWAY
        });
    }

    screen::screen(&universe.records)
        .into_iter()
        .next()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn fetch(
    state: &AppState,
    symbols: &[String],
    as_of_date: chrono::NaiveDate,
) -> Result<Universe, StatusCode> {
    let Some(provider) = state.provider.as_deref() else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    universe::fetch_universe(provider, provider, symbols, as_of_date, &state.universe_opts)
        .await
        .map_err(|e| {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "universe fetch failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn init_sentry(settings: &divgrowth_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

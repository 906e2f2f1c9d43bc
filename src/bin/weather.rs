//! Weather forecast demo for hybrid-cache.
//!
//! `weather poll` fetches the forecast in a loop and logs how long each call
//! took: about two seconds whenever the source runs, near zero on a cache hit.
//! `weather serve` exposes the same cached forecast at `GET /weatherforecast`.

use anyhow::Context;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Days, Local, NaiveDate};
use clap::{Parser, Subcommand};
use hybrid_cache::{
    CacheError, DistributedStore, EntryOptions, HybridCache, HybridCacheBuilder,
    HybridCacheConfig, MemoryDistributedStore, MetricsStore, RedisStore, RedisStoreConfig,
    TracingSink, cancel_after,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const CACHE_KEY: &str = "weather";

const SOURCE_LATENCY: Duration = Duration::from_millis(2000);

const SUMMARIES: [&str; 10] = [
    "Freezing",
    "Bracing",
    "Chilly",
    "Cool",
    "Mild",
    "Warm",
    "Balmy",
    "Hot",
    "Sweltering",
    "Scorching",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct WeatherForecast {
    date: NaiveDate,
    temperature_c: i32,
    temperature_f: i32,
    summary: String,
}

impl WeatherForecast {
    fn random(days_ahead: u64) -> Self {
        let mut rng = rand::thread_rng();
        let temperature_c = rng.gen_range(-20..55);

        WeatherForecast {
            date: Local::now().date_naive() + Days::new(days_ahead),
            temperature_c,
            temperature_f: fahrenheit(temperature_c),
            summary: SUMMARIES[rng.gen_range(0..SUMMARIES.len())].to_string(),
        }
    }
}

fn fahrenheit(celsius: i32) -> i32 {
    32 + (f64::from(celsius) / 0.5556) as i32
}

/// The expensive source: a slow upstream that produces `days` forecasts.
async fn fetch_from_source(days: u64) -> Result<Vec<WeatherForecast>, Infallible> {
    tokio::time::sleep(SOURCE_LATENCY).await;
    tracing::info!(days, "fetching weather from source");

    Ok((1..=days).map(WeatherForecast::random).collect())
}

/// Local copies live 5s, the distributed copy 10s.
fn forecast_options() -> EntryOptions {
    EntryOptions::new(Duration::from_secs(5), Duration::from_secs(10))
}

#[derive(Parser)]
#[command(name = "weather", version, about = "Cached weather forecasts")]
struct Cli {
    /// Redis URL for the distributed tier; an in-process store is used when unset
    #[arg(long, env = "REDIS_URL", global = true)]
    redis_url: Option<String>,

    /// JSON file with cache settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level, overridden by RUST_LOG
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch the forecast in a loop and log the elapsed time of each call
    Poll {
        /// Pause between iterations in milliseconds
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,

        /// Stop after this many iterations
        #[arg(long)]
        iterations: Option<u64>,
    },
    /// Serve forecasts over HTTP
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: SocketAddr,

        /// Per-request deadline in milliseconds
        #[arg(long, default_value_t = 30_000)]
        request_timeout_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let cache = build_cache(&cli).await?;

    match cli.command {
        Command::Poll {
            interval_ms,
            iterations,
        } => poll(cache, Duration::from_millis(interval_ms), iterations).await,
        Command::Serve {
            bind,
            request_timeout_ms,
        } => serve(cache, bind, Duration::from_millis(request_timeout_ms)).await,
    }
}

fn init_tracing(level: &str) {
    // RUST_LOG wins over the command line
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}

async fn build_cache(cli: &Cli) -> anyhow::Result<HybridCache<Vec<WeatherForecast>>> {
    let config = match &cli.config {
        Some(path) => HybridCacheConfig::from_json_file(path)
            .with_context(|| format!("failed to load cache config from {}", path.display()))?,
        None => HybridCacheConfig::default(),
    };

    let store: Arc<dyn DistributedStore> = match &cli.redis_url {
        Some(url) => {
            let redis = RedisStore::new(RedisStoreConfig { url: url.clone() })
                .await
                .context("failed to connect to the distributed cache")?;
            tracing::info!("using redis distributed tier");
            Arc::new(redis)
        }
        None => {
            tracing::info!("REDIS_URL not set, using in-process distributed tier");
            Arc::new(MemoryDistributedStore::default())
        }
    };
    let store = Arc::new(MetricsStore::new(store, Arc::new(TracingSink)));

    Ok(HybridCacheBuilder::from_config(config)
        .distributed(store)
        .build())
}

async fn poll(
    cache: HybridCache<Vec<WeatherForecast>>,
    interval: Duration,
    iterations: Option<u64>,
) -> anyhow::Result<()> {
    let shutdown = shutdown_token();
    let options = forecast_options();
    let mut completed = 0;

    tracing::info!("console service started");

    while iterations.is_none_or(|limit| completed < limit) {
        let start = Instant::now();
        let result = cache
            .get_or_create(CACHE_KEY, |_| fetch_from_source(1), Some(&options), &shutdown)
            .await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(forecast) => tracing::info!(elapsed_ms, ?forecast, "weather"),
            Err(CacheError::Cancelled) => break,
            Err(err) => tracing::warn!(elapsed_ms, error = %err, "fetching weather failed, retrying"),
        }
        completed += 1;

        tokio::select! {
            () = shutdown.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }
    }

    tracing::info!(completed, "console service stopped");
    Ok(())
}

/// A token that is cancelled on Ctrl-C.
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let on_signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
        }
        on_signal.cancel();
    });
    token
}

#[derive(Clone)]
struct AppState {
    cache: HybridCache<Vec<WeatherForecast>>,
    request_timeout: Duration,
    shutdown: CancellationToken,
}

/// Maps cache errors onto HTTP responses.
struct ApiError(CacheError);

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            CacheError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

async fn get_weather_forecast(
    State(state): State<AppState>,
) -> Result<Json<Vec<WeatherForecast>>, ApiError> {
    let deadline = cancel_after(&state.shutdown, state.request_timeout);

    let forecast = state
        .cache
        .get_or_create(CACHE_KEY, |_| fetch_from_source(5), Some(&forecast_options()), &deadline)
        .await?;

    Ok(Json(forecast))
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/weatherforecast", get(get_weather_forecast))
        .with_state(state)
}

async fn serve(
    cache: HybridCache<Vec<WeatherForecast>>,
    bind: SocketAddr,
    request_timeout: Duration,
) -> anyhow::Result<()> {
    let shutdown = shutdown_token();
    let state = AppState {
        cache,
        request_timeout,
        shutdown: shutdown.clone(),
    };

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    tracing::info!(%bind, "serving weather forecasts");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state(request_timeout: Duration) -> AppState {
        AppState {
            cache: HybridCacheBuilder::new()
                .distributed(Arc::new(MemoryDistributedStore::default()))
                .build(),
            request_timeout,
            shutdown: CancellationToken::new(),
        }
    }

    #[test]
    fn test_fahrenheit() {
        assert_eq!(fahrenheit(0), 32);
        assert_eq!(fahrenheit(100), 211);
        assert_eq!(fahrenheit(-20), -3);
    }

    #[test]
    fn test_random_forecast_is_consistent() {
        let forecast = WeatherForecast::random(1);
        assert!((-20..55).contains(&forecast.temperature_c));
        assert_eq!(forecast.temperature_f, fahrenheit(forecast.temperature_c));
        assert!(SUMMARIES.contains(&forecast.summary.as_str()));
        assert!(forecast.date > Local::now().date_naive());
    }

    #[test]
    fn test_error_status_codes() {
        let cancelled = ApiError::from(CacheError::Cancelled).into_response();
        assert_eq!(cancelled.status(), StatusCode::SERVICE_UNAVAILABLE);

        let failed = ApiError::from(CacheError::from_source("upstream down")).into_response();
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_serves_cached_forecast() {
        let state = test_state(Duration::from_secs(30));

        let start = tokio::time::Instant::now();
        let Json(first) = get_weather_forecast(State(state.clone())).await.ok().unwrap();
        assert_eq!(first.len(), 5);
        assert!(start.elapsed() >= SOURCE_LATENCY);

        let start = tokio::time::Instant::now();
        let Json(second) = get_weather_forecast(State(state)).await.ok().unwrap();
        assert_eq!(first, second);
        assert!(start.elapsed() < SOURCE_LATENCY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_deadline_is_service_unavailable() {
        let state = test_state(Duration::from_millis(100));

        let err = match get_weather_forecast(State(state)).await {
            Ok(_) => panic!("Expected the deadline to expire"),
            Err(err) => err,
        };
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockcast_core::domain::catalog::{self, Sector};
use stockcast_core::domain::forecast::ModelKind;
use stockcast_core::forecast::service::{ForecastOutcome, ForecastRequest, ForecastService};
use stockcast_core::ingest::SectorPerformance;
use stockcast_core::ForecastError;

const DEFAULT_HORIZON: usize = 30;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = stockcast_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let provider = stockcast_core::ingest::provider_from_settings(&settings)?;
    let service = ForecastService::from_settings(&settings, provider)?;
    tracing::info!(
        config = ?service.config(),
        max_horizon = service.max_horizon(),
        "forecast service ready"
    );

    let state = AppState {
        service: Arc::new(service),
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/sectors", get(get_sectors))
        .route("/sectors/:name/performance", get(get_sector_performance))
        .route("/forecast/:ticker", get(get_forecast))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

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
    service: Arc<ForecastService>,
}

async fn get_sectors() -> Json<&'static [Sector]> {
    Json(catalog::sectors())
}

async fn get_sector_performance(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<SectorPerformance>, ApiError> {
    let today = chrono::Utc::now().date_naive();
    let perf = state
        .service
        .sector_performance(&name, today)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(perf))
}

#[derive(Debug, Deserialize)]
struct ForecastQuery {
    model: Option<String>,
    horizon: Option<String>,
    start: Option<String>,
    end: Option<String>,
}

async fn get_forecast(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Query(query): Query<ForecastQuery>,
) -> Result<Json<ForecastOutcome>, ApiError> {
    let model = match query.model.as_deref() {
        Some(s) => s
            .parse::<ModelKind>()
            .map_err(|e| ApiError::from(ForecastError::InvalidRequest(e)))?,
        None => ModelKind::Arima,
    };

    let (start, end) = stockcast_core::time::range::resolve_date_range(
        query.start.as_deref(),
        query.end.as_deref(),
        chrono::Utc::now(),
    )
    .map_err(|e| ApiError::from(ForecastError::InvalidRequest(format!("{e:#}"))))?;

    let req = ForecastRequest {
        ticker,
        start,
        end,
        model,
        horizon: parse_horizon(query.horizon.as_deref()).map_err(ApiError::from)?,
    };

    let outcome = state.service.run(req).await.map_err(ApiError::from)?;
    Ok(Json(outcome))
}

fn parse_horizon(raw: Option<&str>) -> Result<usize, ForecastError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(DEFAULT_HORIZON),
        Some(s) => s.parse::<usize>().map_err(|_| {
            ForecastError::InvalidRequest(format!(
                "horizon must be an integer (got {s:?})"
            ))
        }),
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl From<ForecastError> for ApiError {
    fn from(err: ForecastError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            let report = anyhow::Error::new(err.clone());
            sentry_anyhow::capture_anyhow(&report);
            tracing::error!(error = %err, "forecast request failed");
        } else {
            tracing::info!(error = %err, "forecast request rejected");
        }

        ApiError {
            status,
            body: ErrorBody {
                kind: err.kind(),
                message: err.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn status_for(err: &ForecastError) -> StatusCode {
    match err {
        ForecastError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        ForecastError::DataUnavailable { .. } => StatusCode::NOT_FOUND,
        ForecastError::InsufficientData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ForecastError::ProviderError { .. } => StatusCode::BAD_GATEWAY,
        ForecastError::ModelFitError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &stockcast_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

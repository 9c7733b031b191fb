use anyhow::Context;
use clap::{Parser, Subcommand};
use stockcast_core::domain::catalog;
use stockcast_core::domain::forecast::ModelKind;
use stockcast_core::forecast::service::{ForecastRequest, ForecastService};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "stockcast", about = "Forecast daily closing prices with ARIMA or LSTM")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch history, forecast, and write the chart JSON.
    Forecast(ForecastArgs),

    /// List the ticker catalog by sector.
    Sectors,

    /// Trailing-month performance of every ticker in a sector.
    Performance(PerformanceArgs),
}

#[derive(Debug, clap::Args)]
struct PerformanceArgs {
    /// Sector name as listed by `sectors` (case-insensitive).
    #[arg(long)]
    sector: String,

    /// Print JSON instead of a table.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, clap::Args)]
struct ForecastArgs {
    #[arg(long)]
    ticker: String,

    /// arima or lstm.
    #[arg(long, default_value = "arima")]
    model: ModelKind,

    /// Days to forecast.
    #[arg(long, default_value_t = 30)]
    horizon: usize,

    /// History start (YYYY-MM-DD). Defaults to one year before the end date.
    #[arg(long)]
    start: Option<String>,

    /// History end (YYYY-MM-DD), inclusive. Defaults to today (UTC).
    #[arg(long)]
    end: Option<String>,

    /// Seed the sequence model for reproducible runs.
    #[arg(long)]
    seed: Option<u64>,

    /// Write the outcome JSON here instead of stdout.
    #[arg(long)]
    output: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = stockcast_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    match args.command {
        Command::Sectors => {
            for sector in catalog::sectors() {
                println!("{}: {}", sector.name, sector.tickers.join(", "));
            }
            Ok(())
        }
        Command::Forecast(fa) => {
            let res = run_forecast(&settings, fa).await;
            if let Err(err) = &res {
                sentry_anyhow::capture_anyhow(err);
                tracing::error!(error = %err, "forecast run failed");
            }
            res
        }
        Command::Performance(pa) => {
            let res = run_performance(&settings, pa).await;
            if let Err(err) = &res {
                sentry_anyhow::capture_anyhow(err);
                tracing::error!(error = %err, "sector performance failed");
            }
            res
        }
    }
}

async fn run_forecast(
    settings: &stockcast_core::config::Settings,
    args: ForecastArgs,
) -> anyhow::Result<()> {
    let (start, end) = stockcast_core::time::range::resolve_date_range(
        args.start.as_deref(),
        args.end.as_deref(),
        chrono::Utc::now(),
    )?;

    let provider = stockcast_core::ingest::provider_from_settings(settings)?;
    let mut service = ForecastService::from_settings(settings, provider)?;
    if let Some(seed) = args.seed {
        let config = service.config().clone().with_seed(seed);
        service = service.with_config(config);
    }

    let outcome = service
        .run(ForecastRequest {
            ticker: args.ticker.clone(),
            start,
            end,
            model: args.model,
            horizon: args.horizon,
        })
        .await
        .with_context(|| format!("{} forecast for {} failed", args.model, args.ticker))?;

    tracing::info!(
        ticker = %outcome.ticker,
        model = %outcome.model,
        observations = outcome.observations,
        first = ?outcome.forecast.values.first(),
        last = ?outcome.forecast.values.last(),
        "forecast ready"
    );

    let json = serde_json::to_string_pretty(&outcome).context("serialize outcome failed")?;
    match args.output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("write {} failed", path.display()))?;
            tracing::info!(path = %path.display(), "wrote forecast");
        }
        None => println!("{json}"),
    }
    Ok(())
}

async fn run_performance(
    settings: &stockcast_core::config::Settings,
    args: PerformanceArgs,
) -> anyhow::Result<()> {
    let provider = stockcast_core::ingest::provider_from_settings(settings)?;
    let today = chrono::Utc::now().date_naive();
    let perf = stockcast_core::ingest::sector_performance(provider.as_ref(), &args.sector, today)
        .await
        .with_context(|| format!("performance for sector {} failed", args.sector))?;

    if args.json {
        let json = serde_json::to_string_pretty(&perf).context("serialize performance failed")?;
        println!("{json}");
        return Ok(());
    }

    println!("{} ({} to {})", perf.sector, perf.start, perf.end);
    for t in &perf.tickers {
        println!(
            "{:<6} {:>+8.2}%  {:>10.2} -> {:<10.2}",
            t.ticker, t.pct_change, t.first_close, t.last_close
        );
    }
    Ok(())
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

use anyhow::Context;
use clap::Parser;
use divgrowth_core::domain::recommendation::ScreenReport;
use divgrowth_core::ingest::provider::AlphaVantageClient;
use divgrowth_core::ingest::universe::{self, Universe, UniverseOptions};
use divgrowth_core::time::market;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod report;

#[derive(Debug, Parser)]
#[command(name = "divgrowth_worker")]
struct Args {
    /// Market as-of date (YYYY-MM-DD). Defaults to the latest closed US session. Live fetches
    /// reject dates before it.
    #[arg(long)]
    as_of_date: Option<String>,

    /// Comma separated tickers to fetch. Falls back to SCREEN_SYMBOLS.
    #[arg(long, value_delimiter = ',', conflicts_with = "records_file")]
    symbols: Vec<String>,

    /// Screen a JSON object of `symbol -> record` instead of calling the provider.
    #[arg(long)]
    records_file: Option<std::path::PathBuf>,

    #[arg(long, value_enum, default_value_t = report::Format::Table)]
    format: report::Format,

    /// Keep only the top N recommendations.
    #[arg(long)]
    limit: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = divgrowth_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    // Live quotes only describe the latest session; past dates apply to records files.
    let now = chrono::Utc::now();
    let as_of_date = if args.records_file.is_some() {
        market::resolve_as_of_date(args.as_of_date.as_deref(), now)?
    } else {
        market::resolve_live_as_of_date(args.as_of_date.as_deref(), now)?
    };

    let universe = match &args.records_file {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read records file {}", path.display()))?;
            Universe {
                records: report::parse_records(&text)?,
                failures: Vec::new(),
            }
        }
        None => {
            let symbols = if args.symbols.is_empty() {
                settings.screen_symbols.clone()
            } else {
                args.symbols.clone()
            };
            anyhow::ensure!(
                !symbols.is_empty(),
                "no symbols given: pass --symbols, --records-file or set SCREEN_SYMBOLS"
            );

            let client = AlphaVantageClient::from_settings(&settings)?;
            universe::fetch_universe(
                &client,
                &client,
                &symbols,
                as_of_date,
                &UniverseOptions::from_env(),
            )
            .await?
        }
    };

    if universe.all_failed() {
        let err = anyhow::anyhow!(
            "every symbol failed to fetch ({} failures)",
            universe.failures.len()
        );
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(%as_of_date, error = %err, "screen run failed");
        return Err(err);
    }

    let mut recommendations =
        divgrowth_core::screen::rank(divgrowth_core::screen::screen(&universe.records));
    if let Some(limit) = args.limit {
        recommendations.truncate(limit);
    }

    let out = ScreenReport {
        as_of_date,
        generated_at: chrono::Utc::now(),
        screened: universe.records.len(),
        recommendations,
        failures: universe.failures,
    };

    tracing::info!(
        %as_of_date,
        screened = out.screened,
        recommended = out.recommendations.len(),
        failures = out.failures.len(),
        "screen run complete"
    );

    println!("{}", report::render(&out, args.format)?);
    Ok(())
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

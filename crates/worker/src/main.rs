use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use predflux_core::llm::error::LlmCallError;
use predflux_core::llm::{LlmClient, ReportInput};
use predflux_core::market::types::CompanyProfile;
use predflux_core::market::MarketDataProvider;

mod payload;

#[derive(Debug, Parser)]
#[command(name = "predflux_worker")]
struct Args {
    /// Market as-of date (YYYY-MM-DD). Defaults to the latest IST trading day.
    #[arg(long)]
    as_of_date: Option<String>,

    /// Build the payload and stop before calling the model.
    #[arg(long)]
    dry_run: bool,

    /// Write the report JSON here instead of stdout.
    #[arg(long)]
    out: Option<std::path::PathBuf>,
}

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

    let args = Args::parse();

    if let Err(err) = run(&settings, &args).await {
        sentry_anyhow::capture_anyhow(&err);
        if let Some(call) = err.downcast_ref::<LlmCallError>() {
            if let Some(raw) = call.raw_output.as_deref() {
                tracing::error!(stage = call.stage, raw = truncate(raw, 2000), "raw model output");
            }
        }
        tracing::error!(error = %err, "daily report run failed");
        return Err(err);
    }

    Ok(())
}

async fn run(settings: &predflux_core::config::Settings, args: &Args) -> anyhow::Result<()> {
    let as_of_date = predflux_core::time::in_market::resolve_as_of_date(
        args.as_of_date.as_deref(),
        chrono::Utc::now(),
    )?;

    // A batch job has no degraded mode; both clients are required up front.
    let provider = predflux_core::market::finnhub::FinnhubClient::from_settings(settings)?;
    let llm = predflux_core::llm::anthropic::AnthropicClient::from_settings(settings)?;

    let universe = predflux_core::config::dashboard_symbols();

    let mut rows = Vec::with_capacity(universe.len());
    let mut covered = Vec::with_capacity(universe.len());
    for symbol in &universe {
        let quote = match provider.quote(symbol).await {
            Ok(q) => q,
            Err(err) => {
                tracing::warn!(%symbol, error = %err, "quote fetch failed; leaving symbol out of the report");
                continue;
            }
        };
        let profile = match provider.profile(symbol).await {
            Ok(p) => p,
            Err(err) => {
                tracing::warn!(%symbol, error = %err, "profile fetch failed; continuing without a name");
                CompanyProfile {
                    ticker: None,
                    name: None,
                    exchange: None,
                    currency: None,
                }
            }
        };
        rows.push(payload::quote_row(symbol, &quote, &profile));
        covered.push(symbol.clone());
    }
    anyhow::ensure!(
        !rows.is_empty(),
        "no quotes available for any dashboard symbol"
    );

    let articles = match provider.market_news("general").await {
        Ok(articles) => articles,
        Err(err) => {
            tracing::warn!(error = %err, "market news fetch failed; reporting without headlines");
            Vec::new()
        }
    };

    let stock_data = payload::build_stock_data(rows, &articles);

    if args.dry_run {
        tracing::info!(
            %as_of_date,
            dry_run = true,
            stocks = covered.len(),
            headlines = articles.len().min(payload::MARKET_NEWS_HEADLINES),
            "dry run: payload built, skipping the model call"
        );
        return Ok(());
    }

    let report = llm
        .generate_daily_report(ReportInput {
            report_date: as_of_date,
            universe: covered,
            stock_data,
        })
        .await?;

    let rendered =
        serde_json::to_string_pretty(&report).context("failed to render the report JSON")?;
    match &args.out {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("failed to write report to {}", path.display()))?;
            tracing::info!(
                %as_of_date,
                report_id = %report.report_id,
                out = %path.display(),
                "daily report written"
            );
        }
        None => {
            println!("{rendered}");
            tracing::info!(%as_of_date, report_id = %report.report_id, "daily report generated");
        }
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
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

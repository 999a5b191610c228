use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marketlens_core::analysis;
use marketlens_core::domain::market::seed_recent_analyses;
use marketlens_core::domain::request::{AnalysisKind, Timeframe};
use marketlens_core::form::AnalysisForm;
use marketlens_core::market::{self, MarketOverview};
use marketlens_core::page::CompletedAnalysis;
use marketlens_core::subscription::Tier;
use marketlens_core::view::dashboard::{market_rows, recent_rows};

mod render;

#[derive(Debug, Parser)]
#[command(name = "marketlens", about = "Run market analyses from the terminal")]
struct Args {
    /// Subscription tier used for the quota check. Overrides SUBSCRIPTION_TIER.
    #[arg(long, global = true)]
    tier: Option<Tier>,

    /// Remaining analyses. Overrides SUBSCRIPTION_REMAINING.
    #[arg(long, global = true, allow_hyphen_values = true)]
    remaining: Option<i64>,

    /// Print JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Analyze a ticker symbol.
    Ticker {
        symbol: String,
        #[arg(long, default_value = "daily")]
        timeframe: Timeframe,
    },
    /// Analyze a chart image (PNG or JPEG).
    Chart { path: std::path::PathBuf },
    /// Ask a free-form question.
    Question { text: String },
    /// Print the market overview.
    Market {
        /// Fetch fresh rows from the configured provider first.
        #[arg(long)]
        refresh: bool,
    },
    /// Print the recent analyses table.
    Recent,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = marketlens_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let mut subscription = match args.tier {
        Some(tier) => marketlens_core::subscription::Subscription::for_tier(tier),
        None => settings.subscription()?,
    };
    if let Some(remaining) = args.remaining {
        subscription.remaining_analysis = remaining;
    }

    let mut form = AnalysisForm::new();
    match args.command {
        Command::Ticker { symbol, timeframe } => {
            form.set_mode(AnalysisKind::Ticker);
            form.set_ticker(symbol);
            form.set_timeframe(timeframe);
        }
        Command::Chart { path } => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("failed to read chart image {}", path.display()))?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            form.set_mode(AnalysisKind::Chart);
            form.drop_files(vec![(file_name, bytes)])?;
        }
        Command::Question { text } => {
            form.set_mode(AnalysisKind::Question);
            form.set_question(text);
        }
        Command::Market { refresh } => {
            let mut overview = MarketOverview::default();
            if refresh {
                let provider = market::provider::from_settings(&settings)?;
                tracing::info!(provider = provider.provider_name(), "refreshing market rows");
                overview.refresh(provider.as_ref()).await;
            }
            if args.json {
                println!("{}", serde_json::to_string_pretty(overview.items())?);
            } else {
                print!("{}", render::market_table(&market_rows(overview.items())));
            }
            return Ok(());
        }
        Command::Recent => {
            let records = seed_recent_analyses();
            if args.json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                print!("{}", render::recent_table(&recent_rows(&records)));
            }
            return Ok(());
        }
    }

    let service = analysis::from_settings(&settings)?;
    tracing::info!(
        provider = service.provider().as_str(),
        mode = %form.mode(),
        remaining = subscription.remaining_analysis,
        "submitting analysis"
    );

    let submission = match form.submit(&subscription, service.as_ref()).await {
        Ok(s) => s,
        Err(e) => {
            let message = form.error().map(str::to_string).unwrap_or_else(|| e.to_string());
            return Err(anyhow::Error::new(e).context(message));
        }
    };
    subscription.record_analysis();

    let completed = CompletedAnalysis {
        request: submission.request,
        report: submission.report,
        generated_on: chrono::Local::now().date_naive(),
        feedback: None,
    };

    if args.json {
        let out = serde_json::json!({
            "request": completed.request,
            "report": completed.report,
            "remaining_analysis": subscription.remaining_analysis,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print!("{}", render::report(&completed.view()));
        println!("Remaining analyses: {}", subscription.remaining_analysis);
    }

    Ok(())
}

fn init_sentry(settings: &marketlens_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

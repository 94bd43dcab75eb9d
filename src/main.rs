use std::{io, path::PathBuf, sync::Arc};

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::Parser;
use tracing::{info, warn};

use fare_finder::{
    logging, Config, FailurePolicy, HttpPricingClient, LineReporter, Pipeline, QueryTemplate,
};

#[derive(Parser)]
#[command(
    name = "fare-finder",
    version,
    about = "Find the cheapest round trip from every attendee's city to one destination"
)]
struct Cli {
    /// Destination city or airport code
    #[arg(long)]
    destination: String,

    /// First possible departure date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    start_date: NaiveDate,

    /// Last possible departure date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    end_date: NaiveDate,

    /// Length of the stay in nights
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    nights: u32,

    /// Path to the YAML configuration with rules and attendees
    #[arg(long, default_value = "conf.yml")]
    config: PathBuf,

    /// Report a failed origin and keep pricing the others instead of aborting
    #[arg(long)]
    isolate_failures: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|err| format!("expected YYYY-MM-DD: {err}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    if cli.isolate_failures {
        config.service.failure_policy = FailurePolicy::Isolate;
    }

    let template = QueryTemplate::new(&cli.destination, cli.start_date, cli.end_date, cli.nights)?
        .with_currency(config.service.currency.clone())
        .with_language(config.service.language.clone());

    let client = HttpPricingClient::new(&config.service)?;
    let pipeline = Pipeline::new(Arc::new(client), config.rules, config.service.clone());

    let cancel = pipeline.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight requests");
            cancel.cancel();
        }
    });

    let mut reporter = LineReporter::new(io::stdout());
    let report = pipeline
        .run(&config.attendees, &template, &mut reporter)
        .await?;

    let failed = report.failure_count();
    if failed > 0 {
        bail!("{failed} of {} origins failed", report.outcomes.len());
    }
    info!("All origins priced");
    Ok(())
}

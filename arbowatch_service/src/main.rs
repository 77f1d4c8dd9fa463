use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use chrono::{Duration, Local, NaiveDate};
use clap::{Parser, Subcommand};

use arbowatch_service::alert::{EmailNotifier, LogNotifier, Notifier};
use arbowatch_service::config::AppConfig;
use arbowatch_service::dashboard::{DashboardFilter, build_snapshot};
use arbowatch_service::ingest::{csv_table, db, synthetic};
use arbowatch_service::logging::{self, Stage};
use arbowatch_service::model::RawTable;
use arbowatch_service::municipalities::{self, Municipality};
use arbowatch_service::predict::{HttpRiskModel, RiskModel};
use arbowatch_service::run_batch;

const ENV_DATABASE_URL: &str = "DB_URL";

#[derive(Parser)]
#[command(name = "arbowatch")]
#[command(about = "Arbovirus early-warning pipeline for monitored municipalities", long_about = None)]
struct Cli {
    /// TOML config file; built-in defaults when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline once: load, preprocess, predict, alert
    Run {
        /// Raw table CSV; skips the database
        #[arg(long)]
        input: Option<PathBuf>,
        /// Surveillance database URL (falls back to DB_URL)
        #[arg(long)]
        database_url: Option<String>,
        /// Override the configured alert threshold
        #[arg(long)]
        threshold: Option<f64>,
        /// Log alerts instead of emailing them
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        alerts_out: Option<PathBuf>,
        #[arg(long)]
        scales_out: Option<PathBuf>,
        #[arg(long)]
        snapshot_out: Option<PathBuf>,
        /// Dashboard snapshot filter: municipality
        #[arg(long)]
        location: Option<String>,
        /// Dashboard snapshot filter: first date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Dashboard snapshot filter: last date (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Write a synthetic raw table to CSV
    Synthesize {
        #[arg(long, default_value = "synthetic.csv")]
        out: PathBuf,
        /// Days per municipality; defaults to the configured length
        #[arg(long)]
        days: Option<usize>,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// First date; defaults so the series ends today
        #[arg(long)]
        start: Option<NaiveDate>,
    },
}

fn monitored(config: &AppConfig) -> anyhow::Result<Vec<&'static Municipality>> {
    let mut found = Vec::new();
    for name in &config.data.municipalities {
        match municipalities::find_municipality(name) {
            Some(m) => found.push(m),
            None => logging::warn(Stage::Ingest, Some(name.as_str()), "not in the municipality registry; no synthetic data"),
        }
    }
    if found.is_empty() {
        bail!("none of the configured municipalities are in the registry");
    }
    Ok(found)
}

fn default_start(days: usize) -> NaiveDate {
    Local::now().date_naive() - Duration::days(days.saturating_sub(1) as i64)
}

fn synthetic_table(config: &AppConfig) -> anyhow::Result<RawTable> {
    let days = config.data.synthetic_days;
    let table = synthetic::generate_synthetic(&monitored(config)?, default_start(days), days, 42)?;
    Ok(table)
}

fn load_raw(config: &AppConfig, input: Option<&Path>, database_url: Option<String>) -> anyhow::Result<RawTable> {
    if let Some(path) = input {
        return csv_table::load_csv(path).with_context(|| format!("failed to read {}", path.display()));
    }

    let Some(url) = database_url.or_else(|| std::env::var(ENV_DATABASE_URL).ok()) else {
        logging::warn(Stage::Ingest, None, "no database configured; using synthetic data");
        return synthetic_table(config);
    };

    let loaded = db::connect(&url).and_then(|mut client| db::load_from_database(&mut client, &config.data.municipalities));
    match loaded {
        Ok(table) if !table.is_empty() => Ok(table),
        Ok(_) => {
            logging::warn(Stage::Ingest, None, "database returned no rows; using synthetic data");
            synthetic_table(config)
        }
        Err(err) => {
            logging::error(Stage::Ingest, None, &format!("database load failed ({}); using synthetic data", err));
            synthetic_table(config)
        }
    }
}

fn create(path: &Path) -> anyhow::Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    logging::init_logging(
        &config.logging.level,
        config.logging.file.as_deref(),
        config.logging.console_timestamps,
    )
    .context("failed to open log file")?;

    match cli.command {
        Commands::Run {
            input,
            database_url,
            threshold,
            dry_run,
            alerts_out,
            scales_out,
            snapshot_out,
            location,
            start,
            end,
        } => {
            let threshold = threshold.unwrap_or(config.alerts.threshold);
            if !(0.0..=1.0).contains(&threshold) {
                bail!("threshold must be within [0, 1], got {}", threshold);
            }

            let raw = load_raw(&config, input.as_deref(), database_url)?;

            let model = match HttpRiskModel::load(&config.model) {
                Ok(model) => Some(model),
                Err(err) => {
                    logging::log_model_failure(None, "model load", &err);
                    None
                }
            };
            let notifier: Box<dyn Notifier> = if dry_run {
                Box::new(LogNotifier)
            } else {
                Box::new(EmailNotifier::from_env())
            };

            let outcome = run_batch(
                &raw,
                model.as_ref().map(|m| m as &dyn RiskModel),
                notifier.as_ref(),
                threshold,
            )?;

            if let Some(path) = alerts_out {
                csv_table::write_alerts(create(&path)?, &outcome.alerts)?;
            }
            if let (Some(path), Some(params)) = (scales_out, &outcome.scale_params) {
                serde_json::to_writer_pretty(create(&path)?, params)?;
            }
            if let Some(path) = snapshot_out {
                let filter = DashboardFilter { location, start, end };
                let snapshot = build_snapshot(
                    &outcome.records,
                    &outcome.risks,
                    &outcome.alerts,
                    &filter,
                    config.alerts.recent_limit,
                );
                serde_json::to_writer_pretty(create(&path)?, &snapshot)?;
            }

            println!(
                "{} records, {} risk records, {} alerts",
                outcome.records.len(),
                outcome.risks.len(),
                outcome.alerts.len()
            );
        }
        Commands::Synthesize { out, days, seed, start } => {
            let days = days.unwrap_or(config.data.synthetic_days);
            let start = start.unwrap_or_else(|| default_start(days));
            let table = synthetic::generate_synthetic(&monitored(&config)?, start, days, seed)?;
            csv_table::write_raw_table(create(&out)?, &table)?;
            println!("Wrote {} rows to {}.", table.len(), out.display());
        }
    }

    Ok(())
}

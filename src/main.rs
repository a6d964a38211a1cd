use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use tutor_quality::alerts;
use tutor_quality::config::Settings;
use tutor_quality::db::{self, PgStore};
use tutor_quality::jobs::{BatchReport, Pipeline};
use tutor_quality::report;

#[derive(Parser)]
#[command(name = "tutor-quality")]
#[command(about = "Tutor session quality scoring and alerting", long_about = None)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,

    /// Optional TOML settings file
    #[arg(long, env = "TUTOR_QUALITY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import sessions from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Score completed sessions that have no SQS/FSQS yet
    ScoreSessions,
    /// Rebuild daily aggregates over the trailing window
    Aggregate,
    /// Recompute today's Tutor Health Score
    Health,
    /// Recompute today's Tutor Churn Risk Score
    Churn,
    /// Evaluate alerts for every scored tutor
    Alerts,
    /// Run every job in dependency order
    RunCycle,
    /// Print a tutor's performance summary
    Summary {
        #[arg(long)]
        tutor: Uuid,
    },
    /// Acknowledge an open alert
    Acknowledge {
        #[arg(long)]
        alert: Uuid,
        #[arg(long, default_value = "operator")]
        actor: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// Resolve an alert by hand
    Resolve {
        #[arg(long)]
        alert: Uuid,
        #[arg(long, default_value = "operator")]
        actor: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn print_batch(report: &BatchReport) {
    println!(
        "{}: {} succeeded, {} skipped, {} failed",
        report.job,
        report.succeeded,
        report.skipped,
        report.failed.len()
    );
    for failure in &report.failed {
        println!("  - {}: {}", failure.unit, failure.reason);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tutor_quality=info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&cli.database_url)
        .await
        .context("failed to connect to Postgres")?;
    let store = PgStore::new(pool);
    let pipeline = Pipeline::new(settings);
    let now = Utc::now();

    match cli.command {
        Commands::InitDb => {
            db::init_db(store.pool()).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let inserted = db::seed(&store, now.date_naive()).await?;
            println!("Inserted {inserted} seed sessions.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&store, &csv).await?;
            println!("Inserted {inserted} sessions from {}.", csv.display());
        }
        Commands::ScoreSessions => {
            print_batch(&pipeline.score_sessions(&store, now).await?);
        }
        Commands::Aggregate => {
            print_batch(&pipeline.aggregate_daily(&store, now.date_naive()).await?);
        }
        Commands::Health => {
            print_batch(&pipeline.recompute_health(&store, now).await?);
        }
        Commands::Churn => {
            print_batch(&pipeline.recompute_churn(&store, now).await?);
        }
        Commands::Alerts => {
            let sweep = pipeline.evaluate_alerts(&store, now).await?;
            print_batch(&sweep.report);
            for alert in &sweep.created {
                println!("+ {} {} for tutor {}", alert.id, alert.alert_type, alert.tutor_id);
            }
            for alert in &sweep.resolved {
                println!("- {} {} for tutor {}", alert.id, alert.alert_type, alert.tutor_id);
            }
        }
        Commands::RunCycle => {
            let cycle = pipeline.run_cycle(&store, now).await?;
            for report in [
                &cycle.scoring,
                &cycle.aggregation,
                &cycle.health,
                &cycle.churn,
                &cycle.alerts.report,
            ] {
                print_batch(report);
            }
            println!(
                "Alerts: {} created, {} resolved.",
                cycle.alerts.created.len(),
                cycle.alerts.resolved.len()
            );
        }
        Commands::Summary { tutor } => {
            match pipeline.summaries().summary(&store, tutor, now).await? {
                Some(summary) => {
                    println!("{}", summary.narrative);
                    if summary.fallback {
                        println!("(rule-based fallback)");
                    }
                }
                None => println!("No session quality scores for tutor {tutor}."),
            }
        }
        Commands::Acknowledge { alert, actor, note } => {
            let alert = alerts::acknowledge(&store, alert, &actor, note, now).await?;
            println!("Alert {} is now {}.", alert.id, alert.status);
        }
        Commands::Resolve { alert, actor, note } => {
            let alert = alerts::resolve_manually(&store, alert, &actor, note, now).await?;
            println!("Alert {} is now {}.", alert.id, alert.status);
        }
        Commands::Report { out } => {
            let data = report::collect(&store, now).await?;
            std::fs::write(&out, report::build_report(&data))
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Operational CLI for the reunite portal.
//!
//! The `rematch` command runs the full re-scoring sweep (typically from a
//! nightly scheduler). Ctrl-C cancels between pairs without leaving partial
//! match records: planning is pure, and every applied action is a complete
//! row.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Parser, Subcommand};
use reunite_case_models::{CaseQuery, MissingStatus, UidbStatus};
use reunite_database::review::MatchReviewer;
use reunite_database::{db, queries, rematch, run_migrations};
use reunite_engine::MatchConfig;
use reunite_engine::batch::plan_rematch;
use reunite_engine::face::embed_photo;

#[derive(Parser)]
#[command(name = "reunite_cli", about = "Reunite portal operations tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Re-score all open reports against all open UIDB records
    Rematch {
        /// Plan only; print what would change without writing
        #[arg(long)]
        dry_run: bool,
        /// Maximum number of missing-person reports to sweep (for testing)
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Print current dashboard statistics
    Stats {
        /// Trailing window in days for the average time-to-identify
        #[arg(long)]
        window_days: Option<i64>,
    },
    /// Compute the face embedding for an image file
    Embed {
        /// Path to the image file
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let cli = Cli::parse();
    match cli.command {
        Commands::Migrate => migrate().await,
        Commands::Rematch { dry_run, limit } => run_rematch(dry_run, limit).await,
        Commands::Stats { window_days } => print_stats(window_days).await,
        Commands::Embed { path } => embed_file(&path),
    }
}

async fn migrate() -> Result<(), Box<dyn std::error::Error>> {
    let db = db::connect_from_env().await?;
    run_migrations(db.as_ref()).await?;
    println!("Migrations complete");
    Ok(())
}

async fn run_rematch(dry_run: bool, limit: Option<u32>) -> Result<(), Box<dyn std::error::Error>> {
    let config = MatchConfig::from_env()?;
    let db = db::connect_from_env().await?;

    let persons = queries::list_missing_persons(
        db.as_ref(),
        &CaseQuery {
            status: Some(MissingStatus::Active.to_string()),
            limit,
            ..CaseQuery::default()
        },
    )
    .await?;

    let uidbs = queries::list_uidb_records(
        db.as_ref(),
        &CaseQuery {
            status: Some(UidbStatus::Unidentified.to_string()),
            ..CaseQuery::default()
        },
    )
    .await?;

    let existing = queries::all_matches(db.as_ref()).await?;

    log::info!(
        "Sweeping {} active report(s) against {} open UIDB record(s), {} match(es) on file",
        persons.len(),
        uidbs.len(),
        existing.len()
    );

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Cancellation requested; stopping after the current pair");
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    let plan = plan_rematch(&config, &persons, &uidbs, &existing, &cancel);

    println!(
        "Scored {} pair(s): {} action(s), {} skipped, {} failure(s){}",
        plan.scored_pairs,
        plan.actions.len(),
        plan.skipped_pairs,
        plan.failures.len(),
        if plan.cancelled { " (cancelled early)" } else { "" },
    );

    for failure in &plan.failures {
        log::warn!(
            "Pair ({}, {}) failed: {}",
            failure.missing_person_id,
            failure.uidb_id,
            failure.message
        );
    }

    if dry_run {
        println!("Dry run; nothing written");
        return Ok(());
    }

    let reviewer = MatchReviewer::new(db::connect_from_env().await?);
    let summary = rematch::apply_rematch_plan(db.as_ref(), &reviewer, &plan).await?;

    println!(
        "Inserted {} suggested match(es), superseded {}",
        summary.inserted, summary.superseded
    );
    if plan.cancelled {
        println!("Sweep was cancelled early; re-run to cover the remaining pairs");
    }
    Ok(())
}

async fn print_stats(window_days: Option<i64>) -> Result<(), Box<dyn std::error::Error>> {
    let db = db::connect_from_env().await?;
    let window = window_days.unwrap_or(reunite_analytics::DEFAULT_STATS_WINDOW_DAYS);
    let stats = reunite_analytics::dashboard_stats(db.as_ref(), window).await?;

    println!("Active missing reports:  {}", stats.active_missing);
    println!("UIDB records on file:    {}", stats.uidb_records);
    println!("Matches awaiting review: {}", stats.matches_suggested);
    println!("Confirmed matches:       {}", stats.confirmed_matches);
    match stats.avg_time_to_identify_days {
        Some(days) => println!("Avg time to identify:    {days:.1} days (trailing {window} days)"),
        None => println!("Avg time to identify:    n/a (no confirmations in window)"),
    }
    Ok(())
}

fn embed_file(path: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = std::fs::read(path)?;
    let embedding = embed_photo(&bytes);
    println!("{}", serde_json::to_string(&embedding)?);
    Ok(())
}

//! Rosterline CLI
//!
//! Replays a season's roster transactions into daily snapshots, queries the
//! result, and validates it against captured rosters.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod input;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::eyre;
use rosterline_core::TeamId;
use rosterline_replay::ReplayEngine;
use rosterline_storage::{SnapshotStore, StoreImage, tenures};
use rosterline_validate::{ConsistencyValidator, ValidateConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rosterline")]
#[command(about = "Rosterline - roster history reconstruction for a fantasy league", long_about = None)]
struct Cli {
    /// Emit log lines as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a transaction file into daily snapshots
    Replay {
        /// JSON array of raw transaction records
        #[arg(short, long)]
        events: PathBuf,
        /// JSON object of team id to preseason player ids
        #[arg(long)]
        seed: Option<PathBuf>,
        /// Last date to replay (default: last event date)
        #[arg(long)]
        through: Option<NaiveDate>,
        /// Replay configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write the resulting store image here
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Print a team's roster on a date
    Roster {
        /// Store image written by `replay --out`
        #[arg(short, long)]
        image: PathBuf,
        #[arg(short, long)]
        team: TeamId,
        #[arg(short, long)]
        date: NaiveDate,
    },
    /// Print a team's roster tenures
    History {
        /// Store image written by `replay --out`
        #[arg(short, long)]
        image: PathBuf,
        #[arg(short, long)]
        team: TeamId,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Compare replayed rosters against ground-truth captures
    Validate {
        /// Store image written by `replay --out`
        #[arg(short, long)]
        image: PathBuf,
        /// JSON array of ground-truth snapshots
        #[arg(long)]
        truth: PathBuf,
        /// Compare dates past a team's last snapshot against its last roster
        #[arg(long)]
        carry_forward: bool,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rosterline=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_store(image: &Path) -> Result<SnapshotStore> {
    Ok(StoreImage::load(image)?.restore()?)
}

async fn replay(
    events: PathBuf,
    seed: Option<PathBuf>,
    through: Option<NaiveDate>,
    config: Option<PathBuf>,
    out: Option<PathBuf>,
) -> Result<()> {
    let config = input::load_config(config.as_deref())?;
    let records = input::load_records(&events)?;
    let seed = match seed {
        Some(path) => input::load_seed(&path)?,
        None => Default::default(),
    };

    let token = CancellationToken::new();
    let watcher = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; stopping at the next date boundary");
            watcher.cancel();
        }
    });

    let store = Arc::new(SnapshotStore::new());
    let mut engine = ReplayEngine::new(Arc::clone(&store))
        .with_config(config)
        .with_seed(seed)
        .with_cancellation(token);

    let (engine, outcome) = tokio::task::spawn_blocking(move || {
        let outcome = engine.ingest(records).and_then(|_| engine.extend_to(through));
        (engine, outcome)
    })
    .await?;
    let report = outcome?;

    println!(
        "Replayed {} dates ({} snapshots) through {}",
        report.dates_processed,
        report.snapshots_written,
        report
            .through
            .map_or_else(|| "nothing".to_string(), |d| d.to_string())
    );
    println!("Journal: {} events across {} teams", engine.journal().len(), engine.journal().teams().len());

    let faults = engine.faults();
    if faults.is_empty() {
        println!("No integrity faults");
    } else {
        let summary: Vec<String> = faults
            .summary()
            .iter()
            .map(|(kind, count)| format!("{} {}", count, kind))
            .collect();
        println!("Integrity faults: {}", summary.join(", "));
        for fault in faults.iter() {
            println!("  {}", fault);
        }
    }
    println!("Fingerprint: {}", store.fingerprint()?);

    if let Some(out) = out {
        StoreImage::export(&store)?.save(&out)?;
        println!("Store image written to {}", out.display());
    }
    Ok(())
}

fn roster(image: &Path, team: TeamId, date: NaiveDate) -> Result<()> {
    let store = load_store(image)?;
    let (written, roster) = store.get_dated(team, date)?;
    println!("{} {}: {}", team, date, roster);
    if written != date {
        println!("  (carried forward from {})", written);
    }
    Ok(())
}

fn history(image: &Path, team: TeamId, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<()> {
    let store = load_store(image)?;
    let from = match from.or(store.opening(team)?) {
        Some(date) => date,
        None => return Err(eyre!("no snapshots for {}", team)),
    };
    let to = match to.or(store.frontier(team)?) {
        Some(date) => date,
        None => return Err(eyre!("no snapshots for {}", team)),
    };

    for tenure in tenures(&store, team, from, to)? {
        let end = tenure
            .end_date
            .map_or_else(|| "present".to_string(), |d| d.to_string());
        println!(
            "{} {} .. {} ({} days)",
            tenure.player_id, tenure.start_date, end, tenure.days_held
        );
    }
    Ok(())
}

fn validate(image: &Path, truth: &Path, carry_forward: bool) -> Result<()> {
    let store = load_store(image)?;
    let truths = input::load_truths(truth)?;
    let validator = ConsistencyValidator::new().with_config(ValidateConfig {
        past_frontier_is_no_data: !carry_forward,
    });
    let report = validator.validate(&store, &truths)?;

    for entry in report.divergent() {
        println!("{}", entry);
    }
    println!("{}", report.summary());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.json);

    match cli.command {
        Commands::Replay {
            events,
            seed,
            through,
            config,
            out,
        } => replay(events, seed, through, config, out).await,
        Commands::Roster { image, team, date } => roster(&image, team, date),
        Commands::History { image, team, from, to } => history(&image, team, from, to),
        Commands::Validate {
            image,
            truth,
            carry_forward,
        } => validate(&image, &truth, carry_forward),
    }
}

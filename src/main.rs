//! foxwq-sgf-rs: keep a local SGF archive of a FoxWQ player's games.
//!
//! Each run lists the player's games page by page, fetches only the records
//! not yet in the player's ledger, repairs the known FoxWQ defects in the SGF
//! text, and saves each game under a name built from its date and players.
//! Re-running is cheap: everything already saved is skipped without a fetch.

#![warn(clippy::all)]

mod cli;
mod config;
mod fox;
mod ledger;
pub mod retry;
mod sgf;
mod sink;
mod sync;
mod types;

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use cli::{Command, GlobalArgs, PlayerArgs};
use config::Config;
use fox::FoxClient;
use ledger::LedgerStore;
use retry::RetryConfig;
use sink::DirectorySink;
use sync::{PlayerLookup, SyncEngine, SyncMode};
use types::{LogLevel, PlayerId};

/// Timeout for the one-off lookup client of `status` and `reset-ledger`.
const LOOKUP_TIMEOUT_SECS: u64 = 30;

/// Console logging filtered by `--log-level` (or `RUST_LOG`), plus a plain
/// copy to `--log-file` when given.
fn init_tracing(level: LogLevel, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

/// Pick the target player: an explicit uid, a nickname looked up through
/// `lookup`, or the account's own uid.
async fn resolve_player(
    config: &Config,
    args: &PlayerArgs,
    lookup: Option<&dyn PlayerLookup>,
) -> anyhow::Result<PlayerId> {
    if let Some(id) = &args.player_id {
        if id.trim().is_empty() {
            anyhow::bail!("--player-id must not be empty");
        }
        return Ok(PlayerId::new(id.trim()));
    }
    if let Some(name) = &args.player_name {
        let lookup = lookup.context("Resolving --player-name needs FoxWQ credentials")?;
        return lookup
            .resolve_player(name)
            .await
            .with_context(|| format!("Failed to resolve player '{}'", name));
    }
    Ok(PlayerId::new(config.srcuid()?))
}

/// Player for the local-only commands. Only builds an HTTP client when a
/// nickname has to be resolved.
async fn resolve_local_player(config: &Config, args: &PlayerArgs) -> anyhow::Result<PlayerId> {
    if args.player_name.is_none() {
        return resolve_player(config, args, None).await;
    }
    let client = FoxClient::new(
        config.credentials()?,
        RetryConfig::default(),
        LOOKUP_TIMEOUT_SECS,
    )
    .context("Failed to build HTTP client")?;
    resolve_player(config, args, Some(&client)).await
}

fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {:02}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}

async fn run_sync(global: &GlobalArgs, args: cli::SyncArgs) -> anyhow::Result<()> {
    let config = Config::load(global)?;
    let credentials = config.credentials()?;
    let directory = config.directory(args.directory.as_deref())?;
    tracing::debug!(?config, "Loaded configuration");

    let retry = RetryConfig {
        max_retries: args.max_retries,
        base_delay_secs: args.retry_delay,
        ..RetryConfig::default()
    };
    let client =
        FoxClient::new(credentials, retry, args.timeout).context("Failed to build HTTP client")?;
    let player = resolve_player(&config, &args.player, Some(&client)).await?;

    let ledgers = LedgerStore::new(&config.state_directory);
    let lock = ledgers.lock(&player).await?;
    tracing::debug!("Holding run lock {}", lock.path().display());
    let sink = DirectorySink::new(&directory);
    let mode = args.recent.map_or(SyncMode::All, SyncMode::Recent);

    tracing::info!(
        player = %player,
        account = %client.credentials().srcuid,
        "Syncing into {}",
        directory.display()
    );
    let started = Instant::now();

    let engine = SyncEngine::new(&client, &client, &sink, &ledgers)
        .with_page_size(args.page_size.or(config.page_size))
        .with_progress(sync::create_progress_bar(args.no_progress_bar));
    let report = engine.synchronize(&player, mode).await?;

    if report.is_up_to_date() {
        tracing::info!("No new games ({} already saved)", report.skipped);
    }
    tracing::info!("── Summary ──");
    tracing::info!("  {}", report);
    if report.duplicates > 0 {
        tracing::info!("  duplicate listing entries: {}", report.duplicates);
    }
    tracing::info!("  listing calls: {}", report.listing_calls);
    tracing::info!("  elapsed: {}", format_duration(started.elapsed()));
    for failure in &report.failures {
        tracing::warn!("  not saved: {}", failure);
    }
    Ok(())
}

async fn run_status(global: &GlobalArgs, args: cli::StatusArgs) -> anyhow::Result<()> {
    let config = Config::load(global)?;
    let player = resolve_local_player(&config, &args.player).await?;
    let ledgers = LedgerStore::new(&config.state_directory);

    let Some(summary) = ledgers.summary(&player).await? else {
        println!(
            "No ledger for player {} at {}",
            player,
            ledgers.path_for(&player).display()
        );
        println!("Run a sync first to create it.");
        return Ok(());
    };

    println!("Ledger: {}", summary.path.display());
    println!();
    println!("  Player:        {}", summary.player);
    println!("  Saved records: {}", summary.record_count);
    if let Some(modified) = summary.last_modified {
        println!("  Last updated:  {}", modified.format("%Y-%m-%d %H:%M:%S"));
    }
    Ok(())
}

async fn run_reset_ledger(global: &GlobalArgs, args: cli::ResetLedgerArgs) -> anyhow::Result<()> {
    let config = Config::load(global)?;
    let player = resolve_local_player(&config, &args.player).await?;
    let ledgers = LedgerStore::new(&config.state_directory);
    let path = ledgers.path_for(&player);

    if !path.exists() {
        println!("No ledger found at {}", path.display());
        return Ok(());
    }

    if !args.yes {
        println!("This will delete the ledger for player {} at:", player);
        println!("  {}", path.display());
        println!("The next sync will download every game again.");
        println!();
        print!("Are you sure? [y/N] ");
        use std::io::Write;
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let _lock = ledgers.lock(&player).await?;
    if ledgers.remove(&player).await? {
        println!("Ledger deleted.");
    }
    Ok(())
}

async fn run_fix_komi(global: &GlobalArgs, args: cli::FixKomiArgs) -> anyhow::Result<()> {
    let config = Config::load(global)?;
    let directory = config.directory(args.directory.as_deref())?;

    let report = sgf::normalize_directory(&directory)
        .await
        .with_context(|| format!("Failed to read {}", directory.display()))?;

    println!(
        "{} updated, {} already correct, {} failed",
        report.rewritten.len(),
        report.untouched,
        report.failed.len()
    );
    if !report.failed.is_empty() {
        anyhow::bail!(
            "{} of {} files could not be rewritten",
            report.failed.len(),
            report.rewritten.len() + report.untouched + report.failed.len()
        );
    }
    Ok(())
}

async fn run(command: Command, global: &GlobalArgs) -> anyhow::Result<()> {
    match command {
        Command::Sync(args) => run_sync(global, args).await,
        Command::Status(args) => run_status(global, args).await,
        Command::ResetLedger(args) => run_reset_ledger(global, args).await,
        Command::FixKomi(args) => run_fix_komi(global, args).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();
    let global = cli.global.clone();

    if let Err(e) = init_tracing(global.log_level, global.log_file.as_deref()) {
        eprintln!("Error: {:#}", e);
        std::process::exit(2);
    }

    if let Err(e) = run(cli.effective_command(), &global).await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

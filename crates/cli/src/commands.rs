// FILE: crates/cli/src/commands.rs

use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use clap::ArgMatches;
use console::style;
use ledgerline_config::{Config, ConfigManager};
use ledgerline_core::{
    ConflictResolution, ConflictStrategy, Decimal, NaiveDate, QueueItem, Record, RecordId,
};
use ledgerline_network::spawn_probe;
use ledgerline_sync_engine::{DrainOutcome, DrainReport};
use std::str::FromStr;

use crate::context::ClientContext;

/// Create the queue database and warm the resource cache
pub async fn init(ctx: &ClientContext) -> Result<()> {
    println!("{} Local database ready at {}", style("✓").green().bold(), ctx.queue_path.display());

    let cache = ctx.intermediary.cache();
    let evicted = cache.activate().await.context("Failed to activate the resource cache")?;
    for name in &evicted {
        println!("  Removed stale cache {}", name);
    }

    if ctx.monitor.is_online() && !ctx.config.cache.precache.is_empty() {
        let cached = cache
            .install(ctx.fetcher.as_ref(), &ctx.config.cache.precache)
            .await
            .context("Failed to precache resources")?;
        println!("  Cached {} of {} resources in {}", cached, ctx.config.cache.precache.len(), cache.name());
    } else if !ctx.config.cache.precache.is_empty() {
        println!("  {} Offline; resource cache will be filled later", style("!").yellow());
    }

    Ok(())
}

/// Record a new transaction
pub async fn add_record(ctx: &ClientContext, matches: &ArgMatches) -> Result<()> {
    let amount = matches
        .get_one::<String>("amount")
        .ok_or_else(|| anyhow!("Amount is required"))?;
    let amount = parse_amount(amount)?;

    let date = match matches.get_one::<String>("date") {
        Some(date) => parse_date(date)?,
        None => Local::now().date_naive(),
    };
    let description = matches.get_one::<String>("description").cloned().unwrap_or_default();
    let category = matches.get_one::<String>("category").cloned().unwrap_or_default();

    let record = Record::new(ctx.client.user_id(), amount, description, category, date);
    let outcome = ctx.client.save(record).await.context("Failed to save transaction")?;

    println!("{} Transaction saved", style("✓").green().bold());
    println!("  ID: {}", outcome.item.record_id());
    print_save_drain(outcome.drain.as_ref());
    Ok(())
}

/// Save a new version of an existing transaction
pub async fn edit_record(ctx: &ClientContext, matches: &ArgMatches) -> Result<()> {
    let id = record_id_arg(matches)?;
    let Some(mut record) = ctx.client.record(&id).await.context("Failed to read transaction")? else {
        bail!("Transaction {} is not stored on this device", id);
    };

    let mut changed = false;
    if let Some(amount) = matches.get_one::<String>("amount") {
        record.amount = parse_amount(amount)?;
        changed = true;
    }
    if let Some(description) = matches.get_one::<String>("description") {
        record.description = description.clone();
        changed = true;
    }
    if let Some(category) = matches.get_one::<String>("category") {
        record.category = category.clone();
        changed = true;
    }
    if let Some(date) = matches.get_one::<String>("date") {
        record.occurred_on = parse_date(date)?;
        changed = true;
    }
    if !changed {
        bail!("Nothing to change; pass --amount, --description, --category or --date");
    }

    record.touch();
    let outcome = ctx.client.save(record).await.context("Failed to save transaction")?;

    println!("{} Transaction {} updated", style("✓").green().bold(), truncate(id.as_str(), 8));
    print_save_drain(outcome.drain.as_ref());
    Ok(())
}

/// List transactions stored on this device
pub async fn list_records(ctx: &ClientContext) -> Result<()> {
    let records = ctx.client.records().await.context("Failed to list transactions")?;

    if records.is_empty() {
        println!("No transactions yet. Use 'add' to record one.");
        return Ok(());
    }

    println!("\n{} Transactions for {}", style(records.len()).bold().cyan(), ctx.client.user_id());
    println!("{}", "=".repeat(80));
    for record in &records {
        print_record_summary(record);
    }
    Ok(())
}

/// Show mutations waiting for the server
pub async fn show_pending(ctx: &ClientContext, matches: &ArgMatches) -> Result<()> {
    let pending = ctx.client.pending().await.context("Failed to read the queue")?;

    if matches.get_flag("json") {
        let json = serde_json::to_string_pretty(&pending).context("Failed to serialize queue")?;
        println!("{}", json);
        return Ok(());
    }

    if pending.is_empty() {
        println!("{} Nothing waiting to sync", style("✓").green().bold());
        return Ok(());
    }

    let status = if ctx.monitor.is_online() { style("online").green() } else { style("offline").yellow() };
    println!("\n{} pending ({})", style(pending.len()).bold().cyan(), status);
    println!("{}", "=".repeat(80));
    for item in &pending {
        print_queue_item(item);
    }
    Ok(())
}

/// Send every queued mutation now
pub async fn sync_now(ctx: &ClientContext) -> Result<()> {
    let report = ctx.client.sync_now().await.context("Sync failed")?;
    print_report(&report);
    if report.is_failure() {
        bail!("Sync stopped early; {} items remain queued", report.remaining);
    }
    Ok(())
}

/// Resolve a conflicting transaction on the server
pub async fn resolve(ctx: &ClientContext, matches: &ArgMatches) -> Result<()> {
    let id = record_id_arg(matches)?;
    let strategy = matches
        .get_one::<String>("strategy")
        .map(|s| ConflictStrategy::from_str(s))
        .transpose()
        .map_err(|e| anyhow!(e))?
        .unwrap_or(ConflictStrategy::Merge);

    let mut resolution = ConflictResolution::new(id.clone(), strategy);
    if strategy.requires_client_version() {
        let local = ctx
            .client
            .record(&id)
            .await
            .context("Failed to read transaction")?
            .ok_or_else(|| anyhow!("{} needs a local copy of {}", strategy, id))?;
        resolution = resolution.with_client_version(local);
    }

    let response = ctx
        .client
        .resolve_conflict(resolution)
        .await
        .with_context(|| format!("Failed to resolve {}", id))?;

    println!("{} {} resolved with {} ({})", style("✓").green().bold(), truncate(id.as_str(), 8), strategy, response.outcome);
    print_record_summary(&response.record);
    Ok(())
}

/// Stay running and sync whenever the connection allows
pub async fn watch(ctx: &ClientContext) -> Result<()> {
    let probe = spawn_probe(ctx.checker.clone(), ctx.monitor.clone(), ctx.config.client.probe_interval());

    println!(
        "Watching as {} against {} (Ctrl-C to stop)",
        style(ctx.client.user_id()).bold(),
        ctx.config.client.server_url
    );
    ctx.client
        .dispatcher()
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    probe.abort();
    let state = ctx.client.dispatcher().state();
    println!("Stopped with {} pending", state.pending_changes);
    Ok(())
}

/// Write a default configuration file
pub fn init_config(manager: &ConfigManager) -> Result<()> {
    let created = manager.initialize().context("Failed to write config")?;
    if created {
        println!("{} Wrote {}", style("✓").green().bold(), manager.config_path().display());
    } else {
        println!("Config already exists at {}", manager.config_path().display());
    }
    Ok(())
}

/// Print the effective configuration
pub fn show_config(manager: &ConfigManager, config: &Config) -> Result<()> {
    println!("# {}", manager.config_path().display());
    print!("{}", config.to_toml_string().context("Failed to render config")?);

    if let Err(errors) = config.validate() {
        for error in errors {
            eprintln!("{} {}", style("warning:").yellow(), error);
        }
    }
    Ok(())
}

fn record_id_arg(matches: &ArgMatches) -> Result<RecordId> {
    matches
        .get_one::<String>("id")
        .map(|s| RecordId::from(s.as_str()))
        .ok_or_else(|| anyhow!("Record ID is required"))
}

fn parse_amount(s: &str) -> Result<Decimal> {
    Decimal::from_str(s.trim()).with_context(|| format!("'{}' is not an amount", s))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("'{}' is not a date (expected YYYY-MM-DD)", s))
}

fn print_save_drain(drain: Option<&DrainReport>) {
    match drain {
        Some(report) if report.outcome == DrainOutcome::Completed => {
            println!("  Synced with the server");
        }
        Some(report) => print_report(report),
        None => println!("  {} Queued; will sync when online", style("…").yellow()),
    }
}

fn print_report(report: &DrainReport) {
    let label = describe_outcome(report.outcome);
    let label = if report.is_failure() { style(label).yellow() } else { style(label).green() };
    println!(
        "Sync {}: {} acknowledged, {} rejected, {} remaining",
        label,
        report.acknowledged(),
        report.rejected.len(),
        report.remaining
    );

    for (item, result) in &report.rejected {
        let reason = result.error.as_ref().map(|e| e.message.as_str()).unwrap_or("rejected");
        println!("  {} {} dropped: {}", style("✗").red(), truncate(item.record_id().as_str(), 8), reason);
    }
    if let Some(error) = &report.error {
        println!("  {}", style(error).dim());
    }
}

fn print_record_summary(record: &Record) {
    println!("\n{}  {}", style(format_amount(record.amount)).bold(), record.description);
    println!(
        "  ID: {} | {} | {}",
        truncate(record.id.as_str(), 8),
        record.occurred_on,
        if record.category.is_empty() { "uncategorised" } else { record.category.as_str() }
    );
}

fn print_queue_item(item: &QueueItem) {
    println!(
        "  {} {} {} ({})",
        truncate(item.record_id().as_str(), 8),
        item.kind.as_str(),
        format_amount(item.payload.amount),
        item.payload.description
    );
}

fn describe_outcome(outcome: DrainOutcome) -> &'static str {
    match outcome {
        DrainOutcome::Completed => "completed",
        DrainOutcome::Stopped => "stopped",
        DrainOutcome::Skipped => "skipped (offline)",
        DrainOutcome::Coalesced => "already running",
    }
}

fn format_amount(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    if rounded.is_sign_negative() {
        format!("-{:.2}", rounded.abs())
    } else {
        format!("+{:.2}", rounded)
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len).collect();
        format!("{}...", head)
    }
}

use std::io::Write;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use tracing_subscriber::EnvFilter;

use ao3track::db::work_repo::{self, WorkQuery};
use ao3track::db::{ingestion_log_repo, processed_repo, update_repo, Database};
use ao3track::email::{extract_update, ImapClient, MailboxReader, MessageLimit, NormalizedMessage};
use ao3track::{Config, WorkStatistics};

mod cli;

use cli::Command;

const INSPECT_WINDOW: usize = 10;
const PAGE_SIZE: u32 = 20;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::parse_args();

    init_logging(args.verbose)?;

    let config = load_config(args.config)?;

    match args.command {
        Command::Ingest { limit } => run_ingest(&config, limit).await,
        Command::Inspect { n } => run_inspect(&config, n).await,
        Command::Reset { full, yes } => run_reset(&config, full, yes),
        Command::Works { search, page } => run_works(&config, search, page),
        Command::Updates { unread, page } => run_updates(&config, unread, page),
        Command::MarkRead { ao3_id } => run_mark_read(&config, &ao3_id),
        Command::Stats { ao3_id } => run_stats(&config, &ao3_id),
        Command::Runs { limit } => run_runs(&config, limit),
    }
}

/// `RUST_LOG` wins; otherwise `info`, or `debug` with `-v`.
fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_log::LogTracer::init().context("Failed to bridge `log` records into tracing")?;
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;
    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    ao3track::load_config_at(path.as_deref()).context("Failed to load config")
}

fn open_database(config: &Config) -> Result<Database> {
    Ok(ao3track::open_database(config)?)
}

async fn run_ingest(config: &Config, limit: Option<MessageLimit>) -> Result<()> {
    let db = open_database(config)?;
    let summary = ao3track::ingest_configured(config, &db, limit).await?;

    println!(
        "Processed {} new, skipped {} already seen, ignored {}, {} fetch failures",
        summary.processed,
        summary.skipped_duplicate,
        summary.skipped_empty + summary.skipped_unmatched,
        summary.fetch_failures
    );
    if let Some(error) = &summary.error {
        eprintln!("Run stopped early: {}", error);
    }
    Ok(())
}

async fn run_inspect(config: &Config, n: usize) -> Result<()> {
    let mut client = ao3track::imap_client(config)?;
    let result = inspect(&mut client, n).await;
    if let Err(e) = client.disconnect().await {
        tracing::warn!("Failed to disconnect cleanly: {}", e);
    }
    result
}

async fn inspect(client: &mut ImapClient, n: usize) -> Result<()> {
    client.connect().await?;
    let mailbox = client.select_target_mailbox().await?;
    println!("Selected mailbox: {}\n", mailbox.name);

    let uids = client
        .list_candidate_message_ids(&mailbox, Some(INSPECT_WINDOW))
        .await?;
    if uids.is_empty() {
        println!("No messages found.");
        return Ok(());
    }

    let position = if n > uids.len() {
        println!(
            "Only {} messages available. Using message {}",
            uids.len(),
            uids.len()
        );
        uids.len()
    } else {
        n.max(1)
    };
    let uid = uids[position - 1];
    println!("Inspecting message {} (UID: {})\n", position, uid);

    let raw = client.fetch_raw(uid).await?;
    let message = NormalizedMessage::parse(&raw, uid);
    let rule = "=".repeat(80);

    println!("{rule}");
    println!("Subject: {}", message.subject);
    println!("Date: {}", message.date);
    println!("Stable ID: {}", message.id);
    println!("Body kind: {:?}", message.kind);
    println!("Body length: {} characters", message.body.chars().count());
    println!("{rule}");
    println!("First 1000 characters of body:");
    println!("{}", "-".repeat(80));
    println!("{}", message.body.chars().take(1000).collect::<String>());
    println!("{}", "-".repeat(80));

    println!("\n{rule}");
    match extract_update(&message.body, message.kind, &message.subject) {
        Some(update) => {
            println!("Parsed:");
            println!("{}", serde_json::to_string_pretty(&update)?);
        }
        None => {
            println!("Failed to parse: no /works/<id> link in body");
        }
    }
    println!("{rule}");
    Ok(())
}

fn confirm(prompt: &str, accepted: &[&str]) -> Result<bool> {
    print!("{}", prompt);
    std::io::stdout().flush()?;

    let mut response = String::new();
    std::io::stdin().read_line(&mut response)?;
    let response = response.trim().to_lowercase();
    Ok(accepted.contains(&response.as_str()))
}

fn run_reset(config: &Config, full: bool, yes: bool) -> Result<()> {
    let db = open_database(config)?;

    if full {
        println!("WARNING: This will delete ALL data (works, updates, and processed messages).");
        if !yes && !confirm("Are you sure? Type 'yes' to confirm: ", &["yes"])? {
            println!("Reset cancelled.");
            return Ok(());
        }
        db.reset_all()?;
        println!("Database reset.");
    } else {
        println!("This will clear only the processed messages.");
        println!("Your works and updates will remain intact.");
        if !yes && !confirm("Continue? (y/n): ", &["y", "yes"])? {
            println!("Reset cancelled.");
            return Ok(());
        }
        let removed = processed_repo::clear(&db)?;
        println!("Cleared {} processed messages.", removed);
    }
    Ok(())
}

fn run_works(config: &Config, search: Option<String>, page: u32) -> Result<()> {
    let db = open_database(config)?;
    let result = work_repo::list(
        &db,
        &WorkQuery {
            search,
            page,
            page_size: PAGE_SIZE,
        },
    )?;

    if result.items.is_empty() {
        println!("No works found.");
        return Ok(());
    }
    for work in &result.items {
        println!(
            "{:>10}  {}  by {}  [{}]  {}",
            work.ao3_id,
            work.title,
            work.author.as_deref().unwrap_or("unknown"),
            work.last_seen_chapter.as_deref().unwrap_or("-"),
            work.last_update_at.as_deref().unwrap_or("-"),
        );
    }
    println!(
        "\nPage {} of {} ({} works)",
        result.page, result.total_pages, result.total
    );
    Ok(())
}

fn run_updates(config: &Config, unread: bool, page: u32) -> Result<()> {
    let db = open_database(config)?;
    let result = update_repo::list_recent(&db, unread, page, PAGE_SIZE)?;

    if result.items.is_empty() {
        println!("No updates found.");
        return Ok(());
    }
    for item in &result.items {
        let marker = if item.update.is_read { " " } else { "*" };
        println!(
            "{} {}  {}  {}  ({} words)",
            marker,
            item.update.email_date.as_deref().unwrap_or("-"),
            item.work_title,
            item.update.chapter_label,
            item.update
                .chapter_word_count
                .map(|w| w.to_string())
                .unwrap_or_else(|| "?".to_string()),
        );
    }
    println!(
        "\nPage {} of {} ({} updates)",
        result.page, result.total_pages, result.total
    );
    Ok(())
}

fn run_mark_read(config: &Config, ao3_id: &str) -> Result<()> {
    let db = open_database(config)?;
    let Some(work) = work_repo::find_by_ao3_id(&db, ao3_id)? else {
        bail!("No tracked work with AO3 id {}", ao3_id);
    };
    let marked = update_repo::mark_work_read(&db, work.id)?;
    println!("Marked {} updates of '{}' as read.", marked, work.title);
    Ok(())
}

fn run_stats(config: &Config, ao3_id: &str) -> Result<()> {
    let db = open_database(config)?;
    let stats = WorkStatistics::for_work(&db, ao3_id)?
        .ok_or_else(|| anyhow!("No tracked work with AO3 id {}", ao3_id))?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn run_runs(config: &Config, limit: u32) -> Result<()> {
    let db = open_database(config)?;
    let runs = ingestion_log_repo::list_recent(&db, limit)?;
    if runs.is_empty() {
        println!("No ingestion runs recorded.");
        return Ok(());
    }
    for run in &runs {
        println!(
            "#{:<4} {}  processed {}  skipped {}  ignored {}  fetch failures {}{}",
            run.id,
            run.started_at,
            run.messages_processed,
            run.messages_skipped,
            run.messages_ignored,
            run.fetch_failures,
            run.error_message
                .as_deref()
                .map(|e| format!("  error: {}", e))
                .unwrap_or_default(),
        );
    }
    Ok(())
}

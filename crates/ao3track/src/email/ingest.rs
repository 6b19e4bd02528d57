//! Ingestion run: drives a [`MailboxReader`] over a window of candidate
//! messages and records every extracted update.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::db::ingestion_log_repo::{self, RunCompletion};
use crate::db::work_repo::{self, NotificationRef};
use crate::db::{processed_repo, Database};

use super::error::Result;
use super::extract::extract_update;
use super::mailbox::MailboxReader;
use super::normalizer::NormalizedMessage;

/// How many candidate messages a run considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLimit {
    /// Only the newest `n` candidates.
    Bounded(usize),
    Unbounded,
}

impl MessageLimit {
    pub fn as_option(self) -> Option<usize> {
        match self {
            MessageLimit::Bounded(n) => Some(n),
            MessageLimit::Unbounded => None,
        }
    }
}

impl FromStr for MessageLimit {
    type Err = String;

    /// Accepts a positive integer, or `all`, `none` or `-1` for no limit.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if ["all", "none", "-1"].iter().any(|k| s.eq_ignore_ascii_case(k)) {
            return Ok(MessageLimit::Unbounded);
        }
        match s.parse::<usize>() {
            Ok(n) if n > 0 => Ok(MessageLimit::Bounded(n)),
            _ => Err(format!(
                "invalid message limit '{}': use a positive number or 'all'",
                s
            )),
        }
    }
}

impl fmt::Display for MessageLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageLimit::Bounded(n) => write!(f, "{}", n),
            MessageLimit::Unbounded => f.write_str("all"),
        }
    }
}

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Connecting,
    Listing,
    Processing,
    Summarizing,
    Closed,
}

/// What happened to a single candidate message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Processed,
    SkippedDuplicate,
    SkippedEmpty,
    SkippedUnmatched,
    FetchFailed,
}

/// Per-run state. Nothing here outlives the run.
#[derive(Debug)]
pub struct IngestionRun {
    phase: RunPhase,
    started_at: DateTime<Utc>,
    mailbox: Option<String>,
    candidates: usize,
    processed: u32,
    skipped_duplicate: u32,
    skipped_empty: u32,
    skipped_unmatched: u32,
    fetch_failures: u32,
    error: Option<String>,
    seen: HashSet<String>,
}

impl IngestionRun {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            phase: RunPhase::Idle,
            started_at,
            mailbox: None,
            candidates: 0,
            processed: 0,
            skipped_duplicate: 0,
            skipped_empty: 0,
            skipped_unmatched: 0,
            fetch_failures: 0,
            error: None,
            seen: HashSet::new(),
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    fn enter(&mut self, phase: RunPhase) {
        debug!("Ingestion run {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    pub fn record(&mut self, outcome: MessageOutcome) {
        match outcome {
            MessageOutcome::Processed => self.processed += 1,
            MessageOutcome::SkippedDuplicate => self.skipped_duplicate += 1,
            MessageOutcome::SkippedEmpty => self.skipped_empty += 1,
            MessageOutcome::SkippedUnmatched => self.skipped_unmatched += 1,
            MessageOutcome::FetchFailed => self.fetch_failures += 1,
        }
    }

    /// Keeps the first error only.
    pub fn fail(&mut self, message: String) {
        if self.error.is_none() {
            self.error = Some(message);
        }
    }

    pub fn summary(&self, completed_at: DateTime<Utc>) -> RunSummary {
        RunSummary {
            mailbox: self.mailbox.clone(),
            candidates: self.candidates,
            processed: self.processed,
            skipped_duplicate: self.skipped_duplicate,
            skipped_empty: self.skipped_empty,
            skipped_unmatched: self.skipped_unmatched,
            fetch_failures: self.fetch_failures,
            error: self.error.clone(),
            started_at: self.started_at.to_rfc3339(),
            completed_at: completed_at.to_rfc3339(),
        }
    }
}

/// Final report of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub mailbox: Option<String>,
    pub candidates: usize,
    pub processed: u32,
    pub skipped_duplicate: u32,
    pub skipped_empty: u32,
    pub skipped_unmatched: u32,
    pub fetch_failures: u32,
    /// First error that stopped the run early.
    pub error: Option<String>,
    pub started_at: String,
    pub completed_at: String,
}

impl RunSummary {
    fn completion(&self) -> RunCompletion {
        RunCompletion {
            messages_processed: self.processed,
            messages_skipped: self.skipped_duplicate,
            messages_ignored: self.skipped_empty + self.skipped_unmatched,
            fetch_failures: self.fetch_failures,
            error_message: self.error.clone(),
        }
    }
}

/// Runs one ingestion pass.
///
/// Connection, mailbox selection and listing failures are fatal and
/// returned as `Err`. A failed fetch is counted and skipped. Any other
/// error stops the loop and is reported in [`RunSummary::error`]. The
/// ingestion log row is completed in every case.
pub async fn ingest<M>(db: &Database, reader: &mut M, limit: MessageLimit) -> Result<RunSummary>
where
    M: MailboxReader + ?Sized,
{
    let span = info_span!("ingest_run", limit = %limit);
    run_ingest(db, reader, limit).instrument(span).await
}

async fn run_ingest<M>(db: &Database, reader: &mut M, limit: MessageLimit) -> Result<RunSummary>
where
    M: MailboxReader + ?Sized,
{
    let mut run = IngestionRun::new(Utc::now());
    let log_id = ingestion_log_repo::log_start(db, &run.started_at.to_rfc3339())?;

    let result = drive(db, reader, limit, &mut run).await;

    if let Err(e) = reader.disconnect().await {
        warn!("Failed to disconnect cleanly: {}", e);
    }

    run.enter(RunPhase::Summarizing);
    if let Err(e) = &result {
        error!("Ingestion aborted: {}", e);
        run.fail(e.to_string());
    }

    let summary = run.summary(Utc::now());
    let logged =
        ingestion_log_repo::log_complete(db, log_id, &summary.completed_at, &summary.completion());
    run.enter(RunPhase::Closed);

    info!(
        "Done. Processed {} new messages, skipped {} already-seen, ignored {}, {} fetch failures",
        summary.processed,
        summary.skipped_duplicate,
        summary.skipped_empty + summary.skipped_unmatched,
        summary.fetch_failures
    );

    match (result, logged) {
        (Err(e), Err(log_err)) => {
            warn!("Could not record ingestion completion: {}", log_err);
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), Err(log_err)) => Err(log_err.into()),
        (Ok(()), Ok(())) => Ok(summary),
    }
}

async fn drive<M>(
    db: &Database,
    reader: &mut M,
    limit: MessageLimit,
    run: &mut IngestionRun,
) -> Result<()>
where
    M: MailboxReader + ?Sized,
{
    run.enter(RunPhase::Connecting);
    reader.connect().await?;
    let mailbox = reader.select_target_mailbox().await?;
    info!("Selected mailbox: {}", mailbox.name);
    run.mailbox = Some(mailbox.name.clone());

    run.enter(RunPhase::Listing);
    let uids = reader
        .list_candidate_message_ids(&mailbox, limit.as_option())
        .await?;
    run.candidates = uids.len();
    info!("Found {} candidate AO3 messages", uids.len());

    run.enter(RunPhase::Processing);
    for uid in uids {
        match process_message(db, reader, uid, run).await {
            Ok(outcome) => run.record(outcome),
            Err(e) => {
                error!("Stopping run at message UID {}: {}", uid, e);
                run.fail(e.to_string());
                break;
            }
        }
    }

    Ok(())
}

async fn process_message<M>(
    db: &Database,
    reader: &mut M,
    uid: u32,
    run: &mut IngestionRun,
) -> Result<MessageOutcome>
where
    M: MailboxReader + ?Sized,
{
    let raw = match reader.fetch_raw(uid).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Skipping message UID {}: {}", uid, e);
            return Ok(MessageOutcome::FetchFailed);
        }
    };

    let message = NormalizedMessage::parse(&raw, uid);

    if run.seen.contains(&message.id) || processed_repo::is_processed(db, &message.id)? {
        debug!("Message UID {} ({}) already processed", uid, message.id);
        return Ok(MessageOutcome::SkippedDuplicate);
    }
    run.seen.insert(message.id.clone());

    let now = Utc::now().to_rfc3339();

    if message.body.trim().is_empty() {
        warn!("No body found for message {} (ID: {})", uid, message.id);
        processed_repo::mark_processed(db, &message.id, &now)?;
        return Ok(MessageOutcome::SkippedEmpty);
    }

    let Some(extracted) = extract_update(&message.body, message.kind, &message.subject) else {
        warn!(
            "Could not parse AO3 info from message {} (subject: {:?}, type: {:?})",
            uid, message.subject, message.kind
        );
        processed_repo::mark_processed(db, &message.id, &now)?;
        return Ok(MessageOutcome::SkippedUnmatched);
    };

    work_repo::record_email_update(
        db,
        &extracted,
        NotificationRef {
            message_id: &message.id,
            subject: &message.subject,
            date: &message.date,
        },
        &now,
    )?;
    info!(
        "[OK] {} - {} ({})",
        extracted.title, extracted.chapter_label, message.subject
    );

    Ok(MessageOutcome::Processed)
}

//! AO3 notification ingestion over IMAP.
//!
//! Messages are read from a dedicated label (or a sender-filtered inbox),
//! normalized to a single body, and run through the field extractor. Each
//! successful extraction becomes a work upsert plus an update row.

pub mod client;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod mailbox;
pub mod normalizer;

pub use client::{ImapClient, ImapCredentials};
pub use error::EmailError;
pub use extract::{extract_update, BodyKind, ExtractedUpdate};
pub use ingest::{ingest, IngestionRun, MessageLimit, RunPhase, RunSummary};
pub use mailbox::{MailboxReader, SelectedMailbox};
pub use normalizer::NormalizedMessage;

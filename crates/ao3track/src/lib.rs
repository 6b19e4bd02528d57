pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod merge;
pub mod scrape;
pub mod secrets;
pub mod stats;
pub mod tracker;

pub use config::{load_config, load_config_or_default, Config, ImapSettings};
pub use db::{Database, DatabaseError};
pub use email::{ingest, EmailError, ImapClient, ImapCredentials, MailboxReader, MessageLimit, RunSummary};
pub use error::{ConfigError, Result, TrackerError};
pub use merge::{merge_work, Provenance, WorkMetadata};
pub use scrape::{scrape_and_store_works, ScrapeError, ScrapeStats, WorkMetadataFetcher};
pub use secrets::{resolve_secret, SecretError};
pub use stats::WorkStatistics;
pub use tracker::{imap_client, ingest_configured, load_config_at, open_database};

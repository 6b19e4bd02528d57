//! Entry points that wire configuration, storage and the mailbox together.

use std::path::Path;

use log::debug;

use crate::config::{self, Config};
use crate::db::Database;
use crate::email::{ingest, ImapClient, ImapCredentials, MessageLimit, RunSummary};
use crate::error::{ConfigError, Result};

/// Loads the config at `path`, or the default location when `None`.
///
/// An explicit path must exist. The default file is optional and a missing
/// one yields the built-in defaults.
pub fn load_config_at(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => config::load_config(path)?,
        None => match config::default_config_path() {
            Some(default) => config::load_config_or_default(&default, true)?,
            None => Config::default(),
        },
    };
    Ok(config)
}

/// Opens (and migrates) the database the config points at.
pub fn open_database(config: &Config) -> Result<Database> {
    let path = config
        .resolved_database_path()
        .ok_or_else(|| ConfigError::Validation {
            message: "could not determine database path; set databasePath".to_string(),
        })?;
    debug!("Opening database at {}", path.display());
    Ok(Database::open(&path)?)
}

/// Builds an IMAP client with credentials resolved from the config.
pub fn imap_client(config: &Config) -> Result<ImapClient> {
    let credentials = ImapCredentials::resolve(&config.imap)?;
    Ok(ImapClient::new(config.imap.clone(), credentials))
}

/// Runs one ingestion against the configured mailbox. `None` uses the
/// configured default limit.
pub async fn ingest_configured(
    config: &Config,
    db: &Database,
    limit: Option<MessageLimit>,
) -> Result<RunSummary> {
    let mut client = imap_client(config)?;
    let limit = limit.unwrap_or(MessageLimit::Bounded(config.default_message_limit));
    Ok(ingest(db, &mut client, limit).await?)
}

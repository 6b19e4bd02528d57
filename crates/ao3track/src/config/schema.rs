use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::db::default_database_path;
use crate::secrets::expand_home;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub imap: ImapSettings,
    /// SQLite file. `None` means `~/.ao3track/data/ao3track.db`.
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default = "default_message_limit")]
    pub default_message_limit: usize,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_message_limit() -> usize {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            imap: ImapSettings::default(),
            database_path: None,
            default_message_limit: default_message_limit(),
        }
    }
}

impl Config {
    /// The database file to open, with `~` expanded.
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        match self.database_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(PathBuf::from(expand_home(path))),
            _ => default_database_path(),
        }
    }
}

/// IMAP connection and mailbox selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImapSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub use_tls: bool,
    /// Dedicated label holding the notifications.
    #[serde(default = "default_mailbox")]
    pub mailbox: String,
    /// Searched by sender when the dedicated label cannot be opened.
    #[serde(default = "default_fallback_mailbox")]
    pub fallback_mailbox: String,
    #[serde(default = "default_sender_filter")]
    pub sender_filter: String,
    #[serde(default = "default_username_env_var")]
    pub username_env_var: String,
    #[serde(default = "default_password_env_var")]
    pub password_env_var: String,
    #[serde(default)]
    pub password_file: Option<String>,
    #[serde(default)]
    pub password_insecure: Option<String>,
}

fn default_host() -> String {
    "imap.gmail.com".to_string()
}

fn default_port() -> u16 {
    993
}

fn default_true() -> bool {
    true
}

fn default_mailbox() -> String {
    "AO3".to_string()
}

fn default_fallback_mailbox() -> String {
    "INBOX".to_string()
}

fn default_sender_filter() -> String {
    "archiveofourown.org".to_string()
}

fn default_username_env_var() -> String {
    "AO3TRACKER_EMAIL".to_string()
}

fn default_password_env_var() -> String {
    "AO3TRACKER_IMAP_PASSWORD".to_string()
}

impl Default for ImapSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            use_tls: true,
            mailbox: default_mailbox(),
            fallback_mailbox: default_fallback_mailbox(),
            sender_filter: default_sender_filter(),
            username_env_var: default_username_env_var(),
            password_env_var: default_password_env_var(),
            password_file: None,
            password_insecure: None,
        }
    }
}

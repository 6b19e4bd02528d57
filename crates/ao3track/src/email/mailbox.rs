//! The mailbox seam the ingestion run is driven through.

use async_trait::async_trait;

use super::error::Result;

/// The mailbox chosen for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedMailbox {
    pub name: String,
    /// `true` when the dedicated label was unavailable and candidates must
    /// be filtered by sender.
    pub filtered: bool,
}

impl SelectedMailbox {
    pub fn dedicated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filtered: false,
        }
    }

    pub fn fallback(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filtered: true,
        }
    }
}

/// Read-only access to a notification mailbox.
#[async_trait]
pub trait MailboxReader: Send {
    /// Opens the connection and authenticates.
    async fn connect(&mut self) -> Result<()>;

    /// Opens the dedicated label, falling back to the filtered inbox.
    async fn select_target_mailbox(&mut self) -> Result<SelectedMailbox>;

    /// Lists candidate UIDs oldest first. `Some(n)` keeps only the newest `n`.
    async fn list_candidate_message_ids(
        &mut self,
        mailbox: &SelectedMailbox,
        limit: Option<usize>,
    ) -> Result<Vec<u32>>;

    /// Fetches the raw bytes of one message without marking it read.
    async fn fetch_raw(&mut self, uid: u32) -> Result<Vec<u8>>;

    /// Closes the session. Safe to call when not connected.
    async fn disconnect(&mut self) -> Result<()>;
}

/// Sorts UIDs ascending and keeps the newest `limit` of them, oldest first.
pub fn window(mut uids: Vec<u32>, limit: Option<usize>) -> Vec<u32> {
    uids.sort_unstable();
    uids.dedup();
    match limit {
        Some(n) if uids.len() > n => uids.split_off(uids.len() - n),
        _ => uids,
    }
}

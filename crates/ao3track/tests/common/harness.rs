//! In-memory mailbox for driving ingestion runs without a server.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;

use ao3track::email::error::{EmailError, Result};
use ao3track::email::mailbox::window;
use ao3track::email::{MailboxReader, SelectedMailbox};

/// A scripted mailbox. UIDs are the keys of `messages`.
#[derive(Default)]
pub struct FakeMailbox {
    messages: BTreeMap<u32, Vec<u8>>,
    /// When `false`, selection falls back to a sender-filtered inbox.
    pub dedicated_available: bool,
    pub fail_connect: bool,
    pub failing_uids: HashSet<u32>,
    pub connected: bool,
    /// UIDs fetched, in order.
    pub fetched: Vec<u32>,
    pub disconnects: usize,
    /// Runs once, just before the given UID is fetched.
    before_fetch: Option<(u32, Box<dyn FnOnce() + Send>)>,
}

impl FakeMailbox {
    pub fn new() -> Self {
        Self {
            dedicated_available: true,
            ..Default::default()
        }
    }

    pub fn with_message(mut self, uid: u32, raw: Vec<u8>) -> Self {
        self.messages.insert(uid, raw);
        self
    }

    pub fn add_message(&mut self, uid: u32, raw: Vec<u8>) {
        self.messages.insert(uid, raw);
    }

    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn failing_fetch(mut self, uid: u32) -> Self {
        self.failing_uids.insert(uid);
        self
    }

    pub fn without_dedicated_mailbox(mut self) -> Self {
        self.dedicated_available = false;
        self
    }

    pub fn before_fetching<F>(mut self, uid: u32, hook: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.before_fetch = Some((uid, Box::new(hook)));
        self
    }
}

#[async_trait]
impl MailboxReader for FakeMailbox {
    async fn connect(&mut self) -> Result<()> {
        if self.fail_connect {
            return Err(EmailError::ConnectionFailed("connection refused".to_string()));
        }
        self.connected = true;
        Ok(())
    }

    async fn select_target_mailbox(&mut self) -> Result<SelectedMailbox> {
        if self.dedicated_available {
            Ok(SelectedMailbox::dedicated("AO3"))
        } else {
            Ok(SelectedMailbox::fallback("INBOX"))
        }
    }

    async fn list_candidate_message_ids(
        &mut self,
        _mailbox: &SelectedMailbox,
        limit: Option<usize>,
    ) -> Result<Vec<u32>> {
        Ok(window(self.messages.keys().copied().collect(), limit))
    }

    async fn fetch_raw(&mut self, uid: u32) -> Result<Vec<u8>> {
        self.fetched.push(uid);
        if self.before_fetch.as_ref().is_some_and(|(at, _)| *at == uid) {
            if let Some((_, hook)) = self.before_fetch.take() {
                hook();
            }
        }
        if self.failing_uids.contains(&uid) {
            return Err(EmailError::FetchFailed {
                uid,
                reason: "connection reset".to_string(),
            });
        }
        self.messages
            .get(&uid)
            .cloned()
            .ok_or_else(|| EmailError::FetchFailed {
                uid,
                reason: "no such message".to_string(),
            })
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        self.disconnects += 1;
        Ok(())
    }
}

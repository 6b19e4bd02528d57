//! IMAP client for reading the notification mailbox.

use async_imap::Session;
use async_native_tls::TlsConnector;
use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, info, warn};
use secrecy::{ExposeSecret, SecretString};

use crate::config::ImapSettings;
use crate::secrets::{read_env, resolve_secret};

use super::error::{EmailError, Result};
use super::mailbox::{window, MailboxReader, SelectedMailbox};

/// Type alias for the underlying async stream (using async-std compatible TcpStream).
type AsyncTcpStream = async_io::Async<std::net::TcpStream>;

/// Type alias for the TLS stream used by the IMAP session.
type TlsStream = async_native_tls::TlsStream<AsyncTcpStream>;

/// Login for the mailbox account.
pub struct ImapCredentials {
    pub username: String,
    pub password: SecretString,
}

impl std::fmt::Debug for ImapCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapCredentials")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .finish()
    }
}

impl ImapCredentials {
    /// Resolves the username from its env var and the password from the
    /// configured sources (direct value, file, or env var).
    pub fn resolve(settings: &ImapSettings) -> Result<Self> {
        let username = read_env(&settings.username_env_var)
            .ok()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                EmailError::CredentialsNotFound(format!(
                    "environment variable '{}' is not set",
                    settings.username_env_var
                ))
            })?;

        let password = resolve_secret(
            settings.password_insecure.as_deref(),
            settings.password_file.as_deref(),
            Some(settings.password_env_var.as_str()),
        )
        .map_err(|e| EmailError::CredentialsNotFound(e.to_string()))?;

        Ok(Self { username, password })
    }
}

/// IMAP client over TLS with password login.
pub struct ImapClient {
    session: Option<Session<TlsStream>>,
    settings: ImapSettings,
    credentials: ImapCredentials,
}

impl ImapClient {
    /// Creates a new IMAP client with the given settings and login.
    pub fn new(settings: ImapSettings, credentials: ImapCredentials) -> Self {
        Self {
            session: None,
            settings,
            credentials,
        }
    }

    /// Checks if the client is currently connected.
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    fn session(&mut self) -> Result<&mut Session<TlsStream>> {
        self.session
            .as_mut()
            .ok_or_else(|| EmailError::ConnectionFailed("Not connected".to_string()))
    }

    /// Opens a folder in read-only mode using EXAMINE (not SELECT), so
    /// nothing in it is marked read.
    async fn examine_folder(&mut self, folder: &str) -> Result<()> {
        let session = self.session()?;
        debug!("Examining folder: {}", folder);

        let mailbox = session.examine(folder).await.map_err(|e| {
            if e.to_string().contains("Mailbox doesn't exist") || e.to_string().contains("NO") {
                EmailError::FolderNotFound(folder.to_string())
            } else {
                EmailError::ProtocolError(e.to_string())
            }
        })?;

        debug!("Folder '{}' opened with {} messages", folder, mailbox.exists);
        Ok(())
    }
}

#[async_trait]
impl MailboxReader for ImapClient {
    async fn connect(&mut self) -> Result<()> {
        if self.session.is_some() {
            debug!("Already connected to IMAP server");
            return Ok(());
        }

        if !self.settings.use_tls {
            return Err(EmailError::ConfigError(
                "TLS is required for secure email connections".to_string(),
            ));
        }

        let addr = format!("{}:{}", self.settings.host, self.settings.port);
        info!("Connecting to IMAP server at {}", addr);

        let std_stream = std::net::TcpStream::connect(&addr)
            .map_err(|e| EmailError::ConnectionFailed(e.to_string()))?;
        std_stream
            .set_nonblocking(true)
            .map_err(|e| EmailError::ConnectionFailed(e.to_string()))?;
        let tcp_stream = async_io::Async::new(std_stream)
            .map_err(|e| EmailError::ConnectionFailed(e.to_string()))?;

        let tls = TlsConnector::new();
        let tls_stream = tls.connect(&self.settings.host, tcp_stream).await?;

        let client = async_imap::Client::new(tls_stream);
        let session = client
            .login(
                &self.credentials.username,
                self.credentials.password.expose_secret(),
            )
            .await
            .map_err(|(e, _)| EmailError::AuthenticationFailed(e.to_string()))?;

        info!("Successfully authenticated to IMAP server");
        self.session = Some(session);
        Ok(())
    }

    async fn select_target_mailbox(&mut self) -> Result<SelectedMailbox> {
        let dedicated = self.settings.mailbox.clone();
        match self.examine_folder(&dedicated).await {
            Ok(()) => return Ok(SelectedMailbox::dedicated(dedicated)),
            Err(e) => warn!(
                "Could not open mailbox '{}' ({}), falling back to '{}'",
                dedicated, e, self.settings.fallback_mailbox
            ),
        }

        let fallback = self.settings.fallback_mailbox.clone();
        match self.examine_folder(&fallback).await {
            Ok(()) => Ok(SelectedMailbox::fallback(fallback)),
            Err(e) => {
                warn!("Could not open fallback mailbox '{}': {}", fallback, e);
                Err(EmailError::FolderNotFound(format!(
                    "{} (fallback {})",
                    dedicated, fallback
                )))
            }
        }
    }

    async fn list_candidate_message_ids(
        &mut self,
        mailbox: &SelectedMailbox,
        limit: Option<usize>,
    ) -> Result<Vec<u32>> {
        let query = if mailbox.filtered {
            format!("FROM \"{}\"", self.settings.sender_filter.replace('"', ""))
        } else {
            "ALL".to_string()
        };
        debug!("Searching '{}' with query: {}", mailbox.name, query);

        let session = self.session()?;
        let uids = session
            .uid_search(&query)
            .await
            .map_err(|e| EmailError::ProtocolError(e.to_string()))?;

        let found = uids.len();
        let candidates = window(uids.into_iter().collect(), limit);
        debug!("Found {} messages, keeping {}", found, candidates.len());
        Ok(candidates)
    }

    async fn fetch_raw(&mut self, uid: u32) -> Result<Vec<u8>> {
        let session = self.session()?;
        debug!("Fetching email with UID {}", uid);

        // BODY.PEEK[] leaves the \Seen flag untouched.
        let mut messages = session
            .uid_fetch(uid.to_string(), "BODY.PEEK[]")
            .await
            .map_err(|e| EmailError::FetchFailed {
                uid,
                reason: e.to_string(),
            })?;

        let mut body = None;
        while let Some(item) = messages.next().await {
            let message = item.map_err(|e| EmailError::FetchFailed {
                uid,
                reason: e.to_string(),
            })?;
            if body.is_none() {
                body = message.body().map(|b| b.to_vec());
            }
        }

        body.ok_or_else(|| EmailError::FetchFailed {
            uid,
            reason: "message has no body".to_string(),
        })
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(mut session) = self.session.take() {
            info!("Disconnecting from IMAP server");
            session
                .logout()
                .await
                .map_err(|e| EmailError::ProtocolError(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for ImapClient {
    fn drop(&mut self) {
        if self.session.is_some() {
            warn!("ImapClient dropped without explicit disconnect - session will be closed");
        }
    }
}

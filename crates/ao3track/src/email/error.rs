//! Mailbox ingestion error types.

use thiserror::Error;

/// Errors that can occur while reading the notification mailbox.
#[derive(Error, Debug)]
pub enum EmailError {
    /// Failed to connect to the IMAP server.
    #[error("IMAP connection failed: {0}")]
    ConnectionFailed(String),

    /// TLS/SSL error during connection.
    #[error("TLS error: {0}")]
    TlsError(String),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// A required credential could not be resolved.
    #[error("Credentials not found: {0}")]
    CredentialsNotFound(String),

    /// IMAP protocol error.
    #[error("IMAP protocol error: {0}")]
    ProtocolError(String),

    /// Neither the dedicated nor the fallback mailbox could be opened.
    #[error("IMAP folder '{0}' not found")]
    FolderNotFound(String),

    /// A single message could not be fetched.
    #[error("Failed to fetch message UID {uid}: {reason}")]
    FetchFailed { uid: u32, reason: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Database error while recording results.
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<async_native_tls::Error> for EmailError {
    fn from(err: async_native_tls::Error) -> Self {
        EmailError::TlsError(err.to_string())
    }
}

impl From<crate::db::DatabaseError> for EmailError {
    fn from(err: crate::db::DatabaseError) -> Self {
        EmailError::DatabaseError(err.to_string())
    }
}

/// Result type for email operations.
pub type Result<T> = std::result::Result<T, EmailError>;

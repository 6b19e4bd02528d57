//! Message normalization: raw RFC 5322 bytes to a stable id, decoded
//! headers and a single `(body, kind)` pair.

use log::debug;
use mail_parser::{HeaderName, Message, MessageParser, MessagePart, MimeHeaders, PartType};
use sha2::{Digest, Sha256};

use super::extract::BodyKind;

/// A fetched message reduced to what extraction needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedMessage {
    /// Stable deduplication key, see [`stable_message_id`].
    pub id: String,
    /// Decoded subject, empty when absent.
    pub subject: String,
    /// RFC 3339 when the header parses, else the raw header, else empty.
    pub date: String,
    pub body: String,
    pub kind: BodyKind,
}

impl NormalizedMessage {
    /// Parses a raw message fetched under `token`. Unparseable bytes give an
    /// empty-bodied message keyed by the token.
    pub fn parse(raw: &[u8], token: u32) -> Self {
        let Some(message) = MessageParser::default().parse(raw) else {
            debug!("Message UID={} could not be parsed", token);
            return Self {
                id: fallback_id(token),
                subject: String::new(),
                date: String::new(),
                body: String::new(),
                kind: BodyKind::Unknown,
            };
        };

        let (body, kind) = extract_body(&message);
        Self {
            id: stable_message_id(&message, token),
            subject: message.subject().unwrap_or_default().to_string(),
            date: message
                .date()
                .map(|d| d.to_rfc3339())
                .or_else(|| raw_date(&message).map(str::to_string))
                .unwrap_or_default(),
            body,
            kind,
        }
    }
}

/// Decodes an RFC 2047 header value into a single string. Undecodable
/// segments are dropped rather than reported.
pub fn decode_header_value(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }
    let block = format!("Subject: {}\r\n\r\n", raw.trim());
    MessageParser::default()
        .parse(block.as_bytes())
        .and_then(|m| m.subject().map(str::to_string))
        .unwrap_or_default()
}

/// Picks the body to extract from: the last non-empty HTML part, else the
/// first non-empty plain-text part. Attachments are ignored.
pub fn extract_body(message: &Message<'_>) -> (String, BodyKind) {
    let mut html: Option<&str> = None;
    let mut plain: Option<&str> = None;

    for part in message.parts.iter() {
        if is_attachment(part) {
            continue;
        }
        match &part.body {
            PartType::Html(text) if !text.trim().is_empty() => html = Some(text.as_ref()),
            PartType::Text(text) if plain.is_none() && !text.trim().is_empty() => {
                plain = Some(text.as_ref())
            }
            _ => {}
        }
    }

    match (html, plain) {
        (Some(body), _) => (body.to_string(), BodyKind::Html),
        (None, Some(body)) => (body.to_string(), BodyKind::Plain),
        (None, None) => (String::new(), BodyKind::Unknown),
    }
}

/// Derives the deduplication key for a message:
/// the `Message-ID`, else a SHA-256 of `subject|date`, else `imap_uid_<token>`.
pub fn stable_message_id(message: &Message<'_>, token: u32) -> String {
    if let Some(id) = message.message_id().map(str::trim).filter(|s| !s.is_empty()) {
        return id.to_string();
    }

    let subject = message.subject().map(str::trim).unwrap_or_default();
    let date = raw_date(message).unwrap_or_default();
    if !subject.is_empty() && !date.is_empty() {
        return fingerprint(subject, date);
    }

    fallback_id(token)
}

fn fingerprint(subject: &str, date: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(subject.as_bytes());
    hasher.update(b"|");
    hasher.update(date.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn fallback_id(token: u32) -> String {
    format!("imap_uid_{}", token)
}

fn raw_date<'a>(message: &'a Message<'_>) -> Option<&'a str> {
    message
        .header_raw(HeaderName::Date)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn is_attachment(part: &MessagePart<'_>) -> bool {
    part.content_disposition()
        .is_some_and(|d| d.ctype().eq_ignore_ascii_case("attachment"))
}

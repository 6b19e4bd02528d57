//! Builders for raw RFC 5322 notification messages.

#![allow(dead_code)]

/// Builder for a raw notification email.
pub struct MessageBuilder {
    subject: Option<String>,
    date: Option<String>,
    message_id: Option<String>,
    plain: Option<String>,
    html: Option<String>,
}

impl MessageBuilder {
    /// A notification with a fixed date and no body.
    pub fn new(subject: &str) -> Self {
        Self {
            subject: Some(subject.to_string()),
            date: Some("Mon, 15 Jan 2024 10:00:00 +0000".to_string()),
            message_id: None,
            plain: None,
            html: None,
        }
    }

    pub fn message_id(mut self, id: &str) -> Self {
        self.message_id = Some(id.to_string());
        self
    }

    pub fn date(mut self, date: &str) -> Self {
        self.date = Some(date.to_string());
        self
    }

    pub fn without_date(mut self) -> Self {
        self.date = None;
        self
    }

    pub fn without_subject(mut self) -> Self {
        self.subject = None;
        self
    }

    pub fn plain(mut self, body: &str) -> Self {
        self.plain = Some(body.to_string());
        self
    }

    pub fn html(mut self, body: &str) -> Self {
        self.html = Some(body.to_string());
        self
    }

    /// Renders the message with CRLF line endings.
    pub fn build(self) -> Vec<u8> {
        let mut lines = vec![
            "From: Archive of Our Own <do-not-reply@archiveofourown.org>".to_string(),
            "To: reader@example.com".to_string(),
        ];
        if let Some(subject) = &self.subject {
            lines.push(format!("Subject: {}", subject));
        }
        if let Some(date) = &self.date {
            lines.push(format!("Date: {}", date));
        }
        if let Some(id) = &self.message_id {
            lines.push(format!("Message-ID: <{}>", id));
        }
        lines.push("MIME-Version: 1.0".to_string());

        match (self.plain, self.html) {
            (Some(plain), Some(html)) => {
                let boundary = "ao3-boundary";
                lines.push(format!(
                    "Content-Type: multipart/alternative; boundary=\"{}\"",
                    boundary
                ));
                lines.push(String::new());
                lines.push(format!("--{}", boundary));
                lines.push("Content-Type: text/plain; charset=utf-8".to_string());
                lines.push(String::new());
                lines.push(plain);
                lines.push(format!("--{}", boundary));
                lines.push("Content-Type: text/html; charset=utf-8".to_string());
                lines.push(String::new());
                lines.push(html);
                lines.push(format!("--{}--", boundary));
            }
            (None, Some(html)) => {
                lines.push("Content-Type: text/html; charset=utf-8".to_string());
                lines.push(String::new());
                lines.push(html);
            }
            (plain, None) => {
                lines.push("Content-Type: text/plain; charset=utf-8".to_string());
                lines.push(String::new());
                lines.push(plain.unwrap_or_default());
            }
        }

        let mut raw = lines.join("\r\n");
        raw.push_str("\r\n");
        raw.into_bytes()
    }
}

/// A plain-text chapter notification for `work_id`.
pub fn chapter_notification(message_id: &str, work_id: u32, title: &str, chapter: u32) -> Vec<u8> {
    MessageBuilder::new(&format!(
        "[AO3] jane posted Chapter {} of {}",
        chapter, title
    ))
    .message_id(message_id)
    .plain(&format!(
        "jane posted Chapter {chapter} of {title} ( 12,345 words):\r\n\
         https://archiveofourown.org/works/{work_id}/chapters/{chapter}\r\n\
         Chapter {chapter} (1,500 words)\r\n"
    ))
    .build()
}

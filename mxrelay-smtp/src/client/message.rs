//! RFC 5322 message rendering.

use chrono::{DateTime, Utc};

/// Builds the text of a message from its header fields and a plain-text body.
///
/// Empty To and Cc values are omitted. There is no Bcc setter: blind copies
/// never appear in the rendered headers.
///
/// ```
/// use mxrelay_smtp::client::MessageBuilder;
///
/// let message = MessageBuilder::new()
///     .from("sender@example.org")
///     .to("a@example.com, b@example.com")
///     .subject("Hello")
///     .body("Hi there")
///     .build();
///
/// assert!(message.contains("To: a@example.com, b@example.com\r\n"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    from: Option<String>,
    to: Option<String>,
    cc: Option<String>,
    subject: Option<String>,
    message_id: Option<String>,
    date: Option<DateTime<Utc>>,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

impl MessageBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Sets the To header to an already joined address list.
    #[must_use]
    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    /// Sets the Cc header to an already joined address list.
    #[must_use]
    pub fn cc(mut self, cc: impl Into<String>) -> Self {
        self.cc = Some(cc.into());
        self
    }

    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Sets the Message-ID. Angle brackets are added if missing.
    #[must_use]
    pub fn message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Overrides the Date header, which otherwise is the time of `build`.
    #[must_use]
    pub const fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    /// Appends a header. Headers are rendered in the order they are added.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Renders the message with CRLF line endings throughout.
    #[must_use]
    pub fn build(self) -> String {
        let mut message = String::new();
        let mut push = |name: &str, value: &str| {
            message.push_str(name);
            message.push_str(": ");
            message.push_str(value);
            message.push_str("\r\n");
        };

        let date = self.date.unwrap_or_else(Utc::now);
        push("Date", &date.to_rfc2822());

        if let Some(from) = &self.from {
            push("From", from);
        }
        if let Some(to) = self.to.as_deref().filter(|to| !to.is_empty()) {
            push("To", to);
        }
        if let Some(cc) = self.cc.as_deref().filter(|cc| !cc.is_empty()) {
            push("Cc", cc);
        }
        if let Some(subject) = &self.subject {
            push("Subject", subject);
        }
        if let Some(id) = &self.message_id {
            if id.starts_with('<') {
                push("Message-ID", id);
            } else {
                push("Message-ID", &format!("<{id}>"));
            }
        }
        for (name, value) in &self.headers {
            push(name, value);
        }
        push("MIME-Version", "1.0");
        push("Content-Type", "text/plain; charset=utf-8");

        message.push_str("\r\n");
        if let Some(body) = &self.body {
            message.push_str(&normalize_line_endings(body));
        }

        message
    }
}

/// Converts bare `\n` and `\r` line breaks to CRLF.
fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\n', "\r\n")
}

/// Doubles a leading `.` on every line so the body can't end the DATA phase early.
#[must_use]
pub fn dot_stuff(data: &str) -> String {
    let mut stuffed = String::with_capacity(data.len());
    for line in data.split_inclusive('\n') {
        if line.starts_with('.') {
            stuffed.push('.');
        }
        stuffed.push_str(line);
    }
    stuffed
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_build_full_message() {
        let date = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let message = MessageBuilder::new()
            .from("sender@example.org")
            .to("a@example.com")
            .cc("c@example.net")
            .subject("Status")
            .message_id("abc@relay.test")
            .date(date)
            .header("X-Priority", "1")
            .body("line one\nline two")
            .build();

        let expected = format!(
            "Date: {}\r\n\
             From: sender@example.org\r\n\
             To: a@example.com\r\n\
             Cc: c@example.net\r\n\
             Subject: Status\r\n\
             Message-ID: <abc@relay.test>\r\n\
             X-Priority: 1\r\n\
             MIME-Version: 1.0\r\n\
             Content-Type: text/plain; charset=utf-8\r\n\
             \r\n\
             line one\r\nline two",
            date.to_rfc2822()
        );
        assert_eq!(message, expected);
    }

    #[test]
    fn test_empty_recipient_headers_are_omitted() {
        let message = MessageBuilder::new()
            .from("sender@example.org")
            .to("")
            .cc("")
            .build();

        assert!(!message.contains("To:"));
        assert!(!message.contains("Cc:"));
        assert!(!message.contains("Bcc:"));
    }

    #[test]
    fn test_dot_stuff() {
        assert_eq!(dot_stuff(".start\r\nmid.dle\r\n..two\r\n"), "..start\r\nmid.dle\r\n...two\r\n");
        assert_eq!(dot_stuff("no dots"), "no dots");
        assert_eq!(dot_stuff(""), "");
    }
}

//! The caller's message and the per-recipient copies derived from it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{address::RecipientField, envelope::Envelope};

/// A message as handed to the relay.
///
/// Only the addressing fields are interpreted. The body and header fields are
/// passed to the transport as they are, and anything else the caller supplies
/// is kept in `extra` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MailOptions {
    pub from: String,

    #[serde(default)]
    pub to: RecipientField,

    #[serde(default)]
    pub cc: RecipientField,

    #[serde(default)]
    pub bcc: RecipientField,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Plain-text body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// A fully formed RFC 5322 message, sent verbatim instead of rendering one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,

    #[serde(
        default,
        rename = "messageId",
        alias = "message_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub message_id: Option<String>,

    /// Additional headers, rendered in insertion order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MailOptions {
    #[must_use]
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn to(mut self, to: impl Into<RecipientField>) -> Self {
        self.to = to.into();
        self
    }

    #[must_use]
    pub fn cc(mut self, cc: impl Into<RecipientField>) -> Self {
        self.cc = cc.into();
        self
    }

    #[must_use]
    pub fn bcc(mut self, bcc: impl Into<RecipientField>) -> Self {
        self.bcc = bcc.into();
        self
    }

    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// The headers every per-recipient copy carries.
    ///
    /// To and Cc become the full normalised display lists, Bcc is cleared.
    #[must_use]
    pub fn header_template(&self) -> Self {
        Self {
            to: RecipientField::Joined(self.to.header_value()),
            cc: RecipientField::Joined(self.cc.header_value()),
            bcc: RecipientField::Empty,
            ..self.clone()
        }
    }
}

/// One recipient's copy of a message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMail {
    #[serde(flatten)]
    pub message: MailOptions,
    pub envelope: Envelope,
}

impl OutboundMail {
    /// Addresses a copy of `template` to `recipient` alone.
    ///
    /// `template` is expected to come from [`MailOptions::header_template`].
    #[must_use]
    pub fn addressed_to(template: &MailOptions, recipient: impl Into<String>) -> Self {
        Self {
            envelope: Envelope::new(template.from.clone(), recipient),
            message: template.clone(),
        }
    }

    #[must_use]
    pub fn recipient(&self) -> &str {
        &self.envelope.to
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_deserialize_keeps_unknown_fields() {
        let mail: MailOptions = serde_json::from_value(json!({
            "from": "sender@example.org",
            "to": ["A@Example.com"],
            "subject": "Hi",
            "priority": "high",
            "attachments": [{"filename": "a.txt"}],
        }))
        .unwrap();

        assert_eq!(mail.from, "sender@example.org");
        assert_eq!(mail.to, RecipientField::from(vec!["A@Example.com"]));
        assert_eq!(mail.subject.as_deref(), Some("Hi"));
        assert_eq!(mail.extra["priority"], json!("high"));
        assert_eq!(mail.extra["attachments"], json!([{"filename": "a.txt"}]));
    }

    #[test]
    fn test_deserialize_requires_from() {
        let result = serde_json::from_value::<MailOptions>(json!({"to": "a@example.com"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_header_template() {
        let mail = MailOptions::new("sender@example.org")
            .to(vec!["Alice@Example.com", "bob@example.com"])
            .cc("Carol@Example.net")
            .bcc("hidden@example.com")
            .subject("Report");

        let template = mail.header_template();

        assert_eq!(
            template.to,
            RecipientField::Joined("Alice@Example.com, bob@example.com".to_string())
        );
        assert_eq!(
            template.cc,
            RecipientField::Joined("carol@example.net".to_string())
        );
        assert_eq!(template.bcc, RecipientField::Empty);
        assert_eq!(template.subject.as_deref(), Some("Report"));
    }

    #[test]
    fn test_addressed_to_sets_single_recipient_envelope() {
        let template = MailOptions::new("sender@example.org")
            .to("a@example.com, b@example.com")
            .header_template();

        let mail = OutboundMail::addressed_to(&template, "b@example.com");

        assert_eq!(mail.recipient(), "b@example.com");
        assert_eq!(mail.envelope.from, "sender@example.org");
        assert_eq!(mail.message.to.header_value(), "a@example.com, b@example.com");
    }

    #[test]
    fn test_outbound_mail_serializes_flat() {
        let template = MailOptions::new("s@example.org").to("r@example.com").header_template();
        let rendered = serde_json::to_value(OutboundMail::addressed_to(&template, "r@example.com"))
            .unwrap();

        assert_eq!(rendered["from"], json!("s@example.org"));
        assert_eq!(rendered["to"], json!("r@example.com"));
        assert_eq!(rendered["envelope"]["to"], json!("r@example.com"));
    }
}

use serde::{Deserialize, Serialize};

/// The transport-level sender/recipient pair for a single delivery.
///
/// An envelope always names exactly one recipient. `cc` and `bcc` are kept
/// in the record but always empty: copies are addressed through `to` only,
/// and the Cc/Bcc lists stay display-only headers on the message itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub cc: String,
    #[serde(default)]
    pub bcc: String,
}

impl Envelope {
    #[inline]
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            cc: String::new(),
            bcc: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_cc_and_bcc_are_always_blank() {
        let envelope = Envelope::new("s@example.org", "r@example.com");

        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"from": "s@example.org", "to": "r@example.com", "cc": "", "bcc": ""})
        );

        let read: Envelope =
            serde_json::from_value(json!({"from": "s@example.org", "to": "r@example.com"}))
                .unwrap();
        assert_eq!(read, envelope);
    }
}

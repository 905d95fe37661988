use std::path::Path;

use anyhow::Context;
use serde_json::Value;

/// Reads a message file as an untyped record.
///
/// Files ending in `.ron` are read as RON, using map syntax
/// (`{"from": "...", "to": "..."}`); anything else is read as JSON. Whether the
/// record is a usable message is left to the relay.
///
/// # Errors
///
/// Returns an error if the file can't be read or isn't well-formed.
pub fn load_message(path: &Path) -> anyhow::Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read message from {}", path.display()))?;

    let is_ron = path
        .extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("ron"));

    if is_ron {
        ron::from_str(&content).with_context(|| format!("Invalid RON in {}", path.display()))
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_json_and_ron_read_the_same() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("message.json");
        let ron_path = dir.path().join("message.RON");

        std::fs::write(
            &json_path,
            r#"{"from": "s@example.org", "to": ["a@x.com", "b@y.org"], "subject": "Hi"}"#,
        )
        .unwrap();
        std::fs::write(
            &ron_path,
            r#"{"from": "s@example.org", "to": ["a@x.com", "b@y.org"], "subject": "Hi"}"#,
        )
        .unwrap();

        let expected = json!({
            "from": "s@example.org",
            "to": ["a@x.com", "b@y.org"],
            "subject": "Hi",
        });
        assert_eq!(load_message(&json_path).unwrap(), expected);
        assert_eq!(load_message(&ron_path).unwrap(), expected);
    }

    #[test]
    fn test_non_record_is_still_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("message.json");
        std::fs::write(&path, r#""a@x.com""#).unwrap();

        assert_eq!(load_message(&path).unwrap(), json!("a@x.com"));
    }

    #[test]
    fn test_malformed_or_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("message.json");
        std::fs::write(&path, "{from:").unwrap();

        assert!(load_message(&path).is_err());
        assert!(load_message(&dir.path().join("missing.json")).is_err());
    }
}

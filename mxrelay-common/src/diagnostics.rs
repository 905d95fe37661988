//! Opt-in diagnostic snapshots.
//!
//! When enabled, structured snapshots of what the relay is doing (the mail
//! about to be sent, the options in effect, transport errors) are printed to
//! standard output as pretty JSON. Nothing reads them back.

use std::io::Write;

use serde::Serialize;

/// Setting this variable to any non-empty value enables snapshots.
pub const DEBUG_ENV: &str = "MXRELAY_DEBUG";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Diagnostics {
    enabled: bool,
}

impl Diagnostics {
    #[must_use]
    pub const fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Enabled when [`DEBUG_ENV`] is set to a non-empty value.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(std::env::var_os(DEBUG_ENV).is_some_and(|value| !value.is_empty()))
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Writes `value` to stdout when enabled.
    pub fn snapshot<T: Serialize + ?Sized>(&self, value: &T) {
        if !self.enabled {
            return;
        }

        if let Some(rendered) = render(value) {
            let mut stdout = std::io::stdout().lock();
            if let Err(err) = stdout.write_all(rendered.as_bytes()) {
                tracing::warn!(error = %err, "Unable to write diagnostic snapshot");
            }
        }
    }
}

fn render<T: Serialize + ?Sized>(value: &T) -> Option<String> {
    match serde_json::to_string_pretty(value) {
        Ok(rendered) => Some(format!("{rendered}\n\n")),
        Err(err) => {
            tracing::warn!(error = %err, "Unable to render diagnostic snapshot");
            None
        }
    }
}

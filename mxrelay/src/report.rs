use std::{fmt::Write as _, io};

use clap::ValueEnum;
use mxrelay_delivery::{Outcome, Summary};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Renders a summary for the terminal.
///
/// # Errors
///
/// Returns an error if the summary can't be serialised as JSON.
pub fn render(summary: &Summary, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(summary)?),
        OutputFormat::Text => Ok(render_text(summary)),
    }
}

/// Writes the rendered summary, and nothing else, to `out`.
///
/// # Errors
///
/// Returns an error if rendering or writing fails.
pub fn print(
    out: &mut impl io::Write,
    summary: &Summary,
    format: OutputFormat,
) -> anyhow::Result<()> {
    writeln!(out, "{}", render(summary, format)?)?;
    out.flush()?;
    Ok(())
}

fn render_text(summary: &Summary) -> String {
    let mut out = String::new();

    for outcome in summary.iter() {
        let _ = match outcome {
            Outcome::Delivered { to, info } => writeln!(
                out,
                "{:<10} {to} via {} ({})",
                "delivered", info.host, info.response
            ),
            Outcome::Failed { to, info } => {
                writeln!(out, "{:<10} {to}: [{}] {info}", "failed", info.code())
            }
            Outcome::Exhausted { to } => {
                writeln!(out, "{:<10} {to}: no reachable exchanger", "exhausted")
            }
        };
    }

    let _ = write!(
        out,
        "{} of {} recipient(s) delivered",
        summary.delivered(),
        summary.len()
    );
    out
}

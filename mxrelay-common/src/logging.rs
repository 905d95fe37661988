use std::{io::IsTerminal, str::FromStr};

use tracing::{Subscriber, metadata::LevelFilter};
use tracing_subscriber::{
    Layer, filter::FilterFn, fmt::MakeWriter, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

/// Environment variable holding the maximum log level.
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

#[macro_export]
macro_rules! log {
    ($level:expr, $span:expr, $($msg:expr),*) => {{
        let span = $crate::tracing::span!($level, $span);
        let _enter = span.enter();

        $crate::tracing::event!($level, $($msg),*)
    }};
}

/// Traffic we send to a remote exchanger.
#[macro_export]
macro_rules! outgoing {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::log!($crate::tracing::Level::$level, "outgoing", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::outgoing!(level = TRACE, $($msg),*)
    };
}

/// Traffic a remote exchanger sends back.
#[macro_export]
macro_rules! incoming {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::log!($crate::tracing::Level::$level, "incoming", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::incoming!(level = TRACE, $($msg),*)
    };
}

fn level_from(value: Option<&str>, default: LevelFilter) -> LevelFilter {
    value.map_or(default, |level| {
        LevelFilter::from_str(level).unwrap_or_else(|_| {
            eprintln!("Invalid log level specified {level}, defaulting to {default}");
            default
        })
    })
}

/// The subscriber [`init`] installs: compact output, UTC timestamps, mxrelay targets only.
pub fn subscriber<W>(level: LevelFilter, writer: W, ansi: bool) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    tracing_subscriber::Registry::default().with(
        tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_ansi(ansi)
            .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
            .with_filter(level)
            .with_filter(FilterFn::new(|metadata| {
                metadata.target().starts_with("mxrelay")
            })),
    )
}

/// Installs the global subscriber, logging to stderr so stdout stays free for output.
///
/// Colour is only used when stderr is a terminal. Calling this more than once
/// leaves the first subscriber in place.
pub fn init() {
    let default = if cfg!(debug_assertions) {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    };

    let level = level_from(std::env::var(LOG_LEVEL_ENV).ok().as_deref(), default);
    let ansi = std::io::stderr().is_terminal();

    if let Err(error) = subscriber(level, std::io::stderr, ansi).try_init() {
        tracing::debug!(%error, "Logging was already initialised");
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn test_events_go_to_the_given_writer_only() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = subscriber(LevelFilter::INFO, move || writer.clone(), false);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "mxrelay_delivery::relay", "Relay complete");
            tracing::debug!(target: "mxrelay_delivery::relay", "Relaying");
            tracing::info!(target: "hickory_resolver", "not ours");
        });

        let text = captured.text();
        assert!(text.contains("Relay complete"));
        assert!(!text.contains("Relaying"));
        assert!(!text.contains("not ours"));
        assert!(!text.contains('\u{1b}'));
    }

    #[test]
    fn test_repeated_init_is_logged() {
        let captured = Captured::default();
        let writer = captured.clone();
        subscriber(LevelFilter::TRACE, move || writer.clone(), false)
            .try_init()
            .unwrap();

        init();

        assert!(captured.text().contains("Logging was already initialised"));
    }

    #[test]
    fn test_level_from() {
        assert_eq!(level_from(None, LevelFilter::INFO), LevelFilter::INFO);
        assert_eq!(level_from(Some("debug"), LevelFilter::INFO), LevelFilter::DEBUG);
        assert_eq!(level_from(Some("nonsense"), LevelFilter::WARN), LevelFilter::WARN);
    }
}

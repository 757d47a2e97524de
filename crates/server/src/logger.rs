//! Logger initialization for the server.

use jiff::{Zoned, tz::TimeZone};
use logforth::{
    append::Stderr,
    filter::EnvFilter,
    layout::Layout,
};
use std::{fmt::Write, io::IsTerminal, str::FromStr, sync::Once};

static INIT: Once = Once::new();

/// Stderr line layout: UTC millisecond timestamp, level, log target,
/// message.
#[derive(Debug)]
struct LineLayout {
    color: bool,
}

impl LineLayout {
    fn for_stderr() -> Self {
        Self {
            color: std::io::stderr().is_terminal(),
        }
    }

    fn level_markup(level: log::Level) -> (&'static str, &'static str) {
        match level {
            log::Level::Error => ("\x1b[1;31m", "\x1b[0m"),
            log::Level::Warn => ("\x1b[1;33m", "\x1b[0m"),
            log::Level::Info => ("\x1b[1;32m", "\x1b[0m"),
            log::Level::Debug => ("\x1b[1;36m", "\x1b[0m"),
            log::Level::Trace => ("\x1b[1;90m", "\x1b[0m"),
        }
    }
}

impl Layout for LineLayout {
    fn format(
        &self,
        record: &log::Record<'_>,
        _diagnostics: &[Box<dyn logforth::diagnostic::Diagnostic>],
    ) -> anyhow::Result<Vec<u8>> {
        let timestamp = Zoned::now()
            .with_time_zone(TimeZone::UTC)
            .strftime("%Y-%m-%dT%H:%M:%S%.3fZ");

        let (color_on, color_off) = if self.color {
            Self::level_markup(record.level())
        } else {
            ("", "")
        };

        let mut line = String::new();

        write!(
            line,
            "{timestamp} {color_on}{level:<5}{color_off} {target}: {message}",
            level = record.level(),
            target = record.target(),
            message = record.args(),
        )?;

        Ok(line.into_bytes())
    }
}

/// Initialize the logger.
///
/// The filter is a string like `info` or `llm=debug,server=debug`.
pub fn init_logger(log_filter: &str) {
    let log_filter = log_filter.to_owned();

    INIT.call_once(move || {
        logforth::builder()
            .dispatch(move |d| {
                let filter = EnvFilter::from_str(&log_filter)
                    .unwrap_or_else(|_| EnvFilter::from_str("info").expect("default filter should be valid"));

                d.filter(filter).append(Stderr::default().with_layout(LineLayout::for_stderr()))
            })
            .apply();
    });
}

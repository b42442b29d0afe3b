//! Tracing subscriber setup: a colourised console and a plain log file.

use std::fmt;
use std::sync::Mutex;

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use colored::{ColoredString, Colorize};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::{self, Writer};
use tracing_subscriber::fmt::{FmtContext, FormatEvent};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::HarvestError;

/// Console event format: time, a level marker, then the event fields.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleFormatter;

impl<S, N> FormatEvent<S, N> for ConsoleFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> format::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let (marker, paint): (&str, fn(ColoredString) -> ColoredString) =
            match *event.metadata().level() {
                Level::TRACE => ("[ ]", |text| text.dimmed()),
                Level::DEBUG => ("[?]", |text| text.blue()),
                Level::INFO => ("[+]", |text| text.green().bold()),
                Level::WARN => ("[*]", |text| text.yellow().bold()),
                Level::ERROR => ("[-]", |text| text.red().bold()),
            };

        let time = chrono::Local::now().format("%H:%M:%S").to_string();
        write!(writer, "{} {} ", time.as_str().dimmed(), paint(marker.into()))?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Console verbosity for the `--verbose` flag.
#[must_use]
pub const fn console_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    }
}

/// Installs the global subscriber.
///
/// Console output goes to stderr at [`console_level`]. Every event down to
/// DEBUG is also appended to `log_file`, whose parent directory is created
/// when missing.
///
/// # Errors
///
/// Returns [`HarvestError::Logging`] when the log file cannot be created or a
/// global subscriber is already installed.
pub fn init(log_file: &Utf8Path, verbose: bool) -> Result<(), HarvestError> {
    let file = open_log_file(log_file).map_err(HarvestError::Logging)?;

    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .event_format(ConsoleFormatter)
        .with_filter(console_level(verbose));
    let persistent = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .with_filter(LevelFilter::DEBUG);

    tracing_subscriber::registry()
        .with(console)
        .with(persistent)
        .try_init()
        .map_err(|err| HarvestError::Logging(err.to_string()))
}

fn open_log_file(path: &Utf8Path) -> Result<std::fs::File, String> {
    let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    let name = path
        .file_name()
        .ok_or_else(|| format!("log path {path} has no file name"))?;
    Dir::create_ambient_dir_all(parent, ambient_authority())
        .map_err(|err| format!("{parent}: {err}"))?;
    let dir = Dir::open_ambient_dir(parent, ambient_authority())
        .map_err(|err| format!("{parent}: {err}"))?;
    let file = dir.create(name).map_err(|err| format!("{path}: {err}"))?;
    Ok(file.into_std())
}

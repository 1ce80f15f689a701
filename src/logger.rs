//! Diagnostics for the `toolbelt` binary
//!
//! Tool output owns stdout and most of stderr, so log lines stay short on the
//! terminal: a coloured level tag and the message. A log file, when requested,
//! gets the full record with the time since startup and the emitting module.

use std::fmt::Arguments;
use std::fs::File;
use std::io::Write;
use std::time::Instant;

use anstyle::{AnsiColor, Reset, Style};
use log::{Level, LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;

struct ToolbeltLogger {
    level: LevelFilter,
    started: Instant,
    file: Option<Mutex<File>>,
}

impl Log for ToolbeltLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        eprintln!("{}", terminal_line(record.level(), record.args()));
        if let Some(file) = &self.file {
            let line = file_line(
                self.started.elapsed().as_secs_f64(),
                record.level(),
                record.target(),
                record.args(),
            );
            // Losing a log line is preferable to failing the tool run
            let _ = writeln!(file.lock(), "{line}");
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            let _ = file.lock().flush();
        }
    }
}

fn terminal_line(level: Level, message: &Arguments<'_>) -> String {
    let style = level_style(level);
    format!("{style}{level:>5}{Reset} {message}")
}

fn file_line(elapsed: f64, level: Level, target: &str, message: &Arguments<'_>) -> String {
    format!("{elapsed:>9.3}s {level:<5} {target}: {message}")
}

/// Install the process-wide logger.
///
/// `RUST_LOG` (a plain level such as `debug`) takes precedence over `level`,
/// which the binary derives from `-v`.
///
/// # Panics
///
/// Panics if a logger has already been installed.
pub fn init(log_file: Option<File>, level: LevelFilter) {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(level);

    let logger = ToolbeltLogger {
        level,
        started: Instant::now(),
        file: log_file.map(Mutex::new),
    };
    log::set_boxed_logger(Box::new(logger)).expect("logger already initialized");
    log::set_max_level(level);
}

/// Colour of the level tag on the terminal
#[must_use]
pub fn level_style(level: Level) -> Style {
    let color = match level {
        Level::Error => AnsiColor::Red,
        Level::Warn => AnsiColor::Yellow,
        Level::Info => AnsiColor::Blue,
        Level::Debug | Level::Trace => AnsiColor::BrightBlack,
    };
    Style::new().fg_color(Some(anstyle::Color::Ansi(color)))
}

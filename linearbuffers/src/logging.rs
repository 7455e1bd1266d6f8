//! Logging facility (§2/§9), grounded on `original_source/src/debug.c`:
//! a single process-wide level, one-letter aliases, serialized
//! writes to stderr. Re-expressed here as a [`log::Log`] implementation
//! fed through the `log` facade, rather than debug.c's own
//! print-to-stderr calls, so code elsewhere in the crate just uses
//! `log::{error,warn,info,debug}!` like any other Rust crate.
//!
//! `debug.c` has a sixth tier, `notice`, between `warning` and `info`
//! that the `log` crate's five-level `Level` enum has no slot for.
//! Rather than silently collapsing it into `Info`, [`notice!`] checks
//! the same atomic threshold directly and writes its own line,
//! keeping all six tiers distinguishable in output.

use std::io::Write;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;

use log::{Level, LevelFilter, Log, Metadata, Record};

/// The six tiers debug.c recognizes, in increasing verbosity.
#[derive(Debug, Copy, Clone, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Silent = 0,
    Error = 1,
    Warning = 2,
    Notice = 3,
    Info = 4,
    Debug = 5,
}

impl LogLevel {
    /// Parse a level name or its one-letter alias, case-insensitively
    /// (debug.c: `s`, `e`, `w`, `n`, `i`, `d`).
    pub fn parse(s: &str) -> Option<LogLevel> {
        match s.to_ascii_lowercase().as_str() {
            "s" | "silent" => Some(LogLevel::Silent),
            "e" | "error" => Some(LogLevel::Error),
            "w" | "warning" => Some(LogLevel::Warning),
            "n" | "notice" => Some(LogLevel::Notice),
            "i" | "info" => Some(LogLevel::Info),
            "d" | "debug" => Some(LogLevel::Debug),
            _ => None,
        }
    }

    fn to_filter(self) -> LevelFilter {
        match self {
            LogLevel::Silent => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warning => LevelFilter::Warn,
            LogLevel::Notice | LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
        }
    }

    fn as_u8(self) -> u8 {
        self as u8
    }
}

static CURRENT_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Error as u8);
static WRITE_LOCK: Mutex<()> = Mutex::new(());

struct Logger;

static LOGGER: Logger = Logger;

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= current_level().to_filter()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let tag = match record.level() {
            Level::Error => "error",
            Level::Warn => "warning",
            Level::Info => "info",
            Level::Debug => "debug",
            Level::Trace => "trace",
        };
        write_line(tag, format_args!("{}", record.args()));
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn write_line(tag: &str, args: std::fmt::Arguments<'_>) {
    let _guard = WRITE_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let _ = writeln!(std::io::stderr(), "linearbuffers: {tag}: {args}");
}

/// Install this crate's logger as the global `log` logger and set the
/// initial level. Call once, from `main`; safe to call more than once
/// (subsequent calls only adjust the level).
pub fn init(level: LogLevel) {
    CURRENT_LEVEL.store(level.as_u8(), Ordering::Relaxed);
    log::set_max_level(level.to_filter());
    let _ = log::set_logger(&LOGGER);
}

pub fn set_level(level: LogLevel) {
    CURRENT_LEVEL.store(level.as_u8(), Ordering::Relaxed);
    log::set_max_level(level.to_filter());
}

fn current_level() -> LogLevel {
    match CURRENT_LEVEL.load(Ordering::Relaxed) {
        0 => LogLevel::Silent,
        1 => LogLevel::Error,
        2 => LogLevel::Warning,
        3 => LogLevel::Notice,
        4 => LogLevel::Info,
        _ => LogLevel::Debug,
    }
}

/// Log at the `notice` tier (debug.c's tier between `warning` and
/// `info`, which `log::Level` has no slot for).
#[macro_export]
macro_rules! notice {
    ($($arg:tt)*) => {
        $crate::logging::notice_impl(format_args!($($arg)*))
    };
}

#[doc(hidden)]
pub fn notice_impl(args: std::fmt::Arguments<'_>) {
    if current_level() >= LogLevel::Notice {
        write_line("notice", args);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_aliases_case_insensitively() {
        assert_eq!(LogLevel::parse("Debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("d"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("N"), Some(LogLevel::Notice));
        assert_eq!(LogLevel::parse("bogus"), None);
    }

    #[test]
    fn levels_are_ordered_silent_to_debug() {
        assert!(LogLevel::Silent < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Notice);
        assert!(LogLevel::Notice < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Debug);
    }
}

//! Structured console logging for coinwatch
//!
//! Small, dependency-light logger with per-module tags, level filtering and
//! colored aligned output.
//!
//! ## Usage
//!
//! ```rust
//! use coinwatch::logger::{self, LogTag};
//!
//! logger::error(LogTag::Api, "Connection failed");
//! logger::warning(LogTag::Tracker, "Serving stale record");
//! logger::info(LogTag::Monitor, "Sweep refreshed 100 tokens");
//! logger::debug(LogTag::Store, "Upsert rejected: older timestamp"); // only with --debug-store
//! ```
//!
//! Filtering rules:
//! - Errors are always shown
//! - `--quiet` suppresses info and debug
//! - Debug lines require `--debug-all` or the tag's own `--debug-<module>` flag

use chrono::Local;
use colored::Colorize;

use crate::arguments;

/// Per-subsystem log tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTag {
    System,
    Config,
    Api,
    Store,
    Tracker,
    Monitor,
    Web,
}

impl LogTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Config => "CONFIG",
            LogTag::Api => "API",
            LogTag::Store => "STORE",
            LogTag::Tracker => "TRACKER",
            LogTag::Monitor => "MONITOR",
            LogTag::Web => "WEB",
        }
    }

    /// Command-line flag enabling debug output for this tag
    pub fn debug_flag(&self) -> &'static str {
        match self {
            LogTag::System => "--debug-system",
            LogTag::Config => "--debug-config",
            LogTag::Api => "--debug-api",
            LogTag::Store => "--debug-store",
            LogTag::Tracker => "--debug-tracker",
            LogTag::Monitor => "--debug-monitor",
            LogTag::Web => "--debug-web",
        }
    }
}

/// Log severity, ordered from most to least critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warning,
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }
}

const TAG_WIDTH: usize = 7;
const LEVEL_WIDTH: usize = 5;

fn should_log(tag: LogTag, level: LogLevel) -> bool {
    match level {
        LogLevel::Error => true,
        LogLevel::Warning => true,
        LogLevel::Info => !arguments::is_quiet_enabled(),
        LogLevel::Debug => {
            arguments::is_debug_all_enabled() || arguments::has_arg(tag.debug_flag())
        }
    }
}

fn format_tag(tag: LogTag) -> String {
    let padded = format!("{:<width$}", tag.as_str(), width = TAG_WIDTH);
    match tag {
        LogTag::System => padded.cyan().to_string(),
        LogTag::Config => padded.magenta().to_string(),
        LogTag::Api => padded.blue().to_string(),
        LogTag::Store => padded.yellow().to_string(),
        LogTag::Tracker => padded.green().to_string(),
        LogTag::Monitor => padded.purple().to_string(),
        LogTag::Web => padded.bright_blue().to_string(),
    }
}

fn format_level(level: LogLevel) -> String {
    let padded = format!("{:<width$}", level.as_str(), width = LEVEL_WIDTH);
    match level {
        LogLevel::Error => padded.red().bold().to_string(),
        LogLevel::Warning => padded.yellow().to_string(),
        LogLevel::Info => padded.normal().to_string(),
        LogLevel::Debug => padded.dimmed().to_string(),
    }
}

fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    if !should_log(tag, level) {
        return;
    }

    let time = Local::now().format("%H:%M:%S").to_string();
    println!(
        "{} [{}] [{}] {}",
        time.dimmed(),
        format_tag(tag),
        format_level(level),
        message
    );
}

/// Log at ERROR level (always shown)
pub fn error(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level
pub fn warning(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level (suppressed by --quiet)
pub fn info(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level (requires --debug-all or --debug-<module>)
pub fn debug(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Debug, message);
}

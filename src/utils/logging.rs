// Tue Jan 13 2026 - Alex

use colored::*;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::time::Instant;

/// Subsystem log targets.
pub mod targets {
    pub const REGISTRY: &str = "registry";
    pub const PATCHER: &str = "patcher";
    pub const LAZY: &str = "lazy";
    pub const CRAWLER: &str = "crawler";
    pub const REPORTER: &str = "reporter";
}

pub struct LoggingUtils;

impl LoggingUtils {
    /// `RUST_LOG` wins when set; otherwise the coloured stderr logger at the
    /// level the verbosity flag asks for.
    pub fn init(verbosity: u8, quiet: bool) {
        if std::env::var_os("RUST_LOG").is_some() {
            init_from_env();
            return;
        }

        let level = if quiet {
            LevelFilter::Error
        } else {
            Self::level_from_verbosity(verbosity)
        };
        Self::init_logger(level, std::env::var_os("NO_COLOR").is_none());
    }

    pub fn init_logger(level: LevelFilter, use_color: bool) {
        let logger = Box::new(ColoredLogger { level, use_color });
        if log::set_boxed_logger(logger).is_ok() {
            log::set_max_level(level);
        }
    }

    pub fn level_from_str(s: &str) -> LevelFilter {
        match s.to_lowercase().as_str() {
            "error" => LevelFilter::Error,
            "warn" | "warning" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "debug" => LevelFilter::Debug,
            "trace" => LevelFilter::Trace,
            "off" => LevelFilter::Off,
            _ => LevelFilter::Info,
        }
    }

    pub fn level_from_verbosity(verbosity: u8) -> LevelFilter {
        match verbosity {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

struct ColoredLogger {
    level: LevelFilter,
    use_color: bool,
}

impl ColoredLogger {
    fn format_level(&self, level: Level) -> String {
        if !self.use_color {
            return format!("{:5}", level);
        }
        let label = match level {
            Level::Error => "ERROR".red().bold(),
            Level::Warn => "WARN ".yellow().bold(),
            Level::Info => "INFO ".green().bold(),
            Level::Debug => "DEBUG".blue().bold(),
            Level::Trace => "TRACE".magenta().bold(),
        };
        label.to_string()
    }
}

impl Log for ColoredLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let target = format!("[{}]", record.target());
        let target = if self.use_color { target.dimmed().to_string() } else { target };
        eprintln!("{} {} {}", self.format_level(record.level()), target, record.args());
    }

    fn flush(&self) {}
}

pub fn init_from_env() {
    let _ = env_logger::Builder::from_default_env()
        .format_timestamp_millis()
        .try_init();
}

/// Logs how long a scope took, at debug level, when dropped.
pub struct ScopedTimer {
    name: String,
    target: &'static str,
    start: Instant,
}

impl ScopedTimer {
    pub fn new(target: &'static str, name: &str) -> Self {
        log::debug!(target: target, "{} started", name);
        Self {
            name: name.to_string(),
            target,
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        log::debug!(target: self.target, "{} took {:.2}ms", self.name, self.elapsed_ms());
    }
}

pub fn scoped_timer(target: &'static str, name: &str) -> ScopedTimer {
    ScopedTimer::new(target, name)
}

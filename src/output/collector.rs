// Tue Jan 13 2026 - Alex

use crate::config::Config;
use crate::output::channel::{Category, DiagnosticLine};
use crate::output::report::{BadStart, Report};
use crate::output::OutputError;
use crate::patch::BadPatchKind;
use log::{debug, warn};
use regex::Regex;
use std::io::BufRead;

/// Host errors that show up on every run and say nothing about patches.
pub const DEFAULT_IGNORED_ERRORS: &[&str] = &[
    r"KeybindStore: Looking for callback action",
    r"Unable to process domain list delta: Client revision number is null",
    r"Downloading the full bloom filter blocklist",
    r"Failed to load resource",
    r"net::ERR_",
];

/// Builds a [`Report`] from diagnostic lines. Lines without the sentinel
/// are host console output; those mentioning `Error` count as host errors.
pub struct ReportCollector {
    sentinel: String,
    ignored: Vec<Regex>,
    report: Report,
}

impl ReportCollector {
    pub fn new(sentinel: impl Into<String>, ignored: &[String]) -> Result<Self, OutputError> {
        let mut patterns = Vec::with_capacity(DEFAULT_IGNORED_ERRORS.len() + ignored.len());
        for source in DEFAULT_IGNORED_ERRORS
            .iter()
            .copied()
            .chain(ignored.iter().map(String::as_str))
        {
            let regex = Regex::new(source).map_err(|e| OutputError::InvalidPattern {
                pattern: source.to_string(),
                reason: e.to_string(),
            })?;
            patterns.push(regex);
        }

        Ok(Self {
            sentinel: sentinel.into(),
            ignored: patterns,
            report: Report::new(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, OutputError> {
        Self::new(config.sentinel.clone(), &config.ignored_errors)
    }

    pub fn feed(&mut self, raw: &str) {
        match DiagnosticLine::parse(raw, &self.sentinel) {
            Some(line) => self.feed_line(line),
            None if raw.contains("Error") => self.host_error(raw.trim().to_string()),
            None => {}
        }
    }

    pub fn feed_line(&mut self, line: DiagnosticLine) {
        match line.category {
            Category::PatchFailure => match line.as_bad_patch() {
                Some(bad) if bad.kind == BadPatchKind::Slow => self.report.slow_patches.push(bad),
                Some(bad) => self.report.bad_patches.push(bad),
                None => {
                    warn!(target: "reporter", "Unreadable patch failure: {}", line.payload);
                    self.report.other_errors.push(line.payload);
                }
            },
            Category::FindFailure => {
                let description = line.find_description().unwrap_or_default().to_string();
                self.report.bad_finds.push(description);
            }
            Category::StartFailure => {
                let (plugin, error) = line
                    .as_bad_start()
                    .unwrap_or_else(|| (line.payload.clone(), String::new()));
                self.report.bad_starts.push(BadStart { plugin, error });
            }
            Category::HostError => self.host_error(line.payload),
            Category::Fatal => {
                if self.report.fatal.is_none() {
                    self.report.fatal = Some(line.payload);
                }
            }
            Category::Finished => self.report.finished = true,
        }
    }

    fn host_error(&mut self, message: String) {
        if self.ignored.iter().any(|r| r.is_match(&message)) {
            debug!(target: "reporter", "Ignoring known host error: {}", message);
            self.report.ignored_errors.push(message);
        } else {
            self.report.other_errors.push(message);
        }
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    pub fn finish(self) -> Report {
        self.report
    }

    pub fn collect_reader<R: BufRead>(mut self, reader: R) -> Result<Report, OutputError> {
        for line in reader.lines() {
            self.feed(&line?);
        }
        Ok(self.finish())
    }
}

// Tue Jan 13 2026 - Alex

use crate::crawler::CrawlStats;
use crate::output::{DiagnosticLine, Report};
use crate::registry::ModuleRecord;
use crate::utils::string::truncate;
use colored::*;

const PREVIEW_LEN: usize = 96;

pub struct DisplayRenderer {
    max_items: Option<usize>,
}

impl DisplayRenderer {
    pub fn new() -> Self {
        Self { max_items: None }
    }

    pub fn with_max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    fn limit(&self, len: usize) -> usize {
        self.max_items.map_or(len, |max| max.min(len))
    }

    pub fn render_summary(&self, report: &Report, stats: Option<&CrawlStats>) -> String {
        let mut lines = vec![format!("{}", "Verification Summary".cyan().bold()), format!("{}", "-".repeat(40).cyan())];

        if let Some(stats) = stats {
            lines.push(format!("  Modules scanned: {}", stats.modules_scanned.to_string().green()));
            lines.push(format!(
                "  Chunks loaded: {} ({} invalid)",
                stats.valid_chunks.to_string().green(),
                stats.invalid_chunks.to_string().yellow()
            ));
            lines.push(format!("  Poll cycles: {}", stats.poll_cycles));
        }

        lines.push(Self::count_line("Bad patches", report.bad_patches.len(), false));
        lines.push(Self::count_line("Slow patches", report.slow_patches.len(), true));
        lines.push(Self::count_line("Bad finds", report.bad_finds.len(), false));
        lines.push(Self::count_line("Bad starts", report.bad_starts.len(), false));
        lines.push(Self::count_line("Host errors", report.other_errors.len(), false));
        if !report.ignored_errors.is_empty() {
            lines.push(format!("  Ignored errors: {}", report.ignored_errors.len().to_string().dimmed()));
        }

        for bad in report.bad_patches.iter().take(self.limit(report.bad_patches.len())) {
            lines.push(format!("  {} {}", "[-]".red(), DiagnosticLine::patch(bad).payload));
        }
        for find in report.bad_finds.iter().take(self.limit(report.bad_finds.len())) {
            lines.push(format!("  {} {}", "[-]".red(), find));
        }

        lines.push(String::new());
        lines.push(match (&report.fatal, report.has_findings()) {
            (Some(reason), _) => format!("{} Aborted: {}", "[!]".red().bold(), reason),
            (None, true) => format!("{} {} findings", "[!]".yellow().bold(), report.finding_count()),
            (None, false) => format!("{} Everything patched and found", "[+]".green().bold()),
        });
        lines.join("\n")
    }

    fn count_line(label: &str, count: usize, warning_only: bool) -> String {
        let value = match (count, warning_only) {
            (0, _) => count.to_string().green(),
            (_, true) => count.to_string().yellow(),
            (_, false) => count.to_string().red(),
        };
        format!("  {}: {}", label, value)
    }

    pub fn render_match(&self, record: &ModuleRecord) -> String {
        let preview = record.raw_source().replace('\n', " ");
        format!("{} {}", record.id.to_string().cyan(), truncate(&preview, PREVIEW_LEN).dimmed())
    }
}

impl Default for DisplayRenderer {
    fn default() -> Self {
        Self::new()
    }
}

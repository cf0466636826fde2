// Tue Jan 13 2026 - Alex

use super::args::{Args, CollectArgs, Command, SearchArgs, VerifyArgs};
use crate::config::Config;
use crate::crawler::CrawlStats;
use crate::engine::Engine;
use crate::host::SnapshotHost;
use crate::manifest::ExtensionManifest;
use crate::output::{deliver, Report, ReportCollector};
use crate::pattern::fragment::parse_all;
use crate::ui::display::DisplayRenderer;
use crate::ui::progress::CrawlSpinner;
use crate::utils::LoggingUtils;
use crate::validation::VerificationRunner;
use anyhow::Context;
use colored::Colorize;
use std::io::{self, BufReader};
use std::path::Path;
use std::rc::Rc;

pub const EXIT_CLEAN: i32 = 0;
pub const EXIT_FINDINGS: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

/// Summary lines shown per finding section before it is cut.
const SUMMARY_ITEMS: usize = 20;

pub struct CommandHandler {
    quiet: bool,
}

impl CommandHandler {
    pub fn new() -> Self {
        Self { quiet: false }
    }

    /// Runs one subcommand and returns the process exit status.
    pub fn execute(&mut self, args: Args) -> anyhow::Result<i32> {
        self.quiet = args.quiet;
        if args.no_color {
            colored::control::set_override(false);
        }
        LoggingUtils::init(args.verbose, args.quiet);

        match args.command {
            Command::Verify(verify_args) => self.handle_verify(verify_args),
            Command::Collect(collect_args) => self.handle_collect(collect_args),
            Command::Search(search_args) => self.handle_search(search_args),
        }
    }

    fn load_config(&self, path: Option<&Path>) -> anyhow::Result<Config> {
        match path {
            Some(path) => Config::load(path).with_context(|| format!("loading config {}", path.display())),
            None => Ok(Config::default()),
        }
    }

    fn status(&self, message: String) {
        if !self.quiet {
            println!("{}", message);
        }
    }

    fn handle_verify(&self, args: VerifyArgs) -> anyhow::Result<i32> {
        args.validate().map_err(|e| anyhow::anyhow!(e))?;

        let config = self.load_config(args.config.as_deref())?;
        let host = SnapshotHost::load(&args.snapshot)
            .with_context(|| format!("loading snapshot {}", args.snapshot.display()))?;
        let manifest = ExtensionManifest::load(&args.extensions)
            .with_context(|| format!("loading extensions {}", args.extensions.display()))?;

        self.status(format!(
            "{} Verifying {} extensions ({} patches) against {} modules",
            "[*]".blue(),
            manifest.extensions.len(),
            manifest.patch_count(),
            host.snapshot().modules.len()
        ));

        let spinner = CrawlSpinner::new(!self.quiet);
        let printer = spinner.clone();
        let runner = VerificationRunner::new(config.clone(), Rc::new(host))
            .with_line_sink(Box::new(move |line: &str| printer.println(line)))
            .with_progress(spinner.callback());

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .context("building runtime")?;
        let outcome = runtime.block_on(runner.run(&manifest))?;
        spinner.clear();

        self.write_reports(&outcome.report, &config, args.output.as_deref(), args.markdown.as_deref())?;

        if args.webhook {
            match &config.webhook {
                Some(webhook) => match deliver(webhook, &outcome.report, &config.report_title) {
                    Ok(()) => self.status(format!("{} Report delivered to webhook", "[+]".green())),
                    Err(e) => log::error!(target: "reporter", "Webhook delivery failed: {}", e),
                },
                None => log::warn!(target: "reporter", "--webhook given but no webhook is configured"),
            }
        }

        Ok(self.finish(&outcome.report, outcome.stats.as_ref()))
    }

    fn handle_collect(&self, args: CollectArgs) -> anyhow::Result<i32> {
        let config = self.load_config(args.config.as_deref())?;
        let collector = ReportCollector::from_config(&config)?;

        let report = if args.reads_stdin() {
            collector.collect_reader(io::stdin().lock())?
        } else {
            let file = std::fs::File::open(&args.input).with_context(|| format!("opening {}", args.input))?;
            collector.collect_reader(BufReader::new(file))?
        };

        self.write_reports(&report, &config, args.output.as_deref(), args.markdown.as_deref())?;
        Ok(self.finish(&report, None))
    }

    fn handle_search(&self, args: SearchArgs) -> anyhow::Result<i32> {
        let fragments = parse_all(&args.fragments).context("parsing fragments")?;
        let host = SnapshotHost::load(&args.snapshot)
            .with_context(|| format!("loading snapshot {}", args.snapshot.display()))?;
        let factories = host.all_factories();

        let engine = Engine::new(Config::default(), Rc::new(host));
        for factory in factories {
            engine.intercept(factory);
        }

        let registry = engine.registry();
        let matches = registry.search(&fragments);
        let renderer = DisplayRenderer::new();
        for record in &matches {
            println!("{}", renderer.render_match(record));
        }
        self.status(format!("{} {} matching modules", "[*]".blue(), matches.len()));

        Ok(if matches.is_empty() { EXIT_FINDINGS } else { EXIT_CLEAN })
    }

    fn write_reports(
        &self,
        report: &Report,
        config: &Config,
        json: Option<&Path>,
        markdown: Option<&Path>,
    ) -> anyhow::Result<()> {
        if let Some(path) = json {
            report
                .save_json(path)
                .with_context(|| format!("writing {}", path.display()))?;
            self.status(format!("{} Report saved to: {}", "[+]".green(), path.display()));
        }
        if let Some(path) = markdown {
            report
                .save_markdown(path, &config.report_title)
                .with_context(|| format!("writing {}", path.display()))?;
            self.status(format!("{} Markdown report saved to: {}", "[+]".green(), path.display()));
        }
        Ok(())
    }

    fn finish(&self, report: &Report, stats: Option<&CrawlStats>) -> i32 {
        self.status(String::new());
        self.status(DisplayRenderer::new().with_max_items(SUMMARY_ITEMS).render_summary(report, stats));
        exit_code(report)
    }
}

impl Default for CommandHandler {
    fn default() -> Self {
        Self::new()
    }
}

pub fn exit_code(report: &Report) -> i32 {
    if report.is_fatal() {
        EXIT_FATAL
    } else if report.has_findings() {
        EXIT_FINDINGS
    } else {
        EXIT_CLEAN
    }
}

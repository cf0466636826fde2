// Tue Jan 13 2026 - Alex

use crate::config::Config;
use crate::crawler::{ChunkCrawler, CrawlError, CrawlStats, CrawlState};
use crate::engine::Engine;
use crate::host::BundleHost;
use crate::manifest::{install, ExtensionManifest};
use crate::output::{DiagnosticLine, OutputError, Report, ReportCollector};
use crate::utils::logging::{scoped_timer, targets};
use log::info;
use std::rc::Rc;

pub type LineSink = Box<dyn FnMut(&str)>;
pub type CrawlProgress = Box<dyn Fn(CrawlState, &CrawlStats)>;

pub struct VerificationOutcome {
    pub report: Report,
    pub stats: Option<CrawlStats>,
    pub lines: Vec<DiagnosticLine>,
}

/// One full verification: install extensions, boot the host, crawl every
/// chunk, then report every patch and lookup that never landed.
pub struct VerificationRunner {
    config: Config,
    host: Rc<dyn BundleHost>,
    sink: Option<LineSink>,
    progress: Option<CrawlProgress>,
}

impl VerificationRunner {
    pub fn new(config: Config, host: Rc<dyn BundleHost>) -> Self {
        Self {
            config,
            host,
            sink: None,
            progress: None,
        }
    }

    /// Receives each diagnostic line, rendered, as soon as it is produced.
    pub fn with_line_sink(mut self, sink: LineSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_progress(mut self, progress: CrawlProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub async fn run(self, manifest: &ExtensionManifest) -> Result<VerificationOutcome, OutputError> {
        let _timer = scoped_timer(targets::CRAWLER, "verification");
        let VerificationRunner {
            config,
            host,
            mut sink,
            progress,
        } = self;

        let mut collector = ReportCollector::from_config(&config)?;
        let mut lines = Vec::new();
        let mut emit = |line: DiagnosticLine| {
            if let Some(sink) = sink.as_mut() {
                sink(&line.render(&config.sentinel));
            }
            collector.feed_line(line.clone());
            lines.push(line);
        };

        let engine = Engine::new(config.clone(), host);
        let summary = install(&engine, manifest);
        for bad in &summary.failed {
            emit(DiagnosticLine::start(&bad.plugin, &bad.error));
        }

        let crawl = match engine.boot().await {
            Ok(()) => {
                let mut crawler = ChunkCrawler::new(engine.clone());
                if let Some(progress) = progress {
                    crawler = crawler.with_progress(progress);
                }
                crawler.run().await
            }
            Err(e) => Err(CrawlError::Host(e)),
        };

        let stats = match crawl {
            Ok(stats) => {
                let patches = engine.patches();
                for bad in patches
                    .bad_patches()
                    .iter()
                    .chain(patches.unfound().iter())
                    .chain(patches.slow_patches().iter())
                {
                    emit(DiagnosticLine::patch(bad));
                }
                drop(patches);

                for find in engine.replay_history().await {
                    emit(DiagnosticLine::find(&find));
                }
                Some(stats)
            }
            Err(CrawlError::Fatal(reason)) => {
                emit(DiagnosticLine::fatal(&reason));
                None
            }
            Err(e) => {
                emit(DiagnosticLine::fatal(&e.to_string()));
                None
            }
        };

        for error in engine.host_errors() {
            emit(DiagnosticLine::host_error(&error));
        }
        if stats.is_some() {
            emit(DiagnosticLine::finished());
        }

        let report = collector.finish();
        info!(
            target: "crawler",
            "Verification finished with {} findings{}",
            report.finding_count(),
            if report.is_fatal() { " (aborted)" } else { "" }
        );
        Ok(VerificationOutcome { report, stats, lines })
    }
}

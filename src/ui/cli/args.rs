// Tue Jan 13 2026 - Alex

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bundle-interceptor")]
#[command(author = "Alex")]
#[command(version)]
#[command(about = "Verifies that bundle extensions still patch and find what they expect")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Repeat for more detail (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Install extensions against a recorded bundle and crawl every chunk.
    Verify(VerifyArgs),
    /// Build a report from diagnostic lines produced elsewhere.
    Collect(CollectArgs),
    /// List modules whose source contains every fragment.
    Search(SearchArgs),
}

#[derive(ClapArgs, Debug)]
pub struct VerifyArgs {
    #[arg(short, long)]
    pub snapshot: PathBuf,

    #[arg(short, long)]
    pub extensions: PathBuf,

    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// JSON report destination.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub markdown: Option<PathBuf>,

    /// Deliver the report to the webhook in the config.
    #[arg(long)]
    pub webhook: bool,
}

impl VerifyArgs {
    pub fn validate(&self) -> Result<(), String> {
        if !self.snapshot.exists() {
            return Err(format!("Snapshot does not exist: {}", self.snapshot.display()));
        }
        if !self.extensions.exists() {
            return Err(format!("Extension manifest does not exist: {}", self.extensions.display()));
        }
        if let Some(config) = &self.config {
            if !config.exists() {
                return Err(format!("Config does not exist: {}", config.display()));
            }
        }
        Ok(())
    }
}

#[derive(ClapArgs, Debug)]
pub struct CollectArgs {
    /// Log file to read, or `-` for stdin.
    #[arg(short, long, default_value = "-")]
    pub input: String,

    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub markdown: Option<PathBuf>,
}

impl CollectArgs {
    pub fn reads_stdin(&self) -> bool {
        self.input == "-"
    }
}

#[derive(ClapArgs, Debug)]
pub struct SearchArgs {
    #[arg(short, long)]
    pub snapshot: PathBuf,

    /// Plain-text fragments; wrap in slashes (`/.../`) for a regex.
    #[arg(required = true)]
    pub fragments: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verify() {
        let args = Args::parse_from([
            "bundle-interceptor",
            "-vv",
            "verify",
            "--snapshot",
            "snap.json",
            "--extensions",
            "ext.json",
            "--webhook",
        ]);
        assert_eq!(args.verbose, 2);
        match args.command {
            Command::Verify(v) => {
                assert_eq!(v.snapshot, PathBuf::from("snap.json"));
                assert!(v.webhook);
                assert!(v.output.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_collect_defaults_to_stdin() {
        let args = Args::parse_from(["bundle-interceptor", "collect"]);
        match args.command {
            Command::Collect(c) => assert!(c.reads_stdin()),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_search_requires_fragments() {
        assert!(Args::try_parse_from(["bundle-interceptor", "search", "--snapshot", "s.json"]).is_err());
        let args = Args::try_parse_from(["bundle-interceptor", "--quiet", "search", "-s", "s.json", "a", "/b+/"]).unwrap();
        assert!(args.quiet);
    }

    #[test]
    fn test_verify_validate_missing_files() {
        let v = VerifyArgs {
            snapshot: PathBuf::from("/nonexistent/snap.json"),
            extensions: PathBuf::from("/nonexistent/ext.json"),
            config: None,
            output: None,
            markdown: None,
            webhook: false,
        };
        assert!(v.validate().is_err());
    }
}

// Tue Jan 13 2026 - Alex

pub mod args;
pub mod handler;

pub use args::{Args, CollectArgs, Command, SearchArgs, VerifyArgs};
pub use handler::{exit_code, CommandHandler, EXIT_CLEAN, EXIT_FATAL, EXIT_FINDINGS};

use clap::Parser;

pub fn parse_args() -> Args {
    Args::parse()
}

/// Parses the command line and runs it, returning the exit status.
pub fn run() -> anyhow::Result<i32> {
    let args = parse_args();
    CommandHandler::new().execute(args)
}

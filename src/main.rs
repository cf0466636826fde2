// Tue Jan 13 2026 - Alex

use colored::Colorize;

fn main() {
    match bundle_interceptor::ui::cli::run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "[!]".red(), e);
            std::process::exit(bundle_interceptor::ui::cli::EXIT_FINDINGS);
        }
    }
}

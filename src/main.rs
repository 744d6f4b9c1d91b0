//! Kodegen Bundler Create - scaffolds platform-native app bundles.
//!
//! Reads `Bundle.toml`, then creates a bundle directory for each app with
//! its template, runtime support package, requirements, code and launcher.

use kodegen_bundler_create::cli;
use std::process;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    // Run CLI and get exit code
    let exit_code = match cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            for suggestion in e.recovery_suggestions() {
                eprintln!("  {}", suggestion);
            }
            e.exit_code()
        }
    };

    process::exit(exit_code);
}

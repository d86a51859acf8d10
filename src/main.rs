mod cli;
mod error;
mod logging;
mod model;
mod orchestrator;
mod planner;
mod telemetry;
mod text_summary;
#[cfg(feature = "tui")]
mod tui;

use anyhow::Result;
use clap::Parser;
use logging::LogTarget;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let is_non_tui = args.json || args.text || !cfg!(feature = "tui");

    // The TUI owns the terminal, so its logs always go to a file.
    let default_log = if is_non_tui {
        None
    } else {
        logging::default_log_path()
    };
    let log_path = args.log_file.clone().or(default_log);
    match log_path.as_deref() {
        Some(path) => logging::init(LogTarget::File(path))?,
        None if is_non_tui => logging::init(LogTarget::Stderr)?,
        // No cache dir to log into; stay quiet rather than draw over the TUI.
        None => {}
    }

    match cli::run(args).await {
        Ok(()) => {
            // The stdin reader thread may still be parked on a read.
            if is_non_tui {
                std::process::exit(0);
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "plan review failed");
            Err(e)
        }
    }
}

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Log destination: stderr, or a file (`--log-file` or the TUI default).
pub enum LogTarget<'a> {
    /// Line-oriented modes share the terminal with logs on stderr.
    Stderr,
    /// The TUI owns the terminal; logs go to a file.
    File(&'a Path),
}

/// Default log file for interactive sessions, under the user's cache dir.
pub fn default_log_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("plan-review").join("plan-review.log"))
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the default `info` filter.
pub fn init(target: LogTarget<'_>) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    match target {
        LogTarget::Stderr => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|e| anyhow::anyhow!("install log subscriber: {e}"))?;
        }
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("failed to create log directory '{}'", parent.display())
                    })?;
                }
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file '{}'", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .try_init()
                .map_err(|e| anyhow::anyhow!("install log subscriber: {e}"))?;
        }
    }
    Ok(())
}
